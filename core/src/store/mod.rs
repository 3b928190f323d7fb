//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine modules (tariff, billing, progress) never execute SQL; the
//! treasury service loads rows through store methods and hands them over.

use crate::{
    concept::Concept,
    error::{TuitionError, TuitionResult},
    special_case::BillingWindow,
    tariff::EnrollmentKey,
    types::{EnrollmentId, PaymentId, StudentId, Year},
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rusqlite::{types::Type, Connection, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

mod custom;
mod enrollment;
mod payment;
mod reference;
mod special_case;

pub use reference::TariffSummaryRow;

pub struct TuitionStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl TuitionStore {
    pub fn open(path: &str) -> TuitionResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> TuitionResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    pub fn reopen(&self) -> TuitionResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> TuitionResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    /// Run `body` inside one IMMEDIATE transaction.
    ///
    /// The write lock is taken at BEGIN, so two writers touching the same
    /// enrollment serialize. Any error rolls everything back and comes out
    /// as a single `TuitionError::Transaction`.
    fn atomically<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&Connection) -> TuitionResult<T>,
    ) -> TuitionResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|e| TuitionError::transaction(operation, e.into()))?;

        match body(&*tx) {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| TuitionError::transaction(operation, e.into()))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    log::error!("{operation}: rollback failed: {rollback}");
                }
                log::warn!("{operation}: rolled back: {e}");
                Err(TuitionError::transaction(operation, e))
            }
        }
    }
}

// ── Column helpers ─────────────────────────────────────────────────

/// Decimal amounts are stored as text.
pub(crate) fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(text.trim())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn concept_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Concept> {
    let text: String = row.get(idx)?;
    text.parse::<Concept>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ── Row types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id:          EnrollmentId,
    pub student_id:  StudentId,
    pub year:        Year,
    pub branch:      String,
    pub course:      String,
    pub enrolled_on: NaiveDate,
    pub status:      String,
    pub window:      Option<BillingWindow>,
}

impl Enrollment {
    pub fn key(&self) -> EnrollmentKey {
        EnrollmentKey {
            year:   self.year,
            branch: self.branch.clone(),
            course: self.course.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub student_id:  StudentId,
    pub year:        Year,
    pub branch:      String,
    pub course:      String,
    pub enrolled_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id:            PaymentId,
    pub enrollment_id: EnrollmentId,
    #[serde(flatten)]
    pub payment:       crate::billing::Payment,
    pub method:        Option<String>,
    pub notes:         Option<String>,
    pub operator:      Option<String>,
    pub branch:        String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub enrollment_id: EnrollmentId,
    pub concept:       String,
    pub amount:        Decimal,
    pub method:        Option<String>,
    pub notes:         Option<String>,
    pub operator:      Option<String>,
    pub branch:        String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedPayment {
    pub payment_id:   PaymentId,
    pub receipt_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRow {
    pub id:         i64,
    pub payment_id: PaymentId,
    pub student_id: StudentId,
    pub code:       String,
    pub issued_at:  NaiveDateTime,
}
