use super::{decimal_at, NewPayment, PaymentRow, ReceiptRow, RecordedPayment, TuitionStore};
use crate::{
    billing::Payment,
    error::{TuitionError, TuitionResult},
    types::{EnrollmentId, PaymentId, StudentId},
};
use chrono::{Datelike, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Next correlative receipt code for the calendar year of `at`:
/// `{year}{seq}` with `seq` zero-padded to `digits`.
fn next_receipt_code(conn: &Connection, at: NaiveDateTime, digits: usize) -> TuitionResult<String> {
    let year = at.year();
    let last: Option<String> = conn
        .query_row(
            "SELECT code FROM receipt WHERE code LIKE ?1 ORDER BY code DESC LIMIT 1",
            params![format!("{year}%")],
            |row| row.get(0),
        )
        .optional()?;

    let seq = match last {
        Some(code) => {
            let tail = code.get(year.to_string().len()..).unwrap_or_default();
            tail.parse::<u64>().map_err(|_| {
                TuitionError::Conflict(format!("malformed receipt code '{code}'"))
            })? + 1
        }
        None => 1,
    };
    Ok(format!("{year}{seq:0digits$}"))
}

impl TuitionStore {
    // ── Payments ──────────────────────────────────────────────────

    /// Insert a payment and its receipt together.
    pub fn record_payment(
        &self,
        p:              &NewPayment,
        paid_at:        NaiveDateTime,
        receipt_digits: usize,
    ) -> TuitionResult<RecordedPayment> {
        let recorded = self.atomically("record payment", |conn| {
            let student_id: Option<StudentId> = conn
                .query_row(
                    "SELECT student_id FROM enrollment WHERE id = ?1",
                    params![p.enrollment_id],
                    |row| row.get(0),
                )
                .optional()?;
            let student_id = student_id.ok_or_else(|| TuitionError::NotFound {
                entity: "enrollment",
                key:    p.enrollment_id.to_string(),
            })?;

            conn.execute(
                "INSERT INTO payment (enrollment_id, concept, amount, paid_at, method, notes, operator, branch)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    p.enrollment_id,
                    p.concept,
                    p.amount.to_string(),
                    paid_at,
                    p.method,
                    p.notes,
                    p.operator,
                    p.branch,
                ],
            )?;
            let payment_id = conn.last_insert_rowid();

            let receipt_code = next_receipt_code(conn, paid_at, receipt_digits)?;
            conn.execute(
                "INSERT INTO receipt (payment_id, student_id, code, issued_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![payment_id, student_id, receipt_code, paid_at],
            )?;

            Ok(RecordedPayment { payment_id, receipt_code })
        })?;

        log::info!(
            "enrollment={} payment: recorded {} {} receipt={}",
            p.enrollment_id, p.concept, p.amount, recorded.receipt_code
        );
        Ok(recorded)
    }

    pub fn payment(&self, id: PaymentId) -> TuitionResult<Option<PaymentRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, enrollment_id, concept, amount, paid_at, method, notes, operator, branch
                 FROM payment WHERE id = ?1",
                params![id],
                Self::map_payment_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Payments of one enrollment, oldest first.
    pub fn payments_for_enrollment(&self, enrollment_id: EnrollmentId) -> TuitionResult<Vec<PaymentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, enrollment_id, concept, amount, paid_at, method, notes, operator, branch
             FROM payment WHERE enrollment_id = ?1
             ORDER BY paid_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![enrollment_id], Self::map_payment_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Engine view of an enrollment's payments.
    pub fn payments(&self, enrollment_id: EnrollmentId) -> TuitionResult<Vec<Payment>> {
        Ok(self
            .payments_for_enrollment(enrollment_id)?
            .into_iter()
            .map(|row| row.payment)
            .collect())
    }

    /// Remove a payment and its receipt together. Age policy is the
    /// caller's concern.
    pub fn delete_payment(&self, id: PaymentId) -> TuitionResult<()> {
        self.atomically("delete payment", |conn| {
            conn.execute("DELETE FROM receipt WHERE payment_id = ?1", params![id])?;
            let removed = conn.execute("DELETE FROM payment WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(TuitionError::NotFound {
                    entity: "payment",
                    key:    id.to_string(),
                });
            }
            Ok(())
        })?;
        log::info!("payment={id} payment: deleted with its receipt");
        Ok(())
    }

    pub fn receipt_for_payment(&self, payment_id: PaymentId) -> TuitionResult<Option<ReceiptRow>> {
        let receipt = self
            .conn
            .query_row(
                "SELECT id, payment_id, student_id, code, issued_at
                 FROM receipt WHERE payment_id = ?1",
                params![payment_id],
                |row| {
                    Ok(ReceiptRow {
                        id:         row.get(0)?,
                        payment_id: row.get(1)?,
                        student_id: row.get(2)?,
                        code:       row.get(3)?,
                        issued_at:  row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(receipt)
    }

    fn map_payment_row(row: &Row<'_>) -> rusqlite::Result<PaymentRow> {
        Ok(PaymentRow {
            id:            row.get(0)?,
            enrollment_id: row.get(1)?,
            payment: Payment {
                concept: row.get(2)?,
                amount:  decimal_at(row, 3)?,
                paid_at: row.get(4)?,
            },
            method:        row.get(5)?,
            notes:         row.get(6)?,
            operator:      row.get(7)?,
            branch:        row.get(8)?,
        })
    }
}
