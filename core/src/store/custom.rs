//! Store methods for per-enrollment overrides: the custom flat tariff and
//! the per-concept custom amounts.

use super::{concept_at, decimal_at, TuitionStore};
use crate::{
    billing::{CustomAmounts, CustomMonthlyAmount},
    error::{TuitionError, TuitionResult},
    tariff::CustomTariff,
    types::EnrollmentId,
};
use rust_decimal::Decimal;
use rusqlite::{params, OptionalExtension};

impl TuitionStore {
    // ── Custom tariff ─────────────────────────────────────────────

    pub fn custom_tariff(&self, enrollment_id: EnrollmentId) -> TuitionResult<Option<CustomTariff>> {
        let tariff = self
            .conn
            .query_row(
                "SELECT id, enrollment_id, matriculation, monthly
                 FROM custom_tariff WHERE enrollment_id = ?1",
                params![enrollment_id],
                |row| {
                    Ok(CustomTariff {
                        id:            row.get(0)?,
                        enrollment_id: row.get(1)?,
                        matriculation: decimal_at(row, 2)?,
                        monthly:       decimal_at(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(tariff)
    }

    /// At most one custom tariff per enrollment.
    pub fn insert_custom_tariff(
        &self,
        enrollment_id: EnrollmentId,
        matriculation: Decimal,
        monthly:       Decimal,
    ) -> TuitionResult<i64> {
        if self.custom_tariff(enrollment_id)?.is_some() {
            return Err(TuitionError::Conflict(format!(
                "enrollment {enrollment_id} already has a custom tariff"
            )));
        }
        self.conn.execute(
            "INSERT INTO custom_tariff (enrollment_id, matriculation, monthly)
             VALUES (?1, ?2, ?3)",
            params![enrollment_id, matriculation.to_string(), monthly.to_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_custom_tariff(
        &self,
        id:            i64,
        matriculation: Decimal,
        monthly:       Decimal,
    ) -> TuitionResult<()> {
        let changed = self.conn.execute(
            "UPDATE custom_tariff SET matriculation = ?1, monthly = ?2 WHERE id = ?3",
            params![matriculation.to_string(), monthly.to_string(), id],
        )?;
        if changed == 0 {
            return Err(TuitionError::NotFound {
                entity: "custom tariff",
                key:    id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_custom_tariff(&self, id: i64) -> TuitionResult<()> {
        self.conn
            .execute("DELETE FROM custom_tariff WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Custom amounts ────────────────────────────────────────────

    pub fn custom_amount_rows(
        &self,
        enrollment_id: EnrollmentId,
    ) -> TuitionResult<Vec<CustomMonthlyAmount>> {
        let mut stmt = self.conn.prepare(
            "SELECT concept, amount FROM custom_monthly_amount
             WHERE enrollment_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![enrollment_id], |row| {
            Ok(CustomMonthlyAmount {
                concept: concept_at(row, 0)?,
                amount:  decimal_at(row, 1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn custom_amounts(&self, enrollment_id: EnrollmentId) -> TuitionResult<CustomAmounts> {
        let rows = self.custom_amount_rows(enrollment_id)?;
        Ok(rows.iter().collect())
    }
}
