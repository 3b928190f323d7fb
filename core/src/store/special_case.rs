use super::TuitionStore;
use crate::{
    error::{TuitionError, TuitionResult},
    special_case::SpecialCase,
    types::EnrollmentId,
};
use rusqlite::{params, Connection};

fn set_window(
    conn:          &Connection,
    enrollment_id: EnrollmentId,
    start:         Option<u32>,
    end:           Option<u32>,
) -> TuitionResult<()> {
    let changed = conn.execute(
        "UPDATE enrollment SET start_month = ?1, end_month = ?2 WHERE id = ?3",
        params![start, end, enrollment_id],
    )?;
    if changed == 0 {
        return Err(TuitionError::NotFound {
            entity: "enrollment",
            key:    enrollment_id.to_string(),
        });
    }
    Ok(())
}

impl TuitionStore {
    // ── Special cases ─────────────────────────────────────────────

    /// Replace every billing override of an enrollment with `case`.
    ///
    /// In one transaction: set the window, drop the custom tariff, drop the
    /// previous custom amounts, insert the new ones. Nothing is kept if any
    /// step fails.
    pub fn register_special_case(&self, case: &SpecialCase) -> TuitionResult<()> {
        let id = case.enrollment_id;
        self.atomically("register special case", |conn| {
            set_window(
                conn,
                id,
                Some(case.window.start.number()),
                Some(case.window.end.number()),
            )?;
            conn.execute("DELETE FROM custom_tariff WHERE enrollment_id = ?1", params![id])?;
            conn.execute(
                "DELETE FROM custom_monthly_amount WHERE enrollment_id = ?1",
                params![id],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO custom_monthly_amount (enrollment_id, concept, amount)
                 VALUES (?1, ?2, ?3)",
            )?;
            for row in &case.amounts {
                insert.execute(params![id, row.concept.label(), row.amount.to_string()])?;
            }
            Ok(())
        })?;
        log::info!(
            "enrollment={id} special_case: registered {}..{} with {} amounts",
            case.window.start,
            case.window.end,
            case.amounts.len()
        );
        Ok(())
    }

    /// Drop the custom amounts and the window. A custom tariff, if any,
    /// stays in place.
    pub fn clear_special_case(&self, enrollment_id: EnrollmentId) -> TuitionResult<()> {
        let removed = self.atomically("clear special case", |conn| {
            let removed = conn.execute(
                "DELETE FROM custom_monthly_amount WHERE enrollment_id = ?1",
                params![enrollment_id],
            )?;
            set_window(conn, enrollment_id, None, None)?;
            Ok(removed)
        })?;
        log::info!("enrollment={enrollment_id} special_case: cleared {removed} amounts");
        Ok(())
    }
}
