//! Store methods for reference data: fee groups, course mappings and
//! standard tariffs.

use super::{decimal_at, TuitionStore};
use crate::{
    config::TreasuryConfig,
    error::{TuitionError, TuitionResult},
    tariff::{CourseFeeMapping, FeeGroup, StandardTariff},
    types::{FeeGroupId, Year},
};
use rust_decimal::Decimal;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Standard tariff joined with its group name, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffSummaryRow {
    pub year:          Year,
    pub fee_group_id:  FeeGroupId,
    pub group_name:    String,
    pub matriculation: Decimal,
    pub monthly:       Decimal,
}

fn insert_tariff(conn: &Connection, t: &StandardTariff) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO standard_tariff (year, fee_group_id, matriculation, monthly)
         VALUES (?1, ?2, ?3, ?4)",
        params![t.year, t.fee_group_id, t.matriculation.to_string(), t.monthly.to_string()],
    )
}

impl TuitionStore {
    // ── Seeding ───────────────────────────────────────────────────

    /// Load fee groups, mappings and tariffs from config. Rows that already
    /// exist are left untouched.
    pub fn seed_reference(&self, config: &TreasuryConfig) -> TuitionResult<()> {
        self.atomically("seed reference data", |conn| {
            for g in &config.fee_groups {
                conn.execute(
                    "INSERT OR IGNORE INTO fee_group (id, name) VALUES (?1, ?2)",
                    params![g.id, g.name],
                )?;
            }
            for m in &config.course_mappings {
                conn.execute(
                    "INSERT OR IGNORE INTO course_fee_group (course, branch, fee_group_id)
                     VALUES (?1, ?2, ?3)",
                    params![m.course, m.branch, m.fee_group_id],
                )?;
            }
            for t in &config.standard_tariffs {
                conn.execute(
                    "INSERT OR IGNORE INTO standard_tariff (year, fee_group_id, matriculation, monthly)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![t.year, t.fee_group_id, t.matriculation.to_string(), t.monthly.to_string()],
                )?;
            }
            Ok(())
        })?;
        log::info!(
            "reference: seeded {} groups, {} courses, {} tariffs",
            config.fee_groups.len(),
            config.course_mappings.len(),
            config.standard_tariffs.len()
        );
        Ok(())
    }

    // ── Fee groups ────────────────────────────────────────────────

    pub fn fee_groups(&self) -> TuitionResult<Vec<FeeGroup>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM fee_group ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(FeeGroup {
                id:   row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn course_mappings(&self) -> TuitionResult<Vec<CourseFeeMapping>> {
        let mut stmt = self.conn.prepare(
            "SELECT course, branch, fee_group_id FROM course_fee_group ORDER BY branch, course",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CourseFeeMapping {
                course:       row.get(0)?,
                branch:       row.get(1)?,
                fee_group_id: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Standard tariffs ──────────────────────────────────────────

    pub fn standard_tariffs_for_year(&self, year: Year) -> TuitionResult<Vec<StandardTariff>> {
        let mut stmt = self.conn.prepare(
            "SELECT year, fee_group_id, matriculation, monthly
             FROM standard_tariff WHERE year = ?1 ORDER BY fee_group_id",
        )?;
        let rows = stmt.query_map(params![year], |row| {
            Ok(StandardTariff {
                year:          row.get(0)?,
                fee_group_id:  row.get(1)?,
                matriculation: decimal_at(row, 2)?,
                monthly:       decimal_at(row, 3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn tariff_count_for_year(&self, year: Year) -> TuitionResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM standard_tariff WHERE year = ?1",
            params![year],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Insert a whole year's tariffs at once. Refuses a year that already
    /// has any tariff row.
    pub fn register_year_tariffs(
        &self,
        year:    Year,
        tariffs: &[StandardTariff],
    ) -> TuitionResult<()> {
        self.atomically("register year tariffs", |conn| {
            let existing: i64 = conn.query_row(
                "SELECT COUNT(*) FROM standard_tariff WHERE year = ?1",
                params![year],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Err(TuitionError::Conflict(format!(
                    "tariffs for {year} are already defined"
                )));
            }
            for t in tariffs {
                insert_tariff(conn, t)?;
            }
            Ok(())
        })?;
        log::info!("year={year} reference: registered {} tariffs", tariffs.len());
        Ok(())
    }

    /// Every tariff ever defined, newest year first, then by group name.
    pub fn tariff_history(&self) -> TuitionResult<Vec<TariffSummaryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.year, t.fee_group_id, g.name, t.matriculation, t.monthly
             FROM standard_tariff t
             JOIN fee_group g ON g.id = t.fee_group_id
             ORDER BY t.year DESC, g.name",
        )?;
        let rows = stmt.query_map([], Self::map_summary_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct group tariffs used by a branch in a year.
    pub fn branch_tariff_summary(
        &self,
        year:   Year,
        branch: &str,
    ) -> TuitionResult<Vec<TariffSummaryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT t.year, t.fee_group_id, g.name, t.matriculation, t.monthly
             FROM course_fee_group c
             JOIN fee_group g ON g.id = c.fee_group_id
             JOIN standard_tariff t ON t.year = ?1 AND t.fee_group_id = g.id
             WHERE c.branch = ?2
             ORDER BY g.name DESC",
        )?;
        let rows = stmt.query_map(params![year, branch], Self::map_summary_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Standard tariff a course would pay in a year, ignoring overrides.
    pub fn standard_tariff_for_course(
        &self,
        year:   Year,
        course: &str,
        branch: &str,
    ) -> TuitionResult<Option<StandardTariff>> {
        let tariff = self
            .conn
            .query_row(
                "SELECT t.year, t.fee_group_id, t.matriculation, t.monthly
                 FROM course_fee_group c
                 JOIN standard_tariff t ON t.fee_group_id = c.fee_group_id
                 WHERE c.course = ?1 AND c.branch = ?2 AND t.year = ?3",
                params![course, branch, year],
                |row| {
                    Ok(StandardTariff {
                        year:          row.get(0)?,
                        fee_group_id:  row.get(1)?,
                        matriculation: decimal_at(row, 2)?,
                        monthly:       decimal_at(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(tariff)
    }

    fn map_summary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TariffSummaryRow> {
        Ok(TariffSummaryRow {
            year:          row.get(0)?,
            fee_group_id:  row.get(1)?,
            group_name:    row.get(2)?,
            matriculation: decimal_at(row, 3)?,
            monthly:       decimal_at(row, 4)?,
        })
    }
}
