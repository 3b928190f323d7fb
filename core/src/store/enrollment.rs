use super::{Enrollment, NewEnrollment, TuitionStore};
use crate::{
    error::TuitionResult,
    special_case::BillingWindow,
    types::{EnrollmentId, StudentId, Year},
};
use rusqlite::{params, OptionalExtension, Row};

const ENROLLMENT_COLUMNS: &str =
    "id, student_id, year, branch, course, enrolled_on, status, start_month, end_month";

impl TuitionStore {
    // ── Enrollment ────────────────────────────────────────────────

    pub fn insert_enrollment(&self, e: &NewEnrollment) -> TuitionResult<EnrollmentId> {
        self.conn.execute(
            "INSERT INTO enrollment (student_id, year, branch, course, enrolled_on)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![e.student_id, e.year, e.branch, e.course, e.enrolled_on],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn enrollment(&self, id: EnrollmentId) -> TuitionResult<Option<Enrollment>> {
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollment WHERE id = ?1");
        let enrollment = self
            .conn
            .query_row(&sql, params![id], Self::map_enrollment_row)
            .optional()?;
        Ok(enrollment)
    }

    /// The student's most recent enrollment strictly before `year`.
    /// Used to check debts before a re-enrollment.
    pub fn latest_enrollment_before(
        &self,
        student_id: StudentId,
        year:       Year,
    ) -> TuitionResult<Option<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollment
             WHERE student_id = ?1 AND year < ?2
             ORDER BY year DESC, id DESC LIMIT 1"
        );
        let enrollment = self
            .conn
            .query_row(&sql, params![student_id, year], Self::map_enrollment_row)
            .optional()?;
        Ok(enrollment)
    }

    pub fn enrollments_for_branch(&self, year: Year, branch: &str) -> TuitionResult<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollment
             WHERE year = ?1 AND branch = ?2 ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![year, branch], Self::map_enrollment_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn map_enrollment_row(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
        let start: Option<u32> = row.get(7)?;
        let end: Option<u32> = row.get(8)?;
        Ok(Enrollment {
            id:          row.get(0)?,
            student_id:  row.get(1)?,
            year:        row.get(2)?,
            branch:      row.get(3)?,
            course:      row.get(4)?,
            enrolled_on: row.get(5)?,
            status:      row.get(6)?,
            window:      BillingWindow::from_numbers(start, end),
        })
    }
}
