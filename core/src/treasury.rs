//! The treasury service: loads rows through the store, runs the pure engine
//! and returns serializable results.
//!
//! RULES:
//!   - Request validation happens here, before the store is touched.
//!   - The engine modules never see the store; they get plain values.
//!   - Multi-row writes go through the store's atomic operations.

use crate::{
    billing::{self, DebtReport, StatementLine},
    config::{TreasuryConfig, TreasuryPolicy},
    error::{TuitionError, TuitionResult},
    progress::{self, EnrollmentBilling, PaymentProgress, PaymentSummaryRow},
    special_case::{BillingWindow, SpecialCase, SpecialCaseRequest},
    store::{
        Enrollment, NewEnrollment, NewPayment, PaymentRow, RecordedPayment, TariffSummaryRow, TuitionStore,
    },
    tariff::{resolve_tariff, CourseFeeMapping, StandardTariff, TariffAmounts},
    types::{EnrollmentId, FeeGroupId, PaymentId, StudentId, Year},
};
use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One fee group's amounts in a year registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearTariffEntry {
    pub fee_group_id:  FeeGroupId,
    pub matriculation: Decimal,
    pub monthly:       Decimal,
}

/// Expected vs paid for one enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentStatement {
    pub enrollment_id: EnrollmentId,
    pub tariff:        TariffAmounts,
    pub window:        Option<BillingWindow>,
    pub lines:         Vec<StatementLine>,
    pub total_due:     Decimal,
}

pub struct Treasury {
    store:  TuitionStore,
    policy: TreasuryPolicy,
}

impl Treasury {
    pub fn new(store: TuitionStore, policy: TreasuryPolicy) -> Self {
        Self { store, policy }
    }

    /// Migrated in-memory store seeded with `TreasuryConfig::default_test()`.
    pub fn build_test() -> TuitionResult<Self> {
        let config = TreasuryConfig::default_test();
        let store = TuitionStore::in_memory()?;
        store.migrate()?;
        store.seed_reference(&config)?;
        Ok(Self::new(store, config.policy))
    }

    pub fn store(&self) -> &TuitionStore {
        &self.store
    }

    pub fn policy(&self) -> &TreasuryPolicy {
        &self.policy
    }

    pub fn enroll(&self, enrollment: &NewEnrollment) -> TuitionResult<EnrollmentId> {
        let id = self.store.insert_enrollment(enrollment)?;
        log::info!(
            "enrollment={id} treasury: student {} enrolled in {}/{}/{}",
            enrollment.student_id, enrollment.year, enrollment.branch, enrollment.course
        );
        Ok(id)
    }

    fn require_enrollment(&self, id: EnrollmentId) -> TuitionResult<Enrollment> {
        self.store.enrollment(id)?.ok_or(TuitionError::NotFound {
            entity: "enrollment",
            key:    id.to_string(),
        })
    }

    // ── Tariffs and debts ─────────────────────────────────────────

    /// Effective flat tariff of an enrollment.
    pub fn resolve_for(&self, enrollment: &Enrollment) -> TuitionResult<TariffAmounts> {
        let custom = self.store.custom_tariff(enrollment.id)?;
        let mappings = self.store.course_mappings()?;
        let tariffs = self.store.standard_tariffs_for_year(enrollment.year)?;
        resolve_tariff(&enrollment.key(), custom.as_ref(), &mappings, &tariffs)
    }

    pub fn tariff(&self, enrollment_id: EnrollmentId) -> TuitionResult<TariffAmounts> {
        let enrollment = self.require_enrollment(enrollment_id)?;
        self.resolve_for(&enrollment)
    }

    fn report_for(&self, enrollment: &Enrollment) -> TuitionResult<DebtReport> {
        let tariff = self.resolve_for(enrollment)?;
        let custom = self.store.custom_amounts(enrollment.id)?;
        let payments = self.store.payments(enrollment.id)?;
        let report = billing::evaluate_debt(&enrollment.key(), &tariff, &custom, &payments);
        log::debug!(
            "enrollment={} treasury: has_debt={} ({} deficiencies)",
            enrollment.id, report.has_debt, report.deficiencies.len()
        );
        Ok(report)
    }

    pub fn debt_report(&self, enrollment_id: EnrollmentId) -> TuitionResult<DebtReport> {
        let enrollment = self.require_enrollment(enrollment_id)?;
        self.report_for(&enrollment)
    }

    /// Debts of the student's most recent enrollment before `current_year`.
    pub fn verify_debts(&self, student_id: StudentId, current_year: Year) -> TuitionResult<DebtReport> {
        let previous = self
            .store
            .latest_enrollment_before(student_id, current_year)?
            .ok_or_else(|| TuitionError::NotFound {
                entity: "previous enrollment",
                key:    format!("student {student_id} before {current_year}"),
            })?;
        self.report_for(&previous)
    }

    pub fn tariff_for(&self, year: Year, course: &str, branch: &str) -> TuitionResult<StandardTariff> {
        self.store
            .standard_tariff_for_course(year, course, branch)?
            .ok_or_else(|| TuitionError::NotFound {
                entity: "tariff",
                key:    format!("{course}/{branch}/{year}"),
            })
    }

    pub fn tariffs_for_branch(&self, year: Year, branch: &str) -> TuitionResult<Vec<TariffSummaryRow>> {
        self.store.branch_tariff_summary(year, branch)
    }

    // ── Special cases ─────────────────────────────────────────────

    pub fn register_special_case(&self, request: SpecialCaseRequest) -> TuitionResult<SpecialCase> {
        let case = request.validate()?;
        self.store.register_special_case(&case)?;
        Ok(case)
    }

    pub fn clear_special_case(&self, enrollment_id: EnrollmentId) -> TuitionResult<()> {
        self.store.clear_special_case(enrollment_id)
    }

    // ── Custom tariffs ────────────────────────────────────────────

    fn check_positive(matriculation: Decimal, monthly: Decimal) -> TuitionResult<()> {
        if matriculation <= Decimal::ZERO || monthly <= Decimal::ZERO {
            return Err(TuitionError::Validation(
                "custom tariff amounts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn create_custom_tariff(
        &self,
        enrollment_id: EnrollmentId,
        matriculation: Decimal,
        monthly:       Decimal,
    ) -> TuitionResult<i64> {
        Self::check_positive(matriculation, monthly)?;
        self.require_enrollment(enrollment_id)?;
        let id = self.store.insert_custom_tariff(enrollment_id, matriculation, monthly)?;
        log::info!("enrollment={enrollment_id} treasury: custom tariff {matriculation}/{monthly}");
        Ok(id)
    }

    pub fn update_custom_tariff(
        &self,
        id:            i64,
        matriculation: Decimal,
        monthly:       Decimal,
    ) -> TuitionResult<()> {
        Self::check_positive(matriculation, monthly)?;
        self.store.update_custom_tariff(id, matriculation, monthly)
    }

    pub fn delete_custom_tariff(&self, id: i64) -> TuitionResult<()> {
        self.store.delete_custom_tariff(id)
    }

    // ── Payments ──────────────────────────────────────────────────

    pub fn record_payment(&self, payment: &NewPayment, now: NaiveDateTime) -> TuitionResult<RecordedPayment> {
        if payment.amount <= Decimal::ZERO {
            return Err(TuitionError::Validation("payment amount must be positive".into()));
        }
        if payment.concept.trim().is_empty() || payment.branch.trim().is_empty() {
            return Err(TuitionError::Validation("payment needs a concept and a branch".into()));
        }
        self.store
            .record_payment(payment, now, self.policy.receipt_sequence_digits)
    }

    /// Payments of one enrollment, oldest first.
    pub fn payments(&self, enrollment_id: EnrollmentId) -> TuitionResult<Vec<PaymentRow>> {
        self.require_enrollment(enrollment_id)?;
        self.store.payments_for_enrollment(enrollment_id)
    }

    /// Delete a payment recorded less than the policy window ago.
    pub fn delete_payment(&self, id: PaymentId, now: NaiveDateTime) -> TuitionResult<()> {
        let row = self.store.payment(id)?.ok_or(TuitionError::NotFound {
            entity: "payment",
            key:    id.to_string(),
        })?;
        let window = Duration::minutes(self.policy.payment_delete_window_minutes);
        if now - row.payment.paid_at > window {
            return Err(TuitionError::Forbidden(format!(
                "payment {id} is older than {} minutes",
                self.policy.payment_delete_window_minutes
            )));
        }
        self.store.delete_payment(id)
    }

    // ── Reporting ─────────────────────────────────────────────────

    pub fn statement(&self, enrollment_id: EnrollmentId) -> TuitionResult<EnrollmentStatement> {
        let enrollment = self.require_enrollment(enrollment_id)?;
        let tariff = self.resolve_for(&enrollment)?;
        let custom = self.store.custom_amounts(enrollment_id)?;
        let payments = self.store.payments(enrollment_id)?;
        let lines = billing::statement(&tariff, &custom, &payments);
        let total_due: Decimal = lines.iter().map(|l| l.balance).sum();
        Ok(EnrollmentStatement {
            enrollment_id,
            tariff,
            window: enrollment.window,
            lines,
            total_due,
        })
    }

    /// Billing inputs of every enrollment in a year and branch, optionally
    /// narrowed to one course.
    fn branch_billing(
        &self,
        year:   Year,
        branch: &str,
        course: Option<&str>,
    ) -> TuitionResult<Vec<EnrollmentBilling>> {
        let mappings = self.store.course_mappings()?;
        let tariffs = self.store.standard_tariffs_for_year(year)?;

        let mut billing = Vec::new();
        for enrollment in self.store.enrollments_for_branch(year, branch)? {
            if course.is_some_and(|c| c != enrollment.course) {
                continue;
            }
            let tariff = self.tariff_or_none(&enrollment, &mappings, &tariffs)?;
            billing.push(EnrollmentBilling {
                enrollment_id: enrollment.id,
                student_id:    enrollment.student_id,
                tariff,
                custom:        self.store.custom_amounts(enrollment.id)?,
                payments:      self.store.payments(enrollment.id)?,
                course:        enrollment.course,
            });
        }
        Ok(billing)
    }

    pub fn payment_progress(&self, year: Year, branch: &str) -> TuitionResult<PaymentProgress> {
        let billing = self.branch_billing(year, branch, None)?;
        Ok(progress::payment_progress(year, branch, &billing))
    }

    /// Per-enrollment amounts and payments for a year and branch.
    pub fn payment_summary(
        &self,
        year:   Year,
        branch: &str,
        course: Option<&str>,
    ) -> TuitionResult<Vec<PaymentSummaryRow>> {
        let billing = self.branch_billing(year, branch, course)?;
        log::debug!("year={year} treasury: payment summary for {branch}, {} rows", billing.len());
        Ok(progress::payment_summary(&billing))
    }

    /// Resolve, turning missing reference data into `None`.
    fn tariff_or_none(
        &self,
        enrollment: &Enrollment,
        mappings:   &[CourseFeeMapping],
        tariffs:    &[StandardTariff],
    ) -> TuitionResult<Option<TariffAmounts>> {
        let custom = self.store.custom_tariff(enrollment.id)?;
        match resolve_tariff(&enrollment.key(), custom.as_ref(), mappings, tariffs) {
            Ok(tariff) => Ok(Some(tariff)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Year tariffs ──────────────────────────────────────────────

    /// Define a year's standard tariffs, one entry per fee group.
    pub fn register_year_tariffs(&self, year: Year, entries: &[YearTariffEntry]) -> TuitionResult<()> {
        let required = self.policy.required_fee_groups;
        if entries.len() != required {
            return Err(TuitionError::Validation(format!(
                "expected {required} tariffs for {year}, got {}",
                entries.len()
            )));
        }

        let known: HashSet<FeeGroupId> = self.store.fee_groups()?.into_iter().map(|g| g.id).collect();
        let mut seen = HashSet::new();
        for e in entries {
            if !known.contains(&e.fee_group_id) {
                return Err(TuitionError::Validation(format!("unknown fee group {}", e.fee_group_id)));
            }
            if !seen.insert(e.fee_group_id) {
                return Err(TuitionError::Validation(format!(
                    "fee group {} given twice",
                    e.fee_group_id
                )));
            }
            if e.matriculation.is_sign_negative() || e.monthly.is_sign_negative() {
                return Err(TuitionError::Validation(format!(
                    "negative amount for fee group {}",
                    e.fee_group_id
                )));
            }
        }

        let tariffs: Vec<StandardTariff> = entries
            .iter()
            .map(|e| StandardTariff {
                year,
                fee_group_id:  e.fee_group_id,
                matriculation: e.matriculation,
                monthly:       e.monthly,
            })
            .collect();
        self.store.register_year_tariffs(year, &tariffs)
    }

    pub fn tariffs_defined(&self, year: Year) -> TuitionResult<bool> {
        Ok(self.store.tariff_count_for_year(year)? >= self.policy.required_fee_groups)
    }

    pub fn tariff_history(&self) -> TuitionResult<Vec<TariffSummaryRow>> {
        self.store.tariff_history()
    }

    /// Tariffs of the year before `year`, used to prefill a new year.
    pub fn previous_year_tariffs(&self, year: Year) -> TuitionResult<Vec<StandardTariff>> {
        self.store.standard_tariffs_for_year(year - 1)
    }
}
