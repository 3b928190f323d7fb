//! Branch-level payment reports for one year: dashboard progress and the
//! per-enrollment payment summary.
//!
//! An enrollment counts as paid for a concept when what it paid covers what
//! the billing plan expects. A month the plan does not bill expects nothing,
//! so it counts as paid. Custom amounts settle their concepts even without a
//! resolved tariff; anything that needs the missing tariff counts as unpaid.

use crate::{
    billing::{expected_amount, paid_by_concept, CustomAmounts, Payment},
    concept::{BillingMonth, Concept},
    tariff::TariffAmounts,
    types::{EnrollmentId, StudentId, Year},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything the reports need about one enrollment.
#[derive(Debug, Clone)]
pub struct EnrollmentBilling {
    pub enrollment_id: EnrollmentId,
    pub student_id:    StudentId,
    pub course:        String,
    pub tariff:        Option<TariffAmounts>,
    pub custom:        CustomAmounts,
    pub payments:      Vec<Payment>,
}

impl EnrollmentBilling {
    /// Concepts this enrollment has fully paid, computed in one pass.
    fn paid_concepts(&self) -> BTreeSet<Concept> {
        let paid = paid_by_concept(&self.payments);
        Concept::all()
            .filter(|concept| {
                let Some(expected) = expected_amount(self.tariff.as_ref(), &self.custom, *concept)
                else {
                    return false;
                };
                paid.get(concept).copied().unwrap_or(Decimal::ZERO) >= expected
            })
            .collect()
    }
}

// ── Dashboard progress ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCount {
    pub total:      usize,
    #[serde(rename = "pagados")]
    pub paid:       usize,
    #[serde(rename = "porcentaje")]
    pub percentage: f64,
}

impl ProgressCount {
    pub fn new(total: usize, paid: usize) -> Self {
        Self { total, paid, percentage: percentage(paid, total) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthProgress {
    #[serde(rename = "mes")]
    pub month: u32,
    #[serde(flatten)]
    pub count: ProgressCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProgress {
    #[serde(rename = "gestion")]
    pub year:          Year,
    #[serde(rename = "sucursal")]
    pub branch:        String,
    #[serde(rename = "matricula")]
    pub matriculation: ProgressCount,
    #[serde(rename = "mensualidades")]
    pub months:        Vec<MonthProgress>,
}

/// Share of `paid` in `total` as a percentage with two decimals.
/// Zero when there is nothing to count.
pub fn percentage(paid: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((paid as f64) * 10_000.0 / total as f64).round() / 100.0
}

pub fn payment_progress(
    year:        Year,
    branch:      &str,
    enrollments: &[EnrollmentBilling],
) -> PaymentProgress {
    for e in enrollments.iter().filter(|e| e.tariff.is_none()) {
        log::warn!(
            "enrollment={} progress: no tariff resolved, only custom amounts count",
            e.enrollment_id
        );
    }

    let paid: Vec<BTreeSet<Concept>> = enrollments.iter().map(|e| e.paid_concepts()).collect();
    let count = |concept: Concept| {
        ProgressCount::new(paid.len(), paid.iter().filter(|p| p.contains(&concept)).count())
    };

    PaymentProgress {
        year,
        branch: branch.to_string(),
        matriculation: count(Concept::Matriculation),
        months: BillingMonth::ALL
            .into_iter()
            .map(|m| MonthProgress {
                month: m.number(),
                count: count(Concept::Month(m)),
            })
            .collect(),
    }
}

// ── Payment summary ───────────────────────────────────────────────

/// One enrollment's line in the branch payment listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummaryRow {
    #[serde(rename = "inscripcion_id")]
    pub enrollment_id:     EnrollmentId,
    #[serde(rename = "estudiante_id")]
    pub student_id:        StudentId,
    #[serde(rename = "curso")]
    pub course:            String,
    /// Flat amounts, `None` when no tariff resolves.
    #[serde(rename = "costo_matricula_total")]
    pub matriculation:     Option<Decimal>,
    #[serde(rename = "costo_mensualidad_total")]
    pub monthly:           Option<Decimal>,
    #[serde(rename = "tiene_tarifa_personalizada")]
    pub has_custom_tariff: bool,
    #[serde(rename = "mensualidades_personalizadas")]
    pub custom:            CustomAmounts,
    /// Expected amount per concept, when it can be known.
    #[serde(rename = "esperado")]
    pub expected:          BTreeMap<Concept, Decimal>,
    /// Paid per billing concept; every concept is present.
    #[serde(rename = "pagado")]
    pub paid:              BTreeMap<Concept, Decimal>,
}

pub fn payment_summary(enrollments: &[EnrollmentBilling]) -> Vec<PaymentSummaryRow> {
    enrollments
        .iter()
        .map(|e| {
            let paid_totals = paid_by_concept(&e.payments);
            PaymentSummaryRow {
                enrollment_id:     e.enrollment_id,
                student_id:        e.student_id,
                course:            e.course.clone(),
                matriculation:     e.tariff.map(|t| t.matriculation),
                monthly:           e.tariff.map(|t| t.monthly),
                has_custom_tariff: e.tariff.is_some_and(|t| t.is_custom()),
                custom:            e.custom.clone(),
                expected: Concept::all()
                    .filter_map(|c| expected_amount(e.tariff.as_ref(), &e.custom, c).map(|a| (c, a)))
                    .collect(),
                paid: Concept::all()
                    .map(|c| (c, paid_totals.get(&c).copied().unwrap_or(Decimal::ZERO)))
                    .collect(),
            }
        })
        .collect()
}
