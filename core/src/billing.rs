//! Debt evaluation over already-loaded tariff, custom amounts and payments.
//!
//! One expected-amount rule serves every caller (debt check, statement,
//! dashboard progress):
//!   - Matriculation: custom "Matrícula" amount, else the resolved tariff.
//!   - Months, no custom amounts at all: the uniform monthly tariff.
//!   - Months, any custom amount present: the custom amount for that month,
//!     or not billed when the month is absent.
//!
//! The partial-billing window (start/end month) does not enter here.

use crate::{
    concept::{BillingMonth, Concept},
    tariff::{EnrollmentKey, TariffAmounts},
    types::Year,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A payment as the engine sees it. The concept keeps its raw stored label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub concept: String,
    pub amount:  Decimal,
    pub paid_at: NaiveDateTime,
}

impl Payment {
    pub fn new(concept: impl Into<String>, amount: Decimal, paid_at: NaiveDateTime) -> Self {
        Self { concept: concept.into(), amount, paid_at }
    }
}

/// One per-concept override row of a special case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMonthlyAmount {
    pub concept: Concept,
    pub amount:  Decimal,
}

/// Per-concept overrides of one enrollment, keyed in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAmounts(BTreeMap<Concept, Decimal>);

impl CustomAmounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, concept: Concept, amount: Decimal) {
        self.0.insert(concept, amount);
    }

    pub fn get(&self, concept: Concept) -> Option<Decimal> {
        self.0.get(&concept).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Concept, Decimal)> + '_ {
        self.0.iter().map(|(c, a)| (*c, *a))
    }

    /// Expected amount the overrides fix on their own, without a flat
    /// tariff. Any override makes every month custom, so absent months
    /// expect zero.
    pub fn settles(&self, concept: Concept) -> Option<Decimal> {
        match concept {
            Concept::Matriculation => self.get(concept),
            Concept::Month(_) if !self.is_empty() => {
                Some(self.get(concept).unwrap_or(Decimal::ZERO))
            }
            Concept::Month(_) => None,
        }
    }
}

impl FromIterator<(Concept, Decimal)> for CustomAmounts {
    fn from_iter<I: IntoIterator<Item = (Concept, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a CustomMonthlyAmount> for CustomAmounts {
    fn from_iter<I: IntoIterator<Item = &'a CustomMonthlyAmount>>(iter: I) -> Self {
        iter.into_iter().map(|row| (row.concept, row.amount)).collect()
    }
}

/// Sum payments per billing concept. Labels that are not billing concepts
/// are skipped.
pub fn paid_by_concept(payments: &[Payment]) -> BTreeMap<Concept, Decimal> {
    let mut totals = BTreeMap::new();
    for payment in payments {
        match Concept::parse(&payment.concept) {
            Some(concept) => *totals.entry(concept).or_insert(Decimal::ZERO) += payment.amount,
            None => log::debug!("billing: ignoring payment concept '{}'", payment.concept),
        }
    }
    totals
}

/// Effective billing configuration of one enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingPlan<'a> {
    pub tariff: &'a TariffAmounts,
    pub custom: &'a CustomAmounts,
}

impl<'a> BillingPlan<'a> {
    pub fn new(tariff: &'a TariffAmounts, custom: &'a CustomAmounts) -> Self {
        Self { tariff, custom }
    }

    /// Any custom amount switches months to per-concept billing.
    pub fn uses_custom_months(&self) -> bool {
        !self.custom.is_empty()
    }

    pub fn is_billed(&self, concept: Concept) -> bool {
        match concept {
            Concept::Matriculation => true,
            Concept::Month(_) => !self.uses_custom_months() || self.custom.get(concept).is_some(),
        }
    }

    /// Amount owed for a concept; zero when the concept is not billed.
    pub fn expected(&self, concept: Concept) -> Decimal {
        self.custom.settles(concept).unwrap_or(match concept {
            Concept::Matriculation => self.tariff.matriculation,
            Concept::Month(_)      => self.tariff.monthly,
        })
    }

    /// Billed concepts in evaluation order: matriculation, then months.
    pub fn billed_concepts(&self) -> impl Iterator<Item = Concept> + '_ {
        Concept::all().filter(|c| self.is_billed(*c))
    }
}

/// Expected amount when the flat tariff may be unknown. `None` when the
/// concept needs a tariff that could not be resolved.
pub fn expected_amount(
    tariff:  Option<&TariffAmounts>,
    custom:  &CustomAmounts,
    concept: Concept,
) -> Option<Decimal> {
    match tariff {
        Some(tariff) => Some(BillingPlan::new(tariff, custom).expected(concept)),
        None => custom.settles(concept),
    }
}

/// A billing concept that is unpaid or underpaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Deficiency(pub Concept);

impl fmt::Display for Deficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Concept::Matriculation => write!(f, "{} Incompleta", Concept::Matriculation),
            Concept::Month(month)  => write!(f, "Mensualidad de {month} Incompleta"),
        }
    }
}

impl From<Deficiency> for String {
    fn from(deficiency: Deficiency) -> Self {
        deficiency.to_string()
    }
}

impl TryFrom<String> for Deficiency {
    type Error = crate::concept::UnknownConcept;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        let core = trimmed.strip_suffix(" Incompleta").unwrap_or(trimmed);
        let core = core.strip_prefix("Mensualidad de ").unwrap_or(core);
        core.parse().map(Deficiency)
    }
}

/// Outcome of a debt check. Field names follow the external JSON contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtReport {
    #[serde(rename = "tieneDeudas")]
    pub has_debt:     bool,
    #[serde(rename = "detallesDeuda")]
    pub deficiencies: Vec<Deficiency>,
    #[serde(rename = "gestion")]
    pub year:         Year,
    #[serde(rename = "curso")]
    pub course:       String,
    #[serde(rename = "sucursal")]
    pub branch:       String,
}

impl DebtReport {
    pub fn descriptions(&self) -> Vec<String> {
        self.deficiencies.iter().map(ToString::to_string).collect()
    }
}

pub fn evaluate_debt(
    enrollment: &EnrollmentKey,
    tariff:     &TariffAmounts,
    custom:     &CustomAmounts,
    payments:   &[Payment],
) -> DebtReport {
    let plan = BillingPlan::new(tariff, custom);
    let paid = paid_by_concept(payments);

    let deficiencies: Vec<Deficiency> = plan
        .billed_concepts()
        .filter(|concept| {
            let paid = paid.get(concept).copied().unwrap_or(Decimal::ZERO);
            paid < plan.expected(*concept)
        })
        .map(Deficiency)
        .collect();

    log::debug!(
        "billing: {}/{}/{} custom_months={} deficiencies={}",
        enrollment.year,
        enrollment.branch,
        enrollment.course,
        plan.uses_custom_months(),
        deficiencies.len()
    );

    DebtReport {
        has_debt: !deficiencies.is_empty(),
        deficiencies,
        year:   enrollment.year,
        course: enrollment.course.clone(),
        branch: enrollment.branch.clone(),
    }
}

/// One row of an enrollment statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub concept:  Concept,
    pub expected: Decimal,
    pub paid:     Decimal,
    pub balance:  Decimal,
}

/// Expected vs paid for every billed concept, in evaluation order.
pub fn statement(
    tariff:   &TariffAmounts,
    custom:   &CustomAmounts,
    payments: &[Payment],
) -> Vec<StatementLine> {
    let plan = BillingPlan::new(tariff, custom);
    let paid = paid_by_concept(payments);
    plan.billed_concepts()
        .map(|concept| {
            let expected = plan.expected(concept);
            let paid = paid.get(&concept).copied().unwrap_or(Decimal::ZERO);
            StatementLine {
                concept,
                expected,
                paid,
                balance: (expected - paid).max(Decimal::ZERO),
            }
        })
        .collect()
}

/// Months a plan bills, for display alongside the statement.
pub fn billed_months(tariff: &TariffAmounts, custom: &CustomAmounts) -> Vec<BillingMonth> {
    let plan = BillingPlan::new(tariff, custom);
    plan.billed_concepts().filter_map(Concept::month).collect()
}
