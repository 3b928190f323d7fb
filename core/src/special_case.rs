//! Special cases: an enrollment billed only for a window of months, each
//! month with its own amount.
//!
//! Requests arrive with the external field names and are validated here
//! before anything touches the store. The atomic replace/clear lives in
//! `store::special_case`.

use crate::{
    billing::CustomMonthlyAmount,
    concept::{BillingMonth, Concept},
    error::{TuitionError, TuitionResult},
    types::EnrollmentId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Inclusive range of billed months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingWindow {
    pub start: BillingMonth,
    pub end:   BillingMonth,
}

impl BillingWindow {
    pub fn new(start: BillingMonth, end: BillingMonth) -> TuitionResult<Self> {
        if start > end {
            return Err(TuitionError::Validation(format!(
                "start month {start} is after end month {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Build from stored month numbers. Both must be present.
    pub fn from_numbers(start: Option<u32>, end: Option<u32>) -> Option<Self> {
        let start = BillingMonth::from_number(start?)?;
        let end = BillingMonth::from_number(end?)?;
        Self::new(start, end).ok()
    }

    pub fn contains(&self, month: BillingMonth) -> bool {
        self.start <= month && month <= self.end
    }

    pub fn months(&self) -> impl Iterator<Item = BillingMonth> + '_ {
        BillingMonth::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

/// A validated special-case registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialCase {
    pub enrollment_id: EnrollmentId,
    pub window:        BillingWindow,
    pub amounts:       Vec<CustomMonthlyAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialCaseAmount {
    #[serde(rename = "concepto")]
    pub concept: String,
    #[serde(rename = "monto")]
    pub amount:  Decimal,
}

/// Raw special-case payload, as posted by the registration screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialCaseRequest {
    #[serde(rename = "inscripcion_id")]
    pub enrollment_id: Option<EnrollmentId>,
    #[serde(rename = "mes_inicio")]
    pub start_month:   Option<u32>,
    #[serde(rename = "mes_fin")]
    pub end_month:     Option<u32>,
    #[serde(rename = "mensualidades")]
    pub amounts:       Option<Vec<SpecialCaseAmount>>,
}

impl SpecialCaseRequest {
    pub fn validate(self) -> TuitionResult<SpecialCase> {
        let (Some(enrollment_id), Some(start), Some(end), Some(raw_amounts)) =
            (self.enrollment_id, self.start_month, self.end_month, self.amounts)
        else {
            return Err(TuitionError::Validation(
                "special case needs inscripcion_id, mes_inicio, mes_fin and mensualidades".into(),
            ));
        };

        let month = |n: u32| {
            BillingMonth::from_number(n).ok_or_else(|| {
                TuitionError::Validation(format!("month {n} is outside February..November"))
            })
        };
        let window = BillingWindow::new(month(start)?, month(end)?)?;

        let mut seen = HashSet::new();
        let mut amounts = Vec::with_capacity(raw_amounts.len());
        for raw in raw_amounts {
            let concept = Concept::parse(&raw.concept).ok_or_else(|| {
                TuitionError::Validation(format!("unknown concept '{}'", raw.concept))
            })?;
            if !seen.insert(concept) {
                return Err(TuitionError::Validation(format!("concept {concept} given twice")));
            }
            if raw.amount.is_sign_negative() {
                return Err(TuitionError::Validation(format!(
                    "amount for {concept} must not be negative"
                )));
            }
            if let Some(m) = concept.month() {
                if !window.contains(m) {
                    return Err(TuitionError::Validation(format!(
                        "{m} is outside the billed window {}..{}",
                        window.start, window.end
                    )));
                }
            }
            amounts.push(CustomMonthlyAmount { concept, amount: raw.amount });
        }
        amounts.sort_by_key(|a| a.concept);

        Ok(SpecialCase { enrollment_id, window, amounts })
    }
}
