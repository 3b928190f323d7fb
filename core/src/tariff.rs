//! Tariff resolution.
//!
//! Resolution order, first match wins:
//!   1. The enrollment's custom flat tariff, if any. No lookup happens.
//!   2. (course, branch) -> fee group, via the course mapping table.
//!   3. (year, fee group) -> standard tariff.
//!
//! Missing mapping or tariff rows are data errors, never defaulted.

use crate::{
    error::{TuitionError, TuitionResult},
    types::{EnrollmentId, FeeGroupId, Year},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeGroup {
    pub id:   FeeGroupId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFeeMapping {
    pub course:       String,
    pub branch:       String,
    pub fee_group_id: FeeGroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardTariff {
    pub year:          Year,
    pub fee_group_id:  FeeGroupId,
    pub matriculation: Decimal,
    pub monthly:       Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTariff {
    pub id:            i64,
    pub enrollment_id: EnrollmentId,
    pub matriculation: Decimal,
    pub monthly:       Decimal,
}

/// The part of an enrollment that drives tariff lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentKey {
    pub year:   Year,
    pub branch: String,
    pub course: String,
}

/// Where the effective amounts came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TariffSource {
    Custom,
    Standard { fee_group_id: FeeGroupId },
}

/// Effective flat amounts for one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffAmounts {
    pub matriculation: Decimal,
    pub monthly:       Decimal,
    pub source:        TariffSource,
}

impl TariffAmounts {
    pub fn is_custom(&self) -> bool {
        matches!(self.source, TariffSource::Custom)
    }
}

pub fn resolve_tariff(
    enrollment: &EnrollmentKey,
    custom:     Option<&CustomTariff>,
    mappings:   &[CourseFeeMapping],
    tariffs:    &[StandardTariff],
) -> TuitionResult<TariffAmounts> {
    if let Some(custom) = custom {
        return Ok(TariffAmounts {
            matriculation: custom.matriculation,
            monthly:       custom.monthly,
            source:        TariffSource::Custom,
        });
    }

    let fee_group_id = fee_group_for(&enrollment.course, &enrollment.branch, mappings)?;

    let standard = tariffs
        .iter()
        .find(|t| t.year == enrollment.year && t.fee_group_id == fee_group_id)
        .ok_or(TuitionError::StandardTariffNotFound {
            year: enrollment.year,
            fee_group_id,
        })?;

    Ok(TariffAmounts {
        matriculation: standard.matriculation,
        monthly:       standard.monthly,
        source:        TariffSource::Standard { fee_group_id },
    })
}

/// Look up the fee group for a (course, branch) pair.
pub fn fee_group_for(
    course:   &str,
    branch:   &str,
    mappings: &[CourseFeeMapping],
) -> TuitionResult<FeeGroupId> {
    mappings
        .iter()
        .find(|m| m.course == course && m.branch == branch)
        .map(|m| m.fee_group_id)
        .ok_or_else(|| TuitionError::FeeGroupNotFound {
            course: course.to_string(),
            branch: branch.to_string(),
        })
}
