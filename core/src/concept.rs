//! Billing concepts: matriculation plus the ten billable months.
//!
//! Storage and the outside world use the Spanish labels ("Matrícula",
//! "Febrero", ...). Everything inside the core works on the enums below;
//! labels are parsed once at the boundary, case-insensitively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A month that carries a monthly fee. January and December are never billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BillingMonth {
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
}

impl BillingMonth {
    /// Calendar order, February first.
    pub const ALL: [BillingMonth; 10] = [
        BillingMonth::February,
        BillingMonth::March,
        BillingMonth::April,
        BillingMonth::May,
        BillingMonth::June,
        BillingMonth::July,
        BillingMonth::August,
        BillingMonth::September,
        BillingMonth::October,
        BillingMonth::November,
    ];

    /// Calendar month number (2..=11).
    pub fn number(self) -> u32 {
        match self {
            BillingMonth::February  => 2,
            BillingMonth::March     => 3,
            BillingMonth::April     => 4,
            BillingMonth::May       => 5,
            BillingMonth::June      => 6,
            BillingMonth::July      => 7,
            BillingMonth::August    => 8,
            BillingMonth::September => 9,
            BillingMonth::October   => 10,
            BillingMonth::November  => 11,
        }
    }

    pub fn from_number(number: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.number() == number)
    }

    /// External label, as stored in payment and custom amount rows.
    pub fn label(self) -> &'static str {
        match self {
            BillingMonth::February  => "Febrero",
            BillingMonth::March     => "Marzo",
            BillingMonth::April     => "Abril",
            BillingMonth::May       => "Mayo",
            BillingMonth::June      => "Junio",
            BillingMonth::July      => "Julio",
            BillingMonth::August    => "Agosto",
            BillingMonth::September => "Septiembre",
            BillingMonth::October   => "Octubre",
            BillingMonth::November  => "Noviembre",
        }
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A billing line item. Matriculation sorts before every month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Concept {
    Matriculation,
    Month(BillingMonth),
}

pub const MATRICULATION_LABEL: &str = "Matrícula";

impl Concept {
    /// Every billable concept in evaluation order.
    pub fn all() -> impl Iterator<Item = Concept> {
        std::iter::once(Concept::Matriculation)
            .chain(BillingMonth::ALL.into_iter().map(Concept::Month))
    }

    pub fn label(self) -> &'static str {
        match self {
            Concept::Matriculation => MATRICULATION_LABEL,
            Concept::Month(m)      => m.label(),
        }
    }

    pub fn month(self) -> Option<BillingMonth> {
        match self {
            Concept::Matriculation => None,
            Concept::Month(m)      => Some(m),
        }
    }

    /// Case-insensitive match against the external labels.
    /// Returns None for anything that is not billed (e.g. "Enero").
    pub fn parse(label: &str) -> Option<Concept> {
        let wanted = label.trim().to_lowercase();
        Concept::all().find(|c| c.label().to_lowercase() == wanted)
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConcept(pub String);

impl fmt::Display for UnknownConcept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown billing concept '{}'", self.0)
    }
}

impl std::error::Error for UnknownConcept {}

impl FromStr for Concept {
    type Err = UnknownConcept;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Concept::parse(s).ok_or_else(|| UnknownConcept(s.to_string()))
    }
}

impl TryFrom<String> for Concept {
    type Error = UnknownConcept;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Concept> for String {
    fn from(concept: Concept) -> Self {
        concept.label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(Concept::parse("matrícula"), Some(Concept::Matriculation));
        assert_eq!(Concept::parse("MATRÍCULA"), Some(Concept::Matriculation));
        assert_eq!(Concept::parse("junio"), Some(Concept::Month(BillingMonth::June)));
        assert_eq!(Concept::parse(" Marzo "), Some(Concept::Month(BillingMonth::March)));
    }

    #[test]
    fn unbilled_months_are_not_concepts() {
        assert_eq!(Concept::parse("Enero"), None);
        assert_eq!(Concept::parse("Diciembre"), None);
        assert!("Uniforme".parse::<Concept>().is_err());
    }

    #[test]
    fn month_numbers_cover_february_to_november() {
        let numbers: Vec<u32> = BillingMonth::ALL.iter().map(|m| m.number()).collect();
        assert_eq!(numbers, (2..=11).collect::<Vec<_>>());
        assert_eq!(BillingMonth::from_number(1), None);
        assert_eq!(BillingMonth::from_number(11), Some(BillingMonth::November));
    }

    #[test]
    fn matriculation_orders_first() {
        let mut concepts = vec![
            Concept::Month(BillingMonth::June),
            Concept::Matriculation,
            Concept::Month(BillingMonth::February),
        ];
        concepts.sort();
        assert_eq!(
            concepts,
            vec![
                Concept::Matriculation,
                Concept::Month(BillingMonth::February),
                Concept::Month(BillingMonth::June),
            ]
        );
    }

    #[test]
    fn concept_serializes_as_label() {
        let json = serde_json::to_string(&Concept::Month(BillingMonth::September)).unwrap();
        assert_eq!(json, "\"Septiembre\"");
        let back: Concept = serde_json::from_str("\"septiembre\"").unwrap();
        assert_eq!(back, Concept::Month(BillingMonth::September));
    }
}
