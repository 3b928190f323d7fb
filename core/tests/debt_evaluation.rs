//! Debt evaluation: standard and custom-months modes, concept matching,
//! re-enrollment checks.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tuition_core::{
    billing::{evaluate_debt, CustomAmounts, Payment},
    concept::{BillingMonth, Concept},
    store::{NewEnrollment, NewPayment},
    tariff::{EnrollmentKey, TariffAmounts, TariffSource},
    treasury::Treasury,
};

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(10, 0, 0).unwrap()
}

fn key() -> EnrollmentKey {
    EnrollmentKey { year: 2024, branch: "Primaria".into(), course: "Primero".into() }
}

fn tariff() -> TariffAmounts {
    TariffAmounts {
        matriculation: dec!(100),
        monthly:       dec!(800),
        source:        TariffSource::Standard { fee_group_id: 2 },
    }
}

fn pay(concept: &str, amount: Decimal) -> Payment {
    Payment::new(concept, amount, at())
}

fn full_year() -> Vec<Payment> {
    let mut payments = vec![pay("Matrícula", dec!(100))];
    payments.extend(BillingMonth::ALL.iter().map(|m| pay(m.label(), dec!(800))));
    payments
}

fn custom(rows: &[(&str, Decimal)]) -> CustomAmounts {
    rows.iter()
        .map(|(label, amount)| (Concept::parse(label).unwrap(), *amount))
        .collect()
}

#[test]
fn fully_paid_standard_year_has_no_debt() {
    let report = evaluate_debt(&key(), &tariff(), &CustomAmounts::new(), &full_year());
    assert!(!report.has_debt);
    assert!(report.deficiencies.is_empty());
    assert_eq!(report.year, 2024);
    assert_eq!(report.course, "Primero");
    assert_eq!(report.branch, "Primaria");
}

#[test]
fn underpaid_month_is_the_only_deficiency() {
    let mut payments = full_year();
    for p in payments.iter_mut().filter(|p| p.concept == "Marzo") {
        p.amount = dec!(500);
    }
    let report = evaluate_debt(&key(), &tariff(), &CustomAmounts::new(), &payments);
    assert!(report.has_debt);
    assert_eq!(report.descriptions(), vec!["Mensualidad de Marzo Incompleta"]);
}

#[test]
fn custom_months_mode_checks_only_listed_concepts() {
    let amounts = custom(&[("matrícula", dec!(50)), ("junio", dec!(300))]);
    let payments = vec![pay("Matrícula", dec!(50)), pay("Junio", dec!(300))];
    let report = evaluate_debt(&key(), &tariff(), &amounts, &payments);
    assert!(!report.has_debt, "unexpected: {:?}", report.descriptions());
}

#[test]
fn custom_months_mode_reports_in_order() {
    let amounts = custom(&[("junio", dec!(300)), ("matrícula", dec!(50))]);
    let report = evaluate_debt(&key(), &tariff(), &amounts, &[]);
    assert!(report.has_debt);
    assert_eq!(
        report.descriptions(),
        vec!["Matrícula Incompleta", "Mensualidad de Junio Incompleta"]
    );
}

/// Only a Matriculation override still switches months off.
#[test]
fn matriculation_only_custom_map_checks_no_months() {
    let amounts = custom(&[("Matrícula", dec!(60))]);
    let report = evaluate_debt(&key(), &tariff(), &amounts, &[pay("Matrícula", dec!(60))]);
    assert!(!report.has_debt, "unexpected: {:?}", report.descriptions());
}

#[test]
fn payment_concepts_match_case_insensitively() {
    let mut payments: Vec<Payment> = full_year()
        .into_iter()
        .filter(|p| p.concept != "Marzo")
        .collect();
    payments.push(pay("MARZO", dec!(300)));
    payments.push(pay("marzo", dec!(500)));
    payments.push(pay("Enero", dec!(800)));
    payments.push(pay("Uniforme", dec!(80)));

    let report = evaluate_debt(&key(), &tariff(), &CustomAmounts::new(), &payments);
    assert!(!report.has_debt, "unexpected: {:?}", report.descriptions());
}

#[test]
fn overpayment_does_not_cover_other_months() {
    let payments = vec![pay("Matrícula", dec!(100)), pay("Febrero", dec!(8000))];
    let report = evaluate_debt(&key(), &tariff(), &CustomAmounts::new(), &payments);
    assert_eq!(report.deficiencies.len(), 9);
    assert_eq!(report.deficiencies[0].0, Concept::Month(BillingMonth::March));
}

#[test]
fn evaluation_is_repeatable() {
    let amounts = custom(&[("Julio", dec!(300))]);
    let payments = vec![pay("Julio", dec!(100))];
    let first = evaluate_debt(&key(), &tariff(), &amounts, &payments);
    let second = evaluate_debt(&key(), &tariff(), &amounts, &payments);
    assert_eq!(first, second);
}

#[test]
fn report_serializes_with_external_keys() {
    let report = evaluate_debt(&key(), &tariff(), &custom(&[("Mayo", dec!(1))]), &[]);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["tieneDeudas"], true);
    assert_eq!(json["gestion"], 2024);
    assert_eq!(json["curso"], "Primero");
    assert_eq!(json["sucursal"], "Primaria");
    assert_eq!(
        json["detallesDeuda"],
        serde_json::json!(["Matrícula Incompleta", "Mensualidad de Mayo Incompleta"])
    );
}

// ── Through the treasury ──────────────────────────────────────────

fn enroll(treasury: &Treasury, student_id: i64, year: i32) -> i64 {
    treasury
        .enroll(&NewEnrollment {
            student_id,
            year,
            branch:      "Primaria".into(),
            course:      "Primero".into(),
            enrolled_on: NaiveDate::from_ymd_opt(year, 1, 10).unwrap(),
        })
        .unwrap()
}

fn record(treasury: &Treasury, enrollment_id: i64, concept: &str, amount: Decimal) {
    let payment = NewPayment {
        enrollment_id,
        concept: concept.into(),
        amount,
        method: Some("Efectivo".into()),
        notes: None,
        operator: Some("caja1".into()),
        branch: "Primaria".into(),
    };
    treasury.record_payment(&payment, at()).unwrap();
}

#[test]
fn verify_debts_uses_latest_previous_enrollment() {
    let treasury = Treasury::build_test().unwrap();
    let old = enroll(&treasury, 42, 2023);
    let _current = enroll(&treasury, 42, 2024);

    // 2023 group 2 tariff: 150 / 850
    record(&treasury, old, "Matrícula", dec!(150));
    for m in BillingMonth::ALL {
        record(&treasury, old, m.label(), dec!(850));
    }

    let report = treasury.verify_debts(42, 2024).unwrap();
    assert_eq!(report.year, 2023);
    assert!(!report.has_debt, "unexpected: {:?}", report.descriptions());

    // The 2024 enrollment is unpaid, but it is not "previous" for 2024.
    let report = treasury.verify_debts(42, 2025).unwrap();
    assert_eq!(report.year, 2024);
    assert_eq!(report.deficiencies.len(), 11);
}

#[test]
fn verify_debts_without_history_is_not_found() {
    let treasury = Treasury::build_test().unwrap();
    enroll(&treasury, 5, 2024);
    let err = treasury.verify_debts(5, 2024).unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}
