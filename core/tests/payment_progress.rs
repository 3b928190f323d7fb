//! Branch payment reports: dashboard progress and the payment summary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tuition_core::{
    concept::{BillingMonth, Concept},
    special_case::{SpecialCaseAmount, SpecialCaseRequest},
    store::{NewEnrollment, NewPayment},
    treasury::Treasury,
};

fn setup() -> Treasury {
    let _ = env_logger::builder().is_test(true).try_init();
    Treasury::build_test().unwrap()
}

fn enroll(treasury: &Treasury, student_id: i64, branch: &str, course: &str) -> i64 {
    treasury
        .enroll(&NewEnrollment {
            student_id,
            year:        2024,
            branch:      branch.into(),
            course:      course.into(),
            enrolled_on: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        })
        .unwrap()
}

fn pay(treasury: &Treasury, enrollment_id: i64, concept: &str, amount: Decimal) {
    let at = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap().and_hms_opt(8, 30, 0).unwrap();
    treasury
        .record_payment(
            &NewPayment {
                enrollment_id,
                concept: concept.into(),
                amount,
                method: None,
                notes: None,
                operator: None,
                branch: "Primaria".into(),
            },
            at,
        )
        .unwrap();
}

fn special_case(treasury: &Treasury, id: i64, start: u32, end: u32, amounts: &[(&str, Decimal)]) {
    let amounts = amounts
        .iter()
        .map(|(concept, amount)| SpecialCaseAmount { concept: (*concept).into(), amount: *amount })
        .collect();
    treasury
        .register_special_case(SpecialCaseRequest {
            enrollment_id: Some(id),
            start_month:   Some(start),
            end_month:     Some(end),
            amounts:       Some(amounts),
        })
        .unwrap();
}

#[test]
fn progress_counts_unbilled_months_as_paid_and_unresolved_as_unpaid() {
    let treasury = setup();

    // 2024 Primaria/Primero: 170 / 870
    let regular = enroll(&treasury, 1, "Primaria", "Primero");
    pay(&treasury, regular, "Matrícula", dec!(170));
    pay(&treasury, regular, "Febrero", dec!(870));

    let special = enroll(&treasury, 2, "Primaria", "Segundo");
    treasury
        .register_special_case(SpecialCaseRequest {
            enrollment_id: Some(special),
            start_month:   Some(6),
            end_month:     Some(6),
            amounts:       Some(vec![SpecialCaseAmount { concept: "Junio".into(), amount: dec!(300) }]),
        })
        .unwrap();

    let _unmapped = enroll(&treasury, 3, "Primaria", "Séptimo");
    let _elsewhere = enroll(&treasury, 4, "Secundaria", "Primero");

    let progress = treasury.payment_progress(2024, "Primaria").unwrap();

    assert_eq!(progress.matriculation.total, 3);
    assert_eq!(progress.matriculation.paid, 1);
    assert_eq!(progress.matriculation.percentage, 33.33);

    assert_eq!(progress.months.len(), 10);
    let month = |n: u32| progress.months.iter().find(|m| m.month == n).unwrap();

    assert_eq!(month(2).count.paid, 2);
    assert_eq!(month(2).count.percentage, 66.67);
    assert_eq!(month(3).count.paid, 1);
    assert_eq!(month(6).count.paid, 0);
    assert_eq!(month(6).count.percentage, 0.0);
}

#[test]
fn empty_branch_reports_zero() {
    let treasury = setup();
    let progress = treasury.payment_progress(2024, "Primaria").unwrap();
    assert_eq!(progress.matriculation.total, 0);
    assert_eq!(progress.matriculation.percentage, 0.0);
    assert!(progress.months.iter().all(|m| m.count.total == 0));
}

#[test]
fn progress_serializes_with_external_keys() {
    let treasury = setup();
    let id = enroll(&treasury, 1, "Primaria", "Primero");
    pay(&treasury, id, "Matrícula", dec!(170));

    let json = serde_json::to_value(treasury.payment_progress(2024, "Primaria").unwrap()).unwrap();
    assert_eq!(json["matricula"]["total"], 1);
    assert_eq!(json["matricula"]["pagados"], 1);
    assert_eq!(json["matricula"]["porcentaje"], 100.0);
    assert_eq!(json["mensualidades"][0]["mes"], 2);
    assert_eq!(json["mensualidades"][0]["pagados"], 0);
}

#[test]
fn custom_amounts_count_without_a_tariff() {
    let treasury = setup();

    // "Séptimo" has no fee group, so no tariff resolves for either.
    let special = enroll(&treasury, 5, "Primaria", "Séptimo");
    special_case(&treasury, special, 2, 6, &[("Matrícula", dec!(50)), ("Junio", dec!(300))]);
    pay(&treasury, special, "Matrícula", dec!(50));
    pay(&treasury, special, "Junio", dec!(300));

    let plain = enroll(&treasury, 6, "Primaria", "Séptimo");
    pay(&treasury, plain, "Febrero", dec!(900));

    let progress = treasury.payment_progress(2024, "Primaria").unwrap();
    let month = |n: u32| progress.months.iter().find(|m| m.month == n).unwrap();

    assert_eq!(progress.matriculation.total, 2);
    assert_eq!(progress.matriculation.paid, 1);
    assert_eq!(month(2).count.paid, 1, "unlisted month is not billed");
    assert_eq!(month(6).count.paid, 1);
    assert_eq!(month(7).count.paid, 1);
}

#[test]
fn summary_lists_expected_and_paid_per_enrollment() {
    let treasury = setup();

    // 2024 Primaria/Primero: 170 / 870
    let regular = enroll(&treasury, 1, "Primaria", "Primero");
    pay(&treasury, regular, "Matrícula", dec!(170));
    pay(&treasury, regular, "Febrero", dec!(400));
    pay(&treasury, regular, "Febrero", dec!(470));
    pay(&treasury, regular, "Uniforme", dec!(90));

    let special = enroll(&treasury, 2, "Primaria", "Séptimo");
    special_case(&treasury, special, 4, 5, &[("Abril", dec!(250))]);

    let custom = enroll(&treasury, 3, "Primaria", "Segundo");
    treasury.create_custom_tariff(custom, dec!(10), dec!(100)).unwrap();

    let rows = treasury.payment_summary(2024, "Primaria", None).unwrap();
    assert_eq!(rows.len(), 3);

    let row = &rows[0];
    assert_eq!(row.enrollment_id, regular);
    assert_eq!(row.student_id, 1);
    assert_eq!(row.matriculation, Some(dec!(170)));
    assert_eq!(row.monthly, Some(dec!(870)));
    assert!(!row.has_custom_tariff);
    assert_eq!(row.paid.len(), 11);
    assert_eq!(row.paid[&Concept::Matriculation], dec!(170));
    assert_eq!(row.paid[&Concept::Month(BillingMonth::February)], dec!(870));
    assert_eq!(row.paid[&Concept::Month(BillingMonth::March)], Decimal::ZERO);
    assert_eq!(row.expected[&Concept::Month(BillingMonth::November)], dec!(870));

    let row = &rows[1];
    assert_eq!(row.matriculation, None);
    assert_eq!(row.monthly, None);
    assert_eq!(row.expected.len(), 10, "matriculation needs the missing tariff");
    assert_eq!(row.expected[&Concept::Month(BillingMonth::April)], dec!(250));
    assert_eq!(row.expected[&Concept::Month(BillingMonth::May)], Decimal::ZERO);

    let row = &rows[2];
    assert!(row.has_custom_tariff);
    assert_eq!(row.monthly, Some(dec!(100)));

    let filtered = treasury.payment_summary(2024, "Primaria", Some("Segundo")).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].enrollment_id, custom);
    assert!(treasury.payment_summary(2024, "Secundaria", None).unwrap().is_empty());
}

#[test]
fn summary_serializes_with_external_keys() {
    let treasury = setup();
    let id = enroll(&treasury, 1, "Primaria", "Primero");
    pay(&treasury, id, "Matrícula", dec!(170));

    let json = serde_json::to_value(treasury.payment_summary(2024, "Primaria", None).unwrap()).unwrap();
    assert_eq!(json[0]["inscripcion_id"], id);
    assert_eq!(json[0]["curso"], "Primero");
    assert_eq!(json[0]["tiene_tarifa_personalizada"], false);
    assert!(json[0]["pagado"].as_object().unwrap().contains_key("Matrícula"));
    assert!(json[0]["esperado"].as_object().unwrap().contains_key("Noviembre"));
}
