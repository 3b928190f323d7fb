//! Reference data: seeding, year tariff registration, tariff queries.

use rust_decimal_macros::dec;
use tuition_core::{
    config::TreasuryConfig,
    error::TuitionError,
    store::TuitionStore,
    treasury::{Treasury, YearTariffEntry},
};

fn entry(fee_group_id: i64, matriculation: i64, monthly: i64) -> YearTariffEntry {
    YearTariffEntry {
        fee_group_id,
        matriculation: matriculation.into(),
        monthly:       monthly.into(),
    }
}

#[test]
fn seeding_twice_changes_nothing() {
    let config = TreasuryConfig::default_test();
    let store = TuitionStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.seed_reference(&config).unwrap();
    store.seed_reference(&config).unwrap();

    assert_eq!(store.fee_groups().unwrap().len(), 3);
    assert_eq!(store.course_mappings().unwrap().len(), 15);
    assert_eq!(store.tariff_count_for_year(2024).unwrap(), 3);
}

#[test]
fn tariff_lookup_by_course() {
    let treasury = Treasury::build_test().unwrap();
    let tariff = treasury.tariff_for(2023, "Maternal", "Primaria").unwrap();
    assert_eq!(tariff.fee_group_id, 1);
    assert_eq!(tariff.matriculation, dec!(100));
    assert_eq!(tariff.monthly, dec!(800));

    let err = treasury.tariff_for(2023, "Maternal", "Secundaria").unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn branch_summary_lists_distinct_groups() {
    let treasury = Treasury::build_test().unwrap();
    let primaria = treasury.tariffs_for_branch(2024, "Primaria").unwrap();
    let mut groups: Vec<i64> = primaria.iter().map(|t| t.fee_group_id).collect();
    groups.sort();
    assert_eq!(groups, vec![1, 2]);

    let secundaria = treasury.tariffs_for_branch(2024, "Secundaria").unwrap();
    assert_eq!(secundaria.len(), 1);
    assert_eq!(secundaria[0].group_name, "Secundaria");
}

#[test]
fn register_year_tariffs_requires_every_group() {
    let treasury = Treasury::build_test().unwrap();
    assert!(!treasury.tariffs_defined(2025).unwrap());

    let err = treasury
        .register_year_tariffs(2025, &[entry(1, 130, 830), entry(2, 180, 880)])
        .unwrap_err();
    assert!(matches!(err, TuitionError::Validation(_)), "got {err:?}");

    let err = treasury
        .register_year_tariffs(2025, &[entry(1, 130, 830), entry(1, 180, 880), entry(3, 230, 930)])
        .unwrap_err();
    assert!(matches!(err, TuitionError::Validation(_)), "got {err:?}");

    let err = treasury
        .register_year_tariffs(2025, &[entry(1, 130, 830), entry(2, 180, 880), entry(9, 230, 930)])
        .unwrap_err();
    assert!(matches!(err, TuitionError::Validation(_)), "got {err:?}");

    assert_eq!(treasury.store().tariff_count_for_year(2025).unwrap(), 0);

    let entries = [entry(1, 130, 830), entry(2, 180, 880), entry(3, 230, 930)];
    treasury.register_year_tariffs(2025, &entries).unwrap();
    assert!(treasury.tariffs_defined(2025).unwrap());
    assert_eq!(treasury.tariff_for(2025, "Quinto", "Secundaria").unwrap().monthly, dec!(930));

    let err = treasury.register_year_tariffs(2025, &entries).unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[test]
fn history_is_newest_first() {
    let treasury = Treasury::build_test().unwrap();
    let history = treasury.tariff_history().unwrap();
    assert_eq!(history.len(), 6);
    assert!(history[..3].iter().all(|t| t.year == 2024));
    assert!(history[3..].iter().all(|t| t.year == 2023));
    assert_eq!(history[0].group_name, "Inicial y Primaria");

    let previous = treasury.previous_year_tariffs(2024).unwrap();
    assert_eq!(previous.len(), 3);
    assert!(previous.iter().all(|t| t.year == 2023));
}

#[test]
fn reference_files_load() {
    let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
    let config = TreasuryConfig::load(data_dir).unwrap();
    assert_eq!(config.fee_groups.len(), 3);
    assert!(!config.course_mappings.is_empty());
    assert_eq!(config.policy.payment_delete_window_minutes, 60);
}
