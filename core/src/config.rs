use crate::tariff::{CourseFeeMapping, FeeGroup, StandardTariff};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
struct FeeGroupsFile {
    fee_groups: Vec<FeeGroup>,
}

#[derive(Debug, Clone, Deserialize)]
struct CourseFeeGroupsFile {
    courses: Vec<CourseFeeMapping>,
}

#[derive(Debug, Clone, Deserialize)]
struct StandardTariffsFile {
    tariffs: Vec<StandardTariff>,
}

/// Treasury rules that are not reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryPolicy {
    /// Payments older than this cannot be deleted.
    #[serde(default = "default_delete_window")]
    pub payment_delete_window_minutes: i64,
    /// Width of the correlative part of a receipt code (`2024` + `00001`).
    #[serde(default = "default_receipt_digits")]
    pub receipt_sequence_digits: usize,
    /// Number of fee groups a year's tariff registration must cover.
    #[serde(default = "default_required_groups")]
    pub required_fee_groups: usize,
}

fn default_delete_window() -> i64 { 60 }
fn default_receipt_digits() -> usize { 5 }
fn default_required_groups() -> usize { 3 }

impl Default for TreasuryPolicy {
    fn default() -> Self {
        Self {
            payment_delete_window_minutes: default_delete_window(),
            receipt_sequence_digits:       default_receipt_digits(),
            required_fee_groups:           default_required_groups(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreasuryConfig {
    pub fee_groups:       Vec<FeeGroup>,
    pub course_mappings:  Vec<CourseFeeMapping>,
    pub standard_tariffs: Vec<StandardTariff>,
    pub policy:           TreasuryPolicy,
}

impl TreasuryConfig {
    /// Load from the data/ directory.
    /// In tests, use TreasuryConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let groups_path = format!("{data_dir}/reference/fee_groups.json");
        let groups_content = std::fs::read_to_string(&groups_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {groups_path}: {e}"))?;
        let groups_file: FeeGroupsFile = serde_json::from_str(&groups_content)?;

        let courses_path = format!("{data_dir}/reference/course_fee_groups.json");
        let courses_content = std::fs::read_to_string(&courses_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {courses_path}: {e}"))?;
        let courses_file: CourseFeeGroupsFile = serde_json::from_str(&courses_content)?;

        let tariffs_path = format!("{data_dir}/reference/standard_tariffs.json");
        let tariffs_content = std::fs::read_to_string(&tariffs_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {tariffs_path}: {e}"))?;
        let tariffs_file: StandardTariffsFile = serde_json::from_str(&tariffs_content)?;

        // policy.json is optional; every field has a default.
        let policy_path = format!("{data_dir}/policy.json");
        let policy = match std::fs::read_to_string(&policy_path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TreasuryPolicy::default(),
            Err(e) => return Err(anyhow::anyhow!("Cannot read {policy_path}: {e}")),
        };

        let config = Self {
            fee_groups:       groups_file.fee_groups,
            course_mappings:  courses_file.courses,
            standard_tariffs: tariffs_file.tariffs,
            policy,
        };
        config.check()?;
        Ok(config)
    }

    /// Every mapping and tariff must point at a declared fee group.
    fn check(&self) -> anyhow::Result<()> {
        let known = |id| self.fee_groups.iter().any(|g| g.id == id);
        if let Some(m) = self.course_mappings.iter().find(|m| !known(m.fee_group_id)) {
            anyhow::bail!(
                "course '{}' ({}) maps to unknown fee group {}",
                m.course, m.branch, m.fee_group_id
            );
        }
        if let Some(t) = self.standard_tariffs.iter().find(|t| !known(t.fee_group_id)) {
            anyhow::bail!("tariff for {} uses unknown fee group {}", t.year, t.fee_group_id);
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let group = |id: i64, name: &str| FeeGroup { id, name: name.into() };
        let course = |course: &str, branch: &str, fee_group_id: i64| CourseFeeMapping {
            course: course.into(),
            branch: branch.into(),
            fee_group_id,
        };
        let tariff = |year, fee_group_id, matriculation: i64, monthly: i64| StandardTariff {
            year,
            fee_group_id,
            matriculation: Decimal::from(matriculation),
            monthly:       Decimal::from(monthly),
        };

        Self {
            fee_groups: vec![
                group(1, "Maternal"),
                group(2, "Inicial y Primaria"),
                group(3, "Secundaria"),
            ],
            course_mappings: vec![
                course("Maternal",   "Primaria",   1),
                course("Inicial I",  "Primaria",   2),
                course("Inicial II", "Primaria",   2),
                course("Primero",    "Primaria",   2),
                course("Segundo",    "Primaria",   2),
                course("Tercero",    "Primaria",   2),
                course("Cuarto",     "Primaria",   2),
                course("Quinto",     "Primaria",   2),
                course("Sexto",      "Primaria",   2),
                course("Primero",    "Secundaria", 3),
                course("Segundo",    "Secundaria", 3),
                course("Tercero",    "Secundaria", 3),
                course("Cuarto",     "Secundaria", 3),
                course("Quinto",     "Secundaria", 3),
                course("Sexto",      "Secundaria", 3),
            ],
            standard_tariffs: vec![
                tariff(2023, 1, 100, 800),
                tariff(2023, 2, 150, 850),
                tariff(2023, 3, 200, 900),
                tariff(2024, 1, 120, 820),
                tariff(2024, 2, 170, 870),
                tariff(2024, 3, 220, 920),
            ],
            policy: TreasuryPolicy::default(),
        }
    }
}
