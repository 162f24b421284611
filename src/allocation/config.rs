use serde::{Deserialize, Serialize};

use super::task::{Difficulty, TaskCategory};

/// Administrative allocation settings.
///
/// Money is held in cents. Signed fields let malformed admin input through
/// to validation instead of failing at parse time.
///
/// Example YAML:
/// ```yaml
/// total_budget_cents: 1000000
/// program_length_weeks: 12
/// expected_users_per_week: 50
/// max_weekly_budget_cents: 100000
/// points_per_dollar: 100
/// auto_allocate: true
/// scale_curve:
///   min_factor: 0.25
///   max_factor: 2.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AllocationConfig {
    pub total_budget_cents: i64,
    pub program_length_weeks: i64,
    pub expected_users_per_week: u32,
    pub max_weekly_budget_cents: i64,
    pub points_per_dollar: f64,
    pub auto_allocate: bool,

    /// Clamp bounds for the auto-allocation scale factor
    #[serde(default)]
    pub scale_curve: ScaleCurve,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            total_budget_cents: 1_000_000,
            program_length_weeks: 12,
            expected_users_per_week: 50,
            max_weekly_budget_cents: 100_000,
            points_per_dollar: 100.0,
            auto_allocate: true,
            scale_curve: ScaleCurve::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScaleCurve {
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for ScaleCurve {
    fn default() -> Self {
        Self {
            min_factor: 0.25,
            max_factor: 2.0,
        }
    }
}

impl ScaleCurve {
    pub fn clamp(&self, factor: f64) -> f64 {
        factor.max(self.min_factor).min(self.max_factor)
    }
}

/// A single task completion to be priced.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AllocationRequest {
    pub task_category: TaskCategory,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    pub current_week_index: u32,
    pub weekly_budget_used_cents: u64,
    /// Spend across the whole program so far; only read by auto mode pacing
    #[serde(default)]
    pub program_spent_cents: u64,
}

impl AllocationRequest {
    pub fn new(task_category: TaskCategory, current_week_index: u32) -> Self {
        Self {
            task_category,
            difficulty: None,
            current_week_index,
            weekly_budget_used_cents: 0,
            program_spent_cents: 0,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_weekly_used(mut self, cents: u64) -> Self {
        self.weekly_budget_used_cents = cents;
        self
    }

    pub fn with_program_spent(mut self, cents: u64) -> Self {
        self.program_spent_cents = cents;
        self
    }

    pub fn effective_difficulty(&self) -> Difficulty {
        self.difficulty.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct AllocationResult {
    pub points_awarded: u64,
    pub cost_cents: u64,
    pub weekly_budget_used_cents_after: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allocation_config() {
        let config = AllocationConfig::default();

        assert_eq!(config.total_budget_cents, 1_000_000);
        assert_eq!(config.program_length_weeks, 12);
        assert_eq!(config.expected_users_per_week, 50);
        assert_eq!(config.max_weekly_budget_cents, 100_000);
        assert_eq!(config.points_per_dollar, 100.0);
        assert!(config.auto_allocate);
        assert_eq!(config.scale_curve, ScaleCurve::default());
    }

    #[test]
    fn test_allocation_config_serde_roundtrip() {
        let config = AllocationConfig::default();
        let yaml = serde_saphyr::to_string(&config).unwrap();
        let parsed: AllocationConfig = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_parse_without_scale_curve() {
        let yaml = r#"
total_budget_cents: 500000
program_length_weeks: 8
expected_users_per_week: 20
max_weekly_budget_cents: 60000
points_per_dollar: 50
auto_allocate: false
"#;
        let config: AllocationConfig = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.program_length_weeks, 8);
        assert_eq!(config.points_per_dollar, 50.0);
        assert!(!config.auto_allocate);
        assert_eq!(config.scale_curve, ScaleCurve::default());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let yaml = r#"
total_budget_cents: 500000
program_length_weeks: 8
expected_users_per_week: 20
max_weekly_budget_cents: 60000
points_per_dollar: 50
auto_allocate: false
admin_password: hunter2
"#;
        assert!(serde_saphyr::from_str::<AllocationConfig>(yaml).is_err());
    }

    #[test]
    fn test_scale_curve_clamp() {
        let curve = ScaleCurve::default();
        assert_eq!(curve.clamp(0.1), 0.25);
        assert_eq!(curve.clamp(1.3), 1.3);
        assert_eq!(curve.clamp(5.0), 2.0);
    }

    #[test]
    fn test_request_builder_defaults() {
        let request = AllocationRequest::new(TaskCategory::LearningModule, 3);
        assert_eq!(request.difficulty, None);
        assert_eq!(request.effective_difficulty(), Difficulty::Intermediate);
        assert_eq!(request.weekly_budget_used_cents, 0);
        assert_eq!(request.program_spent_cents, 0);

        let request = request
            .with_difficulty(Difficulty::Advanced)
            .with_weekly_used(1200)
            .with_program_spent(9000);
        assert_eq!(request.effective_difficulty(), Difficulty::Advanced);
        assert_eq!(request.weekly_budget_used_cents, 1200);
        assert_eq!(request.program_spent_cents, 9000);
    }
}
