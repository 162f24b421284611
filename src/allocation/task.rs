use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    PulseSurvey,
    PersonalDevelopment,
    LearningModule,
    CheckIn,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 4] = [
        TaskCategory::PulseSurvey,
        TaskCategory::PersonalDevelopment,
        TaskCategory::LearningModule,
        TaskCategory::CheckIn,
    ];

    /// Storage name, matching the task type strings written to the ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::PulseSurvey => "pulse_survey",
            TaskCategory::PersonalDevelopment => "personal_development",
            TaskCategory::LearningModule => "learning_module",
            TaskCategory::CheckIn => "check_in",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = anyhow::Error;

    /// Accepts "pulse_survey", "pulse-survey" and "pulseSurvey" spellings.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "pulsesurvey" => Ok(TaskCategory::PulseSurvey),
            "personaldevelopment" => Ok(TaskCategory::PersonalDevelopment),
            "learningmodule" => Ok(TaskCategory::LearningModule),
            "checkin" => Ok(TaskCategory::CheckIn),
            _ => bail!(
                "Unknown task category '{}' (expected pulse_survey, personal_development, learning_module or check_in)",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            _ => bail!(
                "Unknown difficulty '{}' (expected beginner, intermediate or advanced)",
                s
            ),
        }
    }
}

/// Manual point table. Difficulty only changes learning modules.
pub fn base_points(category: TaskCategory, difficulty: Difficulty) -> u64 {
    match category {
        TaskCategory::PulseSurvey => 500,
        TaskCategory::PersonalDevelopment => 250,
        TaskCategory::LearningModule => match difficulty {
            Difficulty::Beginner => 150,
            Difficulty::Intermediate => 250,
            Difficulty::Advanced => 400,
        },
        TaskCategory::CheckIn => 100,
    }
}

/// Points a typical participant earns in one week: one task of each
/// category at intermediate difficulty.
pub fn reference_weekly_points() -> u64 {
    TaskCategory::ALL
        .iter()
        .map(|c| base_points(*c, Difficulty::Intermediate))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category_snake_case() {
        assert_eq!("pulse_survey".parse::<TaskCategory>().unwrap(), TaskCategory::PulseSurvey);
        assert_eq!("check_in".parse::<TaskCategory>().unwrap(), TaskCategory::CheckIn);
    }

    #[test]
    fn test_parse_category_kebab_and_camel() {
        assert_eq!(
            "learning-module".parse::<TaskCategory>().unwrap(),
            TaskCategory::LearningModule
        );
        assert_eq!(
            "personalDevelopment".parse::<TaskCategory>().unwrap(),
            TaskCategory::PersonalDevelopment
        );
    }

    #[test]
    fn test_parse_category_unknown() {
        let err = "quiz".parse::<TaskCategory>().unwrap_err();
        assert!(err.to_string().contains("Unknown task category 'quiz'"));
    }

    #[test]
    fn test_category_display_roundtrips() {
        for category in TaskCategory::ALL {
            assert_eq!(category.to_string().parse::<TaskCategory>().unwrap(), category);
        }
    }

    #[test]
    fn test_parse_difficulty_case_insensitive() {
        assert_eq!("Advanced".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert_eq!(" beginner ".parse::<Difficulty>().unwrap(), Difficulty::Beginner);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_default_difficulty_is_intermediate() {
        assert_eq!(Difficulty::default(), Difficulty::Intermediate);
    }

    #[test]
    fn test_base_points_table() {
        assert_eq!(base_points(TaskCategory::PulseSurvey, Difficulty::Intermediate), 500);
        assert_eq!(base_points(TaskCategory::PersonalDevelopment, Difficulty::Intermediate), 250);
        assert_eq!(base_points(TaskCategory::LearningModule, Difficulty::Beginner), 150);
        assert_eq!(base_points(TaskCategory::LearningModule, Difficulty::Intermediate), 250);
        assert_eq!(base_points(TaskCategory::LearningModule, Difficulty::Advanced), 400);
        assert_eq!(base_points(TaskCategory::CheckIn, Difficulty::Intermediate), 100);
    }

    #[test]
    fn test_difficulty_ignored_outside_learning_modules() {
        for difficulty in [Difficulty::Beginner, Difficulty::Intermediate, Difficulty::Advanced] {
            assert_eq!(base_points(TaskCategory::PulseSurvey, difficulty), 500);
            assert_eq!(base_points(TaskCategory::CheckIn, difficulty), 100);
        }
    }

    #[test]
    fn test_reference_weekly_points() {
        assert_eq!(reference_weekly_points(), 1100);
    }
}
