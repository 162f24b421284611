use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::allocation::{validate_config, AllocationConfig, AllocationError, ScaleCurve};

pub const TOTAL_BUDGET: &str = "total_budget";
pub const PROGRAM_LENGTH_WEEKS: &str = "program_length_weeks";
pub const EXPECTED_USERS_PER_WEEK: &str = "expected_users_per_week";
pub const MAX_BUDGET_PER_WEEK: &str = "max_budget_per_week";
pub const POINTS_PER_DOLLAR: &str = "points_per_dollar";
pub const AUTO_ALLOCATE_POINTS: &str = "auto_allocate_points";
pub const AUTO_SCALE_MIN: &str = "auto_scale_min";
pub const AUTO_SCALE_MAX: &str = "auto_scale_max";
pub const PROGRAM_START_DATE: &str = "program_start_date";

/// Keys with a default. Budget values are dollars.
pub const DEFAULTS: &[(&str, &str)] = &[
    (TOTAL_BUDGET, "10000"),
    (PROGRAM_LENGTH_WEEKS, "12"),
    (EXPECTED_USERS_PER_WEEK, "50"),
    (MAX_BUDGET_PER_WEEK, "1000"),
    (POINTS_PER_DOLLAR, "100"),
    (AUTO_ALLOCATE_POINTS, "true"),
    (AUTO_SCALE_MIN, "0.25"),
    (AUTO_SCALE_MAX, "2.0"),
];

/// Every key the store understands, including ones without a default
pub fn known_keys() -> impl Iterator<Item = &'static str> {
    DEFAULTS
        .iter()
        .map(|(key, _)| *key)
        .chain(std::iter::once(PROGRAM_START_DATE))
}

pub fn is_known_key(key: &str) -> bool {
    known_keys().any(|k| k == key)
}

pub fn default_value(key: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, value)| *value)
}

/// Build an allocation config from raw settings.
///
/// Absent keys take their default. A present but malformed value is an
/// error, never a silent fallback. Every problem is reported together.
pub fn parse_allocation_config(
    settings: &BTreeMap<String, String>,
) -> Result<AllocationConfig, AllocationError> {
    let mut errors = Vec::new();
    let defaults = AllocationConfig::default();
    let total_budget_cents = take(
        &mut errors,
        TOTAL_BUDGET,
        parse_dollars(lookup(settings, TOTAL_BUDGET)),
        defaults.total_budget_cents,
    );
    let max_weekly_budget_cents = take(
        &mut errors,
        MAX_BUDGET_PER_WEEK,
        parse_dollars(lookup(settings, MAX_BUDGET_PER_WEEK)),
        defaults.max_weekly_budget_cents,
    );
    let program_length_weeks = take(
        &mut errors,
        PROGRAM_LENGTH_WEEKS,
        parse_number(lookup(settings, PROGRAM_LENGTH_WEEKS)),
        defaults.program_length_weeks,
    );
    let expected_users_per_week = take(
        &mut errors,
        EXPECTED_USERS_PER_WEEK,
        parse_number(lookup(settings, EXPECTED_USERS_PER_WEEK)),
        defaults.expected_users_per_week,
    );
    let points_per_dollar = take(
        &mut errors,
        POINTS_PER_DOLLAR,
        parse_number(lookup(settings, POINTS_PER_DOLLAR)),
        defaults.points_per_dollar,
    );
    let auto_allocate = take(
        &mut errors,
        AUTO_ALLOCATE_POINTS,
        parse_bool(lookup(settings, AUTO_ALLOCATE_POINTS)),
        defaults.auto_allocate,
    );
    let min_factor = take(
        &mut errors,
        AUTO_SCALE_MIN,
        parse_number(lookup(settings, AUTO_SCALE_MIN)),
        defaults.scale_curve.min_factor,
    );
    let max_factor = take(
        &mut errors,
        AUTO_SCALE_MAX,
        parse_number(lookup(settings, AUTO_SCALE_MAX)),
        defaults.scale_curve.max_factor,
    );

    if let Some(date) = settings.get(PROGRAM_START_DATE) {
        if let Err(e) = parse_start_date(date) {
            errors.push(format!("{}: {}", PROGRAM_START_DATE, e));
        }
    }

    let config = AllocationConfig {
        total_budget_cents,
        program_length_weeks,
        expected_users_per_week,
        max_weekly_budget_cents,
        points_per_dollar,
        auto_allocate,
        scale_curve: ScaleCurve {
            min_factor,
            max_factor,
        },
    };

    if let Err(problems) = validate_config(&config) {
        errors.extend(problems);
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(AllocationError::InvalidConfig(errors))
    }
}

fn lookup<'a>(settings: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    settings
        .get(key)
        .map(String::as_str)
        .or_else(|| default_value(key))
        .unwrap_or_default()
}

fn take<T>(errors: &mut Vec<String>, key: &str, parsed: Result<T, String>, fallback: T) -> T {
    parsed.unwrap_or_else(|e| {
        errors.push(format!("{}: {}", key, e));
        fallback
    })
}

/// Encode a config as the settings it was loaded from.
pub fn config_to_settings(config: &AllocationConfig) -> Vec<(String, String)> {
    vec![
        (TOTAL_BUDGET.to_string(), format_dollars(config.total_budget_cents)),
        (
            PROGRAM_LENGTH_WEEKS.to_string(),
            config.program_length_weeks.to_string(),
        ),
        (
            EXPECTED_USERS_PER_WEEK.to_string(),
            config.expected_users_per_week.to_string(),
        ),
        (
            MAX_BUDGET_PER_WEEK.to_string(),
            format_dollars(config.max_weekly_budget_cents),
        ),
        (POINTS_PER_DOLLAR.to_string(), config.points_per_dollar.to_string()),
        (AUTO_ALLOCATE_POINTS.to_string(), config.auto_allocate.to_string()),
        (
            AUTO_SCALE_MIN.to_string(),
            config.scale_curve.min_factor.to_string(),
        ),
        (
            AUTO_SCALE_MAX.to_string(),
            config.scale_curve.max_factor.to_string(),
        ),
    ]
}

/// "1000" or "1000.50" dollars to cents.
pub fn parse_dollars(s: &str) -> Result<i64, String> {
    let dollars: f64 = parse_number(s)?;
    if !dollars.is_finite() {
        return Err(format!("'{}' is not a finite amount", s));
    }
    Ok((dollars * 100.0).round() as i64)
}

pub fn format_dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    if abs % 100 == 0 {
        format!("{}{}", sign, abs / 100)
    } else {
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

pub fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("expected true or false, got '{}'", s)),
    }
}

pub fn parse_start_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}' ({})", s, e))
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    s.trim()
        .parse()
        .map_err(|e| format!("invalid number '{}' ({})", s, e))
}
