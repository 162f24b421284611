use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::{AllocationConfig, AllocationRequest, AllocationResult};
use super::error::AllocationError;
use super::task::{base_points, reference_weekly_points};
use super::validation::{validate_config, validate_request};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    Manual,
    Automated,
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationMethod::Manual => f.write_str("manual"),
            AllocationMethod::Automated => f.write_str("automated"),
        }
    }
}

/// Allocation result plus how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOutcome {
    pub result: AllocationResult,
    pub method: AllocationMethod,
    pub base_points: u64,
    /// Scale applied in auto mode, None in manual mode
    pub scale_factor: Option<f64>,
    /// Points before the weekly cap clamp
    pub requested_points: u64,
    /// True when the weekly cap reduced the award
    pub capped: bool,
}

/// Price a task completion against the allocation settings.
///
/// Pure: all state comes in through the arguments and the new weekly usage
/// is returned, never stored.
pub fn allocate(
    config: &AllocationConfig,
    request: &AllocationRequest,
) -> Result<AllocationResult, AllocationError> {
    allocate_detailed(config, request).map(|outcome| outcome.result)
}

pub fn allocate_detailed(
    config: &AllocationConfig,
    request: &AllocationRequest,
) -> Result<AllocationOutcome, AllocationError> {
    validate_config(config).map_err(AllocationError::InvalidConfig)?;
    validate_request(request)?;

    let ppd = config.points_per_dollar;
    let base = base_points(request.task_category, request.effective_difficulty());

    let (method, scale, requested_points) = if config.auto_allocate {
        let scale = scale_factor(config, request);
        let points = (base as f64 * scale).round() as u64;
        (AllocationMethod::Automated, Some(scale), points)
    } else {
        (AllocationMethod::Manual, None, base)
    };

    let mut points = requested_points;
    let mut cost_cents = points_to_cents(points, ppd);

    let available = weekly_headroom_cents(config, request.weekly_budget_used_cents);
    let capped = cost_cents > available;
    if capped {
        cost_cents = available;
        points = cents_to_points(cost_cents, ppd);
    }

    let result = AllocationResult {
        points_awarded: points,
        cost_cents,
        weekly_budget_used_cents_after: request.weekly_budget_used_cents + cost_cents,
    };

    tracing::debug!(
        category = %request.task_category,
        difficulty = %request.effective_difficulty(),
        week = request.current_week_index,
        %method,
        base,
        ?scale,
        points = result.points_awarded,
        cost_cents = result.cost_cents,
        used_after = result.weekly_budget_used_cents_after,
        capped,
        "allocation computed"
    );

    Ok(AllocationOutcome {
        result,
        method,
        base_points: base,
        scale_factor: scale,
        requested_points,
        capped,
    })
}

/// Auto mode multiplier for the manual table.
///
/// The remaining program budget is spread over the remaining weeks (never
/// above the weekly cap), split across the expected participants, and
/// compared with what a typical week of manual-table awards costs.
pub fn scale_factor(config: &AllocationConfig, request: &AllocationRequest) -> f64 {
    let remaining_weeks =
        (config.program_length_weeks - i64::from(request.current_week_index) + 1).max(1);

    let spent = i64::try_from(request.program_spent_cents).unwrap_or(i64::MAX);
    let remaining_budget = config.total_budget_cents.saturating_sub(spent).max(0);

    let paced_weekly = (remaining_budget as f64 / remaining_weeks as f64)
        .min(config.max_weekly_budget_cents.max(0) as f64);
    let per_user_weekly_cap = paced_weekly / f64::from(config.expected_users_per_week.max(1));

    let reference_weekly_cost =
        points_to_cents(reference_weekly_points(), config.points_per_dollar).max(1) as f64;

    config.scale_curve.clamp(per_user_weekly_cap / reference_weekly_cost)
}

/// Cents still spendable this week. Zero once usage reaches the cap.
pub fn weekly_headroom_cents(config: &AllocationConfig, weekly_used_cents: u64) -> u64 {
    (config.max_weekly_budget_cents.max(0) as u64).saturating_sub(weekly_used_cents)
}

/// Points to cents, rounding up so a cost is never understated.
pub fn points_to_cents(points: u64, points_per_dollar: f64) -> u64 {
    (points as f64 * 100.0 / points_per_dollar).ceil() as u64
}

/// Cents to points, rounding down so fractional points are never awarded.
pub fn cents_to_points(cents: u64, points_per_dollar: f64) -> u64 {
    (cents as f64 * points_per_dollar / 100.0).floor() as u64
}
