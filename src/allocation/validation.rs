use super::config::{AllocationConfig, AllocationRequest};
use super::error::AllocationError;

/// Validate allocation settings.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &AllocationConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if !config.points_per_dollar.is_finite() || config.points_per_dollar <= 0.0 {
        errors.push(format!(
            "points_per_dollar: must be a positive number, got {}",
            config.points_per_dollar
        ));
    }

    if config.max_weekly_budget_cents < 0 {
        errors.push(format!(
            "max_weekly_budget: must be non-negative, got {} cents",
            config.max_weekly_budget_cents
        ));
    }

    if config.program_length_weeks <= 0 {
        errors.push(format!(
            "program_length_weeks: must be at least 1, got {}",
            config.program_length_weeks
        ));
    }

    if config.total_budget_cents < 0 {
        errors.push(format!(
            "total_budget: must be non-negative, got {} cents",
            config.total_budget_cents
        ));
    }

    let curve = &config.scale_curve;
    if !curve.min_factor.is_finite() || curve.min_factor <= 0.0 {
        errors.push(format!(
            "scale_curve.min_factor: must be a positive number, got {}",
            curve.min_factor
        ));
    }
    if !curve.max_factor.is_finite() || curve.max_factor < curve.min_factor {
        errors.push(format!(
            "scale_curve.max_factor: must be at least min_factor ({}), got {}",
            curve.min_factor, curve.max_factor
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_request(request: &AllocationRequest) -> Result<(), AllocationError> {
    if request.current_week_index < 1 {
        return Err(AllocationError::InvalidRequest(
            "current_week_index: must be at least 1".to_string(),
        ));
    }
    Ok(())
}
