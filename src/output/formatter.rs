use chrono::{Duration, NaiveDate};
use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::allocation::{AllocationConfig, AllocationOutcome};
use crate::ledger::{AllocationRecord, UserSummary, WeekSummary};
use crate::program::week_start;
use crate::settings::schema::format_dollars;

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format cents as dollars: "$5", "$12.40"
pub fn format_money(cents: u64) -> String {
    format!("${}", format_dollars(i64::try_from(cents).unwrap_or(i64::MAX)))
}

/// Format a points total in compact notation (1.5k, 2.3M, 847)
pub fn format_points(points: u64) -> String {
    let points = points as f64;
    let formatted = if points >= 1_000_000.0 {
        format!("{:.1}M", points / 1_000_000.0)
    } else if points >= 1_000.0 {
        format!("{:.1}k", points / 1_000.0)
    } else {
        format!("{:.0}", points)
    };

    // Trim trailing .0 (e.g., "1.0k" -> "1k")
    formatted.replace(".0M", "M").replace(".0k", "k")
}

/// Multi-line description of a priced completion (for `allocate`)
pub fn format_outcome(outcome: &AllocationOutcome, use_colors: bool) -> String {
    let mut lines = Vec::new();

    let points = outcome.result.points_awarded.to_string();
    if use_colors {
        lines.push(format!("Points: {}", points.bold()));
    } else {
        lines.push(format!("Points: {}", points));
    }
    lines.push(format!("  Cost: {}", format_money(outcome.result.cost_cents)));
    lines.push(format!("  Method: {}", outcome.method));
    lines.push(format!("  Base points: {}", outcome.base_points));
    if let Some(scale) = outcome.scale_factor {
        lines.push(format!(
            "  Scale: x{:.3} ({} requested)",
            scale, outcome.requested_points
        ));
    }
    if outcome.capped {
        let note = "  Capped by weekly budget";
        if use_colors {
            lines.push(note.yellow().to_string());
        } else {
            lines.push(note.to_string());
        }
    }
    lines.push(format!(
        "  Week usage after: {}",
        format_money(outcome.result.weekly_budget_used_cents_after)
    ));

    lines.join("\n")
}

/// Budget overview for one week. Usage above 80% of the cap is red.
/// With a program start date the header carries the week's dates.
pub fn format_week_summary(
    summary: &WeekSummary,
    program_start: Option<NaiveDate>,
    use_colors: bool,
) -> String {
    let percent = format!("{:.0}% used", summary.percent_used());
    let percent = if !use_colors {
        percent
    } else if summary.near_cap() {
        percent.red().to_string()
    } else {
        percent.green().to_string()
    };

    let header = match program_start {
        Some(start) => {
            let first = week_start(start, summary.week);
            let last = first + Duration::days(6);
            format!("Week {} ({} to {})", summary.week, first, last)
        }
        None => format!("Week {}", summary.week),
    };
    let header = if use_colors {
        header.bold().to_string()
    } else {
        header
    };

    format!(
        "{}\n  Spent: {} / {} ({})\n  Remaining: {}\n  Allocations: {} ({} points)",
        header,
        format_money(summary.cost_cents),
        format_money(summary.cap_cents),
        percent,
        format_money(summary.remaining_cents()),
        summary.allocations,
        format_points(summary.points_awarded),
    )
}

/// Points balance of one participant
pub fn format_user_summary(summary: &UserSummary, use_colors: bool) -> String {
    let user = if use_colors {
        summary.user_id.bold().to_string()
    } else {
        summary.user_id.clone()
    };
    format!(
        "{}: {} points from {} allocations ({})",
        user,
        summary.points_awarded,
        summary.allocations,
        format_money(summary.cost_cents)
    )
}

/// Current allocation settings, one per line
pub fn format_config(config: &AllocationConfig, use_colors: bool) -> String {
    let mode = if config.auto_allocate { "auto" } else { "manual" };
    let mode = if use_colors {
        mode.cyan().to_string()
    } else {
        mode.to_string()
    };

    format!(
        "Allocation: {}\n  Total budget: ${}\n  Weekly budget: ${}\n  Program length: {} weeks\n  Expected users per week: {}\n  Points per dollar: {}\n  Auto scale: x{} to x{}",
        mode,
        format_dollars(config.total_budget_cents),
        format_dollars(config.max_weekly_budget_cents),
        config.program_length_weeks,
        config.expected_users_per_week,
        config.points_per_dollar,
        config.scale_curve.min_factor,
        config.scale_curve.max_factor,
    )
}

/// Format records as tab-separated values for scripting
/// Columns: recorded_at, week, user, task, category, difficulty, method,
/// points, cost_cents (no headers, no colors)
pub fn format_tsv(records: &[AllocationRecord]) -> String {
    records
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                r.recorded_at.to_rfc3339(),
                r.week_index,
                r.user_id,
                r.task_id,
                r.category,
                r.difficulty,
                r.method,
                r.points_awarded,
                r.cost_cents
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
