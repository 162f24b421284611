pub mod formatter;

pub use formatter::{
    format_config, format_money, format_outcome, format_points, format_tsv, format_user_summary,
    format_week_summary, should_use_colors,
};
