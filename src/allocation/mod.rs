pub mod config;
pub mod engine;
pub mod error;
pub mod task;
pub mod validation;

pub use config::*;
pub use engine::{
    allocate, allocate_detailed, cents_to_points, points_to_cents, scale_factor,
    weekly_headroom_cents, AllocationMethod, AllocationOutcome,
};
pub use error::AllocationError;
pub use task::{base_points, reference_weekly_points, Difficulty, TaskCategory};
pub use validation::{validate_config, validate_request};
