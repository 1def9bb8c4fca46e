//! Lifecycle orchestration over the repository and the pure engines.

pub mod locks;
pub mod plans;

pub use plans::{AddFill, CloseFill, CreatePlan, ExecuteFill, PlanService, TrimFill};
