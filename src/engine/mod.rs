//! Pure computation: cost-basis folding, risk screening, dashboard projection.

pub mod cost_basis;
pub mod projector;
pub mod risk;

pub use cost_basis::{replay, Aggregates, LedgerError};
pub use projector::{is_projectable, project, DashboardView, ProjectError, RiskLevel};
pub use risk::{RiskAssessment, RiskError, RiskGuard, RiskVerdict};
