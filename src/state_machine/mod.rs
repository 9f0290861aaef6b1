//! # Deploy State Machine
//!
//! Decision kinds produced for a pending deploy and the pure guards the
//! checker evaluates to reach them. Side effects live in
//! [`crate::orchestration`]; nothing here touches a collaborator.

pub mod guards;
pub mod states;

pub use guards::{find_cancel, format_hms, settled_load_balancer_result, DeployTimeBudget};
pub use states::DeployCheckResult;
