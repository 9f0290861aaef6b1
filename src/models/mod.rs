//! # Models
//!
//! Data types flowing between the deploy checker and its collaborators.
//! Everything here is plain data; persistence lives behind the store and
//! registry traits.

pub mod deploy;
pub mod load_balancer;
pub mod request;
pub mod task;

pub use deploy::{
    CancelMarker, Deploy, DeployKey, DeployMarker, DeployResult, DeployState, PendingDeploy,
    VersionedDeployState,
};
pub use load_balancer::{LoadBalancerRequest, LoadBalancerResponse, LoadBalancerState};
pub use request::{Request, RequestType};
pub use task::{Task, TaskCleanup, TaskCleanupType, TaskId};
