// src/pipeline/mod.rs
//! External collaborator seams
//!
//! The engine consults two collaborators while routing events, both modeled
//! as traits so deployments can plug in their own logic:
//!
//! - **ContentPipeline**: pure per-field transforms applied at five
//!   injection points as request/response text passes through
//! - **ProxyReconciler**: bypass allow-list plus the hook for system-proxy
//!   reconciliation on new exchanges
//!
//! Both are synchronous and total from the router's point of view; all
//! concurrency stays on the engine side of the seam.

pub mod content;
pub mod proxy;

// Re-export commonly used types
pub use content::{ContentPipeline, InjectionPoint, PassthroughPipeline, TransformContext};
pub use proxy::{AllowListReconciler, ProxyReconciler, RequestContext};
