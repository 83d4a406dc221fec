//! # loommcp-core
//!
//! The request fabric of loommcp: monotonic request-ID minting and pending
//! request correlation, per-request deadlines on a monotonic clock,
//! cooperative cancellation of inbound requests, and the role-typed
//! [`SessionCore`] that binds a transport to handler tables and dispatches
//! inbound messages in arrival order.
//!
//! `loommcp-client` and `loommcp-server` layer the MCP feature sub-systems
//! (registries, tasks, sampling, elicitation, roots) on top of this crate.

#![warn(missing_docs)]

pub mod cancellation;
pub mod context;
pub mod session;
pub mod timeout;
pub mod tracker;

pub use cancellation::CancellationManager;
pub use context::{PeerHandle, PeerLink, RequestContext};
pub use session::{
    ClientRole, NotificationHandlerFn, PeerInfo, RequestHandlerFn, RequestOptions, Role,
    ServerRole, SessionConfig, SessionCore, WeakSession,
};
pub use timeout::TimeoutManager;
pub use tracker::{
    ErrCallback, OkCallback, PendingRequest, ProgressObserver, RequestTracker,
};
