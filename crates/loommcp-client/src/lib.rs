//! # loommcp-client
//!
//! The client role of loommcp: the initialize handshake with exact protocol
//! version matching, typed convenience operations over the server's tool,
//! resource, and prompt surfaces (with page-walking helpers), a client-side
//! root set served to `roots/list`, the sampling orchestrator with its
//! bounded agentic tool-use loop, and the elicitation orchestrator covering
//! both form and URL modes.

#![warn(missing_docs)]

pub mod client;
pub mod elicitation;
pub mod handlers;
pub mod roots;
pub mod sampling;

pub use client::{Client, ClientBuilder};
pub use elicitation::{ElicitationContinuation, ElicitationRouter};
pub use handlers::{ElicitationHandler, SamplingHandler, UrlElicitationHandler};
pub use roots::{RootsChangedFn, RootsManager};
pub use sampling::SamplingConfig;
