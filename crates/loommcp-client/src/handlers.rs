//! Handler traits the application implements to service server-initiated
//! requests.
//!
//! A client without a given handler answers the corresponding request with
//! a method-not-found error; installing a handler is what turns the feature
//! on at dispatch time (advertising it in capabilities is what turns it on
//! at the protocol level).

use async_trait::async_trait;
use loommcp_protocol::Result;
use loommcp_protocol::types::{
    CreateMessageParams, CreateMessageResult, ElicitResult, FormElicitParams, UrlElicitParams,
};

/// Services `sampling/createMessage` by calling an LLM
///
/// The library never talks to a model provider itself; this trait is the
/// seam where one plugs in. Tool-use iteration happens outside the handler:
/// each call receives the conversation so far and returns one completion.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    /// Produce one completion for the given conversation
    async fn create_message(&self, params: CreateMessageParams) -> Result<CreateMessageResult>;
}

/// Services form-mode `elicitation/create` by collecting user input
#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    /// Render the form and return the user's action synchronously
    async fn elicit(&self, params: FormElicitParams) -> Result<ElicitResult>;
}

/// Services URL-mode `elicitation/create`
///
/// `open_url` returns as soon as the URL has been surfaced to the user; the
/// request is answered `pending` and the terminal result arrives later
/// through `on_complete` when the peer sends
/// `notifications/elicitation/complete`.
#[async_trait]
pub trait UrlElicitationHandler: Send + Sync {
    /// Surface the URL to the user (open a browser, print a link)
    async fn open_url(&self, params: UrlElicitParams) -> Result<()>;

    /// Receive the terminal result of the out-of-band flow
    async fn on_complete(&self, elicitation_id: &str, result: ElicitResult);
}
