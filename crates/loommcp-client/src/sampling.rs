//! Sampling orchestration: the bounded agentic tool-use loop.
//!
//! When a `sampling/createMessage` request declares tools, the handler's
//! completions may request tool invocations. The loop below threads each
//! tool use through a synchronous `tools/call` round-trip on the peer,
//! appends the tool result to the conversation, and samples again, bounded
//! by an iteration cap and an overall deadline. Either bound tripping
//! surfaces a dedicated overflow error to the caller.

use std::sync::Arc;
use std::time::Duration;

use loommcp_core::PeerHandle;
use loommcp_protocol::methods;
use loommcp_protocol::types::{
    CallToolParams, CallToolResult, ContentBlock, CreateMessageParams, CreateMessageResult,
    SamplingMessage, ToolResultContent, ToolUseContent,
};
use loommcp_protocol::{Error, Result};
use tracing::{debug, warn};

use crate::handlers::SamplingHandler;

/// Bounds on the tool-use loop
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Maximum handler invocations per request
    pub max_iterations: usize,
    /// Deadline for the whole loop, across all iterations
    pub overall_timeout: Duration,
    /// Deadline for each `tools/call` round-trip
    pub tool_call_timeout: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            overall_timeout: Duration::from_secs(300),
            tool_call_timeout: Duration::from_secs(60),
        }
    }
}

/// Service one inbound `sampling/createMessage` request
///
/// Without declared tools this is a single handler invocation. With tools,
/// the loop runs until the handler stops requesting tool use, the iteration
/// cap is hit, or the overall deadline fires.
///
/// # Errors
///
/// Propagates handler errors; both bound violations surface as
/// [`Error::SamplingLoopOverflow`].
pub async fn run_sampling(
    handler: Arc<dyn SamplingHandler>,
    params: CreateMessageParams,
    peer: PeerHandle,
    config: SamplingConfig,
) -> Result<CreateMessageResult> {
    let has_tools = params
        .tools
        .as_ref()
        .map(|tools| !tools.is_empty())
        .unwrap_or(false);

    if !has_tools {
        return handler.create_message(params).await;
    }

    let max_iterations = config.max_iterations;
    tokio::time::timeout(
        config.overall_timeout,
        tool_use_loop(handler, params, peer, config),
    )
    .await
    .unwrap_or(Err(Error::SamplingLoopOverflow {
        iterations: max_iterations,
    }))
}

async fn tool_use_loop(
    handler: Arc<dyn SamplingHandler>,
    mut params: CreateMessageParams,
    peer: PeerHandle,
    config: SamplingConfig,
) -> Result<CreateMessageResult> {
    for iteration in 0..config.max_iterations {
        let result = handler.create_message(params.clone()).await?;

        let tool_uses: Vec<ToolUseContent> =
            result.tool_uses().into_iter().cloned().collect();
        if !result.wants_tool_use() {
            debug!(iteration, "sampling settled without tool use");
            return Ok(result);
        }
        if tool_uses.is_empty() {
            // The handler said it wants tools but requested none; there is
            // nothing to feed back, so settle with what it returned.
            warn!(iteration, "toolUse stop reason without tool_use content");
            return Ok(result);
        }

        for tool_use in tool_uses {
            params.messages.push(SamplingMessage::assistant(
                ContentBlock::ToolUse(tool_use.clone()),
            ));
            let tool_result = call_tool(&peer, &tool_use, config.tool_call_timeout).await;
            params
                .messages
                .push(SamplingMessage::user(ContentBlock::ToolResult(tool_result)));
        }
    }

    Err(Error::SamplingLoopOverflow {
        iterations: config.max_iterations,
    })
}

/// One synchronous `tools/call` round-trip on the peer
///
/// Failures become error-flagged tool results rather than aborting the
/// loop; the model sees the failure and decides what to do with it.
async fn call_tool(
    peer: &PeerHandle,
    tool_use: &ToolUseContent,
    timeout: Duration,
) -> ToolResultContent {
    let params = CallToolParams {
        name: tool_use.name.clone(),
        arguments: Some(tool_use.input.clone()),
    };
    let outcome = async {
        let value = peer
            .request(
                methods::TOOLS_CALL,
                Some(serde_json::to_value(&params)?),
                Some(timeout),
            )
            .await?;
        serde_json::from_value::<CallToolResult>(value).map_err(Error::from)
    }
    .await;

    match outcome {
        Ok(result) => ToolResultContent {
            tool_use_id: tool_use.id.clone(),
            content: result.content,
            is_error: result.is_error,
        },
        Err(err) => {
            warn!(tool = %tool_use.name, "tool round-trip failed: {err}");
            ToolResultContent {
                tool_use_id: tool_use.id.clone(),
                content: vec![ContentBlock::text(format!(
                    "tool call failed: {err}"
                ))],
                is_error: true,
            }
        }
    }
}
