//! Tool Invocation
//!
//! The agent can call out to a fixed set of data tools while it reasons.
//! Tools are served in-process by an MCP tool server ([`RelayToolService`])
//! and reached through an MCP client ([`McpToolInvoker`]). A failing tool is
//! never fatal to a turn: the failure is handed back to the agent as data.

pub mod news;
pub mod service;
pub mod weather;

pub use service::RelayToolService;

use async_openai::types::{ChatCompletionTool, ChatCompletionToolArgs, FunctionObjectArgs};
use async_trait::async_trait;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A typed failure from a single tool call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("The {0} service is not configured.")]
    NotConfigured(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("Could not process response: {0}")]
    InvalidResponse(String),
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Tool call failed: {0}")]
    Failed(String),
}

/// The capability the agent uses to discover and call tools.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Describes every available tool in chat-completions form.
    async fn list_tools(&self) -> Result<Vec<ChatCompletionTool>, ToolError>;

    /// Calls one tool with JSON-encoded arguments and returns its text result.
    async fn invoke(&self, name: &str, arguments: &str) -> Result<String, ToolError>;
}

/// A `ToolInvoker` that talks to a [`RelayToolService`] over an in-process
/// duplex transport.
pub struct McpToolInvoker {
    client: RunningService<RoleClient, ()>,
    server: JoinHandle<()>,
}

impl McpToolInvoker {
    /// Spawns the tool server and connects a client to it.
    pub async fn start(service: RelayToolService) -> anyhow::Result<Self> {
        let (server_transport, client_transport) = tokio::io::duplex(4096);

        let server = tokio::spawn(async move {
            match service.serve(server_transport).await {
                Ok(running) => {
                    let _ = running.waiting().await;
                }
                Err(e) => warn!(error = ?e, "Tool server failed to start"),
            }
        });
        let client = ().serve(client_transport).await?;
        info!("Tool server started.");

        Ok(Self { client, server })
    }
}

impl Drop for McpToolInvoker {
    fn drop(&mut self) {
        self.server.abort();
    }
}

#[async_trait]
impl ToolInvoker for McpToolInvoker {
    async fn list_tools(&self) -> Result<Vec<ChatCompletionTool>, ToolError> {
        let tools = self
            .client
            .list_all_tools()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        tools
            .into_iter()
            .map(|t| {
                let parameters = serde_json::to_value(&*t.input_schema)
                    .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;
                let function = FunctionObjectArgs::default()
                    .name(t.name)
                    .description(t.description.unwrap_or_default())
                    .parameters(parameters)
                    .build()
                    .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;
                ChatCompletionToolArgs::default()
                    .function(function)
                    .build()
                    .map_err(|e| ToolError::InvalidResponse(e.to_string()))
            })
            .collect()
    }

    async fn invoke(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let arguments: serde_json::Map<String, serde_json::Value> = if arguments.trim().is_empty()
        {
            serde_json::Map::new()
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?
        };

        info!(tool = %name, "Calling tool");
        let result = self
            .client
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let text = result
            .content
            .unwrap_or_default()
            .into_iter()
            .filter_map(|content| match content.raw {
                RawContent::Text(text_content) => Some(text_content.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error.unwrap_or(false) {
            warn!(tool = %name, error = %text, "Tool reported a failure");
            return Err(ToolError::Failed(text));
        }
        Ok(text)
    }
}
