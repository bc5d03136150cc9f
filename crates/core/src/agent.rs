//! Conversation Agent
//!
//! Produces the assistant's reply for one transcript. The agent may call
//! tools before answering; a failing tool is reported back to the model as
//! a JSON error result instead of aborting the turn.

use crate::{
    llm_client::{LLMAction, LLMClient, LLMStreamEvent},
    tools::ToolInvoker,
    turn::Exchange,
};
use anyhow::{Result, bail};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How many rounds of tool calls the model may request before it is asked
/// for a final, tool-less answer.
pub const MAX_TOOL_ROUNDS: usize = 4;

#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// Returns the reply to `transcript`, given the prior exchanges of the session.
    async fn respond(&self, transcript: &str, history: &[Exchange]) -> Result<String>;
}

pub struct ToolCallingAgent {
    llm: Arc<dyn LLMClient>,
    tools: Arc<dyn ToolInvoker>,
    system_prompt: String,
}

impl ToolCallingAgent {
    pub fn new(llm: Arc<dyn LLMClient>, tools: Arc<dyn ToolInvoker>, system_prompt: String) -> Self {
        Self {
            llm,
            tools,
            system_prompt,
        }
    }

    fn build_messages(
        &self,
        transcript: &str,
        history: &[Exchange],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()?
                .into(),
        ];
        for exchange in history {
            if !exchange.user_transcript.is_empty() {
                messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(exchange.user_transcript.clone())
                        .build()?
                        .into(),
                );
            }
            if !exchange.ai_response.is_empty() {
                messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(exchange.ai_response.clone())
                        .build()?
                        .into(),
                );
            }
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(transcript.to_string())
                .build()?
                .into(),
        );
        debug!(messages = messages.len(), "Built agent prompt");
        Ok(messages)
    }
}

fn non_empty(reply: String) -> Result<String> {
    let reply = reply.trim().to_string();
    if reply.is_empty() {
        bail!("Agent returned an empty reply");
    }
    Ok(reply)
}

#[async_trait]
impl ConversationAgent for ToolCallingAgent {
    async fn respond(&self, transcript: &str, history: &[Exchange]) -> Result<String> {
        let mut messages = self.build_messages(transcript, history)?;

        let tools = match self.tools.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Tools unavailable; answering without them");
                vec![]
            }
        };

        for round in 1..=MAX_TOOL_ROUNDS {
            let tool_calls = match self.llm.decide_action(messages.clone(), tools.clone()).await? {
                LLMAction::TextResponse(text) => return non_empty(text),
                LLMAction::ToolCall(tool_calls) => tool_calls,
            };
            info!(round, calls = tool_calls.len(), "Agent requested tools");

            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for call in &tool_calls {
                let result = match self
                    .tools
                    .invoke(&call.function.name, &call.function.arguments)
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(tool = %call.function.name, error = %e, "Tool call failed; reporting to agent");
                        serde_json::json!({ "error": e.to_string() }).to_string()
                    }
                };
                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }
        }

        info!("Tool round limit reached; requesting final answer");
        let mut stream = self.llm.stream_after_tools(messages).await?;
        let mut reply = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                LLMStreamEvent::TextChunk(chunk) => reply.push_str(&chunk),
            }
        }
        non_empty(reply)
    }
}
