//! Model-driven action execution.
//!
//! The model receives the action and the HTML part it lives in, answers
//! with tool calls, and sees each call's result before deciding whether
//! the action is complete. The operations that actually applied are kept
//! so the action can be replayed without the model.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use web_explorer::{Action, Execution, ExplorerError, ExplorerResult, Operation};

use crate::context::RunContext;
use crate::dom::{self, Outcome};
use crate::error::into_explorer;
use crate::html;
use crate::model::{tool_arguments, ChatMessage, ToolCall};
use crate::prompts::{EXECUTE_ACTION, VERIFY_ACTION};

pub const CLICK_ELEMENT: &str = "click_element";
pub const FILL_TEXT_INPUT: &str = "fill_text_input";
pub const SELECT_OPTION: &str = "select_option";

#[derive(Deserialize)]
struct ClickArgs {
    selector: String,
}

#[derive(Deserialize)]
struct FillArgs {
    selector: String,
    text: String,
}

#[derive(Deserialize)]
struct SelectArgs {
    selector: String,
    value: String,
}

/// Turn one tool call into the operation it asks for.
pub fn operation_for(call: &ToolCall) -> Result<Operation> {
    let message = ChatMessage {
        role: "assistant".to_string(),
        content: None,
        tool_calls: vec![call.clone()],
        tool_call_id: None,
    };
    let op = match call.function.name.as_str() {
        CLICK_ELEMENT => {
            let args: ClickArgs = tool_arguments(&message, CLICK_ELEMENT)?;
            Operation::click(args.selector)
        }
        FILL_TEXT_INPUT => {
            let args: FillArgs = tool_arguments(&message, FILL_TEXT_INPUT)?;
            Operation::fill(args.selector, args.text)
        }
        SELECT_OPTION => {
            let args: SelectArgs = tool_arguments(&message, SELECT_OPTION)?;
            Operation::select(args.selector, args.value)
        }
        other => anyhow::bail!("unknown function {other}"),
    };
    Ok(op)
}

/// [`web_explorer::Executor`] backed by the model and the shared browser tab.
pub struct LlmExecutor {
    ctx: RunContext,
}

impl LlmExecutor {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    async fn run(&mut self, action: &Action) -> Result<Execution> {
        let config = &self.ctx.config;
        tracing::info!(action = %action.description, "executing action");

        let before = html::page_html(&self.ctx.session).await?;
        let parts = html::split_parts(&before, config.html_part_length);
        let Some(part) = parts.get(action.part) else {
            tracing::warn!(
                part = action.part,
                parts = parts.len(),
                "action part no longer exists on the page"
            );
            return Ok(Execution::failed());
        };

        let prompt = self.ctx.prompts.get(EXECUTE_ACTION)?;
        let verify = self.ctx.prompts.get(VERIFY_ACTION)?;
        let mut messages = vec![ChatMessage::user(
            prompt.render(&[("action", action.description.as_str()), ("html", part.as_str())]),
        )];
        let mut operations = Vec::new();

        for round in 1..=config.action_max_tries {
            let reply = self.ctx.model.chat(prompt, &messages).await?;
            messages.push(reply.clone());

            if reply.tool_calls.is_empty() {
                if reply.says("success") {
                    tracing::info!(round, "model reports the action complete");
                } else if reply.says("failure") {
                    tracing::info!(round, "model reports the action impossible");
                } else {
                    tracing::warn!(round, "model answered without tool calls or verdict");
                }
                break;
            }

            for call in &reply.tool_calls {
                let outcome = match operation_for(call) {
                    Ok(op) => {
                        let outcome =
                            dom::apply(&self.ctx.session, &op, config.browser_timeout_ms).await?;
                        if outcome == Outcome::Applied {
                            operations.push(op);
                            tokio::time::sleep(config.action_sleep).await;
                        }
                        outcome
                    }
                    Err(e) => Outcome::Failed(format!("{e:#}")),
                };
                if outcome != Outcome::Applied {
                    tracing::warn!(tool = %call.function.name, outcome = ?outcome, "tool call failed");
                }
                messages.push(ChatMessage::tool_result(&call.id, outcome.tool_message()));
            }
            messages.push(ChatMessage::user(verify.template.clone()));
        }

        let after = html::page_html(&self.ctx.session).await?;
        let changed = after != before;
        if changed && operations.is_empty() {
            tracing::warn!("page changed but no operation applied, not replayable");
        }
        let success = changed && !operations.is_empty();
        tracing::info!(success, operations = operations.len(), "action finished");
        Ok(Execution {
            success,
            operations,
        })
    }

    async fn reapply(&mut self, operations: &[Operation]) -> Result<()> {
        let config = &self.ctx.config;
        for (i, op) in operations.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(config.action_sleep).await;
            }
            match dom::apply(&self.ctx.session, op, config.browser_timeout_ms).await? {
                Outcome::Applied => {}
                outcome => {
                    return Err(ExplorerError::Replay(format!(
                        "{} on '{}': {}",
                        op.kind,
                        op.selector,
                        outcome.tool_message()
                    ))
                    .into())
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl web_explorer::Executor for LlmExecutor {
    async fn execute(&mut self, action: &Action) -> ExplorerResult<Execution> {
        self.run(action).await.map_err(into_explorer)
    }

    async fn replay(&mut self, operations: &[Operation]) -> ExplorerResult<()> {
        self.reapply(operations).await.map_err(into_explorer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FunctionCall;
    use web_explorer::OperationKind;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            kind: "function".into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    #[test]
    fn test_tool_calls_map_to_operations() {
        let op = operation_for(&call(CLICK_ELEMENT, r##"{"selector":"#buy"}"##)).unwrap();
        assert_eq!(op, Operation::click("#buy"));

        let op = operation_for(&call(FILL_TEXT_INPUT, r##"{"selector":"#q","text":"shoes"}"##)).unwrap();
        assert_eq!(op.kind, OperationKind::Fill);
        assert_eq!(op.value.as_deref(), Some("shoes"));

        let op = operation_for(&call(SELECT_OPTION, r##"{"selector":"#size","value":"42"}"##)).unwrap();
        assert_eq!(op, Operation::select("#size", "42"));
    }

    #[test]
    fn test_bad_tool_calls_are_errors() {
        assert!(operation_for(&call("hover_element", r#"{"selector":"a"}"#)).is_err());
        assert!(operation_for(&call(FILL_TEXT_INPUT, r##"{"selector":"#q"}"##)).is_err());
        assert!(operation_for(&call(CLICK_ELEMENT, "not json")).is_err());
    }
}
