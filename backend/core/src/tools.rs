use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::ToolcastError;
use crate::messages::{user_message, UserMessage};
use crate::traits::Tool;
use crate::types::{ToolContext, ToolDeclaration, ToolInvocation, ToolResult};

/// Name → tool map, built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolcastError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolcastError::DuplicateTool(name));
        }
        debug!(tool = %name, "Tool registered");
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Declarations of all registered tools, sorted by name.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut decls: Vec<ToolDeclaration> = self
            .tools
            .values()
            .map(|t| t.declaration().clone())
            .collect();
        decls.sort_by(|a, b| a.name.cmp(&b.name));
        decls
    }

    pub async fn invoke_call(&self, call: &ToolInvocation, ctx: &ToolContext) -> ToolResult {
        self.invoke(&call.name, &call.arguments, ctx).await
    }

    /// Execute a tool by name. Never panics and never returns an error:
    /// every failure is folded into `ToolResult { success: false, .. }` so
    /// the rest of the batch keeps running.
    pub async fn invoke(&self, name: &str, args: &Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, chat_id = %ctx.chat_id, "Unknown tool requested");
            return ToolResult::fail(user_message(UserMessage::UnknownTool, &ctx.language));
        };

        let args = match validate_args(tool.declaration(), args) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool arguments rejected");
                let kind = match &e {
                    ToolcastError::InvalidArguments { message, .. }
                        if message.starts_with("missing") =>
                    {
                        UserMessage::MissingArguments
                    }
                    _ => UserMessage::InvalidArguments,
                };
                return ToolResult::fail(user_message(kind, &ctx.language));
            }
        };

        if ctx.is_cancelled() {
            info!(tool = %name, "Skipping tool, request cancelled");
            return ToolResult::fail(user_message(UserMessage::Cancelled, &ctx.language));
        }

        info!(tool = %name, chat_id = %ctx.chat_id, "Executing tool");
        let outcome = AssertUnwindSafe(tool.execute(args, ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                debug!(tool = %name, success = result.success, "Tool finished");
                result
            }
            Ok(Err(e)) => {
                error!(tool = %name, error = %format!("{e:#}"), "Tool failed");
                ToolResult::fail(user_message(UserMessage::ToolFailed, &ctx.language))
            }
            Err(panic) => {
                error!(tool = %name, panic = %panic_message(&panic), "Tool panicked");
                ToolResult::fail(user_message(UserMessage::ToolFailed, &ctx.language))
            }
        }
    }
}

/// Check arguments against the declaration: must be an object (or absent)
/// and carry every required parameter with a non-null value.
pub fn validate_args<'a>(
    decl: &ToolDeclaration,
    args: &'a Value,
) -> Result<&'a Map<String, Value>, ToolcastError> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();

    let map = match args {
        Value::Object(map) => map,
        Value::Null => EMPTY.get_or_init(Map::new),
        other => {
            return Err(ToolcastError::InvalidArguments {
                tool: decl.name.clone(),
                message: format!("expected an object, got {}", json_type(other)),
            })
        }
    };

    let missing: Vec<&str> = decl
        .required_params()
        .filter(|p| map.get(*p).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(ToolcastError::InvalidArguments {
            tool: decl.name.clone(),
            message: format!("missing required arguments: {}", missing.join(", ")),
        });
    }

    Ok(map)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
