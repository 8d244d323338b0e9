//! Tool registry: named, schema-validated operations callable over MCP.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::BiolinkMcpError;

pub(crate) mod biolink;
pub mod schema;

pub use schema::{JsonObject, ParamDef, ParamSchema, ParamType, ToolArguments};

#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: ToolArguments) -> Result<Value, BiolinkMcpError>;
}

#[async_trait::async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(ToolArguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BiolinkMcpError>> + Send + 'static,
{
    async fn call(&self, args: ToolArguments) -> Result<Value, BiolinkMcpError> {
        (self)(args).await
    }
}

/// Discovery metadata for one tool. Immutable once registered.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: ParamSchema,
}

impl ToolDefinition {
    pub fn to_mcp_tool(&self) -> rmcp::model::Tool {
        rmcp::model::Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.schema.to_json_schema()),
        )
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Registration-ordered set of tools, read-only once serving starts.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.index.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParamSchema,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), BiolinkMcpError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BiolinkMcpError::Config("Tool name cannot be empty".into()));
        }
        if self.index.contains_key(&name) {
            return Err(BiolinkMcpError::Config(format!(
                "Tool '{name}' is already registered"
            )));
        }

        self.index.insert(name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            definition: ToolDefinition {
                name,
                description: description.into(),
                schema,
            },
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i].definition)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| &t.definition)
    }

    pub fn list_tools(&self) -> Vec<rmcp::model::Tool> {
        self.definitions().map(ToolDefinition::to_mcp_tool).collect()
    }

    /// Validates `arguments` against the tool's schema, then runs its handler.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> Result<Value, BiolinkMcpError> {
        let tool = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| BiolinkMcpError::UnknownTool(name.to_string()))?;

        let args = tool.definition.schema.validate(arguments)?;
        info!(tool = name, "Invoking tool");
        let start = Instant::now();
        let result = tool.handler.call(args).await;
        debug!(
            tool = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Tool finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    async fn echo(args: ToolArguments) -> Result<Value, BiolinkMcpError> {
        Ok(json!({ "id": args.str("entity_id")?, "limit": args.integer("limit")? }))
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "echo",
                "Echo the identifier back",
                ParamSchema::new()
                    .param(ParamDef::identifier("entity_id", "CURIE").required())
                    .param(ParamDef::integer("limit", "rows").with_default(20)),
                echo,
            )
            .expect("register echo");
        registry
            .register(
                "offline",
                "Always unreachable",
                ParamSchema::new(),
                |_args: ToolArguments| async {
                    Err::<Value, _>(BiolinkMcpError::Network("connection refused".into()))
                },
            )
            .expect("register offline");
        registry
    }

    fn object(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn register_rejects_empty_and_duplicate_names() {
        let mut registry = registry();
        let dup = registry.register("echo", "again", ParamSchema::new(), echo);
        assert!(matches!(dup, Err(BiolinkMcpError::Config(_))));

        let empty = registry.register("  ", "blank", ParamSchema::new(), echo);
        assert!(matches!(empty, Err(BiolinkMcpError::Config(_))));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn listing_is_ordered_and_stable() {
        let registry = registry();
        let first: Vec<String> = registry
            .list_tools()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        let second: Vec<String> = registry
            .list_tools()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();

        assert_eq!(first, vec!["echo", "offline"]);
        assert_eq!(first, second);
        assert_eq!(
            registry.list_tools()[0].input_schema.get("required"),
            Some(&json!(["entity_id"]))
        );
    }

    #[tokio::test]
    async fn invoke_applies_defaults_and_dispatches() {
        let registry = registry();
        let out = registry
            .invoke("echo", Some(&object(json!({ "entity_id": "HGNC:11998" }))))
            .await
            .expect("echo");

        assert_eq!(out, json!({ "id": "HGNC:11998", "limit": 20 }));
    }

    #[tokio::test]
    async fn invoke_rejects_unknown_tool_and_bad_arguments() {
        let registry = registry();

        let unknown = registry.invoke("nope", None).await.expect_err("unknown");
        assert_eq!(unknown.kind(), ErrorKind::Validation);

        let missing = registry.invoke("echo", None).await.expect_err("missing");
        assert_eq!(missing.kind(), ErrorKind::Validation);

        let empty = registry
            .invoke("echo", Some(&object(json!({ "entity_id": "" }))))
            .await
            .expect_err("empty");
        assert_eq!(empty.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn upstream_failure_does_not_poison_registry() {
        let registry = registry();

        let err = registry.invoke("offline", None).await.expect_err("offline");
        assert_eq!(err.kind(), ErrorKind::Network);

        let out = registry
            .invoke("echo", Some(&object(json!({ "entity_id": "X:1" }))))
            .await
            .expect("still serving");
        assert_eq!(out["id"], "X:1");
    }
}
