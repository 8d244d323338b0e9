//! Typed parameter schemas and argument validation for registered tools.

use serde_json::{Map, Value, json};

use crate::error::BiolinkMcpError;

pub type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String {
        non_empty: bool,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Boolean,
    StringList,
}

impl ParamType {
    fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            ParamType::String { non_empty } => match value.as_str() {
                Some(s) if *non_empty && s.trim().is_empty() => Err("must not be empty".into()),
                Some(_) => Ok(()),
                None => Err(format!("expected string, got {}", value_type_name(value))),
            },
            ParamType::Integer { minimum, maximum } => {
                let Some(n) = value.as_i64() else {
                    return Err(format!("expected integer, got {}", value_type_name(value)));
                };
                if let Some(min) = minimum {
                    if n < *min {
                        return Err(format!("must be >= {min}, got {n}"));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return Err(format!("must be <= {max}, got {n}"));
                    }
                }
                Ok(())
            }
            ParamType::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("expected boolean, got {}", value_type_name(value)))
                }
            }
            ParamType::StringList => {
                let Some(items) = value.as_array() else {
                    return Err(format!("expected array, got {}", value_type_name(value)));
                };
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        return Err(format!(
                            "expected string at index {i}, got {}",
                            value_type_name(item)
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    fn json_schema(&self) -> JsonObject {
        let schema = match self {
            ParamType::String { non_empty: true } => json!({ "type": "string", "minLength": 1 }),
            ParamType::String { non_empty: false } => json!({ "type": "string" }),
            ParamType::Integer { minimum, maximum } => {
                let mut schema = json!({ "type": "integer" });
                if let Some(min) = minimum {
                    schema["minimum"] = json!(min);
                }
                if let Some(max) = maximum {
                    schema["maximum"] = json!(max);
                }
                schema
            }
            ParamType::Boolean => json!({ "type": "boolean" }),
            ParamType::StringList => json!({ "type": "array", "items": { "type": "string" } }),
        };
        match schema {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        }
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single named parameter of a tool.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamDef {
    fn new(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: false,
            default: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String { non_empty: false }, description)
    }

    /// A string that must contain something other than whitespace.
    pub fn identifier(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String { non_empty: true }, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(
            name,
            ParamType::Integer {
                minimum: None,
                maximum: None,
            },
            description,
        )
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn string_list(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::StringList, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.default = None;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    pub fn range(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        if let ParamType::Integer { .. } = self.param_type {
            self.param_type = ParamType::Integer { minimum, maximum };
        }
        self
    }

    fn property_schema(&self) -> JsonObject {
        let mut schema = self.param_type.json_schema();
        schema.insert("description".into(), self.description.clone().into());
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        schema
    }
}

/// Ordered parameter list for one tool.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    params: Vec<ParamDef>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, def: ParamDef) -> Self {
        self.params.push(def);
        self
    }

    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    /// Checks `arguments` and returns them with defaults filled in.
    ///
    /// Explicit `null` counts as omitted. Undeclared arguments are rejected.
    pub fn validate(
        &self,
        arguments: Option<&JsonObject>,
    ) -> Result<ToolArguments, BiolinkMcpError> {
        let empty = JsonObject::new();
        let arguments = arguments.unwrap_or(&empty);

        if let Some(unexpected) = arguments
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            return Err(BiolinkMcpError::Validation(format!(
                "unexpected argument '{unexpected}'"
            )));
        }

        let mut validated = JsonObject::new();
        for param in &self.params {
            match arguments.get(&param.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    param.param_type.validate(value).map_err(|reason| {
                        BiolinkMcpError::Validation(format!("'{}' {reason}", param.name))
                    })?;
                    validated.insert(param.name.clone(), value.clone());
                }
                None => {
                    if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(BiolinkMcpError::Validation(format!(
                            "missing required argument '{}'",
                            param.name
                        )));
                    }
                }
            }
        }

        Ok(ToolArguments(validated))
    }

    /// Renders the schema as a JSON Schema object for tool discovery.
    pub fn to_json_schema(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        for param in &self.params {
            properties.insert(param.name.clone(), Value::Object(param.property_schema()));
        }
        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::String(p.name.clone()))
            .collect();

        let mut schema = JsonObject::new();
        schema.insert("type".into(), "object".into());
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        schema.insert("additionalProperties".into(), false.into());
        schema
    }
}

/// Arguments that passed schema validation, defaults applied.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments(JsonObject);

impl ToolArguments {
    fn missing(name: &str) -> BiolinkMcpError {
        BiolinkMcpError::Validation(format!("missing required argument '{name}'"))
    }

    pub fn str(&self, name: &str) -> Result<&str, BiolinkMcpError> {
        self.opt_str(name).ok_or_else(|| Self::missing(name))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn integer(&self, name: &str) -> Result<i64, BiolinkMcpError> {
        self.opt_integer(name).ok_or_else(|| Self::missing(name))
    }

    pub fn opt_integer(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    /// Integer constrained to be non-negative by its schema.
    pub fn count(&self, name: &str) -> Result<u64, BiolinkMcpError> {
        let n = self.integer(name)?;
        u64::try_from(n)
            .map_err(|_| BiolinkMcpError::Validation(format!("'{name}' must be >= 0, got {n}")))
    }

    pub fn opt_count(&self, name: &str) -> Result<Option<u64>, BiolinkMcpError> {
        match self.0.get(name) {
            Some(_) => self.count(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, BiolinkMcpError> {
        self.0
            .get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| Self::missing(name))
    }

    pub fn string_list(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParamSchema {
        ParamSchema::new()
            .param(ParamDef::identifier("entity_id", "CURIE").required())
            .param(
                ParamDef::integer("limit", "page size")
                    .range(Some(1), Some(500))
                    .with_default(20),
            )
            .param(ParamDef::string("taxon", "taxon label"))
            .param(ParamDef::boolean("compact", "shape rows").with_default(true))
            .param(ParamDef::string_list("sources", "allowed sources"))
    }

    fn args(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    #[test]
    fn defaults_are_applied_for_omitted_params() {
        let validated = schema()
            .validate(Some(&args(json!({ "entity_id": "HGNC:11998" }))))
            .expect("valid");

        assert_eq!(validated.str("entity_id").unwrap(), "HGNC:11998");
        assert_eq!(validated.integer("limit").unwrap(), 20);
        assert!(validated.boolean("compact").unwrap());
        assert_eq!(validated.opt_str("taxon"), None);
        assert!(validated.string_list("sources").is_empty());
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let err = schema().validate(None).expect_err("missing");
        assert!(matches!(err, BiolinkMcpError::Validation(_)));
        assert!(err.to_string().contains("entity_id"));

        let err = schema()
            .validate(Some(&args(json!({ "entity_id": null }))))
            .expect_err("null counts as missing");
        assert!(err.to_string().contains("missing required argument"));
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let err = schema()
            .validate(Some(&args(json!({ "entity_id": "   " }))))
            .expect_err("empty");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn mistyped_and_out_of_range_values_are_rejected() {
        for bad in [
            json!({ "entity_id": 7 }),
            json!({ "entity_id": "X:1", "limit": "20" }),
            json!({ "entity_id": "X:1", "limit": 2.5 }),
            json!({ "entity_id": "X:1", "limit": 0 }),
            json!({ "entity_id": "X:1", "limit": 501 }),
            json!({ "entity_id": "X:1", "compact": "yes" }),
            json!({ "entity_id": "X:1", "sources": ["a", 1] }),
            json!({ "entity_id": "X:1", "bogus": true }),
        ] {
            let err = schema().validate(Some(&args(bad.clone()))).expect_err("invalid");
            assert!(
                matches!(err, BiolinkMcpError::Validation(_)),
                "expected validation error for {bad}"
            );
        }
    }

    #[test]
    fn json_schema_lists_required_and_defaults() {
        let rendered = Value::Object(schema().to_json_schema());

        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["entity_id"]));
        assert_eq!(rendered["additionalProperties"], false);
        assert_eq!(rendered["properties"]["entity_id"]["minLength"], 1);
        assert_eq!(rendered["properties"]["limit"]["default"], 20);
        assert_eq!(rendered["properties"]["limit"]["maximum"], 500);
        assert_eq!(rendered["properties"]["sources"]["items"]["type"], "string");
    }

    #[test]
    fn schema_without_required_params_omits_required_key() {
        let rendered = ParamSchema::new().to_json_schema();
        assert!(!rendered.contains_key("required"));
    }
}
