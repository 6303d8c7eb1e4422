use std::collections::BTreeMap;

use serde_json::Value;

use super::Params;
use crate::error::ParameterError;

/// Expected JSON type of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Float,
    Bool,
    Array,
    Object,
}

impl ParamType {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Integers are accepted where a float is expected.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

fn type_name_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declaration of a single parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSpec {
    pub required: bool,
    pub default: Option<Value>,
    pub kind: Option<ParamType>,
    pub description: String,
}

impl ParamSpec {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn optional() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_type(mut self, kind: ParamType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Set of parameter declarations attached to a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    specs: BTreeMap<String, ParamSpec>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.specs.insert(name.into(), spec);
        self
    }

    pub fn specs(&self) -> &BTreeMap<String, ParamSpec> {
        &self.specs
    }

    /// Validate `params`, filling defaults for absent optional parameters.
    ///
    /// All missing required parameters are reported together. Parameters not
    /// declared in the schema pass through untouched.
    pub fn validate(&self, params: &Params) -> Result<Params, ParameterError> {
        let mut validated = Params::new();
        let mut missing = Vec::new();

        for (name, spec) in &self.specs {
            match params.get(name) {
                Some(value) => {
                    if let Some(kind) = spec.kind {
                        if !kind.matches(value) {
                            return Err(ParameterError::TypeMismatch {
                                name: name.clone(),
                                expected: kind.name(),
                                found: type_name_of(value),
                            });
                        }
                    }
                    validated.insert(name.clone(), value.clone());
                }
                None if spec.required => missing.push(name.clone()),
                None => {
                    if let Some(default) = &spec.default {
                        validated.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(ParameterError::Missing(missing));
        }

        for (name, value) in params {
            validated
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }

        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ParamSchema {
        ParamSchema::new()
            .param("value", ParamSpec::required().with_type(ParamType::Integer))
            .param(
                "optional",
                ParamSpec::optional()
                    .with_default("default")
                    .with_type(ParamType::String),
            )
    }

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn fills_defaults_for_absent_optional() {
        let out = schema().validate(&params(&[("value", json!(21))])).unwrap();
        assert_eq!(out.get("value"), Some(&json!(21)));
        assert_eq!(out.get("optional"), Some(&json!("default")));
    }

    #[test]
    fn missing_required_is_reported() {
        let err = schema().validate(&Params::new()).unwrap_err();
        assert_eq!(err, ParameterError::Missing(vec!["value".to_string()]));
        assert_eq!(err.names(), vec!["value"]);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = schema()
            .validate(&params(&[("value", json!("not an int"))]))
            .unwrap_err();
        match err {
            ParameterError::TypeMismatch {
                name,
                expected,
                found,
            } => {
                assert_eq!(name, "value");
                assert_eq!(expected, "integer");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn undeclared_parameters_pass_through() {
        let out = schema()
            .validate(&params(&[("value", json!(1)), ("extra", json!(true))]))
            .unwrap();
        assert_eq!(out.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn float_accepts_integers() {
        let schema = ParamSchema::new().param("ratio", ParamSpec::required().with_type(ParamType::Float));
        assert!(schema.validate(&params(&[("ratio", json!(2))])).is_ok());
        assert!(schema.validate(&params(&[("ratio", json!(0.5))])).is_ok());
    }
}
