use serde_json::{Map, Value};

use super::error::{ToolError, ToolResult};

/// The declared type of a tool parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Mapping,
    Sequence,
    /// A closed set of allowed string values
    Literal(Vec<String>),
    /// No declared type
    Unannotated,
    /// A type with no schema equivalent, named for diagnostics only
    Other(String),
}

impl ParamType {
    pub fn literal<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamType::Literal(values.into_iter().map(Into::into).collect())
    }
}

/// One parameter in a tool's declared signature
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
    /// `None` means the parameter is required. `Some(Value::Null)` is an
    /// optional parameter whose default is "not given".
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl Param {
    pub fn required<S: Into<String>>(name: S, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            description: None,
        }
    }

    pub fn optional<S: Into<String>, V: Into<Value>>(name: S, ty: ParamType, default: V) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default.into()),
            description: None,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The explicit signature a tool carries in place of runtime reflection
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSignature {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<Param>,
}

impl ToolSignature {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Match decoded keyword arguments against the signature: reject unknown
    /// and missing arguments, check literal values, and fill in defaults.
    pub fn bind(&self, tool: &str, arguments: Value) -> ToolResult<ToolArgs> {
        let mut values = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::invalid(
                    tool,
                    format!("expected a JSON object of arguments, got {}", other),
                ))
            }
        };

        if let Some(unknown) = values
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            return Err(ToolError::invalid(
                tool,
                format!("unexpected argument '{}'", unknown),
            ));
        }

        for param in &self.params {
            let given = values.get(&param.name).filter(|v| !v.is_null()).cloned();
            match given {
                Some(value) => {
                    if let ParamType::Literal(allowed) = &param.ty {
                        let valid = value
                            .as_str()
                            .map(|v| allowed.iter().any(|a| a == v))
                            .unwrap_or(false);
                        if !valid {
                            return Err(ToolError::invalid(
                                tool,
                                format!(
                                    "'{}' must be one of [{}], got {}",
                                    param.name,
                                    allowed.join(", "),
                                    value
                                ),
                            ));
                        }
                    }
                }
                None => match &param.default {
                    None => {
                        return Err(ToolError::invalid(
                            tool,
                            format!("missing required argument '{}'", param.name),
                        ))
                    }
                    Some(default) => {
                        values.insert(param.name.clone(), default.clone());
                    }
                },
            }
        }

        Ok(ToolArgs {
            tool: tool.to_string(),
            values,
        })
    }
}

/// Keyword arguments bound to a tool's signature
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs {
    tool: String,
    values: Map<String, Value>,
}

impl ToolArgs {
    /// Get an argument, treating JSON null as absent
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn str(&self, name: &str) -> ToolResult<&str> {
        self.opt_str(name)?
            .ok_or_else(|| ToolError::invalid(&self.tool, format!("'{}' is required", name)))
    }

    pub fn opt_str(&self, name: &str) -> ToolResult<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.type_error(name, "a string", other)),
        }
    }

    /// Numbers are accepted either as JSON numbers or numeric strings since
    /// models are not always careful about quoting.
    pub fn opt_f64(&self, name: &str) -> ToolResult<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.type_error(name, "a number", &Value::String(s.clone()))),
            Some(other) => Err(self.type_error(name, "a number", other)),
        }
    }

    pub fn opt_i64(&self, name: &str) -> ToolResult<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| self.type_error(name, "an integer", &Value::Number(n.clone()))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.type_error(name, "an integer", &Value::String(s.clone()))),
            Some(other) => Err(self.type_error(name, "an integer", other)),
        }
    }

    fn type_error(&self, name: &str, expected: &str, got: &Value) -> ToolError {
        ToolError::invalid(
            &self.tool,
            format!("'{}' must be {}, got {}", name, expected, got),
        )
    }
}
