//! Declarative description of the options a trigger accepts.
//!
//! A [`Schema`] is enough to validate raw options (fill defaults, reject
//! unknown or mistyped options, enforce required ones) and to produce the
//! display-safe, masked copy of a validated configuration.

use serde_json::{Map, Value};

use super::error::{ConfigurationError, FieldProblem, Problem};
use super::mask::mask_value;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Boolean,
    /// A string restricted to a fixed set of values.
    OneOf(&'static [&'static str]),
    /// A nested block of options.
    Object(Schema),
}

impl FieldType {
    fn describe(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::OneOf(_) => "string",
            FieldType::Boolean => "boolean",
            FieldType::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    pub sensitive: bool,
}

impl Field {
    fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            sensitive: false,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn one_of(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self::new(name, FieldType::OneOf(allowed))
    }

    pub fn object(name: &'static str, schema: Schema) -> Self {
        Self::new(name, FieldType::Object(schema))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Masked by [`Schema::mask`].
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate raw options, returning them with defaults filled in.
    ///
    /// All problems are collected, not just the first one.
    pub fn validate(&self, raw: &Value) -> Result<Value, ConfigurationError> {
        let empty = Map::new();
        let options = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(ConfigurationError::NotAnObject),
        };

        let mut problems = Vec::new();
        let validated = self.check("", options, &mut problems);
        if problems.is_empty() {
            Ok(Value::Object(validated))
        } else {
            Err(ConfigurationError::Invalid(problems))
        }
    }

    fn check(
        &self,
        prefix: &str,
        options: &Map<String, Value>,
        problems: &mut Vec<FieldProblem>,
    ) -> Map<String, Value> {
        let mut out = Map::new();

        for key in options.keys() {
            if self.get(key).is_none() {
                problems.push(FieldProblem::new(path(prefix, key), Problem::Unknown));
            }
        }

        for field in &self.fields {
            let field_path = path(prefix, field.name);
            match options.get(field.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    if let Some(value) = check_value(field, &field_path, value, problems) {
                        out.insert(field.name.to_string(), value);
                    }
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.to_string(), default.clone());
                    } else if field.required {
                        problems.push(FieldProblem::new(field_path, Problem::Missing));
                    }
                }
            }
        }
        out
    }

    /// Copy of `configuration` with every sensitive option masked.
    ///
    /// Options the schema does not know pass through unchanged, and an
    /// absent block stays absent.
    pub fn mask(&self, configuration: &Value) -> Value {
        let Value::Object(options) = configuration else {
            return configuration.clone();
        };
        let masked = options
            .iter()
            .map(|(key, value)| {
                let value = match self.get(key) {
                    Some(field) if field.sensitive => mask_value(value),
                    Some(Field {
                        ty: FieldType::Object(nested),
                        ..
                    }) => nested.mask(value),
                    _ => value.clone(),
                };
                (key.clone(), value)
            })
            .collect();
        Value::Object(masked)
    }
}

fn path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_value(
    field: &Field,
    field_path: &str,
    value: &Value,
    problems: &mut Vec<FieldProblem>,
) -> Option<Value> {
    let wrong_type = |problems: &mut Vec<FieldProblem>| {
        problems.push(FieldProblem::new(
            field_path,
            Problem::WrongType {
                expected: field.ty.describe(),
            },
        ));
        None
    };

    match (&field.ty, value) {
        (FieldType::String, Value::String(_)) => Some(value.clone()),
        // The environment provider parses `123456` or `true` into scalars.
        (FieldType::String, Value::Number(_) | Value::Bool(_)) => {
            Some(Value::String(scalar_text(value)))
        }
        (FieldType::Boolean, Value::Bool(_)) => Some(value.clone()),
        // Environment variables only carry strings.
        (FieldType::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => wrong_type(problems),
        },
        (FieldType::OneOf(allowed), Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
            let text = scalar_text(value);
            if allowed.contains(&text.as_str()) {
                Some(Value::String(text))
            } else {
                problems.push(FieldProblem::new(
                    field_path,
                    Problem::NotAllowed { allowed: *allowed },
                ));
                None
            }
        }
        (FieldType::Object(nested), Value::Object(options)) => {
            Some(Value::Object(nested.check(field_path, options, problems)))
        }
        _ => wrong_type(problems),
    }
}
