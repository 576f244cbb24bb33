//! Typed model of module outputs and the decoder for `output -json`.
//!
//! The engine reports each output as `{"sensitive": bool, "type": tag,
//! "value": payload}` where `tag` is either a primitive name (`"string"`) or
//! a two-element array naming a collection kind and its element types
//! (`["object", {...}]`). Decoding selects an [`OutputType`] from the tag and
//! then checks that the payload has the matching shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClassifiedError, ErrorKind, Operation};

/// The closed set of output shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// A boolean.
    Bool,
    /// A 64-bit float.
    Number,
    /// A string.
    String,
    /// A mapping from attribute name to value (`object` and `map`).
    Object,
    /// An ordered sequence (`tuple`, `list`, and `set`).
    Tuple,
}

impl OutputType {
    /// Map an engine type tag onto an output type.
    ///
    /// Returns `None` for tags the harness does not understand.
    #[must_use]
    pub fn from_tag(tag: &Value) -> Option<Self> {
        match tag {
            Value::String(name) => match name.as_str() {
                "bool" => Some(Self::Bool),
                "number" => Some(Self::Number),
                "string" => Some(Self::String),
                _ => None,
            },
            Value::Array(parts) => match parts.first().and_then(Value::as_str) {
                Some("object" | "map") => Some(Self::Object),
                Some("tuple" | "list" | "set") => Some(Self::Tuple),
                _ => None,
            },
            _ => None,
        }
    }

    /// Lower-case name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Object => "object",
            Self::Tuple => "tuple",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed output payload.
///
/// Nested values may be `Null`; a top-level value always matches its
/// output's [`OutputType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    /// An absent nested value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// Attribute name to value.
    Object(BTreeMap<String, OutputValue>),
    /// Ordered elements.
    Tuple(Vec<OutputValue>),
}

impl OutputValue {
    /// Borrow the boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Borrow the numeric payload.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Borrow the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the object payload.
    #[must_use]
    pub const fn as_object(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Object(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the tuple payload.
    #[must_use]
    pub fn as_tuple(&self) -> Option<&[Self]> {
        match self {
            Self::Tuple(value) => Some(value),
            _ => None,
        }
    }

    fn from_json(value: Value) -> Result<Self, String> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(
                number
                    .as_f64()
                    .ok_or_else(|| format!("number {number} is out of range"))?,
            ),
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::Tuple(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| Ok((key, Self::from_json(item)?)))
                    .collect::<Result<_, String>>()?,
            ),
        })
    }

    const fn matches(&self, output_type: OutputType) -> bool {
        matches!(
            (self, output_type),
            (Self::Bool(_), OutputType::Bool)
                | (Self::Number(_), OutputType::Number)
                | (Self::String(_), OutputType::String)
                | (Self::Object(_), OutputType::Object)
                | (Self::Tuple(_), OutputType::Tuple)
        )
    }
}

/// One declared module output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    name: String,
    #[serde(rename = "type")]
    output_type: OutputType,
    sensitive: bool,
    value: OutputValue,
}

impl Output {
    /// Create an output record.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        output_type: OutputType,
        sensitive: bool,
        value: OutputValue,
    ) -> Self {
        Self {
            name: name.into(),
            output_type,
            sensitive,
            value,
        }
    }

    /// Output name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub const fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// Whether the module marked the output sensitive.
    ///
    /// The value is carried unredacted either way.
    #[must_use]
    pub const fn sensitive(&self) -> bool {
        self.sensitive
    }

    /// The payload.
    #[must_use]
    pub const fn value(&self) -> &OutputValue {
        &self.value
    }
}

#[derive(Deserialize)]
struct RawOutput {
    #[serde(default)]
    sensitive: bool,
    #[serde(rename = "type")]
    tag: Value,
    value: Value,
}

/// Decode the stdout of `output -json` into outputs sorted by name.
///
/// # Errors
///
/// Returns a [`ClassifiedError`] of kind [`ErrorKind::DecodeFailure`] when the
/// document is malformed, a type tag is unknown, or a payload does not match
/// its tag. No partial result is returned.
pub fn decode_outputs(stdout: &[u8]) -> Result<Vec<Output>, ClassifiedError> {
    let raw: BTreeMap<String, RawOutput> = serde_json::from_slice(stdout)
        .map_err(|error| decode_failure(format!("malformed output document: {error}")))?;

    raw.into_iter()
        .map(|(name, entry)| decode_one(name, entry))
        .collect()
}

fn decode_one(name: String, entry: RawOutput) -> Result<Output, ClassifiedError> {
    let output_type = OutputType::from_tag(&entry.tag).ok_or_else(|| {
        decode_failure(format!("output '{name}' has unknown type tag {}", entry.tag))
    })?;
    let value = OutputValue::from_json(entry.value)
        .map_err(|reason| decode_failure(format!("output '{name}': {reason}")))?;
    if !value.matches(output_type) {
        return Err(decode_failure(format!(
            "output '{name}' value does not match type {output_type}"
        )));
    }
    Ok(Output::new(name, output_type, entry.sensitive, value))
}

fn decode_failure(detail: String) -> ClassifiedError {
    ClassifiedError::new(
        Operation::Output,
        ErrorKind::DecodeFailure,
        "unexpected output format",
        detail,
    )
}
