use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Malformed identifier in provider data. Only ever skips the offending entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {field} format: expected {expected}, got {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

fn wrong_type(field: &'static str, expected: &'static str, value: Option<&Value>) -> ValidationError {
    ValidationError::WrongType {
        field,
        expected,
        found: json_type_name(value),
    }
}

pub(crate) fn json_type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// Any non-string value becomes `""`.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        _ => String::new(),
    })
}

/// Strings verbatim, numbers stringified, anything else `""`.
fn lenient_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(number) => number_to_string(&number),
        _ => String::new(),
    })
}

/// Integers as-is, integral floats without decimals (`8.0` renders as `8`),
/// other floats in their shortest round-trip form.
fn number_to_string(number: &Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => number.to_string(),
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_i64().unwrap_or_default(),
        Value::String(text) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

/// `Some` only when the section is a JSON object.
fn object_section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(section @ Value::Object(_)) => serde_json::from_value(section).ok(),
        _ => None,
    })
}

/// A well-typed VOD category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: String,
    pub category_name: String,
    /// Informational only; unparseable values fall back to `0`.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub parent_id: i64,
}

/// One element of the category listing.
///
/// Entries whose `category_id` or `category_name` is not a string decode as
/// `Malformed`, so one bad entry never fails the whole listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CategoryEntry {
    Valid(Category),
    Malformed(Value),
}

impl CategoryEntry {
    pub fn validate(&self) -> Result<Category, ValidationError> {
        match self {
            Self::Valid(category) => Ok(category.clone()),
            Self::Malformed(raw) => Err(diagnose_category(raw)),
        }
    }

    /// Best-effort label for log lines about entries that failed validation.
    pub fn describe(&self) -> String {
        match self {
            Self::Valid(category) => category.category_id.clone(),
            Self::Malformed(raw) => match raw.get("category_id") {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => "<missing category_id>".to_string(),
            },
        }
    }
}

fn diagnose_category(raw: &Value) -> ValidationError {
    let category_id = raw.get("category_id");
    if !matches!(category_id, Some(Value::String(_))) {
        return wrong_type("category_id", "string", category_id);
    }
    let category_name = raw.get("category_name");
    if !matches!(category_name, Some(Value::String(_))) {
        return wrong_type("category_name", "string", category_name);
    }
    wrong_type("category", "object", Some(raw))
}

/// `stream_id` exactly as the provider typed it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StreamId {
    Text(String),
    Number(Number),
    Other(Value),
}

/// One element of a category's stream listing. Only `stream_id` drives the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamEntry {
    #[serde(default)]
    pub stream_id: Option<StreamId>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
}

impl StreamEntry {
    /// Resolves `stream_id` to the string the info endpoint expects.
    ///
    /// Strings pass through unchanged; numbers are rendered without decimal places
    /// (`123.0` becomes `"123"`).
    pub fn stream_id(&self) -> Result<String, ValidationError> {
        match &self.stream_id {
            Some(StreamId::Text(id)) => Ok(id.clone()),
            Some(StreamId::Number(n)) => Ok(match (n.as_u64(), n.as_i64(), n.as_f64()) {
                (Some(u), _, _) => u.to_string(),
                (None, Some(i), _) => i.to_string(),
                (None, None, Some(f)) => format!("{f:.0}"),
                (None, None, None) => n.to_string(),
            }),
            Some(StreamId::Other(raw)) => Err(wrong_type("stream_id", "string or number", Some(raw))),
            None => Err(wrong_type("stream_id", "string or number", None)),
        }
    }

    /// The identifier as received, for log lines and failure reports.
    pub fn raw_id(&self) -> String {
        match &self.stream_id {
            Some(StreamId::Text(id)) => id.clone(),
            Some(StreamId::Number(n)) => n.to_string(),
            Some(StreamId::Other(raw)) => raw.to_string(),
            None => "<missing>".to_string(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|name| !name.is_empty())
    }
}

/// The `info` section of a stream info document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InfoSection {
    #[serde(deserialize_with = "lenient_text")]
    pub plot: String,
    #[serde(deserialize_with = "lenient_text")]
    pub genre: String,
    #[serde(deserialize_with = "lenient_text")]
    pub releasedate: String,
    #[serde(deserialize_with = "lenient_scalar")]
    pub rating: String,
    #[serde(deserialize_with = "lenient_text")]
    pub director: String,
    #[serde(deserialize_with = "lenient_text")]
    pub cast: String,
    #[serde(deserialize_with = "lenient_text")]
    pub movie_image: String,
    #[serde(deserialize_with = "lenient_text")]
    pub youtube_trailer: String,
    #[serde(deserialize_with = "lenient_scalar")]
    pub tmdb_id: String,
}

/// The `movie_data` section of a stream info document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MovieData {
    #[serde(deserialize_with = "lenient_scalar")]
    pub stream_id: String,
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
}

/// Per-stream metadata document.
///
/// A section that is missing or not a JSON object decodes as `None`; inside a
/// section every mistyped field decodes as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamInfo {
    #[serde(default, deserialize_with = "object_section")]
    pub info: Option<InfoSection>,
    #[serde(default, deserialize_with = "object_section")]
    pub movie_data: Option<MovieData>,
}
