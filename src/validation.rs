//! Typed request validation producing a per-field error map.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Field name -> list of messages, serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "validation failed for: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Reads scalar fields out of a submitted form, recording an error for each
/// field that is missing or malformed.
pub struct FieldReader<'a> {
    fields: &'a HashMap<String, String>,
    errors: ValidationErrors,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a HashMap<String, String>) -> Self {
        Self {
            fields,
            errors: ValidationErrors::new(),
        }
    }

    fn raw(&self, name: &str) -> Option<&'a str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Required string of at most `max_chars` characters.
    pub fn string(&mut self, name: &str, max_chars: usize) -> Option<String> {
        let value = self.optional_string(name, max_chars)?;
        if value.is_none() {
            self.errors
                .add(name, format!("The {name} field is required."));
        }
        value
    }

    /// Optional string; `Some(None)` when absent, `None` when invalid.
    pub fn optional_string(&mut self, name: &str, max_chars: usize) -> Option<Option<String>> {
        match self.raw(name) {
            None => Some(None),
            Some(value) if value.chars().count() > max_chars => {
                self.errors.add(
                    name,
                    format!("The {name} field must not be greater than {max_chars} characters."),
                );
                None
            }
            Some(value) => Some(Some(value.to_string())),
        }
    }

    /// Required positive integer id.
    pub fn id(&mut self, name: &str) -> Option<u64> {
        match self.optional_id(name)? {
            Some(id) => Some(id),
            None => {
                self.errors
                    .add(name, format!("The {name} field is required."));
                None
            }
        }
    }

    /// Optional positive integer id; `Some(None)` when absent, `None` when invalid.
    pub fn optional_id(&mut self, name: &str) -> Option<Option<u64>> {
        match self.raw(name) {
            None => Some(None),
            Some(value) => match value.parse::<u64>() {
                Ok(id) if id > 0 => Some(Some(id)),
                _ => {
                    self.errors
                        .add(name, format!("The {name} field must be an integer."));
                    None
                }
            },
        }
    }

    /// Required date, as RFC 3339 or `YYYY-MM-DD` (midnight UTC).
    pub fn date(&mut self, name: &str) -> Option<DateTime<Utc>> {
        let Some(value) = self.raw(name) else {
            self.errors
                .add(name, format!("The {name} field is required."));
            return None;
        };
        match parse_date(value) {
            Some(date) => Some(date),
            None => {
                self.errors
                    .add(name, format!("The {name} field must be a valid date."));
                None
            }
        }
    }

    /// Record an error that is not tied to a scalar read.
    pub fn reject(&mut self, name: &str, message: impl Into<String>) {
        self.errors.add(name, message);
    }

    pub fn merge(&mut self, errors: ValidationErrors) {
        self.errors.merge(errors);
    }

    pub fn finish(self) -> ValidationErrors {
        self.errors
    }
}

pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
