use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{EntityKind, RecordId};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A typed, validated value for one schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Renders the value the way it would be typed back into a form.
    pub fn to_form_string(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Integer(value) => value.to_string(),
            FieldValue::Date(date) => date.format(DATE_FORMAT).to_string(),
            FieldValue::Null => String::new(),
        }
    }
}

pub type FieldValues = BTreeMap<String, FieldValue>;

static NULL: FieldValue = FieldValue::Null;

/// Looks up a field, treating a missing key the same as an explicit null.
pub fn field_value<'a>(values: &'a FieldValues, name: &str) -> &'a FieldValue {
    values.get(name).unwrap_or(&NULL)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub entity: EntityKind,
    pub values: FieldValues,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn value(&self, field: &str) -> &FieldValue {
        field_value(&self.values, field)
    }
}
