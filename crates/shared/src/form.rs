use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    domain::{EntityKind, EntitySchema, FieldKind, FieldSpec, RecordId},
    record::{FieldValue, FieldValues, Record, DATE_FORMAT},
};

/// Field name to submitted string, exactly as posted.
pub type RawForm = BTreeMap<String, String>;

/// Field name to the messages explaining why its value was rejected.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(FieldValues),
    Invalid { raw: RawForm, errors: FieldErrors },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// Checks a submitted form against an entity schema.
///
/// Every schema field ends up in the `Valid` map, absent optional fields as
/// `FieldValue::Null`. Keys the schema does not declare are ignored. The
/// input is never modified; an `Invalid` result hands it back untouched so
/// the form can be re-rendered with what the user typed.
pub fn validate(schema: &EntitySchema, raw: &RawForm) -> Validation {
    let mut values = FieldValues::new();
    let mut errors = FieldErrors::new();

    for field in schema.fields {
        let submitted = raw.get(field.name).map(|v| v.trim()).unwrap_or_default();
        match clean_field(field, submitted) {
            Ok(value) => {
                values.insert(field.name.to_string(), value);
            }
            Err(message) => {
                errors
                    .entry(field.name.to_string())
                    .or_default()
                    .push(message);
            }
        }
    }

    if errors.is_empty() {
        Validation::Valid(values)
    } else {
        Validation::Invalid {
            raw: raw.clone(),
            errors,
        }
    }
}

fn clean_field(field: &FieldSpec, submitted: &str) -> Result<FieldValue, String> {
    if submitted.is_empty() {
        return if field.required {
            Err(REQUIRED_MESSAGE.to_string())
        } else {
            Ok(FieldValue::Null)
        };
    }

    match field.kind {
        FieldKind::Text { max_len } => {
            let len = submitted.chars().count();
            if len > max_len {
                return Err(format!(
                    "Ensure this value has at most {max_len} characters (it has {len})."
                ));
            }
            Ok(FieldValue::Text(submitted.to_string()))
        }
        FieldKind::Integer { min } => {
            let value = submitted
                .parse::<i64>()
                .map_err(|_| "Enter a whole number.".to_string())?;
            if value < min {
                return Err(format!(
                    "Ensure this value is greater than or equal to {min}."
                ));
            }
            Ok(FieldValue::Integer(value))
        }
        FieldKind::Date => NaiveDate::parse_from_str(submitted, DATE_FORMAT)
            .map(FieldValue::Date)
            .map_err(|_| "Enter a valid date.".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub value: String,
    pub errors: Vec<String>,
}

/// Form description handed to the renderer for the create/edit templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormView {
    pub entity: EntityKind,
    pub template: &'static str,
    pub action: String,
    pub record_id: Option<RecordId>,
    pub fields: Vec<BoundField>,
}

impl FormView {
    pub fn unbound(kind: EntityKind) -> Self {
        Self::build(kind, None, |_| (String::new(), Vec::new()))
    }

    pub fn for_record(record: &Record) -> Self {
        Self::build(record.entity, Some(record.id), |field| {
            (record.value(field.name).to_form_string(), Vec::new())
        })
    }

    pub fn rebound(
        kind: EntityKind,
        record_id: Option<RecordId>,
        raw: &RawForm,
        errors: &FieldErrors,
    ) -> Self {
        Self::build(kind, record_id, |field| {
            (
                raw.get(field.name).cloned().unwrap_or_default(),
                errors.get(field.name).cloned().unwrap_or_default(),
            )
        })
    }

    pub fn has_errors(&self) -> bool {
        self.fields.iter().any(|field| !field.errors.is_empty())
    }

    pub fn field(&self, name: &str) -> Option<&BoundField> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn build(
        kind: EntityKind,
        record_id: Option<RecordId>,
        mut bind: impl FnMut(&FieldSpec) -> (String, Vec<String>),
    ) -> Self {
        let schema = kind.schema();
        let action = match record_id {
            Some(id) => format!("/{}/edit/{}", kind.slug(), id.0),
            None => format!("/{}/create", kind.slug()),
        };
        let fields = schema
            .fields
            .iter()
            .map(|field| {
                let (value, errors) = bind(field);
                BoundField {
                    name: field.name,
                    label: field.label,
                    kind: field.kind,
                    required: field.required,
                    value,
                    errors,
                }
            })
            .collect();

        Self {
            entity: kind,
            template: schema.form_template,
            action,
            record_id,
            fields,
        }
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
