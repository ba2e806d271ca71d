//! Ordered field declarations and the feature layout they produce.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::error::{Invalid, SchemaError};
use crate::field::{FieldKind, FieldSpec, FieldValue, OutOfRange, canonical_selection};

/// The process-wide input schema: every field the model consumes, in the
/// order it was declared at training time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

#[derive(Deserialize)]
struct SchemaFile {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    /// Validate and wrap a list of field specs.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_json::from_str(json)?;
        Self::new(file.fields)
    }

    /// Load a schema from a JSON file of the form `{"fields": [...]}`.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Encoded column names, in model input order.
    ///
    /// Scalar columns (numeric, binary, ordinal) come first in field order,
    /// then each one-hot block in field order with its values sorted.
    pub fn feature_names(&self) -> Vec<String> {
        let scalars = self.fields.iter().filter(|f| !f.is_one_hot());
        let one_hot = self.fields.iter().filter(|f| f.is_one_hot());
        scalars.chain(one_hot).flat_map(FieldSpec::columns).collect()
    }

    /// Arrow schema of the encoded record: one non-null `Float32` per column.
    pub fn arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .feature_names()
            .into_iter()
            .map(|name| Field::new(name, DataType::Float32, false))
            .collect();
        Arc::new(Schema::new(fields))
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
            validate_kind(field)?;
            validate_default(field)?;
        }

        let mut columns = HashSet::new();
        for column in self.feature_names() {
            if !columns.insert(column.clone()) {
                return Err(SchemaError::DuplicateColumn(column));
            }
        }
        Ok(())
    }
}

fn invalid(field: &FieldSpec, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidField {
        field: field.name.clone(),
        reason: reason.into(),
    }
}

fn validate_kind(field: &FieldSpec) -> Result<(), SchemaError> {
    match &field.kind {
        FieldKind::Numeric { min, max, .. } => {
            if min.is_some_and(|v| !v.is_finite()) || max.is_some_and(|v| !v.is_finite()) {
                return Err(invalid(field, "bounds must be finite"));
            }
            if let (Some(lo), Some(hi)) = (min, max)
                && lo > hi
            {
                return Err(invalid(field, format!("min {lo} exceeds max {hi}")));
            }
        }
        FieldKind::Binary { positive, negative } => {
            if positive.is_empty() || negative.is_empty() {
                return Err(invalid(field, "binary tokens must not be empty"));
            }
            if positive == negative {
                return Err(invalid(field, "binary tokens must differ"));
            }
        }
        FieldKind::Categorical { values, .. } => validate_values(field, values)?,
        FieldKind::MultiSelect {
            values,
            none,
            separator,
            ..
        } => {
            validate_values(field, values)?;
            if separator.is_empty() {
                return Err(invalid(field, "separator must not be empty"));
            }
            if !values.contains(none) {
                return Err(invalid(
                    field,
                    format!("none sentinel {none:?} is not a declared value"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_values(field: &FieldSpec, values: &[String]) -> Result<(), SchemaError> {
    if values.is_empty() {
        return Err(invalid(field, "no allowed values"));
    }
    let mut seen = HashSet::new();
    for v in values {
        if v.trim().is_empty() {
            return Err(invalid(field, "allowed values must not be blank"));
        }
        if !seen.insert(v.as_str()) {
            return Err(invalid(field, format!("duplicate value {v:?}")));
        }
    }
    Ok(())
}

/// A default must encode, and must name a declared category. Unknown
/// defaults would silently zero a one-hot block on every omitted field.
fn validate_default(field: &FieldSpec) -> Result<(), SchemaError> {
    let to_err = |reason| SchemaError::InvalidDefault {
        field: field.name.clone(),
        reason,
    };

    let value = match &field.kind {
        // Resolve directly: `coerce` would loop back to the default on blanks.
        FieldKind::MultiSelect {
            none, separator, ..
        } => FieldValue::Category(canonical_selection(&field.default, none, separator)),
        _ if field.default.is_blank() => return Err(to_err(Invalid::Empty)),
        // Bounds hold for defaults even when user input is clamped.
        FieldKind::Numeric { min, max, .. } => {
            let strict = FieldSpec {
                kind: FieldKind::Numeric {
                    min: *min,
                    max: *max,
                    out_of_range: OutOfRange::Reject,
                },
                ..field.clone()
            };
            strict.coerce(Some(&field.default)).map_err(to_err)?
        }
        _ => field.coerce(Some(&field.default)).map_err(to_err)?,
    };

    if let (FieldValue::Category(c), Some(values)) = (&value, field.values())
        && !values.contains(c)
    {
        return Err(to_err(Invalid::UnknownCategory(c.clone())));
    }
    Ok(())
}

/// The vitamin recommendation form, as the production model was trained on it.
pub mod vitamin {
    use super::FeatureSchema;
    use crate::field::{FieldSpec, OutOfRange};

    /// Encoded column order expected by the trained model.
    pub const FEATURE_NAMES: [&str; 23] = [
        "age",
        "sun_hours_per_week",
        "vitamin_d_level",
        "pregnant",
        "smoker",
        "gender_female",
        "gender_male",
        "gender_other",
        "diet_omnivore",
        "diet_pescatarian",
        "diet_vegan",
        "diet_vegetarian",
        "sun_exposure_high",
        "sun_exposure_low",
        "sun_exposure_moderate",
        "activity_level_lightly_active",
        "activity_level_moderately_active",
        "activity_level_sedentary",
        "activity_level_very_active",
        "health_condition_chronic_kidney",
        "health_condition_malabsorption",
        "health_condition_none",
        "health_condition_osteoporosis",
    ];

    /// Field declarations in training order.
    ///
    /// `sun_hours_per_week` and `vitamin_d_level` are not asked on the form;
    /// their defaults are the training-time backfill values.
    pub fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::numeric("age", 30.0).with_bounds(Some(1.0), Some(100.0), OutOfRange::Reject),
            FieldSpec::numeric("sun_hours_per_week", 10.0).with_bounds(
                Some(0.0),
                None,
                OutOfRange::Reject,
            ),
            FieldSpec::numeric("vitamin_d_level", 20.0).with_bounds(
                Some(0.0),
                None,
                OutOfRange::Reject,
            ),
            FieldSpec::binary("pregnant", "No"),
            FieldSpec::binary("smoker", "No"),
            FieldSpec::categorical("gender", &["male", "female", "other"], "female"),
            FieldSpec::categorical(
                "diet",
                &["omnivore", "vegetarian", "vegan", "pescatarian"],
                "omnivore",
            ),
            FieldSpec::categorical("sun_exposure", &["low", "moderate", "high"], "moderate"),
            FieldSpec::categorical(
                "activity_level",
                &[
                    "sedentary",
                    "lightly_active",
                    "moderately_active",
                    "very_active",
                ],
                "moderately_active",
            ),
            FieldSpec::categorical(
                "health_condition",
                &["none", "osteoporosis", "malabsorption", "chronic_kidney"],
                "none",
            ),
        ]
    }

    pub fn schema() -> FeatureSchema {
        FeatureSchema::new(fields()).expect("built-in vitamin schema is valid")
    }
}
