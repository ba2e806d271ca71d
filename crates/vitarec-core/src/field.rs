//! Declarative input field specifications.
//!
//! A [`FieldSpec`] says how one raw form value becomes model input: its
//! kind, the tokens it accepts, and the default substituted when the value
//! is missing. Defaults go through the same coercion as user input, so an
//! omitted field and an explicitly supplied default always encode the same.

use serde::{Deserialize, Serialize};

use crate::error::Invalid;
use crate::raw::RawValue;

/// Separator joining the sorted members of a multi-select value.
pub const DEFAULT_SEPARATOR: &str = "+";

/// How a categorical field reaches the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalEncoding {
    /// One indicator column per allowed value, named `{field}_{value}`.
    #[default]
    OneHot,
    /// A single column holding the code from the artifact's fitted encoder.
    Ordinal,
}

/// What to do with a numeric value outside its bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRange {
    #[default]
    Reject,
    Clamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default)]
        out_of_range: OutOfRange,
    },
    Binary {
        #[serde(default = "default_positive")]
        positive: String,
        #[serde(default = "default_negative")]
        negative: String,
    },
    Categorical {
        values: Vec<String>,
        #[serde(default)]
        encoding: CategoricalEncoding,
    },
    MultiSelect {
        /// Canonical categories the model was trained on.
        values: Vec<String>,
        /// Category used for an empty selection.
        none: String,
        #[serde(default = "default_separator")]
        separator: String,
        #[serde(default)]
        encoding: CategoricalEncoding,
    },
}

fn default_positive() -> String {
    "Yes".to_string()
}

fn default_negative() -> String {
    "No".to_string()
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

/// Declaration of one input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub default: RawValue,
}

/// A field value after defaulting and coercion, before column placement.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(f32),
    Category(String),
}

impl FieldSpec {
    /// Unbounded numeric field.
    pub fn numeric(name: &str, default: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric {
                min: None,
                max: None,
                out_of_range: OutOfRange::Reject,
            },
            default: RawValue::One(default.to_string()),
        }
    }

    /// Yes/No field.
    pub fn binary(name: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Binary {
                positive: default_positive(),
                negative: default_negative(),
            },
            default: RawValue::from(default),
        }
    }

    /// Single-select field, one-hot encoded.
    pub fn categorical(name: &str, values: &[&str], default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Categorical {
                values: values.iter().map(|v| v.to_string()).collect(),
                encoding: CategoricalEncoding::OneHot,
            },
            default: RawValue::from(default),
        }
    }

    /// Multi-select field, one-hot encoded over its canonical categories.
    /// Defaults to the empty selection.
    pub fn multi_select(name: &str, values: &[&str], none: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::MultiSelect {
                values: values.iter().map(|v| v.to_string()).collect(),
                none: none.to_string(),
                separator: default_separator(),
                encoding: CategoricalEncoding::OneHot,
            },
            default: RawValue::Many(Vec::new()),
        }
    }

    /// Bound a numeric field. No effect on other kinds.
    pub fn with_bounds(mut self, lo: Option<f64>, hi: Option<f64>, policy: OutOfRange) -> Self {
        if let FieldKind::Numeric {
            min,
            max,
            out_of_range,
        } = &mut self.kind
        {
            *min = lo;
            *max = hi;
            *out_of_range = policy;
        }
        self
    }

    /// Switch a categorical or multi-select field to ordinal encoding.
    pub fn ordinal(mut self) -> Self {
        match &mut self.kind {
            FieldKind::Categorical { encoding, .. } | FieldKind::MultiSelect { encoding, .. } => {
                *encoding = CategoricalEncoding::Ordinal;
            }
            _ => {}
        }
        self
    }

    pub fn with_default(mut self, default: impl Into<RawValue>) -> Self {
        self.default = default.into();
        self
    }

    /// Declared categories, for categorical and multi-select fields.
    pub fn values(&self) -> Option<&[String]> {
        match &self.kind {
            FieldKind::Categorical { values, .. } | FieldKind::MultiSelect { values, .. } => {
                Some(values)
            }
            _ => None,
        }
    }

    /// True when the field expands into one indicator column per value.
    pub fn is_one_hot(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Categorical {
                encoding: CategoricalEncoding::OneHot,
                ..
            } | FieldKind::MultiSelect {
                encoding: CategoricalEncoding::OneHot,
                ..
            }
        )
    }

    /// Declared values in indicator-column order (byte-wise sorted).
    pub fn sorted_values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self
            .values()
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect();
        values.sort_unstable();
        values
    }

    /// Column names this field contributes to the encoded record.
    pub fn columns(&self) -> Vec<String> {
        if self.is_one_hot() {
            self.sorted_values()
                .into_iter()
                .map(|v| format!("{}_{}", self.name, v))
                .collect()
        } else {
            vec![self.name.clone()]
        }
    }

    /// Resolve a supplied value (or the default, when missing or blank)
    /// and coerce it to this field's kind.
    ///
    /// Categories are returned as-is; whether they are known is decided by
    /// the encoding strategy.
    pub fn coerce(&self, supplied: Option<&RawValue>) -> Result<FieldValue, Invalid> {
        let value = match supplied {
            Some(v) if !v.is_blank() => v,
            _ => &self.default,
        };

        match &self.kind {
            FieldKind::Numeric {
                min,
                max,
                out_of_range,
            } => {
                let text = value.single().map_err(Invalid::MultipleValues)?;
                parse_numeric(text, *min, *max, *out_of_range).map(FieldValue::Scalar)
            }
            FieldKind::Binary { positive, negative } => {
                let token = value.single().map_err(Invalid::MultipleValues)?;
                if token == positive {
                    Ok(FieldValue::Scalar(1.0))
                } else if token == negative {
                    Ok(FieldValue::Scalar(0.0))
                } else {
                    Err(Invalid::UnknownToken {
                        value: token.to_string(),
                        allowed: vec![positive.clone(), negative.clone()],
                    })
                }
            }
            FieldKind::Categorical { .. } => {
                let token = value.single().map_err(Invalid::MultipleValues)?;
                Ok(FieldValue::Category(token.to_string()))
            }
            FieldKind::MultiSelect {
                none, separator, ..
            } => Ok(FieldValue::Category(canonical_selection(
                value, none, separator,
            ))),
        }
    }
}

fn parse_numeric(
    text: &str,
    min: Option<f64>,
    max: Option<f64>,
    policy: OutOfRange,
) -> Result<f32, Invalid> {
    let x: f64 = text
        .parse()
        .map_err(|_| Invalid::NotNumeric(text.to_string()))?;
    if !x.is_finite() {
        return Err(Invalid::NotFinite(text.to_string()));
    }

    let below = min.is_some_and(|lo| x < lo);
    let above = max.is_some_and(|hi| x > hi);
    let x = match policy {
        _ if !(below || above) => x,
        OutOfRange::Reject => return Err(Invalid::OutOfRange { value: x, min, max }),
        OutOfRange::Clamp => {
            let lo = min.unwrap_or(f64::NEG_INFINITY);
            let hi = max.unwrap_or(f64::INFINITY);
            x.clamp(lo, hi)
        }
    };

    // Finite as f64 is not enough: the record stores f32.
    let y = x as f32;
    if !y.is_finite() {
        return Err(Invalid::NotFinite(text.to_string()));
    }
    Ok(y)
}

/// Collapse a selection into its canonical category string.
///
/// Members (and any pre-joined member lists) are split on the separator,
/// deduplicated and sorted. The `none` sentinel only survives on its own.
pub fn canonical_selection(value: &RawValue, none: &str, separator: &str) -> String {
    let mut members: Vec<&str> = value
        .members()
        .flat_map(|m| m.split(separator))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .collect();
    members.sort_unstable();
    members.dedup();
    if members.len() > 1 {
        members.retain(|m| *m != none);
    }
    if members.is_empty() {
        return none.to_string();
    }
    members.join(separator)
}
