//! Raw user input as delivered by a form or JSON body.
//!
//! Values stay textual until the encoder coerces them against a
//! [`FieldSpec`](crate::FieldSpec). Repeated form fields become
//! [`RawValue::Many`].

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Deserializer, Serialize};

/// One raw field value: a single token or a repeated selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    One(String),
    Many(Vec<String>),
}

impl RawValue {
    /// True for an empty or whitespace-only value, or a selection with no
    /// non-blank members. Blank values resolve to the field default.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::One(s) => s.trim().is_empty(),
            Self::Many(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }

    /// Trimmed members, skipping blanks.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Self::One(s) => std::slice::from_ref(s),
            Self::Many(v) => v,
        };
        items.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    /// The value as a single trimmed token.
    ///
    /// A one-element selection counts as a single token; anything longer
    /// is reported with its member count.
    pub fn single(&self) -> Result<&str, usize> {
        match self {
            Self::One(s) => Ok(s.trim()),
            Self::Many(_) => {
                let mut members = self.members();
                match (members.next(), members.next()) {
                    (None, _) => Ok(""),
                    (Some(only), None) => Ok(only),
                    _ => Err(self.members().count()),
                }
            }
        }
    }

    /// Append a member, turning a single value into a selection.
    fn push(&mut self, value: String) {
        match self {
            Self::One(first) => *self = Self::Many(vec![std::mem::take(first), value]),
            Self::Many(v) => v.push(value),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

impl<const N: usize> From<[&str; N]> for RawValue {
    fn from(v: [&str; N]) -> Self {
        Self::Many(v.iter().map(|s| s.to_string()).collect())
    }
}

// JSON bodies may carry numbers, booleans, or null; keep their textual form.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireScalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl WireScalar {
    fn into_text(self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Scalar(WireScalar),
    List(Vec<WireScalar>),
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireValue::deserialize(deserializer)? {
            WireValue::Scalar(s) => Self::One(s.into_text()),
            WireValue::List(items) => {
                Self::Many(items.into_iter().map(WireScalar::into_text).collect())
            }
        })
    }
}

/// Field name → raw value for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInput(BTreeMap<String, RawValue>);

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, collecting repeated names into a
    /// selection the way form decoding does.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut input = Self::new();
        for (k, v) in pairs {
            input.push(k, v);
        }
        input
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a value, appending to an existing one.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.0.entry(name.into()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
            Entry::Vacant(entry) => {
                entry.insert(RawValue::One(value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<RawValue> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RawInput
where
    K: Into<String>,
    V: Into<RawValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
