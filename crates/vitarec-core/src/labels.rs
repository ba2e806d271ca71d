//! Fitted label encoders shipped with a model artifact.
//!
//! A [`LabelEncoder`] maps category strings to integer codes and back, where
//! a code is the category's index in the class list. The same type serves
//! as the target encoder (model class code → vitamin name) and as a
//! per-field category encoder for ordinal features. Mappings always come
//! from the artifact; nothing in the crate defines codes inline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelEncoder {
    classes: Vec<String>,
    codes: HashMap<String, i64>,
}

impl LabelEncoder {
    /// Build from a fitted class list, keeping its order.
    pub fn new(classes: Vec<String>) -> Result<Self, SchemaError> {
        let mut codes = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if codes.insert(class.clone(), code as i64).is_some() {
                return Err(SchemaError::DuplicateClass(class.clone()));
            }
        }
        Ok(Self { classes, codes })
    }

    /// Fit from observed labels: distinct values, sorted.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(Into::into).collect();
        classes.sort_unstable();
        classes.dedup();
        let codes = classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.clone(), code as i64))
            .collect();
        Self { classes, codes }
    }

    /// Code for a category, if it was seen at fit time.
    pub fn transform(&self, class: &str) -> Option<i64> {
        self.codes.get(class).copied()
    }

    /// Category for a code, if the code is in range.
    pub fn inverse_transform(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TryFrom<Vec<String>> for LabelEncoder {
    type Error = SchemaError;

    fn try_from(classes: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(classes)
    }
}

impl From<LabelEncoder> for Vec<String> {
    fn from(encoder: LabelEncoder) -> Self {
        encoder.classes
    }
}
