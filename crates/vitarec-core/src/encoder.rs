//! Raw input → model-ready feature record.
//!
//! The encoder walks the schema in declaration order, resolves each field
//! (default substitution, coercion), and writes the result into a fixed
//! column layout computed once at construction. Column order never depends
//! on the order of keys in the input.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use tracing::debug;

use crate::error::{EncodeError, Invalid, SchemaError, SchemaMismatch, ValidationError};
use crate::field::{FieldSpec, FieldValue};
use crate::labels::LabelEncoder;
use crate::raw::RawInput;
use crate::record::EncodedRecord;
use crate::schema::FeatureSchema;

/// Where one field's value lands in the encoded row.
#[derive(Debug, Clone)]
enum Slot {
    Scalar(usize),
    OneHot { start: usize, values: Vec<String> },
    Ordinal { column: usize, encoder: LabelEncoder },
}

/// Encodes [`RawInput`] into an [`EncodedRecord`] for one [`FeatureSchema`].
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: Arc<FeatureSchema>,
    arrow_schema: SchemaRef,
    feature_names: Vec<String>,
    slots: Vec<Slot>,
}

impl FeatureEncoder {
    /// Build an encoder for `schema`.
    ///
    /// `category_encoders` are the artifact's fitted encoders keyed by field
    /// name; every ordinal field needs one, and it must know every declared
    /// value of that field.
    pub fn new(
        schema: Arc<FeatureSchema>,
        category_encoders: &HashMap<String, LabelEncoder>,
    ) -> Result<Self, SchemaError> {
        let feature_names = schema.feature_names();
        let position: HashMap<&str, usize> = feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let column = |name: &str| -> Result<usize, SchemaError> {
            position
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::DuplicateColumn(name.to_string()))
        };

        let mut slots = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let slot = if field.is_one_hot() {
                let values: Vec<String> = field
                    .sorted_values()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let first = field.columns().into_iter().next().unwrap_or_default();
                Slot::OneHot {
                    start: column(&first)?,
                    values,
                }
            } else if field.values().is_some() {
                let encoder = category_encoders
                    .get(&field.name)
                    .ok_or_else(|| SchemaError::MissingCategoryEncoder(field.name.clone()))?;
                check_category_encoder(field, encoder)?;
                Slot::Ordinal {
                    column: column(&field.name)?,
                    encoder: encoder.clone(),
                }
            } else {
                Slot::Scalar(column(&field.name)?)
            };
            slots.push(slot);
        }

        for name in category_encoders.keys() {
            if !slots_use_encoder(&schema, name) {
                debug!(field = %name, "category encoder not used by any ordinal field");
            }
        }

        Ok(Self {
            arrow_schema: schema.arrow_schema(),
            schema,
            feature_names,
            slots,
        })
    }

    /// Encoder for a schema with no ordinal fields.
    pub fn one_hot(schema: Arc<FeatureSchema>) -> Result<Self, SchemaError> {
        Self::new(schema, &HashMap::new())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        self.arrow_schema.clone()
    }

    /// Encoded column names, in order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Check this encoder's columns against a model's expected input.
    pub fn check_against(&self, expected: &[String]) -> Result<(), SchemaMismatch> {
        SchemaMismatch::check(expected, &self.feature_names)
    }

    /// Encode one request.
    ///
    /// Missing or blank fields take their declared default. One-hot fields
    /// with an unknown value encode as all zeros; ordinal fields reject it.
    pub fn encode(&self, raw: &RawInput) -> Result<EncodedRecord, EncodeError> {
        for key in raw.keys() {
            if self.schema.field(key).is_none() {
                debug!(field = %key, "ignoring unrecognised input field");
            }
        }

        let mut values = vec![0.0f32; self.feature_names.len()];
        for (field, slot) in self.schema.fields().iter().zip(&self.slots) {
            let value = field
                .coerce(raw.get(&field.name))
                .map_err(|reason| ValidationError::new(&field.name, reason))?;

            match (slot, value) {
                (Slot::Scalar(col), FieldValue::Scalar(x)) => values[*col] = x,
                (Slot::OneHot { start, values: cats }, FieldValue::Category(c)) => {
                    match cats.binary_search(&c) {
                        Ok(i) => values[start + i] = 1.0,
                        Err(_) => {
                            debug!(field = %field.name, value = %c, "unknown category, indicators left at zero");
                        }
                    }
                }
                (Slot::Ordinal { column, encoder }, FieldValue::Category(c)) => {
                    let code = encoder.transform(&c).ok_or_else(|| {
                        ValidationError::new(&field.name, Invalid::UnknownCategory(c.clone()))
                    })?;
                    values[*column] = code as f32;
                }
                _ => return Err(EncodeError::SlotMismatch(field.name.clone())),
            }
        }

        let record = EncodedRecord::try_new(self.arrow_schema.clone(), &values)?;
        debug!(columns = record.len(), "encoded feature record");
        Ok(record)
    }
}

fn slots_use_encoder(schema: &FeatureSchema, name: &str) -> bool {
    schema
        .field(name)
        .is_some_and(|f| f.values().is_some() && !f.is_one_hot())
}

/// The artifact's encoder must cover every category the form can produce.
/// Schema validation keeps defaults (and the multi-select `none` sentinel)
/// among the declared values, so this covers them too.
fn check_category_encoder(field: &FieldSpec, encoder: &LabelEncoder) -> Result<(), SchemaError> {
    for value in field.values().unwrap_or_default() {
        if encoder.transform(value).is_none() {
            return Err(SchemaError::InvalidField {
                field: field.name.clone(),
                reason: format!("category encoder does not know declared value {value:?}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::OutOfRange;
    use crate::raw::RawValue;
    use crate::schema::vitamin;

    fn encoder() -> FeatureEncoder {
        FeatureEncoder::one_hot(Arc::new(vitamin::schema())).unwrap()
    }

    fn scenario() -> RawInput {
        RawInput::from_pairs([
            ("age", "30"),
            ("gender", "female"),
            ("diet", "omnivore"),
            ("sun_exposure", "moderate"),
            ("activity_level", "moderately_active"),
            ("health_condition", "none"),
            ("pregnant", "No"),
            ("smoker", "No"),
        ])
    }

    #[test]
    fn encodes_reference_scenario() {
        let rec = encoder().encode(&scenario()).unwrap();
        assert_eq!(rec.len(), vitamin::FEATURE_NAMES.len());
        assert_eq!(rec.feature_names(), vitamin::FEATURE_NAMES);
        assert_eq!(rec.value("age"), Some(30.0));
        assert_eq!(rec.value("gender_female"), Some(1.0));
        assert_eq!(rec.value("gender_male"), Some(0.0));
        assert_eq!(rec.value("gender_other"), Some(0.0));
        assert_eq!(rec.value("pregnant"), Some(0.0));
        assert_eq!(rec.value("smoker"), Some(0.0));
        // Hidden fields take their training-time backfill.
        assert_eq!(rec.value("sun_hours_per_week"), Some(10.0));
        assert_eq!(rec.value("vitamin_d_level"), Some(20.0));
    }

    #[test]
    fn full_vector_for_reference_scenario() {
        let rec = encoder().encode(&scenario()).unwrap();
        #[rustfmt::skip]
        let expected = vec![
            30.0, 10.0, 20.0, 0.0, 0.0,
            1.0, 0.0, 0.0,
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        ];
        assert_eq!(rec.values(), expected);
    }

    #[test]
    fn omitting_any_field_equals_supplying_its_default() {
        let enc = encoder();
        let schema = vitamin::schema();
        let full = scenario()
            .with("sun_hours_per_week", "10")
            .with("vitamin_d_level", "20");
        for field in schema.fields() {
            let mut omitted = full.clone();
            omitted.remove(&field.name);
            let mut explicit = full.clone();
            explicit.insert(field.name.clone(), field.default.clone());
            assert_eq!(
                enc.encode(&omitted).unwrap(),
                enc.encode(&explicit).unwrap(),
                "field {}",
                field.name
            );
        }
    }

    #[test]
    fn empty_input_encodes_all_defaults() {
        let enc = encoder();
        assert_eq!(
            enc.encode(&RawInput::new()).unwrap(),
            enc.encode(&scenario()).unwrap()
        );
    }

    #[test]
    fn missing_health_condition_equals_none() {
        let enc = encoder();
        let mut missing = scenario();
        missing.remove("health_condition");
        let explicit = scenario().with("health_condition", "none");
        assert_eq!(
            enc.encode(&missing).unwrap(),
            enc.encode(&explicit).unwrap()
        );
    }

    #[test]
    fn blank_value_takes_default() {
        let enc = encoder();
        let blank = scenario().with("diet", "  ");
        assert_eq!(
            enc.encode(&blank).unwrap(),
            enc.encode(&scenario()).unwrap()
        );
    }

    #[test]
    fn one_hot_sets_exactly_one_indicator_for_known_values() {
        let enc = encoder();
        let schema = vitamin::schema();
        for field in schema.fields().iter().filter(|f| f.is_one_hot()) {
            for value in field.values().unwrap() {
                let rec = enc.encode(&scenario().with(field.name.clone(), value.as_str())).unwrap();
                let ones: Vec<String> = field
                    .columns()
                    .into_iter()
                    .filter(|c| rec.value(c) == Some(1.0))
                    .collect();
                assert_eq!(ones, vec![format!("{}_{}", field.name, value)]);
            }
        }
    }

    #[test]
    fn unknown_category_zeroes_the_block() {
        let rec = encoder()
            .encode(&scenario().with("diet", "carnivore"))
            .unwrap();
        for col in ["diet_omnivore", "diet_pescatarian", "diet_vegan", "diet_vegetarian"] {
            assert_eq!(rec.value(col), Some(0.0), "{col}");
        }
        assert_eq!(rec.value("gender_female"), Some(1.0));
    }

    #[test]
    fn binary_accepts_only_yes_and_no() {
        let enc = encoder();
        let yes = enc.encode(&scenario().with("smoker", "Yes")).unwrap();
        assert_eq!(yes.value("smoker"), Some(1.0));
        let no = enc.encode(&scenario().with("smoker", "No")).unwrap();
        assert_eq!(no.value("smoker"), Some(0.0));

        let err = enc.encode(&scenario().with("smoker", "maybe")).unwrap_err();
        match err {
            EncodeError::Validation(v) => {
                assert_eq!(v.field, "smoker");
                assert!(matches!(v.reason, Invalid::UnknownToken { .. }));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_age_is_a_validation_error() {
        let err = encoder()
            .encode(&scenario().with("age", "abc"))
            .unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Validation(ValidationError { ref field, reason: Invalid::NotNumeric(_) })
                if field == "age"
        ));
    }

    #[test]
    fn age_out_of_range_is_rejected() {
        let err = encoder().encode(&scenario().with("age", "101")).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Validation(ValidationError {
                reason: Invalid::OutOfRange { .. },
                ..
            })
        ));
    }

    #[test]
    fn column_order_ignores_input_key_order() {
        let enc = encoder();
        let forward = RawInput::from_pairs([("age", "55"), ("smoker", "Yes"), ("diet", "vegan")]);
        let reverse = RawInput::from_pairs([("diet", "vegan"), ("smoker", "Yes"), ("age", "55")]);
        let a = enc.encode(&forward).unwrap();
        let b = enc.encode(&reverse).unwrap();
        assert_eq!(a.feature_names(), vitamin::FEATURE_NAMES);
        assert_eq!(a, b);
    }

    #[test]
    fn unrecognised_fields_are_ignored() {
        let enc = encoder();
        let extra = scenario().with("favourite_colour", "green");
        assert_eq!(
            enc.encode(&extra).unwrap(),
            enc.encode(&scenario()).unwrap()
        );
    }

    #[test]
    fn check_against_flags_model_schema_drift() {
        let enc = encoder();
        let mut expected: Vec<String> = vitamin::FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        assert!(enc.check_against(&expected).is_ok());
        expected.swap(3, 4);
        let err = enc.check_against(&expected).unwrap_err();
        assert_eq!(err.first_difference(), 3);
    }

    // ── Ordinal and multi-select ──

    fn ordinal_schema() -> Arc<FeatureSchema> {
        Arc::new(
            FeatureSchema::new(vec![
                FieldSpec::numeric("age", 30.0).with_bounds(Some(1.0), Some(100.0), OutOfRange::Clamp),
                FieldSpec::categorical("sun_exposure", &["low", "moderate", "high"], "moderate")
                    .ordinal(),
                FieldSpec::multi_select(
                    "health_conditions",
                    &["none", "osteoporosis", "malabsorption", "malabsorption+osteoporosis"],
                    "none",
                ),
            ])
            .unwrap(),
        )
    }

    fn sun_encoder() -> HashMap<String, LabelEncoder> {
        HashMap::from([(
            "sun_exposure".to_string(),
            LabelEncoder::fit(["low", "moderate", "high"]),
        )])
    }

    #[test]
    fn ordinal_uses_artifact_codes() {
        let enc = FeatureEncoder::new(ordinal_schema(), &sun_encoder()).unwrap();
        assert_eq!(
            enc.feature_names(),
            &[
                "age",
                "sun_exposure",
                "health_conditions_malabsorption",
                "health_conditions_malabsorption+osteoporosis",
                "health_conditions_none",
                "health_conditions_osteoporosis",
            ]
        );
        // fit() sorts: high=0, low=1, moderate=2.
        let rec = enc.encode(&RawInput::new().with("sun_exposure", "low")).unwrap();
        assert_eq!(rec.value("sun_exposure"), Some(1.0));
        let rec = enc.encode(&RawInput::new()).unwrap();
        assert_eq!(rec.value("sun_exposure"), Some(2.0));
    }

    #[test]
    fn ordinal_rejects_unseen_category() {
        let enc = FeatureEncoder::new(ordinal_schema(), &sun_encoder()).unwrap();
        let err = enc
            .encode(&RawInput::new().with("sun_exposure", "extreme"))
            .unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Validation(ValidationError {
                reason: Invalid::UnknownCategory(_),
                ..
            })
        ));
    }

    #[test]
    fn ordinal_needs_an_artifact_encoder() {
        let err = FeatureEncoder::new(ordinal_schema(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingCategoryEncoder(f) if f == "sun_exposure"));
    }

    #[test]
    fn ordinal_encoder_must_cover_declared_values() {
        let partial = HashMap::from([(
            "sun_exposure".to_string(),
            LabelEncoder::fit(["low", "high"]),
        )]);
        let err = FeatureEncoder::new(ordinal_schema(), &partial).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));
    }

    #[test]
    fn multi_select_canonicalises_before_one_hot() {
        let enc = FeatureEncoder::new(ordinal_schema(), &sun_encoder()).unwrap();
        let mut input = RawInput::new();
        input.push("health_conditions", "osteoporosis");
        input.push("health_conditions", "malabsorption");
        let rec = enc.encode(&input).unwrap();
        assert_eq!(
            rec.value("health_conditions_malabsorption+osteoporosis"),
            Some(1.0)
        );
        assert_eq!(rec.value("health_conditions_osteoporosis"), Some(0.0));

        let empty = enc
            .encode(&RawInput::new().with("health_conditions", RawValue::Many(vec![])))
            .unwrap();
        assert_eq!(empty.value("health_conditions_none"), Some(1.0));
    }

    fn ordinal_conditions_schema() -> Arc<FeatureSchema> {
        Arc::new(
            FeatureSchema::new(vec![
                FieldSpec::numeric("age", 30.0),
                FieldSpec::multi_select(
                    "health_conditions",
                    &["none", "osteoporosis", "malabsorption", "malabsorption+osteoporosis"],
                    "none",
                )
                .ordinal(),
            ])
            .unwrap(),
        )
    }

    fn conditions_encoder() -> HashMap<String, LabelEncoder> {
        HashMap::from([(
            "health_conditions".to_string(),
            LabelEncoder::fit(["none", "osteoporosis", "malabsorption", "malabsorption+osteoporosis"]),
        )])
    }

    #[test]
    fn ordinal_multi_select_looks_up_the_canonical_selection() {
        let enc = FeatureEncoder::new(ordinal_conditions_schema(), &conditions_encoder()).unwrap();
        assert_eq!(enc.feature_names(), &["age", "health_conditions"]);

        // fit() sorts: malabsorption=0, malabsorption+osteoporosis=1, none=2, osteoporosis=3.
        let mut input = RawInput::new();
        input.push("health_conditions", "osteoporosis");
        input.push("health_conditions", "malabsorption");
        let rec = enc.encode(&input).unwrap();
        assert_eq!(rec.value("health_conditions"), Some(1.0));

        let joined = enc
            .encode(&RawInput::new().with("health_conditions", "osteoporosis+malabsorption"))
            .unwrap();
        assert_eq!(joined, rec);

        let empty = enc.encode(&RawInput::new()).unwrap();
        assert_eq!(empty.value("health_conditions"), Some(2.0));
    }

    #[test]
    fn ordinal_multi_select_encoder_must_know_the_none_sentinel() {
        let without_none = HashMap::from([(
            "health_conditions".to_string(),
            LabelEncoder::fit(["osteoporosis", "malabsorption", "malabsorption+osteoporosis"]),
        )]);
        let err = FeatureEncoder::new(ordinal_conditions_schema(), &without_none).unwrap_err();
        match err {
            SchemaError::InvalidField { field, reason } => {
                assert_eq!(field, "health_conditions");
                assert!(reason.contains("\"none\""), "{reason}");
            }
            other => panic!("expected invalid field, got {other:?}"),
        }
    }

    #[test]
    fn ordinal_multi_select_rejects_unseen_combination() {
        let enc = FeatureEncoder::new(ordinal_conditions_schema(), &conditions_encoder()).unwrap();
        let mut input = RawInput::new();
        input.push("health_conditions", "osteoporosis");
        input.push("health_conditions", "chronic_kidney");
        let err = enc.encode(&input).unwrap_err();
        match err {
            EncodeError::Validation(v) => {
                assert_eq!(v.field, "health_conditions");
                assert_eq!(
                    v.reason,
                    Invalid::UnknownCategory("chronic_kidney+osteoporosis".into())
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn vitamin_d_level_beyond_f32_is_rejected() {
        let err = encoder()
            .encode(&scenario().with("vitamin_d_level", "1e39"))
            .unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Validation(ValidationError { ref field, reason: Invalid::NotFinite(_) })
                if field == "vitamin_d_level"
        ));
    }

    #[test]
    fn mismatched_slot_is_an_error() {
        let mut enc = encoder();
        // age (scalar) and gender (one-hot) trade slots.
        enc.slots.swap(0, 5);
        let err = enc.encode(&scenario()).unwrap_err();
        assert!(matches!(err, EncodeError::SlotMismatch(ref f) if f == "age"));
    }

    #[test]
    fn clamped_age() {
        let enc = FeatureEncoder::new(ordinal_schema(), &sun_encoder()).unwrap();
        let rec = enc.encode(&RawInput::new().with("age", "250")).unwrap();
        assert_eq!(rec.value("age"), Some(100.0));
    }

    #[test]
    fn encoder_is_shareable_across_threads() {
        let enc = Arc::new(encoder());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let enc = Arc::clone(&enc);
                std::thread::spawn(move || {
                    let age = (20 + i).to_string();
                    enc.encode(&RawInput::new().with("age", age.as_str()))
                        .unwrap()
                        .value("age")
                })
            })
            .collect();
        let ages: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ages, vec![Some(20.0), Some(21.0), Some(22.0), Some(23.0)]);
    }
}
