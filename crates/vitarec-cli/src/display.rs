//! Vertical card display for schemas, encoded records, and predictions.

use arrow::array::AsArray;
use arrow::datatypes::Float32Type;
use vitarec_ai::{Health, PredictionResult};
use vitarec_core::{
    CategoricalEncoding, EncodedRecord, FeatureSchema, FieldKind, FieldSpec, OutOfRange, RawValue,
};

/// Print every field declaration, then the encoded column order.
pub fn print_schema(schema: &FeatureSchema) {
    println!("=== Input fields ===");
    for field in schema.fields() {
        println!("  {:<26} {}", field.name, describe_field(field));
    }
    println!();

    let names = schema.feature_names();
    println!("=== Feature columns ({}) ===", names.len());
    for (i, name) in names.iter().enumerate() {
        println!("  {i:>3}  {name}");
    }
}

fn describe_field(field: &FieldSpec) -> String {
    let kind = match &field.kind {
        FieldKind::Numeric {
            min,
            max,
            out_of_range,
        } => {
            let lo = min.map(|v| v.to_string()).unwrap_or_default();
            let hi = max.map(|v| format!("={v}")).unwrap_or_default();
            let policy = match out_of_range {
                OutOfRange::Reject => "reject",
                OutOfRange::Clamp => "clamp",
            };
            format!("numeric {lo}..{hi} ({policy})")
        }
        FieldKind::Binary { positive, negative } => format!("binary {positive}/{negative}"),
        FieldKind::Categorical { values, encoding } => {
            format!("categorical [{}] {}", values.join(", "), encoding_name(*encoding))
        }
        FieldKind::MultiSelect {
            values,
            none,
            separator,
            encoding,
        } => format!(
            "multi-select [{}] none={none} sep={separator} {}",
            values.join(", "),
            encoding_name(*encoding)
        ),
    };
    format!("{kind}  default: {}", format_raw(&field.default))
}

fn encoding_name(encoding: CategoricalEncoding) -> &'static str {
    match encoding {
        CategoricalEncoding::OneHot => "one-hot",
        CategoricalEncoding::Ordinal => "ordinal",
    }
}

/// Print one encoded record, one column per line, non-zero values marked.
pub fn print_record(record: &EncodedRecord) {
    let batch = record.batch();
    println!("=== Encoded record ({} columns) ===", record.len());
    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        let value = column.as_primitive::<Float32Type>().value(0);
        let marker = if value != 0.0 { "*" } else { " " };
        println!("  {:<34} {marker} {value}", field.name());
    }
}

pub fn print_prediction(result: &PredictionResult) {
    println!("=== Recommendation: {} ===", result.label);
    println!(
        "  {:<26} {}",
        "predicted_at",
        result.predicted_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !result.input.is_empty() {
        println!();
        println!("Input");
        for (name, value) in result.input.iter() {
            println!("  {:<26} {}", name, format_raw(value));
        }
    }
    if let Some(probabilities) = &result.probabilities {
        println!();
        println!("Confidence");
        for p in probabilities {
            let marker = if p.label == result.label { "<" } else { "" };
            println!("  {:<26} {:>6} {marker}", p.label, p.percent);
        }
    }
    println!();
}

pub fn print_health(health: &Health) {
    match health {
        Health::Ready { features, classes } => {
            println!("=== Model ready ===");
            println!("  {:<26} {}", "features", features);
            println!("  {:<26} {}", "classes", classes);
        }
        Health::Degraded { reason } => {
            println!("=== Model not loaded ===");
            println!("  {:<26} {}", "reason", reason);
        }
    }
}

fn format_raw(value: &RawValue) -> String {
    match value {
        RawValue::One(s) if s.is_empty() => "(empty)".to_string(),
        RawValue::One(s) => s.clone(),
        RawValue::Many(items) if items.is_empty() => "(none)".to_string(),
        RawValue::Many(items) => items.join(", "),
    }
}
