//! The encoded model input: one row, all `Float32`, named feature columns.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float32Array};
use arrow::datatypes::{DataType, Float32Type, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::error::{EncodeError, SchemaMismatch};

/// A single-row feature table whose column names and order match the
/// schema the model was trained against.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    batch: RecordBatch,
}

impl EncodedRecord {
    /// Build from positional values laid out by `schema`.
    pub fn try_new(schema: SchemaRef, values: &[f32]) -> Result<Self, EncodeError> {
        let columns: Vec<ArrayRef> = values
            .iter()
            .map(|&v| Arc::new(Float32Array::from(vec![v])) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(schema, columns)?;
        Self::from_batch(batch)
    }

    /// Wrap an existing batch, checking it is one row of non-null `Float32`.
    pub fn from_batch(batch: RecordBatch) -> Result<Self, EncodeError> {
        if batch.num_rows() != 1 {
            return Err(ArrowError::InvalidArgumentError(format!(
                "encoded record must have exactly one row, got {}",
                batch.num_rows()
            ))
            .into());
        }
        for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
            if field.data_type() != &DataType::Float32 {
                return Err(ArrowError::SchemaError(format!(
                    "feature column `{}` is {}, expected Float32",
                    field.name(),
                    field.data_type()
                ))
                .into());
            }
            if column.is_null(0) {
                return Err(ArrowError::InvalidArgumentError(format!(
                    "feature column `{}` is null",
                    field.name()
                ))
                .into());
            }
        }
        Ok(Self { batch })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Number of feature columns.
    pub fn len(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_columns() == 0
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Row values in column order.
    pub fn values(&self) -> Vec<f32> {
        self.batch
            .columns()
            .iter()
            .map(|col| col.as_primitive::<Float32Type>().value(0))
            .collect()
    }

    /// Value of a named column.
    pub fn value(&self, name: &str) -> Option<f32> {
        self.batch
            .column_by_name(name)
            .map(|col| col.as_primitive::<Float32Type>().value(0))
    }

    /// Check the columns against a model's expected input.
    pub fn ensure_columns(&self, expected: &[String]) -> Result<(), SchemaMismatch> {
        SchemaMismatch::check(expected, &self.feature_names())
    }
}
