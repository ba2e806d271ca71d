pub mod encoder;
pub mod error;
pub mod field;
pub mod labels;
pub mod raw;
pub mod record;
pub mod schema;

pub use encoder::FeatureEncoder;
pub use error::{EncodeError, Invalid, SchemaError, SchemaMismatch, ValidationError};
pub use field::{CategoricalEncoding, FieldKind, FieldSpec, FieldValue, OutOfRange};
pub use labels::LabelEncoder;
pub use raw::{RawInput, RawValue};
pub use record::EncodedRecord;
pub use schema::{FeatureSchema, vitamin};
