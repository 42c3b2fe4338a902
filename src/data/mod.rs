//! Field data: field identifiers, value/storage kinds and the field itself.

pub mod field;
pub mod field_id;
pub mod value_type;

pub use field::{Field, FieldHeader, Position};
pub use field_id::FieldId;
pub use value_type::{FieldType, ValueType};
