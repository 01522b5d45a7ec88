pub mod family;
pub mod types;
pub mod validate;

pub use family::{type_family, TypeFamily};
pub use types::{ExpectedSchema, LogicalType};
pub use validate::{validate_schema, ValidationReport};
