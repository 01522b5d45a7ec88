// src/schema/family.rs

use arrow::datatypes::DataType;

use super::types::LogicalType;

/// Runtime type family of an inferred Arrow column, as seen by the schema check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Float,
    Temporal,
    Other,
}

/// Classify an Arrow `DataType`.
///
/// - Int8..Int64, UInt8..UInt64        → Integer
/// - Float16/32/64, Decimal128/256     → Float
/// - Date32/64, Timestamp(*)           → Temporal
/// - Utf8, LargeUtf8, Boolean, Null, … → Other
pub fn type_family(dt: &DataType) -> TypeFamily {
    match dt {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => TypeFamily::Integer,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => TypeFamily::Float,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => TypeFamily::Temporal,
        _ => TypeFamily::Other,
    }
}

/// The logical type a runtime family must be declared as, if any.
/// `Other` imposes nothing, so `TEXT` columns are never flagged.
pub fn required_logical_type(family: TypeFamily) -> Option<LogicalType> {
    match family {
        TypeFamily::Integer => Some(LogicalType::Int),
        TypeFamily::Float => Some(LogicalType::Numeric),
        TypeFamily::Temporal => Some(LogicalType::Timestamp),
        TypeFamily::Other => None,
    }
}
