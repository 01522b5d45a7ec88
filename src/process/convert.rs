use arrow::{
    array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray, TimestampMicrosecondBuilder},
    compute::cast,
    datatypes::{DataType, TimeUnit},
    error::ArrowError,
};
use std::sync::Arc;
use thiserror::Error;

use crate::process::date_parser;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("row {row}: cannot parse {value:?} as a timestamp")]
    Unparseable { row: usize, value: String },
    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

/// Timestamps are stored as naive microseconds.
pub fn canonical_timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

pub fn is_canonical_timestamp(dt: &DataType) -> bool {
    matches!(dt, DataType::Timestamp(TimeUnit::Microsecond, None))
}

/// Convert any date-ish column into canonical timestamps.
///
/// Temporal columns are cast, text is parsed value by value, and anything else
/// is rendered to text first. Nulls stay null; the first non-null value that
/// does not parse is returned as `Unparseable`.
pub fn to_canonical_timestamps(arr: &ArrayRef) -> Result<ArrayRef, ConvertError> {
    match arr.data_type() {
        dt if is_canonical_timestamp(dt) => Ok(arr.clone()),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            Ok(cast(arr, &canonical_timestamp_type())?)
        }
        DataType::Null => Ok(Arc::new(TimestampMicrosecondArray::new_null(arr.len()))),
        DataType::Utf8 => parse_strings(downcast_utf8(arr)?),
        _ => {
            let text = cast(arr, &DataType::Utf8)?;
            parse_strings(downcast_utf8(&text)?)
        }
    }
}

fn downcast_utf8(arr: &ArrayRef) -> Result<&StringArray, ConvertError> {
    arr.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
        ConvertError::Arrow(ArrowError::CastError(format!(
            "expected Utf8, found {}",
            arr.data_type()
        )))
    })
}

fn parse_strings(sarr: &StringArray) -> Result<ArrayRef, ConvertError> {
    let mut b = TimestampMicrosecondBuilder::with_capacity(sarr.len());
    for (row, opt) in sarr.iter().enumerate() {
        match opt {
            None => b.append_null(),
            Some(raw) if raw.trim().is_empty() => b.append_null(),
            Some(raw) => match date_parser::parse_timestamp_micros(raw) {
                Some(ts) => b.append_value(ts),
                None => {
                    return Err(ConvertError::Unparseable {
                        row,
                        value: raw.to_string(),
                    })
                }
            },
        }
    }
    Ok(Arc::new(b.finish()))
}
