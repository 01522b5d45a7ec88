// src/schema/validate.rs

use arrow::datatypes::Schema;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};
use tracing::{debug, instrument};

use super::family::{required_logical_type, type_family};
use super::types::ExpectedSchema;

/// Outcome of one schema check. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Expected columns the batch lacks.
    pub missing: BTreeSet<String>,
    /// Batch columns the expected schema does not name.
    pub extra: BTreeSet<String>,
    /// Column → inferred runtime type, where that type contradicts the declared one.
    pub mismatches: BTreeMap<String, String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.mismatches.is_empty()
    }
}

fn join_set<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return f.write_str("schema matches");
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing columns [{}]", join_set(self.missing.iter())));
        }
        if !self.extra.is_empty() {
            parts.push(format!("extra columns [{}]", join_set(self.extra.iter())));
        }
        if !self.mismatches.is_empty() {
            let m = self
                .mismatches
                .iter()
                .map(|(c, t)| format!("{c}: {t}"))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("type mismatches [{m}]"));
        }
        f.write_str(&parts.join("; "))
    }
}

/// Compare a batch schema against the expected column set and type map.
///
/// Pure; reports every discrepancy instead of stopping at the first one.
#[instrument(level = "debug", skip_all, fields(columns = actual.fields().len()))]
pub fn validate_schema(actual: &Schema, expected: &ExpectedSchema) -> ValidationReport {
    let actual_names: BTreeSet<&str> = actual.fields().iter().map(|f| f.name().as_str()).collect();

    let missing = expected
        .iter()
        .filter(|(name, _)| !actual_names.contains(name))
        .map(|(name, _)| name.to_string())
        .collect();

    let extra = actual_names
        .iter()
        .filter(|name| !expected.contains(name))
        .map(|name| name.to_string())
        .collect();

    let mut mismatches = BTreeMap::new();
    for (name, declared) in expected.iter() {
        let Ok(field) = actual.field_with_name(name) else {
            continue;
        };
        if let Some(required) = required_logical_type(type_family(field.data_type())) {
            if required != declared {
                debug!(column = name, %declared, actual = %field.data_type(), "type mismatch");
                mismatches.insert(name.to_string(), field.data_type().to_string());
            }
        }
    }

    ValidationReport {
        missing,
        extra,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogicalType;
    use arrow::datatypes::{DataType, Field, TimeUnit};

    fn fire_schema() -> Schema {
        Schema::new(vec![
            Field::new("Incident Number", DataType::Int64, true),
            Field::new(
                "Incident Date",
                DataType::Timestamp(TimeUnit::Second, None),
                true,
            ),
            Field::new("Address", DataType::Utf8, true),
            Field::new("City", DataType::Utf8, true),
            Field::new("zipcode", DataType::Utf8, true),
            Field::new("Battalion", DataType::Utf8, true),
            Field::new("Primary Situation", DataType::Utf8, true),
        ])
    }

    #[test]
    fn exact_match_passes() {
        let report = validate_schema(&fire_schema(), &ExpectedSchema::default());
        assert!(report.passed(), "{report}");
        assert!(report.missing.is_empty());
        assert!(report.extra.is_empty());
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn missing_battalion_is_the_only_finding() {
        let full = fire_schema();
        let fields: Vec<Field> = full
            .fields()
            .iter()
            .filter(|f| f.name() != "Battalion")
            .map(|f| f.as_ref().clone())
            .collect();
        let report = validate_schema(&Schema::new(fields), &ExpectedSchema::default());

        assert_eq!(report.missing, BTreeSet::from(["Battalion".to_string()]));
        assert!(report.extra.is_empty());
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn reports_extra_columns_and_type_mismatches() {
        let mut fields: Vec<Field> = fire_schema()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields[4] = Field::new("zipcode", DataType::Int64, true);
        fields[1] = Field::new("Incident Date", DataType::Float64, true);
        fields.push(Field::new("neighborhood_district", DataType::Utf8, true));

        let report = validate_schema(&Schema::new(fields), &ExpectedSchema::default());

        assert!(report.missing.is_empty());
        assert_eq!(
            report.extra,
            BTreeSet::from(["neighborhood_district".to_string()])
        );
        assert_eq!(report.mismatches.get("zipcode").map(String::as_str), Some("Int64"));
        assert_eq!(
            report.mismatches.get("Incident Date").map(String::as_str),
            Some("Float64")
        );
        let text = report.to_string();
        assert!(text.contains("neighborhood_district"));
        assert!(text.contains("zipcode: Int64"));
    }

    #[test]
    fn string_runtime_types_are_never_flagged() {
        let expected = ExpectedSchema::new([
            ("Incident Number", LogicalType::Int),
            ("City", LogicalType::Text),
        ]);
        let schema = Schema::new(vec![
            Field::new("Incident Number", DataType::Utf8, true),
            Field::new("City", DataType::Boolean, true),
        ]);
        assert!(validate_schema(&schema, &expected).passed());
    }
}
