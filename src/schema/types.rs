// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Declared logical type of a required source column.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalType {
    Int,
    Timestamp,
    Text,
    Numeric,
}

impl LogicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Int => "INT",
            LogicalType::Timestamp => "TIMESTAMP",
            LogicalType::Text => "TEXT",
            LogicalType::Numeric => "NUMERIC",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Required column name → declared logical type.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq)]
#[serde(transparent)]
pub struct ExpectedSchema(BTreeMap<String, LogicalType>);

impl ExpectedSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, LogicalType)>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    pub fn get(&self, column: &str) -> Option<LogicalType> {
        self.0.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, LogicalType)> {
        self.0.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ExpectedSchema {
    /// The fire-incident source columns every run requires.
    fn default() -> Self {
        Self::new([
            ("Incident Number", LogicalType::Int),
            ("Incident Date", LogicalType::Timestamp),
            ("Address", LogicalType::Text),
            ("City", LogicalType::Text),
            ("zipcode", LogicalType::Text),
            ("Battalion", LogicalType::Text),
            ("Primary Situation", LogicalType::Text),
        ])
    }
}
