use serde::Serialize;
use std::collections::BTreeMap;

/// Reserved row code meaning "unassigned/unknown" in every dimension
/// that is used as a default classifier value.
pub const UNASSIGNED_CODE: &str = "00";

/// A classifier declared on a dimension or a variable: a reference to the rows
/// of another dimension, with the code used when nothing resolves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classifier {
    pub field_name: String,
    pub name: String,
    pub dimension_code: String,
    pub default_value: String,
}

impl Classifier {
    pub fn new(field_name: &str, name: &str, dimension_code: &str, default_value: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            name: name.to_string(),
            dimension_code: dimension_code.to_string(),
            default_value: default_value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimension {
    pub code: String,
    pub name: String,
    pub classifiers: Vec<Classifier>,
}

/// One entry of a dimension. Classifier fields are flattened next to
/// `code` and `name`, keyed by the classifier's `fieldName`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub code: String,
    pub name: String,
    #[serde(flatten)]
    pub classifiers: BTreeMap<String, String>,
}

impl Row {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            classifiers: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.classifiers.insert(field.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefQuery {
    pub accum: String,
    pub temporality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableOptions {
    pub unit: String,
    pub decimals: u8,
    pub def_query: DefQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub code: String,
    pub name: String,
    pub temporality: String,
    pub classifiers: Vec<Classifier>,
    pub options: VariableOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub variable_code: String,
    /// Epoch milliseconds.
    pub time: i64,
    pub value: f64,
    pub classifier_values: BTreeMap<String, String>,
}

/// Half-open `[start, end)` range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn contains(&self, time: i64) -> bool {
        time >= self.start && time < self.end
    }
}

/// What a period delete clears: variable-level data, detail-level data, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteScope {
    pub var_data: bool,
    pub details: bool,
}

impl DeleteScope {
    pub const VARIABLE_DATA: DeleteScope = DeleteScope {
        var_data: true,
        details: false,
    };
}
