use crate::codelists::{CodeList, DEPTHS, PROGRAMS, RESOURCES, SPECIES, WIND_DIRECTIONS};
use crate::types::{Classifier, DefQuery, Variable, VariableOptions, UNASSIGNED_CODE};

pub const STATION_DIMENSION: &str = "fipafan2019.estacion";

/// How a value cell turns into the posted number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEncoding {
    /// The cell is a decimal number.
    Number,
    /// `+` posts 1, `-` posts 0, anything else discards the whole row.
    PresenceMarker,
}

impl ValueEncoding {
    /// `None` means the cell yields no point.
    pub fn decode(self, cell: &str) -> Option<f64> {
        let cell = cell.trim();
        match self {
            ValueEncoding::Number => cell.parse::<f64>().ok().filter(|v| v.is_finite()),
            ValueEncoding::PresenceMarker => match cell {
                "+" => Some(1.0),
                "-" => Some(0.0),
                _ => None,
            },
        }
    }

    /// Whether an undecodable cell invalidates the whole row rather than
    /// only that cell.
    pub fn discards_row(self) -> bool {
        matches!(self, ValueEncoding::PresenceMarker)
    }
}

/// A column whose text is a classifier value resolved through a code list.
pub struct ClassifierColumn {
    pub field: &'static str,
    pub name: &'static str,
    pub column: usize,
    pub list: &'static CodeList,
}

/// A numeric column, optionally tagged with a fixed classifier code (the
/// depth or species the column stands for).
pub struct ValueColumn {
    pub column: usize,
    pub code: Option<&'static str>,
}

/// Dimension that tags the parallel value columns of a row.
pub struct ValueClassifier {
    pub field: &'static str,
    pub name: &'static str,
    pub list: &'static CodeList,
}

pub struct VariableSpec {
    pub code: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub decimals: u8,
    pub accum: &'static str,
}

pub struct DatasetLayout {
    pub key: &'static str,
    pub file_name: &'static str,
    pub columns: usize,
    pub station_column: usize,
    pub program_column: usize,
    pub date_column: usize,
    pub date_format: &'static str,
    pub classifier_columns: &'static [ClassifierColumn],
    pub value_classifier: Option<ValueClassifier>,
    pub value_columns: &'static [ValueColumn],
    pub encoding: ValueEncoding,
    /// Local dates bounding the data replaced on every import.
    pub window: ((i32, u32, u32), (i32, u32, u32)),
    pub variable: VariableSpec,
}

const DATE_FORMAT: &str = "%d/%m/%Y";
const WINDOW: ((i32, u32, u32), (i32, u32, u32)) = ((2000, 1, 1), (2100, 1, 1));

const WIND_COLUMN: &[ClassifierColumn] = &[ClassifierColumn {
    field: "direccionViento",
    name: "Dirección del Viento",
    column: 3,
    list: &WIND_DIRECTIONS,
}];

const DEPTH_COLUMNS: &[ValueColumn] = &[
    ValueColumn { column: 4, code: Some("01") },
    ValueColumn { column: 5, code: Some("02") },
    ValueColumn { column: 6, code: Some("03") },
    ValueColumn { column: 7, code: Some("04") },
];

const BY_DEPTH: ValueClassifier = ValueClassifier {
    field: "profundidad",
    name: "Profundidad",
    list: &DEPTHS,
};

const fn depth_profile(key: &'static str, file_name: &'static str, variable: VariableSpec) -> DatasetLayout {
    DatasetLayout {
        key,
        file_name,
        columns: 8,
        station_column: 0,
        program_column: 1,
        date_column: 2,
        date_format: DATE_FORMAT,
        classifier_columns: WIND_COLUMN,
        value_classifier: Some(BY_DEPTH),
        value_columns: DEPTH_COLUMNS,
        encoding: ValueEncoding::Number,
        window: WINDOW,
        variable,
    }
}

pub static DATASETS: [DatasetLayout; 5] = [
    depth_profile(
        "oxigeno",
        "oxigeno.csv",
        VariableSpec {
            code: "fipafan2019.oxigeno",
            name: "Oxígeno Disuelto",
            unit: "mg/L",
            decimals: 2,
            accum: "avg",
        },
    ),
    depth_profile(
        "clorofila",
        "clorofila.csv",
        VariableSpec {
            code: "fipafan2019.clorofila",
            name: "Clorofila",
            unit: "µg/L",
            decimals: 2,
            accum: "avg",
        },
    ),
    depth_profile(
        "salinidad",
        "salinidad.csv",
        VariableSpec {
            code: "fipafan2019.salinidad",
            name: "Salinidad",
            unit: "PSU",
            decimals: 2,
            accum: "avg",
        },
    ),
    DatasetLayout {
        key: "abundancia",
        file_name: "abundancia-relativa.csv",
        columns: 8,
        station_column: 0,
        program_column: 1,
        date_column: 2,
        date_format: DATE_FORMAT,
        classifier_columns: &[],
        value_classifier: Some(ValueClassifier {
            field: "especie",
            name: "Especie",
            list: &SPECIES,
        }),
        value_columns: &[
            ValueColumn { column: 3, code: Some("01") },
            ValueColumn { column: 4, code: Some("02") },
            ValueColumn { column: 5, code: Some("03") },
            ValueColumn { column: 6, code: Some("04") },
            ValueColumn { column: 7, code: Some("05") },
        ],
        encoding: ValueEncoding::Number,
        window: WINDOW,
        variable: VariableSpec {
            code: "fipafan2019.abundanciaRelativa",
            name: "Abundancia Relativa",
            unit: "nivel",
            decimals: 0,
            accum: "max",
        },
    },
    DatasetLayout {
        key: "toxinas",
        file_name: "toxinas.csv",
        columns: 5,
        station_column: 0,
        program_column: 1,
        date_column: 2,
        date_format: DATE_FORMAT,
        classifier_columns: &[ClassifierColumn {
            field: "recurso",
            name: "Recurso",
            column: 3,
            list: &RESOURCES,
        }],
        value_classifier: None,
        value_columns: &[ValueColumn { column: 4, code: None }],
        encoding: ValueEncoding::PresenceMarker,
        window: WINDOW,
        variable: VariableSpec {
            code: "fipafan2019.toxinas",
            name: "Presencia de Toxinas",
            unit: "presencia",
            decimals: 0,
            accum: "max",
        },
    },
];

pub fn find(key: &str) -> Option<&'static DatasetLayout> {
    DATASETS.iter().find(|d| d.key == key)
}

impl DatasetLayout {
    /// Variable definition, classified by station, program and the
    /// dataset-specific dimensions.
    pub fn variable_definition(&self) -> Variable {
        let mut classifiers = vec![
            Classifier::new("estacion", "Estación", STATION_DIMENSION, UNASSIGNED_CODE),
            Classifier::new("programa", "Programa", PROGRAMS.dimension, UNASSIGNED_CODE),
        ];
        classifiers.extend(
            self.classifier_columns
                .iter()
                .map(|c| Classifier::new(c.field, c.name, c.list.dimension, UNASSIGNED_CODE)),
        );
        if let Some(vc) = &self.value_classifier {
            classifiers.push(Classifier::new(vc.field, vc.name, vc.list.dimension, UNASSIGNED_CODE));
        }

        Variable {
            code: self.variable.code.to_string(),
            name: self.variable.name.to_string(),
            temporality: "1d".to_string(),
            classifiers,
            options: VariableOptions {
                unit: self.variable.unit.to_string(),
                decimals: self.variable.decimals,
                def_query: DefQuery {
                    accum: self.variable.accum.to_string(),
                    temporality: "1M".to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_internally_consistent() {
        for d in DATASETS.iter() {
            let fixed = [d.station_column, d.program_column, d.date_column];
            for c in fixed.iter().chain(d.classifier_columns.iter().map(|c| &c.column)) {
                assert!(*c < d.columns, "{}: column {} out of range", d.key, c);
            }
            for v in d.value_columns {
                assert!(v.column < d.columns, "{}: value column out of range", d.key);
                assert!(!fixed.contains(&v.column));
                if let (Some(code), Some(vc)) = (v.code, &d.value_classifier) {
                    assert!(vc.list.entries.iter().any(|e| e.code == code));
                }
            }
        }
    }

    #[test]
    fn keys_resolve() {
        assert!(find("oxigeno").is_some());
        assert!(find("toxinas").is_some());
        assert!(find("temperatura").is_none());
    }

    #[test]
    fn presence_marker_decoding() {
        let e = ValueEncoding::PresenceMarker;
        assert_eq!(e.decode("+"), Some(1.0));
        assert_eq!(e.decode(" - "), Some(0.0));
        assert_eq!(e.decode(""), None);
        assert_eq!(e.decode("0"), None);
        assert!(e.discards_row());
    }

    #[test]
    fn number_decoding_rejects_garbage() {
        let e = ValueEncoding::Number;
        assert_eq!(e.decode("7.25"), Some(7.25));
        assert_eq!(e.decode(""), None);
        assert_eq!(e.decode("s/d"), None);
        assert_eq!(e.decode("NaN"), None);
        assert!(!e.discards_row());
    }

    #[test]
    fn oxygen_variable_is_classified_by_depth_and_wind() {
        let v = find("oxigeno").unwrap().variable_definition();
        let fields: Vec<&str> = v.classifiers.iter().map(|c| c.field_name.as_str()).collect();
        assert_eq!(fields, ["estacion", "programa", "direccionViento", "profundidad"]);
        assert_eq!(v.options.def_query.accum, "avg");
    }
}
