use crate::codelists;
use crate::data::property_string;
use crate::datasets::{DATASETS, STATION_DIMENSION};
use crate::normalize::{institution_code, pad};
use crate::store::{DimensionalStore, StoreError};
use crate::types::{Classifier, Dimension, Row, UNASSIGNED_CODE};
use geojson::FeatureCollection;
use std::collections::BTreeMap;
use tracing::info;

pub const MACROZONE_DIMENSION: &str = "fipafan2019.macrozona";
pub const INSTITUTION_DIMENSION: &str = "fipafan2019.institucion";
const PROVINCE_DIMENSION: &str = "bcn.provincia";
const COMUNA_DIMENSION: &str = "bcn.comuna";
const NO_PROVINCE: &str = "000";
const NO_COMUNA: &str = "00000";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub dimensions: usize,
    pub rows: usize,
    pub variables: usize,
}

struct Provisioner<'a> {
    store: &'a dyn DimensionalStore,
    summary: ProvisionSummary,
}

impl<'a> Provisioner<'a> {
    async fn dimension(&mut self, dimension: Dimension) -> Result<(), StoreError> {
        info!("Dimension {}", dimension.code);
        self.store.save_dimension(&dimension).await?;
        self.summary.dimensions += 1;
        Ok(())
    }

    async fn rows(&mut self, dimension_code: &str, rows: &[Row]) -> Result<(), StoreError> {
        for row in rows {
            self.store.save_row(dimension_code, row).await?;
            self.summary.rows += 1;
        }
        info!("  {} rows in {}", rows.len(), dimension_code);
        Ok(())
    }
}

pub fn macrozone_rows(macrozones: &FeatureCollection) -> Vec<Row> {
    let mut rows: Vec<Row> = macrozones
        .features
        .iter()
        .filter_map(|f| {
            let id = property_string(f, "id")?;
            let name = property_string(f, "nombre").unwrap_or_else(|| id.clone());
            let province =
                property_string(f, "codigoProvincia").unwrap_or_else(|| NO_PROVINCE.to_string());
            Some(Row::new(pad(&id, 2), name).with("provincia", province))
        })
        .collect();
    rows.push(Row::new(UNASSIGNED_CODE, "Sin Macrozona Asociada").with("provincia", NO_PROVINCE));
    rows
}

/// Distinct institutions found on the stations, keyed by normalized code.
/// The reserved "No Indicada" row is always present.
pub fn institution_rows(stations: &FeatureCollection) -> Vec<Row> {
    let mut institutions: BTreeMap<String, String> = BTreeMap::new();
    let (code, name) = institution_code(None);
    institutions.insert(code, name);
    for f in &stations.features {
        let (code, name) = institution_code(property_string(f, "nombreInstitucion").as_deref());
        institutions.entry(code).or_insert(name);
    }
    institutions
        .into_iter()
        .map(|(code, name)| Row::new(code, name))
        .collect()
}

pub fn station_rows(stations: &FeatureCollection) -> Vec<Row> {
    let mut rows: Vec<Row> = stations
        .features
        .iter()
        .filter_map(|f| {
            let code = property_string(f, "_codigoDimension")?;
            let name = property_string(f, "nombre").unwrap_or_else(|| code.clone());
            let macrozone = property_string(f, "codigoMacrozona")
                .unwrap_or_else(|| UNASSIGNED_CODE.to_string());
            let comuna =
                property_string(f, "codigoComuna").unwrap_or_else(|| NO_COMUNA.to_string());
            let (institution, _) =
                institution_code(property_string(f, "nombreInstitucion").as_deref());
            Some(
                Row::new(code, name)
                    .with("macrozona", macrozone)
                    .with("comuna", comuna)
                    .with("institucion", institution),
            )
        })
        .collect();
    rows.push(
        Row::new(UNASSIGNED_CODE, "Estación No Identificada")
            .with("macrozona", UNASSIGNED_CODE)
            .with("comuna", NO_COMUNA)
            .with("institucion", UNASSIGNED_CODE),
    );
    rows
}

/// Provisions the whole schema from the cached macrozone and station layers.
pub async fn provision(
    store: &dyn DimensionalStore,
    macrozones: &FeatureCollection,
    stations: &FeatureCollection,
) -> Result<ProvisionSummary, StoreError> {
    let mut p = Provisioner {
        store,
        summary: ProvisionSummary::default(),
    };

    // 1. Macrozones
    p.dimension(Dimension {
        code: MACROZONE_DIMENSION.to_string(),
        name: "Macrozona FIPA-FAN-2019".to_string(),
        classifiers: vec![Classifier::new("provincia", "Provincia", PROVINCE_DIMENSION, NO_PROVINCE)],
    })
    .await?;
    p.rows(MACROZONE_DIMENSION, &macrozone_rows(macrozones)).await?;

    // 2. Institutions
    p.dimension(Dimension {
        code: INSTITUTION_DIMENSION.to_string(),
        name: "Institución FIPA-FAN-2019".to_string(),
        classifiers: vec![],
    })
    .await?;
    p.rows(INSTITUTION_DIMENSION, &institution_rows(stations)).await?;

    // 3. Code lists
    for list in codelists::all() {
        p.dimension(Dimension {
            code: list.dimension.to_string(),
            name: list.name.to_string(),
            classifiers: vec![],
        })
        .await?;
        p.rows(list.dimension, &list.rows()).await?;
    }

    // 4. Stations, which reference all of the above
    p.dimension(Dimension {
        code: STATION_DIMENSION.to_string(),
        name: "Estaciones FIPA-FAN-2019".to_string(),
        classifiers: vec![
            Classifier::new("macrozona", "Macrozona", MACROZONE_DIMENSION, UNASSIGNED_CODE),
            Classifier::new("comuna", "Comuna", COMUNA_DIMENSION, NO_COMUNA),
            Classifier::new("institucion", "Institución", INSTITUTION_DIMENSION, UNASSIGNED_CODE),
        ],
    })
    .await?;
    p.rows(STATION_DIMENSION, &station_rows(stations)).await?;

    // 5. Variables
    for layout in DATASETS.iter() {
        let variable = layout.variable_definition();
        info!("Variable {}", variable.code);
        p.store.save_variable(&variable).await?;
        p.summary.variables += 1;
    }

    info!(
        "Provisioned {} dimensions, {} rows, {} variables",
        p.summary.dimensions, p.summary.rows, p.summary.variables
    );
    Ok(p.summary)
}
