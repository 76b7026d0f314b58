use crate::assign::SpatialAssigner;
use crate::config::AppConfig;
use crate::data::{fetch_comunas, load_collection, write_collection};
use crate::normalize::{normalize_macrozones, normalize_stations, MACROZONES_NAME, STATIONS_NAME};
use anyhow::{anyhow, Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson};
use std::fs::File;
use std::io::BufReader;
use tracing::info;

/// Counts of what the prepare step wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareSummary {
    pub macrozones: usize,
    pub stations: usize,
    pub comunas: usize,
}

async fn load_comunas(config: &AppConfig) -> Result<Vec<Feature>> {
    if let Some(path) = &config.input.comunas_file {
        let file = File::open(path).with_context(|| format!("Failed to open comunas: {:?}", path))?;
        return match GeoJson::from_reader(BufReader::new(file))? {
            GeoJson::FeatureCollection(fc) => Ok(fc.features),
            _ => Err(anyhow!("Comunas must be a FeatureCollection")),
        };
    }
    let url = config
        .bcn
        .url
        .as_deref()
        .ok_or_else(|| anyhow!("Neither input.comunas_file nor bcn.url is configured"))?;
    fetch_comunas(&reqwest::Client::new(), url).await
}

/// Normalizes and enriches the raw layers in memory.
pub fn enrich(
    mut macrozones: FeatureCollection,
    mut stations: FeatureCollection,
    comunas: &[Feature],
) -> (FeatureCollection, FeatureCollection) {
    normalize_macrozones(&mut macrozones);
    normalize_stations(&mut stations);
    SpatialAssigner::new(&macrozones.features, comunas).assign_stations(&mut stations);
    (macrozones, stations)
}

/// Builds the derived macrozone and station artifacts from the raw sources.
pub async fn prepare_files(config: &AppConfig) -> Result<PrepareSummary> {
    let macrozones = load_collection(&config.macrozones_source_path(), MACROZONES_NAME)?;
    let stations = load_collection(&config.stations_source_path(), STATIONS_NAME)?;
    let comunas = load_comunas(config).await?;
    info!("Loaded {} comunas", comunas.len());

    let (macrozones, stations) = enrich(macrozones, stations, &comunas);
    write_collection(&config.macrozones_cache_path(), &macrozones)?;
    write_collection(&config.stations_cache_path(), &stations)?;

    Ok(PrepareSummary {
        macrozones: macrozones.features.len(),
        stations: stations.features.len(),
        comunas: comunas.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{collection_name, set_collection_name};
    use crate::layers::LayerCache;
    use crate::testutil::{collection, point_feature, square_feature};
    use serde_json::json;

    fn write(path: &std::path::Path, fc: &FeatureCollection) {
        std::fs::write(path, serde_json::to_string(fc).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn prepared_files_feed_the_layer_cache() {
        let dir = tempfile::tempdir().unwrap();
        let resources = dir.path();
        write(
            &resources.join("macrozonas-sanitarias.geojson"),
            &collection(vec![square_feature(
                json!({"REP_SUBPES": 4, "REP_SUB_10": 10}),
                -74.0,
                -43.0,
                1.0,
            )]),
        );
        write(
            &resources.join("estaciones.geojson"),
            &collection(vec![point_feature(
                json!({"REP_SUBPES": "101", "REP_SUBP_8": "Dalcahue", "REP_SUB_10": "IFOP"}),
                -73.7,
                -42.5,
            )]),
        );
        let mut comunas = collection(vec![square_feature(
            json!({"_codigoDimension": "10201", "codigoRegion": "10", "nombre": "Castro"}),
            -74.0,
            -42.6,
            0.6,
        )]);
        set_collection_name(&mut comunas, "Comunas");
        write(&resources.join("comunas.geojson"), &comunas);

        let toml = format!(
            r#"
            [input]
            resources_dir = {:?}
            comunas_file = {:?}
            csv_dir = {:?}

            [store]
            url = "http://localhost:1"

            [server]
            port = 0
            "#,
            resources,
            resources.join("comunas.geojson"),
            resources
        );
        let config = AppConfig::from_toml(&toml).unwrap();

        let summary = prepare_files(&config).await.unwrap();
        assert_eq!(
            summary,
            PrepareSummary {
                macrozones: 1,
                stations: 1,
                comunas: 1
            }
        );

        let cache = LayerCache::load(&config).unwrap();
        assert_eq!(collection_name(&cache.stations), Some(STATIONS_NAME));
        let station = cache.stations.features[0].properties.as_ref().unwrap();
        assert_eq!(station["codigoMacrozona"], "04");
        assert_eq!(station["codigoComuna"], "10201");
        assert_eq!(station["nombreInstitucion"], "IFOP");
        let macrozone = cache.macrozones.features[0].properties.as_ref().unwrap();
        assert_eq!(macrozone["codigoRegion"], "10");
    }

    #[tokio::test]
    async fn missing_comuna_source_is_an_error() {
        let toml = r#"
            [input]
            resources_dir = "."
            csv_dir = "."
            [store]
            url = "http://localhost:1"
            [server]
            port = 0
        "#;
        let config = AppConfig::from_toml(toml).unwrap();
        assert!(load_comunas(&config).await.is_err());
    }
}
