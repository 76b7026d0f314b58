use crate::config::AppConfig;
use crate::data::load_collection;
use crate::normalize::{MACROZONES_NAME, STATIONS_NAME};
use anyhow::Result;
use geojson::FeatureCollection;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

pub const MACROZONES_LAYER: &str = "MacrozonasSanitarias";
pub const STATIONS_LAYER: &str = "EstacionesMonitoreo";
pub const GEOJSON_FORMAT: &str = "geoJSON";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayerError {
    #[error("Format {0} not supported")]
    UnsupportedFormat(String),
    #[error("Layer code '{0}' not handled")]
    UnknownLayer(String),
}

/// Query arguments sent by the map front end. Only the layer code is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerArgs {
    #[serde(rename = "codigoVariable", default)]
    pub layer: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// The two prepared collections, loaded once and read-only afterwards.
pub struct LayerCache {
    pub macrozones: FeatureCollection,
    pub stations: FeatureCollection,
}

impl LayerCache {
    /// Reads the derived artifacts written by the prepare step.
    pub fn load(config: &AppConfig) -> Result<Self> {
        let macrozones = load_collection(&config.macrozones_cache_path(), MACROZONES_NAME)?;
        info!("Read {} macrozones into cache", macrozones.features.len());
        let stations = load_collection(&config.stations_cache_path(), STATIONS_NAME)?;
        info!("Read {} stations into cache", stations.features.len());
        Ok(Self {
            macrozones,
            stations,
        })
    }

    pub fn query(&self, format: &str, args: &LayerArgs) -> Result<&FeatureCollection, LayerError> {
        if format != GEOJSON_FORMAT {
            return Err(LayerError::UnsupportedFormat(format.to_string()));
        }
        match args.layer.as_str() {
            MACROZONES_LAYER => Ok(&self.macrozones),
            STATIONS_LAYER => Ok(&self.stations),
            other => Err(LayerError::UnknownLayer(other.to_string())),
        }
    }
}
