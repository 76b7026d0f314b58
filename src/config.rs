use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub bcn: BcnConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub resources_dir: PathBuf,
    #[serde(default = "default_macrozones_source")]
    pub macrozones_source: String,
    #[serde(default = "default_stations_source")]
    pub stations_source: String,
    #[serde(default = "default_macrozones_cache")]
    pub macrozones_cache: String,
    #[serde(default = "default_stations_cache")]
    pub stations_cache: String,
    pub comunas_file: Option<PathBuf>, // takes precedence over bcn.url
    pub csv_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub token: Option<String>,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BcnConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_web_dir")]
    pub web_dir: PathBuf,
}

fn default_macrozones_source() -> String {
    "macrozonas-sanitarias.geojson".to_string()
}

fn default_stations_source() -> String {
    "estaciones.geojson".to_string()
}

fn default_macrozones_cache() -> String {
    "macrozonas-sanitarias-fipa.geojson".to_string()
}

fn default_stations_cache() -> String {
    "estaciones-fipa.geojson".to_string()
}

fn default_time_zone() -> String {
    "America/Santiago".to_string()
}

fn default_web_dir() -> PathBuf {
    PathBuf::from("www")
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        // time zone must parse before any command runs
        config.time_zone()?;
        Ok(config)
    }

    pub fn time_zone(&self) -> Result<Tz> {
        self.store
            .time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid time zone '{}': {}", self.store.time_zone, e))
    }

    pub fn macrozones_source_path(&self) -> PathBuf {
        self.input.resources_dir.join(&self.input.macrozones_source)
    }

    pub fn stations_source_path(&self) -> PathBuf {
        self.input.resources_dir.join(&self.input.stations_source)
    }

    pub fn macrozones_cache_path(&self) -> PathBuf {
        self.input.resources_dir.join(&self.input.macrozones_cache)
    }

    pub fn stations_cache_path(&self) -> PathBuf {
        self.input.resources_dir.join(&self.input.stations_cache)
    }
}
