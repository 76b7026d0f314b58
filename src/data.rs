use anyhow::{anyhow, Context, Result};
use geo::Point;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Reads a GeoJSON FeatureCollection and sets its `name` label.
pub fn load_collection(path: &Path, name: &str) -> Result<FeatureCollection> {
    info!("Loading GeoJSON from {:?}...", path);
    let file = File::open(path).with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let reader = BufReader::new(file);

    // Parse the GeoJSON. warning: this loads the whole file into memory.
    let geojson = GeoJson::from_reader(reader)
        .with_context(|| format!("Failed to parse GeoJSON: {:?}", path))?;

    let mut collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection: {:?}", path)),
    };
    set_collection_name(&mut collection, name);
    Ok(collection)
}

/// Persists an enriched collection as a derived artifact.
pub fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer(BufWriter::new(file), collection)
        .with_context(|| format!("Failed to write GeoJSON: {:?}", path))?;
    info!("Wrote {} features to {:?}", collection.features.len(), path);
    Ok(())
}

pub fn set_collection_name(collection: &mut FeatureCollection, name: &str) {
    collection
        .foreign_members
        .get_or_insert_with(JsonObject::new)
        .insert("name".to_string(), json!(name));
}

pub fn collection_name(collection: &FeatureCollection) -> Option<&str> {
    collection.foreign_members.as_ref()?.get("name")?.as_str()
}

/// Reads a string or numeric property as a string.
pub fn property_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.properties.as_ref()?.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn point_of(feature: &Feature) -> Option<Point<f64>> {
    match &feature.geometry.as_ref()?.value {
        Value::Point(c) if c.len() >= 2 && c[0].is_finite() && c[1].is_finite() => {
            Some(Point::new(c[0], c[1]))
        }
        _ => None,
    }
}

/// Fetches the comuna polygons served by the external layer host.
pub async fn fetch_comunas(client: &reqwest::Client, base_url: &str) -> Result<Vec<Feature>> {
    let url = format!("{}/consulta", base_url.trim_end_matches('/'));
    info!("Fetching comunas from {}", url);
    let body = json!({
        "formato": "geoJSON",
        "args": {"codigoVariable": "Comunas"}
    });
    let resp = client.post(&url).json(&body).send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        anyhow::bail!("HTTP {} from {}: {}", status, url, text);
    }
    let collection: FeatureCollection = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse comunas from {}", url))?;
    info!("Fetched {} comunas", collection.features.len());
    Ok(collection.features)
}
