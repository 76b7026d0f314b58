use crate::codelists::macrozone_info;
use crate::data::property_string;
use crate::types::UNASSIGNED_CODE;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde_json::Value;

pub const MACROZONES_NAME: &str = "SUB Pesca - Macrozonas Sanitarias";
pub const STATIONS_NAME: &str = "FIPA-FAN-2019 - Estaciones de Monitoreo";

// Raw attribute names, as exported from the source shapefiles.
const MACROZONE_ID: &str = "REP_SUBPES";
const MACROZONE_REGION: &str = "REP_SUB_10";
const STATION_ID: &str = "REP_SUBPES";
const STATION_NAME: &str = "REP_SUBP_8";
const STATION_SECTOR: &str = "REP_SUBP_9";
const STATION_INSTITUTION: &str = "REP_SUB_10";

const NO_INSTITUTION_NAME: &str = "No Indicada";

/// Left-pads `code` with zeros up to `width` characters.
pub fn pad(code: &str, width: usize) -> String {
    format!("{:0>width$}", code, width = width)
}

/// JavaScript-style falsiness: null, false, zero, NaN and the empty string.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Removes every property without a value. A missing key is the only
/// representation of "unknown".
pub fn strip_empty(feature: &mut Feature) {
    if let Some(props) = feature.properties.as_mut() {
        props.retain(|_, v| !is_falsy(v));
    }
}

fn set(props: &mut JsonObject, key: &str, value: Option<String>) {
    match value {
        Some(v) => props.insert(key.to_string(), Value::String(v)),
        None => props.remove(key),
    };
}

pub fn normalize_macrozone(feature: &mut Feature) {
    let raw_id = property_string(feature, MACROZONE_ID);
    let raw_region = property_string(feature, MACROZONE_REGION);
    let info = raw_id.as_deref().and_then(macrozone_info);
    let name = info.as_ref().map(|i| i.name.to_string()).or_else(|| raw_id.clone());

    let props = feature.properties.get_or_insert_with(JsonObject::new);
    set(props, "id", raw_id.clone());
    set(props, "nombre", name.clone());
    set(props, "_titulo", name.map(|n| format!("Macrozona Sanitaria: {}", n)));
    set(props, "_codigoDimension", raw_id.map(|id| pad(&id, 2)));
    set(props, "codigoRegion", raw_region.map(|r| pad(&r, 2)));
    set(props, "codigoProvincia", info.map(|i| i.province.to_string()));

    strip_empty(feature);
}

pub fn normalize_station(feature: &mut Feature) {
    let raw_id = property_string(feature, STATION_ID);
    let name = property_string(feature, STATION_NAME);

    let sector = property_string(feature, STATION_SECTOR);
    let institution = property_string(feature, STATION_INSTITUTION);

    let props = feature.properties.get_or_insert_with(JsonObject::new);
    set(props, "id", raw_id.clone());
    set(props, "nombre", name.clone());
    set(props, "_titulo", name.map(|n| format!("Estación: {}", n)));
    set(props, "nombreSector", sector);
    set(props, "nombreInstitucion", institution);
    set(props, "_codigoDimension", raw_id);

    strip_empty(feature);
}

pub fn normalize_macrozones(collection: &mut FeatureCollection) {
    collection.features.iter_mut().for_each(normalize_macrozone);
}

pub fn normalize_stations(collection: &mut FeatureCollection) {
    collection.features.iter_mut().for_each(normalize_station);
}

/// Institution code and display name for a raw institution field.
/// Case and surrounding whitespace are ignored; empty values and the
/// `xx` placeholder map to the reserved code.
pub fn institution_code(raw: Option<&str>) -> (String, String) {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    let code = trimmed.to_lowercase();
    if code.is_empty() || code == "xx" {
        (UNASSIGNED_CODE.to_string(), NO_INSTITUTION_NAME.to_string())
    } else {
        (code, trimmed.to_string())
    }
}
