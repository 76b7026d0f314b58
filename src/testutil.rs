use geojson::{Feature, FeatureCollection};
use serde_json::{json, Value};

/// Axis-aligned square polygon with its lower-left corner at (`x`, `y`).
pub fn square_feature(properties: Value, x: f64, y: f64, size: f64) -> Feature {
    serde_json::from_value(json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]
            ]]
        }
    }))
    .unwrap()
}

pub fn point_feature(properties: Value, x: f64, y: f64) -> Feature {
    serde_json::from_value(json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {"type": "Point", "coordinates": [x, y]}
    }))
    .unwrap()
}

pub fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
