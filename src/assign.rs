use crate::data::{point_of, property_string};
use crate::geometry::PolygonIndex;
use crate::normalize::strip_empty;
use crate::types::UNASSIGNED_CODE;
use geo::Point;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Regions where monitoring stations exist; comunas elsewhere are never
/// candidates.
pub const REGION_FILTER: [&str; 3] = ["10", "11", "12"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub codigo_macrozona: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo_comuna: Option<String>,
}

pub struct SpatialAssigner {
    macrozones: PolygonIndex,
    comunas: PolygonIndex,
}

impl SpatialAssigner {
    /// `macrozones` must already be normalized (keyed by `_codigoDimension`);
    /// `comunas` are filtered to `REGION_FILTER` by their `codigoRegion`.
    pub fn new(macrozones: &[Feature], comunas: &[Feature]) -> Self {
        let macrozones = PolygonIndex::from_features(macrozones, "_codigoDimension", |_| true);
        let comunas = PolygonIndex::from_features(comunas, "_codigoDimension", in_region_filter);
        info!(
            "Spatial index: {} macrozones, {} candidate comunas",
            macrozones.len(),
            comunas.len()
        );
        Self { macrozones, comunas }
    }

    pub fn assign(&self, point: &Point<f64>) -> Assignment {
        let codigo_macrozona = self
            .macrozones
            .containing(point)
            .unwrap_or(UNASSIGNED_CODE)
            .to_string();

        let codigo_comuna = self
            .comunas
            .containing(point)
            .or_else(|| self.comunas.nearest_by_vertex(point).map(|(code, km)| {
                debug!("No comuna contains {:?}, nearest vertex at {:.3} km", point, km);
                code
            }))
            .map(str::to_string);

        Assignment {
            codigo_macrozona,
            codigo_comuna,
        }
    }

    /// Adds `codigoMacrozona` and `codigoComuna` to each station, then drops
    /// empty properties.
    pub fn assign_stations(&self, stations: &mut FeatureCollection) {
        for feature in stations.features.iter_mut() {
            let label = property_string(feature, "_codigoDimension").unwrap_or_default();
            let assignment = match point_of(feature) {
                Some(point) => self.assign(&point),
                None => {
                    warn!("Station {} has no point geometry", label);
                    Assignment {
                        codigo_macrozona: UNASSIGNED_CODE.to_string(),
                        codigo_comuna: None,
                    }
                }
            };
            debug!(
                "{} => macrozona {}, comuna {}",
                label,
                assignment.codigo_macrozona,
                assignment.codigo_comuna.as_deref().unwrap_or("-")
            );

            let props = feature.properties.get_or_insert_with(JsonObject::new);
            props.insert(
                "codigoMacrozona".to_string(),
                Value::String(assignment.codigo_macrozona),
            );
            match assignment.codigo_comuna {
                Some(code) => props.insert("codigoComuna".to_string(), Value::String(code)),
                None => props.remove("codigoComuna"),
            };
            strip_empty(feature);
        }
    }
}

fn in_region_filter(feature: &Feature) -> bool {
    property_string(feature, "codigoRegion")
        .map_or(false, |r| REGION_FILTER.contains(&r.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{collection, point_feature, square_feature};
    use serde_json::json;

    fn macrozone(code: &str, x: f64, y: f64, size: f64) -> Feature {
        square_feature(json!({"_codigoDimension": code}), x, y, size)
    }

    fn comuna(code: &str, region: &str, x: f64, y: f64, size: f64) -> Feature {
        square_feature(
            json!({"_codigoDimension": code, "codigoRegion": region, "nombre": code}),
            x,
            y,
            size,
        )
    }

    fn chiloe() -> SpatialAssigner {
        SpatialAssigner::new(
            &[
                macrozone("07", -74.0, -42.0, 1.0),
                macrozone("04", -74.0, -43.0, 1.0),
            ],
            &[
                comuna("10201", "10", -74.0, -42.6, 0.6),
                comuna("10202", "10", -74.0, -43.0, 0.4),
                comuna("11101", "11", -74.0, -46.0, 1.0),
                comuna("13101", "13", -71.0, -34.0, 1.0),
            ],
        )
    }

    #[test]
    fn station_inside_comuna_and_macrozone() {
        let a = chiloe().assign(&Point::new(-73.7, -42.5));
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            json!({"codigoMacrozona": "04", "codigoComuna": "10201"})
        );
    }

    #[test]
    fn outside_all_macrozones_gets_reserved_code() {
        let a = chiloe().assign(&Point::new(-80.0, -42.5));
        assert_eq!(a.codigo_macrozona, "00");
    }

    #[test]
    fn coastal_station_falls_back_to_nearest_comuna() {
        let assigner = chiloe();
        // just west of 10202
        let p = Point::new(-74.05, -42.9);
        let first = assigner.assign(&p);
        assert_eq!(first.codigo_comuna.as_deref(), Some("10202"));
        for _ in 0..3 {
            assert_eq!(assigner.assign(&p), first);
        }
    }

    #[test]
    fn comunas_outside_region_filter_are_never_candidates() {
        let assigner = chiloe();
        // inside 13101, which is filtered out; nearest eligible vertex is 10201's
        let a = assigner.assign(&Point::new(-70.5, -33.5));
        assert_eq!(a.codigo_comuna.as_deref(), Some("10201"));
    }

    #[test]
    fn no_candidates_leaves_comuna_absent() {
        let assigner = SpatialAssigner::new(&[], &[comuna("13101", "13", 0.0, 0.0, 1.0)]);
        let a = assigner.assign(&Point::new(0.5, 0.5));
        assert_eq!(a.codigo_macrozona, "00");
        assert_eq!(a.codigo_comuna, None);
    }

    #[test]
    fn stations_are_enriched_in_place() {
        let assigner = chiloe();
        let mut stations = collection(vec![
            point_feature(json!({"_codigoDimension": "101"}), -73.7, -42.5),
            point_feature(json!({"_codigoDimension": "102", "codigoComuna": "stale"}), -80.0, 10.0),
            serde_json::from_value(json!({
                "type": "Feature",
                "properties": {"_codigoDimension": "103"},
                "geometry": null
            }))
            .unwrap(),
        ]);
        assigner.assign_stations(&mut stations);

        let p0 = stations.features[0].properties.as_ref().unwrap();
        assert_eq!(p0["codigoMacrozona"], "04");
        assert_eq!(p0["codigoComuna"], "10201");

        let p1 = stations.features[1].properties.as_ref().unwrap();
        assert_eq!(p1["codigoMacrozona"], "00");
        assert_ne!(p1["codigoComuna"], "stale");

        let p2 = stations.features[2].properties.as_ref().unwrap();
        assert_eq!(p2["codigoMacrozona"], "00");
        assert!(!p2.contains_key("codigoComuna"));
    }
}
