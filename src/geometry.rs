use crate::data::property_string;
use geo::{BoundingRect, CoordsIter, HaversineDistance, Intersects, MultiPolygon, Point};
use geojson::{Feature, Value};
use rstar::{RTree, RTreeObject, AABB};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("feature has no geometry")]
    Missing,
    #[error("unsupported geometry type: {0}")]
    Unsupported(&'static str),
    #[error("polygon has no rings")]
    Empty,
    #[error("ring {ring} has {len} positions, at least 4 are required")]
    DegenerateRing { ring: usize, len: usize },
    #[error("invalid position in ring {ring}")]
    InvalidPosition { ring: usize },
    #[error("failed to convert geometry: {0}")]
    Conversion(String),
}

// Wrapper for RTree indexing
struct PolygonEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for PolygonEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

#[derive(Debug, Clone)]
pub struct IndexedPolygon {
    pub code: String,
    pub shape: MultiPolygon<f64>,
}

pub struct PolygonIndex {
    polygons: Vec<IndexedPolygon>,
    tree: RTree<PolygonEnvelope>,
}

impl PolygonIndex {
    /// Builds an index from the features accepted by `include`, using the
    /// property `code_key` as each polygon's identifier.
    pub fn from_features<F>(features: &[Feature], code_key: &str, include: F) -> Self
    where
        F: Fn(&Feature) -> bool,
    {
        let mut polygons = Vec::new();
        for feature in features.iter().filter(|f| include(*f)) {
            let Some(code) = property_string(feature, code_key) else {
                warn!("Polygon without '{}' property excluded", code_key);
                continue;
            };
            match polygon_from_feature(feature) {
                Ok(shape) => polygons.push(IndexedPolygon { code, shape }),
                Err(e) => warn!("Polygon {} excluded: {}", code, e),
            }
        }
        Self::from_polygons(polygons)
    }

    pub fn from_polygons(polygons: Vec<IndexedPolygon>) -> Self {
        let items: Vec<PolygonEnvelope> = polygons
            .iter()
            .enumerate()
            .filter_map(|(index, polygon)| {
                let rect = polygon.shape.bounding_rect()?;
                Some(PolygonEnvelope {
                    index,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            polygons,
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Code of the first polygon, in input order, containing `point`.
    /// Points on a boundary count as contained.
    pub fn containing(&self, point: &Point<f64>) -> Option<&str> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.index)
            .collect();
        // RTree order is arbitrary; input order decides ties
        candidates.sort_unstable();

        candidates
            .into_iter()
            .map(|i| &self.polygons[i])
            .find(|polygon| polygon.shape.intersects(point))
            .map(|polygon| polygon.code.as_str())
    }

    /// Polygon owning the vertex closest to `point`, with the great-circle
    /// distance to that vertex in kilometres. On equal distances the earlier
    /// polygon wins.
    pub fn nearest_by_vertex(&self, point: &Point<f64>) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for polygon in &self.polygons {
            let Some(distance) = nearest_vertex_km(&polygon.shape, point) else {
                warn!("Polygon {} has no vertices, skipped", polygon.code);
                continue;
            };
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((polygon.code.as_str(), distance));
            }
        }
        best
    }
}

fn nearest_vertex_km(shape: &MultiPolygon<f64>, point: &Point<f64>) -> Option<f64> {
    shape
        .coords_iter()
        .map(|c| Point::from(c).haversine_distance(point) / 1000.0)
        .fold(None, |acc: Option<f64>, d| match acc {
            Some(m) if m <= d => Some(m),
            _ => Some(d),
        })
}

/// Converts a Polygon or MultiPolygon feature into a `MultiPolygon`, rejecting
/// rings too short to enclose an area and positions that are not finite.
pub fn polygon_from_feature(feature: &Feature) -> Result<MultiPolygon<f64>, GeometryError> {
    let geometry = feature.geometry.as_ref().ok_or(GeometryError::Missing)?;
    match &geometry.value {
        Value::Polygon(rings) => check_rings(rings)?,
        Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err(GeometryError::Empty);
            }
            for rings in polygons {
                check_rings(rings)?;
            }
        }
        other => return Err(GeometryError::Unsupported(value_kind(other))),
    }

    let converted: geo::Geometry<f64> = geometry
        .value
        .clone()
        .try_into()
        .map_err(|e| GeometryError::Conversion(format!("{:?}", e)))?;

    match converted {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        _ => Err(GeometryError::Conversion("not a polygon".to_string())),
    }
}

fn check_rings(rings: &[Vec<Vec<f64>>]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::Empty);
    }
    for (ring, positions) in rings.iter().enumerate() {
        if positions.len() < 4 {
            return Err(GeometryError::DegenerateRing {
                ring,
                len: positions.len(),
            });
        }
        let valid = positions
            .iter()
            .all(|p| p.len() >= 2 && p[0].is_finite() && p[1].is_finite());
        if !valid {
            return Err(GeometryError::InvalidPosition { ring });
        }
    }
    Ok(())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
