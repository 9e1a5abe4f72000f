//! `GeoJSON` layer reading.
//!
//! Layers may be a `FeatureCollection`, a single `Feature`, or a bare
//! `Geometry`. Only polygonal geometry is kept; everything else is
//! reported as a feature without geometry so callers can count it.

use std::path::Path;

use geo::{BoundingRect, MultiPolygon};
use geojson::{GeoJson, JsonObject};
use rstar::AABB;

use crate::SpatialError;

/// One feature of a layer.
#[derive(Debug, Clone)]
pub struct VectorFeature {
    /// Position in the layer, starting at zero.
    pub index: usize,
    /// Polygonal geometry, or `None` when missing or not polygonal.
    pub geometry: Option<MultiPolygon<f64>>,
    /// Feature properties.
    pub properties: JsonObject,
}

impl VectorFeature {
    /// Property value by name, ignoring JSON `null`.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name).filter(|v| !v.is_null())
    }
}

/// Reads every feature of a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be read or is not `GeoJSON`.
pub fn read_features(path: &Path) -> Result<Vec<VectorFeature>, SpatialError> {
    let text = std::fs::read_to_string(path)?;
    let features = parse_features(&text)?;
    log::debug!("Read {} features from {}", features.len(), path.display());
    Ok(features)
}

/// Parses every feature of a `GeoJSON` document.
///
/// # Errors
///
/// Returns [`SpatialError::GeoJson`] if the text is not `GeoJSON`.
pub fn parse_features(text: &str) -> Result<Vec<VectorFeature>, SpatialError> {
    let geojson: GeoJson = text.parse()?;
    let raw: Vec<(Option<geojson::Geometry>, JsonObject)> = match geojson {
        GeoJson::FeatureCollection(fc) => fc
            .features
            .into_iter()
            .map(|f| (f.geometry, f.properties.unwrap_or_default()))
            .collect(),
        GeoJson::Feature(f) => vec![(f.geometry, f.properties.unwrap_or_default())],
        GeoJson::Geometry(g) => vec![(Some(g), JsonObject::new())],
    };

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, (geometry, properties))| VectorFeature {
            index,
            geometry: geometry.and_then(to_multipolygon),
            properties,
        })
        .collect())
}

/// Loads a study-area layer, merging all of its polygons into one
/// [`MultiPolygon`].
///
/// # Errors
///
/// * [`SpatialError`] if the file cannot be read or parsed
/// * [`SpatialError::EmptyLayer`] if it holds no polygon
pub fn load_study_area(path: &Path) -> Result<MultiPolygon<f64>, SpatialError> {
    let features = read_features(path)?;
    let polygons: Vec<_> = features
        .into_iter()
        .filter_map(|f| f.geometry)
        .flat_map(|mp| mp.0)
        .collect();
    if polygons.is_empty() {
        return Err(SpatialError::EmptyLayer {
            layer: path.display().to_string(),
        });
    }
    log::info!("Study area has {} polygons", polygons.len());
    Ok(MultiPolygon(polygons))
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
#[must_use]
pub fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        other => {
            log::warn!("Skipping non-polygonal geometry: {other:?}");
            None
        }
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
#[must_use]
pub fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
