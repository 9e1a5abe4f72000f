//! Census tract layer and its R-tree index.

use std::collections::BTreeSet;
use std::path::Path;

use geo::{MultiPolygon, Rect, Validation};
use rstar::{AABB, RTree, RTreeObject};

use crate::SpatialError;
use crate::features::{VectorFeature, compute_envelope, read_features};

/// Property holding the tract identifier.
pub const CLUSTER_ID_PROPERTY: &str = "cluster_id";

/// One census tract.
#[derive(Debug, Clone)]
pub struct TractFeature {
    /// Unique tract identifier.
    pub cluster_id: String,
    /// Tract boundary.
    pub geometry: MultiPolygon<f64>,
}

/// A tract feature that could not be used, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTract {
    /// Position of the feature in the layer.
    pub index: usize,
    /// Identifier, if the feature had one.
    pub cluster_id: Option<String>,
    /// Why the feature was rejected.
    pub reason: String,
}

/// Usable tracts in layer order, plus the rejected ones.
#[derive(Debug, Clone, Default)]
pub struct TractLayer {
    /// Valid tracts.
    pub tracts: Vec<TractFeature>,
    /// Features that were reported and skipped.
    pub rejected: Vec<RejectedTract>,
}

impl TractLayer {
    /// Loads a tract layer from a `GeoJSON` file.
    ///
    /// # Errors
    ///
    /// * [`SpatialError`] if the file cannot be read or parsed
    /// * [`SpatialError::EmptyLayer`] if no tract is usable
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let layer = Self::from_features(read_features(path)?);
        if layer.tracts.is_empty() {
            return Err(SpatialError::EmptyLayer {
                layer: path.display().to_string(),
            });
        }
        log::info!(
            "Loaded {} tracts from {} ({} rejected)",
            layer.tracts.len(),
            path.display(),
            layer.rejected.len()
        );
        Ok(layer)
    }

    /// Validates features into tracts. A feature is rejected when it has
    /// no `cluster_id`, repeats an earlier `cluster_id`, has no polygonal
    /// geometry, or its geometry is invalid (e.g. self-intersecting).
    #[must_use]
    pub fn from_features(features: Vec<VectorFeature>) -> Self {
        let mut layer = Self::default();
        let mut seen = BTreeSet::new();

        for feature in features {
            let cluster_id = feature.property(CLUSTER_ID_PROPERTY).and_then(id_string);
            let reject = |reason: String| RejectedTract {
                index: feature.index,
                cluster_id: cluster_id.clone(),
                reason,
            };

            let rejection = match (&cluster_id, &feature.geometry) {
                (None, _) => Some(reject(format!("missing {CLUSTER_ID_PROPERTY}"))),
                (Some(id), _) if seen.contains(id) => {
                    Some(reject(format!("duplicate {CLUSTER_ID_PROPERTY} {id}")))
                }
                (_, None) => Some(reject("no polygon geometry".to_string())),
                (_, Some(geometry)) => geometry
                    .check_validation()
                    .err()
                    .map(|e| reject(format!("invalid geometry: {e}"))),
            };

            if let Some(rejected) = rejection {
                log::warn!(
                    "Skipping tract feature {} ({}): {}",
                    rejected.index,
                    rejected.cluster_id.as_deref().unwrap_or("?"),
                    rejected.reason
                );
                layer.rejected.push(rejected);
                continue;
            }

            if let (Some(cluster_id), Some(geometry)) = (cluster_id, feature.geometry) {
                seen.insert(cluster_id.clone());
                layer.tracts.push(TractFeature {
                    cluster_id,
                    geometry,
                });
            }
        }

        layer
    }
}

/// Reads an identifier from a string or integral number property.
fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| n.as_i64().map(|v| v.to_string()))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| format!("{f:.0}"))
            }),
        _ => None,
    }
}

/// A tract envelope stored in the R-tree, pointing back into the tract
/// list.
struct TractEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for TractEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over tract envelopes.
pub struct TractIndex {
    tree: RTree<TractEntry>,
}

impl TractIndex {
    /// Builds the index over `tracts`.
    #[must_use]
    pub fn new(tracts: &[TractFeature]) -> Self {
        let entries = tracts
            .iter()
            .enumerate()
            .map(|(position, tract)| TractEntry {
                position,
                envelope: compute_envelope(&tract.geometry),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Positions of the tracts whose envelope intersects `rect`, ascending.
    #[must_use]
    pub fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let query = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut positions: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.position)
            .collect();
        positions.sort_unstable();
        positions
    }

    /// Number of indexed tracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parse_features;
    use geo::coord;

    const TRACTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "cluster_id": "T1" },
              "geometry": { "type": "Polygon", "coordinates": [[[0,0],[60,0],[60,60],[0,60],[0,0]]] } },
            { "type": "Feature", "properties": { "cluster_id": 17031010200 },
              "geometry": { "type": "Polygon", "coordinates": [[[60,0],[120,0],[120,60],[60,60],[60,0]]] } },
            { "type": "Feature", "properties": { "name": "no id" },
              "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] } },
            { "type": "Feature", "properties": { "cluster_id": "BOWTIE" },
              "geometry": { "type": "Polygon", "coordinates": [[[0,0],[10,10],[10,0],[0,10],[0,0]]] } },
            { "type": "Feature", "properties": { "cluster_id": "T1" },
              "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] } },
            { "type": "Feature", "properties": { "cluster_id": "LINE" },
              "geometry": { "type": "LineString", "coordinates": [[0,0],[1,1]] } }
        ]
    }"#;

    fn layer() -> TractLayer {
        TractLayer::from_features(parse_features(TRACTS).unwrap())
    }

    #[test]
    fn keeps_valid_tracts_in_order() {
        let layer = layer();
        let ids: Vec<&str> = layer.tracts.iter().map(|t| t.cluster_id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "17031010200"]);
    }

    #[test]
    fn reports_every_rejected_feature() {
        let layer = layer();
        let rejected: Vec<usize> = layer.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, vec![2, 3, 4, 5]);
        assert!(layer.rejected[0].reason.contains("missing"));
        assert!(layer.rejected[1].reason.contains("invalid geometry"));
        assert!(layer.rejected[2].reason.contains("duplicate"));
        assert!(layer.rejected[3].reason.contains("no polygon"));
    }

    #[test]
    fn index_finds_intersecting_envelopes() {
        let layer = layer();
        let index = TractIndex::new(&layer.tracts);
        assert_eq!(index.len(), 2);

        let left = Rect::new(coord! { x: 10.0, y: 10.0 }, coord! { x: 20.0, y: 20.0 });
        assert_eq!(index.candidates(&left), vec![0]);

        let both = Rect::new(coord! { x: 50.0, y: 10.0 }, coord! { x: 70.0, y: 20.0 });
        assert_eq!(index.candidates(&both), vec![0, 1]);

        let outside = Rect::new(coord! { x: 500.0, y: 500.0 }, coord! { x: 510.0, y: 510.0 });
        assert!(index.candidates(&outside).is_empty());
    }
}
