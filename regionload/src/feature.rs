//! Feature data types.
//!
//! Features travel through the loader in two shapes:
//!
//! - [`SourceFeature`]: as delivered by the remote source or read back from the
//!   persistent cache. It has no identity yet.
//! - [`Feature`]: after the merge sink assigned it a session-local id.
//!
//! Geometry is kept as an opaque GeoJSON geometry object. The loader never
//! inspects it; the rendering consumer does.
//!
//! Merged features are handed around as a [`FeatureSet`], which shares its
//! storage between snapshots.

use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Feature properties (string keys to arbitrary JSON values).
pub type Properties = Map<String, Value>;

/// A feature as delivered by a source, before id assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFeature {
    /// GeoJSON geometry object (`null` is allowed by GeoJSON).
    #[serde(default)]
    pub geometry: Value,

    /// Feature properties.
    #[serde(default)]
    pub properties: Properties,
}

impl SourceFeature {
    /// Create a source feature from geometry and properties.
    pub fn new(geometry: Value, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    /// Attach a session-local id.
    pub fn with_id(self, id: u64) -> Feature {
        Feature {
            id,
            geometry: self.geometry,
            properties: self.properties,
        }
    }
}

/// A merged feature carrying its session-local id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    /// Unique within one load session, assigned from 0 upwards.
    pub id: u64,

    /// GeoJSON geometry object.
    pub geometry: Value,

    /// Feature properties.
    pub properties: Properties,
}

impl Feature {
    /// Drop the session-local id, e.g. to compare content across sessions.
    pub fn to_source(&self) -> SourceFeature {
        SourceFeature {
            geometry: self.geometry.clone(),
            properties: self.properties.clone(),
        }
    }
}

/// Immutable, cheaply cloneable sequence of merged features.
///
/// Features are stored in shared chunks, one per append. Cloning a set or
/// extending it never copies features; extending copies only the chunk list.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    chunks: Arc<Vec<Arc<[Feature]>>>,
    len: usize,
}

impl FeatureSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the set holds no features.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Features in merge order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    /// Feature at `index` in merge order.
    pub fn get(&self, index: usize) -> Option<&Feature> {
        let mut offset = index;
        for chunk in self.chunks.iter() {
            if offset < chunk.len() {
                return chunk.get(offset);
            }
            offset -= chunk.len();
        }
        None
    }

    /// Append `features` as one new chunk.
    ///
    /// Other clones of this set are unaffected.
    pub fn extend(&mut self, features: Vec<Feature>) {
        if features.is_empty() {
            return;
        }
        self.len += features.len();
        Arc::make_mut(&mut self.chunks).push(features.into());
    }
}

impl PartialEq for FeatureSet {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl From<Vec<Feature>> for FeatureSet {
    fn from(features: Vec<Feature>) -> Self {
        let mut set = Self::new();
        set.extend(features);
        set
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl Serialize for FeatureSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// A GeoJSON `FeatureCollection` borrowed from a merged feature set.
///
/// Used when serializing the merge result for writeback or file output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection<'a> {
    /// The features in merge order.
    pub features: &'a FeatureSet,
}

impl<'a> FeatureCollection<'a> {
    /// Wrap a feature set.
    pub fn new(features: &'a FeatureSet) -> Self {
        Self { features }
    }

    /// Serialize to JSON bytes.
    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
