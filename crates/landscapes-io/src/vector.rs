// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoJSON building footprints and tracks

use std::fs;
use std::path::{Path as FsPath, PathBuf};

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue, Value};
use landscapes_model::{Footprint, HeightAttributes, Path};

use crate::{FormatError, Result};

/// Footprints decoded from one or more documents
#[derive(Debug, Default)]
pub struct FootprintBatch {
    /// Usable footprints in input order
    pub footprints: Vec<Footprint>,
    /// Features that could not be turned into a footprint
    pub skipped: Vec<FormatError>,
    /// Features seen so far, usable footprints or not
    pub feature_count: usize,
}

impl FootprintBatch {
    /// Append the footprints of one GeoJSON document
    ///
    /// Feature indices continue from the features already in the batch, so
    /// diagnostics point at a unique position across several files.
    pub fn extend_from_str(
        &mut self,
        text: &str,
        resolve_height: &dyn Fn(&HeightAttributes) -> f64,
    ) -> Result<()> {
        let features = features_of(text.parse::<GeoJson>()?);
        for feature in features {
            let index = self.feature_count;
            self.feature_count += 1;
            match footprint_from_feature(index, &feature, resolve_height) {
                Ok(footprint) => self.footprints.push(footprint),
                Err(err) => {
                    log::warn!("skipping feature {}: {}", index, err);
                    self.skipped.push(err);
                }
            }
        }
        Ok(())
    }
}

/// Decode the footprints of a single GeoJSON document
pub fn parse_footprints(
    text: &str,
    resolve_height: &dyn Fn(&HeightAttributes) -> f64,
) -> Result<FootprintBatch> {
    let mut batch = FootprintBatch::default();
    batch.extend_from_str(text, resolve_height)?;
    Ok(batch)
}

/// Decode every `*.json` tile in a directory, in file name order
///
/// Zero-length files are empty tiles and are skipped silently.
pub fn read_footprint_dir(
    dir: impl AsRef<FsPath>,
    resolve_height: &dyn Fn(&HeightAttributes) -> f64,
) -> Result<FootprintBatch> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    let mut batch = FootprintBatch::default();
    for file in &files {
        let text = fs::read_to_string(file)?;
        if text.is_empty() {
            log::debug!("skipping empty tile {}", file.display());
            continue;
        }
        batch.extend_from_str(&text, resolve_height)?;
    }

    log::info!(
        "read {} footprints from {} features in {} files",
        batch.footprints.len(),
        batch.feature_count,
        files.len()
    );
    Ok(batch)
}

/// Height attributes of a feature's properties
///
/// Numbers and numeric strings are accepted; `building:levels` is used when
/// `levels` is absent.
pub fn height_attributes(properties: Option<&JsonObject>) -> HeightAttributes {
    let number = |key: &str| -> Option<f64> {
        match properties?.get(key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    };
    HeightAttributes {
        height: number("height"),
        levels: number("levels").or_else(|| number("building:levels")),
    }
}

fn features_of(document: GeoJson) -> Vec<Feature> {
    match document {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    }
}

fn footprint_from_feature(
    index: usize,
    feature: &Feature,
    resolve_height: &dyn Fn(&HeightAttributes) -> f64,
) -> Result<Footprint> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| FormatError::feature(index, "no geometry"))?;

    let outer = match &geometry.value {
        Value::Polygon(rings) => rings.first(),
        Value::MultiPolygon(polygons) => polygons.first().and_then(|rings| rings.first()),
        other => {
            return Err(FormatError::feature(
                index,
                format!("expected Polygon or MultiPolygon, got {}", geometry_name(other)),
            ))
        }
    }
    .ok_or_else(|| FormatError::feature(index, "polygon without rings"))?;

    let ring = outer
        .iter()
        .map(|position| planar(index, position))
        .collect::<Result<Vec<_>>>()?;

    let height = resolve_height(&height_attributes(feature.properties.as_ref()));
    Ok(Footprint::new(index, ring, height)?)
}

fn geometry_name(value: &Value) -> &'static str {
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

fn planar(index: usize, position: &[f64]) -> Result<[f64; 2]> {
    match position {
        [x, y, ..] => Ok([*x, *y]),
        _ => Err(FormatError::feature(
            index,
            format!("position with {} coordinates", position.len()),
        )),
    }
}

/// A track document and the polyline of its first feature
#[derive(Clone, Debug)]
pub struct Track {
    collection: FeatureCollection,
    /// First line of the first feature
    pub path: Path,
}

impl Track {
    /// The collection with the first feature's geometry replaced by a 3D
    /// `LineString` through `points`
    ///
    /// All other features, properties and foreign members are kept.
    pub fn with_points(&self, points: &[[f64; 3]]) -> FeatureCollection {
        let mut collection = self.collection.clone();
        if let Some(first) = collection.features.first_mut() {
            let line = points.iter().map(|p| p.to_vec()).collect();
            let mut geometry = Geometry::new(Value::LineString(line));
            if let Some(previous) = &first.geometry {
                geometry.foreign_members = previous.foreign_members.clone();
            }
            first.geometry = Some(geometry);
        }
        collection
    }

    /// Serialize [`Self::with_points`] as GeoJSON text
    pub fn to_geojson_string(&self, points: &[[f64; 3]]) -> String {
        GeoJson::FeatureCollection(self.with_points(points)).to_string()
    }
}

/// Decode a track document
///
/// A `MultiLineString` is reduced to its first line. The path carries
/// elevations only if every position has a third coordinate.
pub fn parse_track(text: &str) -> Result<Track> {
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        other => FeatureCollection {
            bbox: None,
            features: features_of(other),
            foreign_members: None,
        },
    };

    let first = collection
        .features
        .first()
        .ok_or_else(|| FormatError::feature(0, "track has no features"))?;
    let geometry = first
        .geometry
        .as_ref()
        .ok_or_else(|| FormatError::feature(0, "track feature has no geometry"))?;

    let line = match &geometry.value {
        Value::LineString(line) => line,
        Value::MultiLineString(lines) => lines
            .first()
            .ok_or_else(|| FormatError::feature(0, "empty MultiLineString"))?,
        other => {
            return Err(FormatError::feature(
                0,
                format!("expected LineString or MultiLineString, got {}", geometry_name(other)),
            ))
        }
    };

    let path = if line.iter().all(|p| p.len() >= 3) && !line.is_empty() {
        Path::from_3d(line.iter().map(|p| [p[0], p[1], p[2]]).collect())
    } else {
        Path::from_2d(
            line.iter()
                .map(|p| planar(0, p))
                .collect::<Result<Vec<_>>>()?,
        )
    };

    Ok(Track { collection, path })
}

/// Read a track document from disk
pub fn read_track(path: impl AsRef<FsPath>) -> Result<Track> {
    parse_track(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use landscapes_model::DEFAULT_BUILDING_HEIGHT;

    fn resolve(attributes: &HeightAttributes) -> f64 {
        attributes.resolve(3.0, DEFAULT_BUILDING_HEIGHT)
    }

    const BUILDINGS: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"height": 12.5},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
        {"type": "Feature", "properties": {"levels": "4"},
         "geometry": {"type": "Polygon", "coordinates": [[[5,5],[6,5],[6,6]]]}},
        {"type": "Feature", "properties": {},
         "geometry": {"type": "Point", "coordinates": [1,1]}},
        {"type": "Feature", "properties": {"height": 0, "building:levels": 2},
         "geometry": {"type": "MultiPolygon", "coordinates": [[[[9,9],[10,9],[10,10],[9,9]]]]}},
        {"type": "Feature", "properties": null,
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,1],[0,0]]]}}
      ]
    }"#;

    #[test]
    fn test_footprints_and_heights() {
        let batch = parse_footprints(BUILDINGS, &resolve).unwrap();
        assert_eq!(batch.feature_count, 5);
        assert_eq!(batch.footprints.len(), 3);

        let first = &batch.footprints[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.height, 12.5);
        assert_eq!(first.vertex_count(), 4);

        // Open ring closed on ingestion, levels as a string
        let second = &batch.footprints[1];
        assert_eq!(second.ring.first(), second.ring.last());
        assert_eq!(second.height, 12.0);

        // Zero height is ignored in favour of building:levels
        assert_eq!(batch.footprints[2].index, 3);
        assert_eq!(batch.footprints[2].height, 6.0);

        assert_eq!(batch.skipped.len(), 2);
        assert!(matches!(batch.skipped[0], FormatError::Feature { index: 2, .. }));
        assert!(matches!(batch.skipped[1], FormatError::Model(_)));
    }

    #[test]
    fn test_indices_continue_across_documents() {
        let mut batch = parse_footprints(BUILDINGS, &resolve).unwrap();
        batch.extend_from_str(BUILDINGS, &resolve).unwrap();
        assert_eq!(batch.feature_count, 10);
        assert_eq!(batch.footprints[3].index, 5);
    }

    #[test]
    fn test_directory_skips_empty_tiles() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), BUILDINGS).unwrap();
        fs::write(dir.path().join("a.json"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "not geojson").unwrap();

        let batch = read_footprint_dir(dir.path(), &resolve).unwrap();
        assert_eq!(batch.footprints.len(), 3);

        fs::write(dir.path().join("c.json"), "{ broken").unwrap();
        assert!(matches!(
            read_footprint_dir(dir.path(), &resolve),
            Err(FormatError::GeoJson(_))
        ));
    }

    const TRACK: &str = r#"{
      "type": "FeatureCollection",
      "name": "ride",
      "features": [
        {"type": "Feature", "properties": {"name": "Loop", "time": "2020-05-01"},
         "geometry": {"type": "MultiLineString",
                      "coordinates": [[[10,20,0],[11,21,0],[12,23,0]], [[0,0,0],[1,1,1]]]}},
        {"type": "Feature", "properties": {"kind": "marker"},
         "geometry": {"type": "Point", "coordinates": [10,20]}}
      ]
    }"#;

    #[test]
    fn test_track_takes_first_line() {
        let track = parse_track(TRACK).unwrap();
        assert_eq!(track.path.len(), 3);
        assert!(track.path.has_elevation);
        assert_eq!(track.path.points[2], [12.0, 23.0, 0.0]);
    }

    #[test]
    fn test_track_output_keeps_metadata() {
        let track = parse_track(TRACK).unwrap();
        let text = track.to_geojson_string(&[[0.0, 0.0, 5.0], [1.0, 1.0, 6.5]]);
        let reparsed: JsonValue = serde_json::from_str(&text).unwrap();

        assert_eq!(reparsed["name"], "ride");
        assert_eq!(reparsed["features"][0]["properties"]["name"], "Loop");
        assert_eq!(reparsed["features"][0]["geometry"]["type"], "LineString");
        assert_eq!(
            reparsed["features"][0]["geometry"]["coordinates"][1],
            serde_json::json!([1.0, 1.0, 6.5])
        );
        assert_eq!(reparsed["features"][1]["geometry"]["type"], "Point");
    }

    #[test]
    fn test_planar_track_and_bad_geometry() {
        let planar = r#"{"type": "Feature", "properties": {},
            "geometry": {"type": "LineString", "coordinates": [[0,0],[1,2]]}}"#;
        let track = parse_track(planar).unwrap();
        assert!(!track.path.has_elevation);
        assert_eq!(track.path.points[1], [1.0, 2.0, 0.0]);

        let point = r#"{"type": "Feature", "properties": {},
            "geometry": {"type": "Point", "coordinates": [0,0]}}"#;
        assert!(matches!(
            parse_track(point),
            Err(FormatError::Feature { index: 0, .. })
        ));
    }
}
