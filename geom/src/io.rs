//! Reading and writing planar geometry as GeoJSON. Coordinates are taken as-is; no projection
//! happens here, so inputs should already be in a projected coordinate system.

use std::path::Path;

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};

use crate::{PolyLine, Polygon, Pt2D, Ring};

/// Reads every feature from a GeoJSON file holding a FeatureCollection, a single Feature, or a
/// bare Geometry.
pub fn read_features<P: AsRef<Path>>(path: P) -> Result<Vec<Feature>> {
    let path = path.as_ref();
    let raw = fs_err::read_to_string(path)?;
    let geojson = raw
        .parse::<GeoJson>()
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    })
}

/// Extracts every LineString and MultiLineString part, keyed by the integer value of
/// `id_property`, or by feature index when no property is named. Parts of one MultiLineString
/// share its key.
pub fn read_polylines<P: AsRef<Path>>(
    path: P,
    id_property: Option<&str>,
) -> Result<Vec<(usize, PolyLine)>> {
    let path = path.as_ref();
    let mut results = Vec::new();
    for (idx, feature) in read_features(path)?.into_iter().enumerate() {
        let id = match id_property {
            Some(key) => feature_id(&feature, key)
                .with_context(|| format!("feature {} of {}", idx, path.display()))?,
            None => idx,
        };
        let parts = match feature.geometry.map(|g| g.value) {
            Some(Value::LineString(pts)) => vec![pts],
            Some(Value::MultiLineString(parts)) => parts,
            _ => {
                warn!("Skipping feature {} of {}, not a line", idx, path.display());
                continue;
            }
        };
        for raw_pts in parts {
            let pl = PolyLine::deduping_new(to_pts(&raw_pts)?)
                .with_context(|| format!("feature {} of {}", idx, path.display()))?;
            results.push((id, pl));
        }
    }
    if results.is_empty() {
        bail!("{} has no line features", path.display());
    }
    Ok(results)
}

/// Reads the first Polygon or MultiPolygon feature. Only the first part of a MultiPolygon is
/// used.
pub fn read_polygon<P: AsRef<Path>>(path: P) -> Result<Polygon> {
    let path = path.as_ref();
    for feature in read_features(path)? {
        let rings = match feature.geometry.map(|g| g.value) {
            Some(Value::Polygon(rings)) => rings,
            Some(Value::MultiPolygon(mut polygons)) => {
                if polygons.is_empty() {
                    continue;
                }
                if polygons.len() > 1 {
                    warn!(
                        "{} has a MultiPolygon with {} parts; only using the first",
                        path.display(),
                        polygons.len()
                    );
                }
                polygons.remove(0)
            }
            _ => continue,
        };
        let mut result = Vec::new();
        for raw_pts in rings {
            result.push(Ring::deduping_new(to_pts(&raw_pts)?)?);
        }
        return Polygon::from_rings(result);
    }
    bail!("{} has no polygon features", path.display())
}

/// Writes features as a FeatureCollection, overwriting the file.
pub fn write_features<P: AsRef<Path>>(path: P, features: Vec<Feature>) -> Result<()> {
    let collection = GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });
    fs_err::write(path.as_ref(), collection.to_string())?;
    Ok(())
}

/// A feature with no properties yet
pub fn feature(geometry: Geometry) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

impl Polygon {
    pub fn to_geojson(&self) -> Geometry {
        Geometry::new(Value::from(&self.to_geo()))
    }
}

impl PolyLine {
    pub fn to_geojson(&self) -> Geometry {
        Geometry::new(Value::from(&geo::LineString::from(self)))
    }
}

impl Pt2D {
    pub fn to_geojson(self) -> Geometry {
        Geometry::new(Value::Point(vec![self.x(), self.y()]))
    }
}

/// The integer value of a property, accepting numbers and numeric strings.
pub fn feature_id(feature: &Feature, key: &str) -> Result<usize> {
    let value = match feature.property(key) {
        Some(value) => value,
        None => bail!("missing property {}", key),
    };
    if let Some(id) = value.as_u64() {
        return Ok(id as usize);
    }
    if let Some(id) = value.as_f64() {
        if id >= 0.0 && id.fract() == 0.0 {
            return Ok(id as usize);
        }
    }
    if let Some(id) = value.as_str() {
        return id
            .trim()
            .parse::<usize>()
            .with_context(|| format!("property {} = {:?} isn't an id", key, id));
    }
    bail!("property {} = {} isn't an id", key, value)
}

fn to_pts(raw: &[Vec<f64>]) -> Result<Vec<Pt2D>> {
    raw.iter()
        .map(|pair| {
            if pair.len() < 2 {
                bail!("coordinate with {} values", pair.len());
            }
            Pt2D::checked_new(pair[0], pair[1])
                .ok_or_else(|| anyhow!("bad coordinate {:?}", pair))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let lines_path = dir.path().join("lines.geojson");
        fs_err::write(
            &lines_path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"ReachID": 7},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0], [10, 0], [20, 5]]}},
                {"type": "Feature", "properties": {"ReachID": "9"},
                 "geometry": {"type": "MultiLineString", "coordinates": [[[0, 1], [1, 1]], [[2, 2], [3, 3]]]}},
                {"type": "Feature", "properties": {"ReachID": 1},
                 "geometry": {"type": "Point", "coordinates": [0, 0]}}
            ]}"#,
        )
        .unwrap();

        let keyed = read_polylines(&lines_path, Some("ReachID")).unwrap();
        let ids: Vec<usize> = keyed.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![7, 9, 9]);
        // The duplicate vertex is squished
        assert_eq!(keyed[0].1.points().len(), 3);

        let by_index = read_polylines(&lines_path, None).unwrap();
        assert_eq!(by_index[0].0, 0);
        assert_eq!(by_index[1].0, 1);

        assert!(read_polylines(&lines_path, Some("missing")).is_err());

        let square = Polygon::rectangle_two_corners(Pt2D::new(0.0, 0.0), Pt2D::new(4.0, 3.0))
            .unwrap();
        let mut f = feature(square.to_geojson());
        f.set_property("ReachID", 7);
        let out_path = dir.path().join("out.geojson");
        write_features(&out_path, vec![f]).unwrap();
        let back = read_polygon(&out_path).unwrap();
        assert_eq!(back.area(), 12.0);
        assert_eq!(read_features(&out_path).unwrap()[0].property("ReachID").unwrap(), 7);
    }
}
