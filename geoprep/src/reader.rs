//! Lecture des fichiers géospatiaux (GeoJSON)

use std::path::Path;

use geojson::feature::Id;
use geojson::GeoJson;
use serde_json::Value;
use tracing::{debug, info};

use crate::types::{Feature, FeatureSet, Properties, WGS84_EPSG};
use crate::GeoprepError;

/// Formats d'entrée reconnus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    GeoJson,
}

impl InputFormat {
    /// Détecte le format depuis l'extension, puis depuis le contenu
    pub fn detect(path: &Path, content: &str) -> Result<Self, GeoprepError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("geojson") | Some("json") => Ok(Self::GeoJson),
            _ if content.trim_start().starts_with('{') => Ok(Self::GeoJson),
            Some(other) => Err(GeoprepError::UnsupportedFormat(other.to_string())),
            None => Err(GeoprepError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Lit un fichier géospatial et retourne ses features.
///
/// # Errors
///
/// Retourne `GeoprepError` si le fichier est illisible, d'un format non
/// reconnu, ou si son contenu n'est pas du GeoJSON valide.
pub fn read_features(path: &Path) -> Result<FeatureSet, GeoprepError> {
    let content = std::fs::read_to_string(path)?;

    match InputFormat::detect(path, &content)? {
        InputFormat::GeoJson => {
            let set = parse_geojson(&content)?;
            info!(
                path = %path.display(),
                features = set.len(),
                fields = set.fields.len(),
                epsg = set.epsg,
                "Read features"
            );
            Ok(set)
        }
    }
}

/// Parse un document GeoJSON (FeatureCollection, Feature ou Geometry seule)
pub fn parse_geojson(content: &str) -> Result<FeatureSet, GeoprepError> {
    let json: Value = serde_json::from_str(content)?;
    let epsg = legacy_crs_epsg(&json).unwrap_or(WGS84_EPSG);

    let features: Vec<Feature> = match GeoJson::from_json_value(json)? {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(convert_feature).collect(),
        GeoJson::Feature(f) => vec![convert_feature(f)],
        GeoJson::Geometry(g) => vec![Feature {
            id: None,
            geometry: Some(g),
            properties: Properties::new(),
        }],
    };

    let mut fields: Vec<String> = Vec::new();
    for feature in &features {
        for key in feature.properties.keys() {
            if !fields.iter().any(|f| f == key) {
                fields.push(key.clone());
            }
        }
    }

    debug!(features = features.len(), epsg, "Parsed GeoJSON document");

    Ok(FeatureSet {
        features,
        fields,
        epsg,
    })
}

fn convert_feature(feature: geojson::Feature) -> Feature {
    let id = feature.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    Feature {
        id,
        geometry: feature.geometry,
        properties: feature.properties.unwrap_or_default(),
    }
}

/// EPSG d'un membre `crs` hérité (GeoJSON 2008), absent de la RFC 7946
fn legacy_crs_epsg(json: &Value) -> Option<u32> {
    let name = json.pointer("/crs/properties/name")?.as_str()?;

    if name.ends_with("CRS84") {
        return Some(WGS84_EPSG);
    }

    name.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 7, "geometry": {"type": "Point", "coordinates": [1.0, 2.0, 3.0]},
             "properties": {"name": "a", "pop": 10}},
            {"type": "Feature", "geometry": null, "properties": {"name": "b", "area": 1.5}}
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let set = parse_geojson(COLLECTION).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.fields, vec!["name", "pop", "area"]);
        assert_eq!(set.epsg, 4326);
        assert_eq!(set.features[0].id.as_deref(), Some("7"));
        assert!(set.features[1].geometry.is_none());
    }

    #[test]
    fn test_z_ordinates_are_kept() {
        let set = parse_geojson(COLLECTION).unwrap();
        let geometry = set.features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.value, geojson::Value::Point(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_bare_geometry() {
        let set = parse_geojson(r#"{"type": "LineString", "coordinates": [[0, 0], [1, 1]]}"#)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.fields.is_empty());
    }

    #[test]
    fn test_legacy_crs() {
        let doc = r#"{"type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}},
            "features": []}"#;
        assert_eq!(parse_geojson(doc).unwrap().epsg, 2154);

        let doc = r#"{"type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}},
            "features": []}"#;
        assert_eq!(parse_geojson(doc).unwrap().epsg, 4326);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            InputFormat::detect(Path::new("co_census.geojson"), "").unwrap(),
            InputFormat::GeoJson
        );
        assert!(InputFormat::detect(Path::new("parcels.shp"), "\u{0}\u{0}").is_err());
    }

    #[test]
    fn test_read_features_from_file() {
        let path = std::env::temp_dir().join("geoprep_reader_test.geojson");
        std::fs::write(&path, COLLECTION).unwrap();

        let set = read_features(&path).unwrap();
        assert_eq!(set.len(), 2);

        std::fs::remove_file(path).ok();
    }
}
