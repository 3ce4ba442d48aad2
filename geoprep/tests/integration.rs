//! Tests d'intégration : lecture, réparation, validation et centroïdes

use geoprep::{clean_geometry, read_features, validate_geojson, CentroidDeriver, GeoprepError};

const TRACTS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "id": "08031000100",
            "properties": {"GEOID": "08031000100", "NAME": "Census Tract 1", "ALAND": 1520000},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-105.00, 39.70, 1600.0], [-104.98, 39.70, 1600.0],
                    [-104.98, 39.72, 1605.0], [-105.00, 39.72, 1605.0],
                    [-105.00, 39.70, 1600.0]
                ]]
            }
        },
        {
            "type": "Feature",
            "id": "08031000201",
            "properties": {"GEOID": "08031000201", "NAME": "Census Tract 2.01"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-104.96, 39.70], [-104.94, 39.72],
                    [-104.94, 39.70], [-104.96, 39.72],
                    [-104.96, 39.70]
                ]]
            }
        },
        {
            "type": "Feature",
            "id": "08031000202",
            "properties": {"GEOID": "08031000202", "NAME": "Census Tract 2.02", "AWATER": 0},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[-104.90, 39.70, 0, 0], [-104.88, 39.70, 0, 0], [-104.88, 39.72, 0, 0], [-104.90, 39.70, 0, 0]]],
                    [[[-104.86, 39.70, 0, 0], [-104.84, 39.70, 0, 0], [-104.84, 39.72, 0, 0], [-104.86, 39.70, 0, 0]]]
                ]
            }
        }
    ]
}"#;

fn write_fixture(name: &str, content: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_clean_and_validate_every_feature() {
    let path = write_fixture("geoprep_integration_tracts.geojson", TRACTS);
    let set = read_features(&path).unwrap();

    assert_eq!(set.len(), 3);
    assert_eq!(set.epsg, 4326);
    assert_eq!(set.fields, vec!["GEOID", "NAME", "ALAND", "AWATER"]);

    for feature in &set.features {
        let geometry = feature.geometry.as_ref().expect("fixture features have geometry");
        let cleaned = geojson::Geometry::new(clean_geometry(&geometry.value).unwrap());
        let text = cleaned.to_string();

        validate_geojson(&text)
            .unwrap_or_else(|e| panic!("feature {:?} failed validation: {}", feature.id, e));
    }

    std::fs::remove_file(path).ok();
}

#[test]
fn test_raw_geometries_fail_validation() {
    let path = write_fixture("geoprep_integration_raw.geojson", TRACTS);
    let set = read_features(&path).unwrap();

    // Z non retiré
    let first = set.features[0].geometry.as_ref().unwrap().to_string();
    assert!(matches!(
        validate_geojson(&first),
        Err(GeoprepError::ExcessDimension { ordinates: 3 })
    ));

    // Ring en noeud papillon
    let second = set.features[1].geometry.as_ref().unwrap().to_string();
    assert!(matches!(
        validate_geojson(&second),
        Err(GeoprepError::InvalidGeometry { .. })
    ));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_centroids_fall_inside_tracts() {
    let path = write_fixture("geoprep_integration_centroids.geojson", TRACTS);
    let set = read_features(&path).unwrap();
    let deriver = CentroidDeriver::web_mercator().unwrap();

    let geometries: Vec<_> = set.features.iter().map(|f| f.planar_geometry()).collect();
    let centroids = deriver.derive(&geometries).unwrap();

    assert_eq!(centroids.len(), set.len());

    let (lon, lat) = centroids[0].unwrap();
    assert!((lon - (-104.99)).abs() < 1e-6, "lon={}", lon);
    assert!(lat > 39.70 && lat < 39.72, "lat={}", lat);

    for centroid in &centroids {
        let (lon, lat) = centroid.unwrap();
        assert!(lon > -105.0 && lon < -104.84);
        assert!(lat > 39.70 && lat < 39.72);
    }

    std::fs::remove_file(path).ok();
}

#[test]
fn test_unsupported_input_format() {
    let path = write_fixture("geoprep_integration_parcels.shp", "\u{0}\u{0}\u{27}\u{a}");
    assert!(matches!(
        read_features(&path),
        Err(GeoprepError::UnsupportedFormat(_))
    ));
    std::fs::remove_file(path).ok();
}
