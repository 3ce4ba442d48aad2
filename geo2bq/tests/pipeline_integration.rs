//! Tests d'intégration des chargements avec un entrepôt factice

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use geo2bq::config::{PipelineConfig, TableRef, WriteMode};
use geo2bq::layer::Project;
use geo2bq::pipeline::{file_to_table, layer_to_table, prepare_file_dataset};
use geo2bq::table::Dataset;
use geo2bq::warehouse::{BackfillError, LoadStage, Warehouse, WarehouseError};
use geo2bq::LoadStatus;

/// Entrepôt factice : enregistre les tables écrites et les requêtes
#[derive(Default)]
struct RecordingWarehouse {
    tables: Mutex<Vec<(String, WriteMode, Dataset)>>,
    queries: Mutex<Vec<String>>,
    fail_queries: bool,
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn write_table(
        &self,
        table: &TableRef,
        dataset: &Dataset,
        mode: WriteMode,
    ) -> Result<u64, WarehouseError> {
        self.tables
            .lock()
            .unwrap()
            .push((table.to_string(), mode, dataset.clone()));
        Ok(dataset.len() as u64)
    }

    async fn execute(&self, sql: &str) -> Result<Option<u64>, WarehouseError> {
        if self.fail_queries {
            return Err(WarehouseError::Api {
                status: 400,
                message: "Invalid table-valued function".to_string(),
            });
        }
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(Some(3))
    }
}

const CENSUS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"GEOID": "08031000100", "ALAND": 1520000},
            "geometry": {"type": "Polygon", "coordinates": [[
                [-105.00, 39.70, 1600.0], [-104.98, 39.70, 1600.0],
                [-104.98, 39.72, 1601.0], [-105.00, 39.72, 1601.0],
                [-105.00, 39.70, 1600.0]
            ]]}
        },
        {
            "type": "Feature",
            "properties": {"GEOID": "08031000201", "ALAND": 980000},
            "geometry": {"type": "Polygon", "coordinates": [[
                [-104.96, 39.70, 1590.0], [-104.94, 39.72, 1590.0],
                [-104.94, 39.70, 1590.0], [-104.96, 39.72, 1590.0],
                [-104.96, 39.70, 1590.0]
            ]]}
        },
        {
            "type": "Feature",
            "properties": {"GEOID": "08031000202", "ALAND": 2100000},
            "geometry": {"type": "Polygon", "coordinates": [[
                [-104.92, 39.70, 1580.0], [-104.90, 39.70, 1580.0],
                [-104.90, 39.72, 1582.0], [-104.92, 39.72, 1582.0],
                [-104.92, 39.70, 1580.0]
            ]]}
        }
    ]
}"#;

fn write_fixture(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn config() -> PipelineConfig {
    PipelineConfig {
        destination_table: "az_homes.az_homes_geom".to_string(),
        project_id: Some("orobytes".to_string()),
        credentials_path: Some(PathBuf::from("orobytes.json")),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_file_to_table_end_to_end() {
    let path = write_fixture("geo2bq_census_e2e.geojson", CENSUS);
    let warehouse = RecordingWarehouse::default();

    let report = file_to_table(&path, &config(), &warehouse).await.unwrap();

    assert_eq!(report.status, LoadStatus::Success);
    assert_eq!(report.rows, 3);
    assert_eq!(report.table, "az_homes.az_homes_geom");
    assert_eq!(report.geometries_repaired, 1);
    assert_eq!(report.geography_stage, Some(LoadStage::GeographyPopulated));

    let tables = warehouse.tables.lock().unwrap();
    assert_eq!(tables.len(), 1);
    let (table, mode, dataset) = &tables[0];
    assert_eq!(table, "orobytes.az_homes.az_homes_geom");
    assert_eq!(*mode, WriteMode::Replace);
    assert_eq!(
        dataset.columns(),
        ["GEOID", "ALAND", "longitude", "latitude", "geometry_geojson"]
    );

    for row in dataset.rows() {
        let text = row["geometry_geojson"].as_str().expect("geometry_geojson text");
        geoprep::validate_geojson(text).unwrap();

        let geometry: geojson::Geometry = text.parse().unwrap();
        assert!(matches!(
            geometry.value,
            geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_)
        ));

        let lon = row["longitude"].as_f64().unwrap();
        let lat = row["latitude"].as_f64().unwrap();
        assert!(lon > -105.0 && lon < -104.90, "lon={}", lon);
        assert!(lat > 39.70 && lat < 39.72, "lat={}", lat);
    }

    let queries = warehouse.queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("ADD COLUMN IF NOT EXISTS geometry GEOGRAPHY"));
    assert!(queries[0].contains("`orobytes.az_homes.az_homes_geom`"));
    assert!(queries[1].contains("ST_GEOGFROMGEOJSON(geometry_geojson)"));

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_failed_backfill_leaves_table_written() {
    let path = write_fixture("geo2bq_census_backfill.geojson", CENSUS);
    let warehouse = RecordingWarehouse {
        fail_queries: true,
        ..Default::default()
    };

    let err = file_to_table(&path, &config(), &warehouse).await.unwrap_err();
    let backfill = err
        .downcast_ref::<BackfillError>()
        .expect("backfill error");

    assert_eq!(backfill.completed, LoadStage::TableWritten);
    assert_eq!(warehouse.tables.lock().unwrap().len(), 1);

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_file_without_geography_skips_sql() {
    let path = write_fixture("geo2bq_census_nogeo.geojson", CENSUS);
    let warehouse = RecordingWarehouse::default();
    let config = PipelineConfig {
        add_geography: false,
        add_coordinates: false,
        write_mode: WriteMode::Append,
        ..config()
    };

    let report = file_to_table(&path, &config, &warehouse).await.unwrap();

    assert!(report.geography_stage.is_none());
    assert!(warehouse.queries.lock().unwrap().is_empty());
    let tables = warehouse.tables.lock().unwrap();
    assert_eq!(tables[0].1, WriteMode::Append);
    assert_eq!(tables[0].2.columns(), ["GEOID", "ALAND", "geometry_geojson"]);

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_layer_to_table() {
    let dir = std::env::temp_dir().join("geo2bq_layer_project");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("az_homes.geojson"),
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"address":"1 Main St","price":350000},
             "geometry":{"type":"Point","coordinates":[-112.07,33.45]}},
            {"type":"Feature","properties":{"address":"9 Elm St","price":412500.5},
             "geometry":{"type":"Point","coordinates":[-111.93,33.42]}}
        ]}"#,
    )
    .unwrap();

    let project = Project::load_dir(&dir).unwrap();
    let layer = project.map_layer_by_name("az_homes").unwrap();
    let warehouse = RecordingWarehouse::default();
    let config = PipelineConfig {
        destination_table: "az_homes.az_homes".to_string(),
        ..config()
    };

    let report = layer_to_table(layer, &config, &warehouse).await.unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.rows_written, Some(2));

    let tables = warehouse.tables.lock().unwrap();
    let dataset = &tables[0].2;
    assert_eq!(dataset.columns(), ["address", "price", "longitude", "latitude"]);
    assert_eq!(dataset.rows()[0]["longitude"], Value::from(-112.07));
    assert_eq!(dataset.rows()[1]["latitude"], Value::from(33.42));

    let schema = dataset.infer_schema();
    assert_eq!(schema[1].column_type.as_str(), "FLOAT");

    // Aucune requête SQL pour une couche
    assert!(warehouse.queries.lock().unwrap().is_empty());

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_dry_run_preparation_needs_no_credentials() {
    let path = write_fixture("geo2bq_census_dry.geojson", CENSUS);
    let config = PipelineConfig::default();

    let prepared = prepare_file_dataset(&path, &config).unwrap();
    assert_eq!(prepared.dataset.len(), 3);
    assert_eq!(prepared.geometries_repaired, 1);
    assert_eq!(prepared.features_without_geometry, 0);

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_missing_project_is_reported() {
    let path = write_fixture("geo2bq_census_noproject.geojson", CENSUS);
    let warehouse = RecordingWarehouse::default();
    let config = PipelineConfig {
        project_id: None,
        ..config()
    };

    let err = file_to_table(&path, &config, &warehouse).await.unwrap_err();
    assert!(err.to_string().contains("No project id"));
    assert!(warehouse.tables.lock().unwrap().is_empty());

    std::fs::remove_file(path).ok();
}
