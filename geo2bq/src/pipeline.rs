//! Les deux chargements : couche -> table, fichier -> table + GEOGRAPHY
//!
//! Chaque chargement se découpe en une préparation hors ligne (`prepare_*`,
//! utilisée par `--dry-run`) et une écriture dans l'entrepôt.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use geo::{Centroid, Geometry};
use geoprep::reproject::SmartReprojector;
use geoprep::validity::{is_valid, ring_structure_error};
use geoprep::{clean_geometry, read_features, validate_geojson, CentroidDeriver, Feature, FeatureSet};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::layer::Layer;
use crate::report::LoadReport;
use crate::table::{Dataset, Row};
use crate::warehouse::backfill::{GEOGRAPHY_COLUMN, GEOJSON_COLUMN};
use crate::warehouse::{run_backfill, Warehouse};

pub const LONGITUDE_COLUMN: &str = "longitude";
pub const LATITUDE_COLUMN: &str = "latitude";

/// Jeu de données prêt à être chargé, avec ses compteurs
#[derive(Debug, Clone)]
pub struct Prepared {
    pub dataset: Dataset,
    pub geometries_repaired: usize,
    pub features_without_geometry: usize,
}

impl Prepared {
    /// Rapport pré-rempli avec les compteurs de préparation
    pub fn report(&self, source: &str, table: &str, config: &PipelineConfig) -> LoadReport {
        let mut report = LoadReport::new(source, table, config.write_mode);
        report.rows = self.dataset.len();
        report.schema = self.dataset.infer_schema();
        report.geometries_repaired = self.geometries_repaired;
        report.features_without_geometry = self.features_without_geometry;
        report
    }
}

fn attribute_rows(fields: &[String], features: &[Feature]) -> Vec<Row> {
    features
        .iter()
        .map(|feature| {
            fields
                .iter()
                .map(|field| {
                    let value = feature.properties.get(field).cloned().unwrap_or(Value::Null);
                    (field.clone(), value)
                })
                .collect()
        })
        .collect()
}

fn push_coordinates(dataset: &mut Dataset, centroids: &[Option<(f64, f64)>]) -> Result<()> {
    let (longitudes, latitudes): (Vec<Value>, Vec<Value>) = centroids
        .iter()
        .map(|c| match c {
            Some((lon, lat)) => (Value::from(*lon), Value::from(*lat)),
            None => (Value::Null, Value::Null),
        })
        .unzip();

    dataset.push_column(LONGITUDE_COLUMN, longitudes)?;
    dataset.push_column(LATITUDE_COLUMN, latitudes)?;
    Ok(())
}

/// Prépare les lignes d'une couche : attributs, puis centroïde plan dans le CRS de la couche
pub fn prepare_layer_dataset(layer: &dyn Layer, config: &PipelineConfig) -> Result<Prepared> {
    let features = layer.features();
    let mut dataset = Dataset::from_rows(
        layer.field_names().to_vec(),
        attribute_rows(layer.field_names(), features),
    );

    let without_geometry = features.iter().filter(|f| f.planar_geometry().is_none()).count();

    if config.add_coordinates {
        let centroids: Vec<Option<(f64, f64)>> = features
            .iter()
            .map(|f| {
                f.planar_geometry()
                    .and_then(|g| g.centroid())
                    .map(|p| (p.x(), p.y()))
            })
            .collect();
        push_coordinates(&mut dataset, &centroids)?;
    }

    debug!(
        layer = layer.name(),
        rows = dataset.len(),
        columns = dataset.columns().len(),
        "Layer dataset prepared"
    );

    Ok(Prepared {
        dataset,
        geometries_repaired: 0,
        features_without_geometry: without_geometry,
    })
}

/// Ramène les géométries dans le CRS géographique configuré (2D)
fn to_geographic_crs(set: &mut FeatureSet, config: &PipelineConfig) -> Result<()> {
    if set.epsg == config.geographic_epsg {
        return Ok(());
    }

    let reprojector = SmartReprojector::new(set.epsg, config.geographic_epsg)
        .with_context(|| format!("Cannot reproject EPSG:{} input", set.epsg))?;
    info!(
        from = set.epsg,
        to = config.geographic_epsg,
        reprojector = reprojector.description(),
        "Reprojecting input to geographic CRS"
    );

    for (index, feature) in set.features.iter_mut().enumerate() {
        let Some(planar) = feature.planar_geometry() else {
            continue;
        };
        let projected = reprojector
            .transform_geometry(&planar)
            .with_context(|| format!("Feature #{}: reprojection failed", index))?;
        feature.geometry = Some(geojson::Geometry::new(geojson::Value::from(&projected)));
    }

    set.epsg = config.geographic_epsg;
    Ok(())
}

/// Prépare les lignes d'un fichier : centroïdes, réparation, texte GeoJSON validé
pub fn prepare_file_dataset(path: &Path, config: &PipelineConfig) -> Result<Prepared> {
    let mut set = read_features(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    to_geographic_crs(&mut set, config)?;

    let planar: Vec<Option<Geometry>> = set.features.iter().map(Feature::planar_geometry).collect();

    let mut dataset = Dataset::from_rows(set.fields.clone(), attribute_rows(&set.fields, &set.features));
    if dataset.drop_column(GEOGRAPHY_COLUMN) {
        warn!(
            column = GEOGRAPHY_COLUMN,
            "Dropping attribute that collides with the GEOGRAPHY column"
        );
    }

    if config.add_coordinates {
        let deriver = CentroidDeriver::new(config.geographic_epsg, config.metric_epsg)?;
        let centroids = deriver.derive(&planar)?;
        push_coordinates(&mut dataset, &centroids)?;
    }

    let mut repaired = 0;
    let mut without_geometry = 0;
    let mut geojson_texts = Vec::with_capacity(set.len());

    for (index, (feature, planar)) in set.features.iter().zip(&planar).enumerate() {
        let Some(geometry) = &feature.geometry else {
            without_geometry += 1;
            geojson_texts.push(Value::Null);
            continue;
        };

        if ring_structure_error(&geometry.value).is_some()
            || planar.as_ref().map_or(false, |g| !is_valid(g))
        {
            repaired += 1;
        }

        let describe = || match &feature.id {
            Some(id) => format!("Feature #{} (id {})", index, id),
            None => format!("Feature #{}", index),
        };

        let cleaned = clean_geometry(&geometry.value).with_context(describe)?;
        let text = geojson::Geometry::new(cleaned).to_string();
        validate_geojson(&text).with_context(describe)?;

        geojson_texts.push(Value::String(text));
    }

    dataset.push_column(GEOJSON_COLUMN, geojson_texts)?;

    info!(
        path = %path.display(),
        rows = dataset.len(),
        repaired,
        without_geometry,
        "File dataset prepared"
    );

    Ok(Prepared {
        dataset,
        geometries_repaired: repaired,
        features_without_geometry: without_geometry,
    })
}

/// Charge une couche dans la table configurée
pub async fn layer_to_table<W: Warehouse + ?Sized>(
    layer: &dyn Layer,
    config: &PipelineConfig,
    warehouse: &W,
) -> Result<LoadReport> {
    let start = Instant::now();
    let table = config.table_ref(None)?;

    let prepared = prepare_layer_dataset(layer, config)?;
    let mut report = prepared.report(layer.name(), &table.short(), config);

    let rows = warehouse
        .write_table(&table, &prepared.dataset, config.write_mode)
        .await
        .with_context(|| format!("Failed to write table {}", table))?;
    report.record_write(rows);

    report.set_duration(start.elapsed());
    info!(layer = layer.name(), table = %table, rows, "Layer loaded");
    Ok(report)
}

/// Charge un fichier dans la table configurée, puis remplit la colonne GEOGRAPHY
pub async fn file_to_table<W: Warehouse + ?Sized>(
    path: &Path,
    config: &PipelineConfig,
    warehouse: &W,
) -> Result<LoadReport> {
    let start = Instant::now();
    let table = config.table_ref(None)?;

    let prepared = prepare_file_dataset(path, config)?;
    let mut report = prepared.report(&path.display().to_string(), &table.short(), config);

    if config.add_geography {
        let outcome = run_backfill(warehouse, &table, &prepared.dataset, config.write_mode).await?;
        report.record_backfill(&outcome);
    } else {
        let rows = warehouse
            .write_table(&table, &prepared.dataset, config.write_mode)
            .await
            .with_context(|| format!("Failed to write table {}", table))?;
        report.record_write(rows);
    }

    report.set_duration(start.elapsed());
    info!(path = %path.display(), table = %table, rows = report.rows, "File loaded");
    Ok(report)
}
