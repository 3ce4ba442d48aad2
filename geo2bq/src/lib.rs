//! # geo2bq
//!
//! Chargement de données géospatiales dans BigQuery.
//!
//! ## Features
//!
//! - Couche nommée -> table, avec centroïdes `longitude` / `latitude`
//! - Fichier GeoJSON -> table, géométries réparées et réduites en 2D,
//!   colonne `geometry_geojson` puis colonne GEOGRAPHY native
//! - Client REST BigQuery (compte de service, jobs de chargement, SQL)
//! - Rapport de chargement JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Couche d'un projet -> table
//! geo2bq layer --project-dir ./layers --layer az_homes --table az_homes.az_homes
//!
//! # Fichier GeoJSON -> table + GEOGRAPHY
//! geo2bq file --input co_census.geojson --table az_homes.az_homes_geom --credentials orobytes.json
//! ```

pub mod config;
pub mod layer;
pub mod pipeline;
pub mod report;
pub mod table;
pub mod warehouse;

pub use config::{PipelineConfig, TableRef, WriteMode};
pub use layer::{Layer, MemoryLayer, Project};
pub use pipeline::{file_to_table, layer_to_table};
pub use report::{LoadReport, LoadStatus};
pub use table::{ColumnType, Dataset, Row};
pub use warehouse::{BigQueryClient, Warehouse, WarehouseError};
