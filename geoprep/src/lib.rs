//! # geoprep
//!
//! Préparation de features géospatiales avant chargement dans un entrepôt de données.
//!
//! ## Features
//!
//! - Lecture GeoJSON (FeatureCollection, Feature, Geometry) en conservant Z/M
//! - Réparation des géométries invalides (noeudage des rings, réorganisation trous/coques)
//! - Normalisation 2D sur `geojson::Value`, sans perte des x/y d'origine
//! - Centroïdes calculés en projection métrique puis ramenés en degrés
//! - Validation finale du texte GeoJSON sérialisé
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geoprep::{clean_geometry, read_features, validate_geojson};
//! use std::path::Path;
//!
//! let set = read_features(Path::new("co_census.geojson"))?;
//! for feature in &set.features {
//!     if let Some(geometry) = &feature.geometry {
//!         let cleaned = geojson::Geometry::new(clean_geometry(&geometry.value)?);
//!         validate_geojson(&cleaned.to_string())?;
//!     }
//! }
//! ```

pub mod centroid;
pub mod error;
pub mod normalize;
pub mod reader;
pub mod repair;
pub mod reproject;
pub mod types;
pub mod validate;
pub mod validity;

pub use centroid::CentroidDeriver;
pub use error::GeoprepError;
pub use normalize::force_2d;
pub use reader::{parse_geojson, read_features};
pub use repair::clean_geometry;
pub use types::{Feature, FeatureSet, Properties, WEB_MERCATOR_EPSG, WGS84_EPSG};
pub use validate::validate_geojson;
