//! Types d'erreurs pour le crate geoprep

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture ou du nettoyage des géométries
#[derive(Debug, Error)]
pub enum GeoprepError {
    /// Erreur d'I/O lors de la lecture du fichier source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fichier GeoJSON illisible
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Texte JSON illisible
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Format de fichier non reconnu
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// Type de géométrie hors de {Point, LineString, Polygon, MultiPolygon}
    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometryType(String),

    /// Géométrie topologiquement invalide (auto-intersection, orientation)
    #[error("Invalid {geometry_type}: {reason}")]
    InvalidGeometry {
        geometry_type: String,
        reason: String,
    },

    /// Coordonnée avec plus de deux ordonnées après normalisation
    #[error("Found coordinates with more than 2 dimensions ({ordinates} ordinates)")]
    ExcessDimension { ordinates: usize },

    /// Position avec moins de deux ordonnées
    #[error("Malformed position: expected at least 2 ordinates, got {0}")]
    MalformedPosition(usize),

    /// Structure GeoJSON inattendue
    #[error("Malformed GeoJSON geometry: {0}")]
    MalformedGeoJson(String),

    /// Échec de reprojection
    #[error("Reprojection failed: {0}")]
    Reprojection(String),
}

impl GeoprepError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(geometry_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            geometry_type: geometry_type.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de reprojection
    pub fn reprojection(reason: impl Into<String>) -> Self {
        Self::Reprojection(reason.into())
    }
}
