//! Types de données pour le crate geoprep

use serde_json::{Map, Value};

/// Propriétés d'une feature, dans l'ordre du fichier source
pub type Properties = Map<String, Value>;

/// Une feature avec sa géométrie et ses attributs
#[derive(Debug, Clone)]
pub struct Feature {
    /// Identifiant de la feature (membre `id` du GeoJSON), si présent
    pub id: Option<String>,

    /// Géométrie d'origine, toutes ordonnées conservées (Z/M compris)
    pub geometry: Option<geojson::Geometry>,

    /// Attributs de la feature (clé -> valeur)
    pub properties: Properties,
}

impl Feature {
    /// Géométrie 2D `geo` pour les calculs (centroïde, validité)
    ///
    /// Les ordonnées au-delà de x/y sont ignorées par la conversion. Une
    /// géométrie vide ou avec une position de moins de deux ordonnées donne `None`.
    pub fn planar_geometry(&self) -> Option<geo::Geometry> {
        let geometry = self.geometry.as_ref()?;
        if crate::normalize::is_empty(&geometry.value) {
            return None;
        }
        crate::normalize::check_positions(&geometry.value).ok()?;
        geo::Geometry::<f64>::try_from(geometry.value.clone()).ok()
    }
}

/// Résultat de la lecture d'un fichier géospatial
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Features dans l'ordre du fichier
    pub features: Vec<Feature>,

    /// Union des noms de propriétés, dans l'ordre de première apparition
    pub fields: Vec<String>,

    /// Code EPSG des coordonnées (4326 sauf membre `crs` explicite)
    pub epsg: u32,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Code EPSG WGS84, CRS implicite de GeoJSON (RFC 7946)
pub const WGS84_EPSG: u32 = 4326;

/// Code EPSG Web Mercator
pub const WEB_MERCATOR_EPSG: u32 = 3857;
