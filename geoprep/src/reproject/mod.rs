//! Reprojection des géométries
//!
//! Deux niveaux :
//! - `ReprojectorLite` en Rust pur pour WGS84 (EPSG:4326) ↔ Web Mercator (EPSG:3857)
//! - `Reprojector` via PROJ pour le reste (feature `reproject`)
//!
//! `SmartReprojector` choisit automatiquement.

mod mercator;
#[cfg(feature = "reproject")]
mod proj;
mod smart;

#[cfg(feature = "reproject")]
pub use self::proj::Reprojector;
pub use smart::SmartReprojector;

use geo::{Coord, Geometry, MapCoords};

use crate::types::{WEB_MERCATOR_EPSG, WGS84_EPSG};
use crate::GeoprepError;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Reprojection légère WGS84 ↔ Web Mercator
#[derive(Debug, Clone, Copy)]
pub struct ReprojectorLite {
    source_epsg: u32,
    target_epsg: u32,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeoprepError> {
        if !Self::is_supported(source_epsg, target_epsg) {
            return Err(GeoprepError::reprojection(format!(
                "EPSG:{} → EPSG:{} not supported without PROJ. Supported: 4326 ↔ 3857",
                source_epsg, target_epsg
            )));
        }

        Ok(Self {
            source_epsg,
            target_epsg,
        })
    }

    /// Vérifie si la paire est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        matches!(
            (source, target),
            (WGS84_EPSG, WEB_MERCATOR_EPSG) | (WEB_MERCATOR_EPSG, WGS84_EPSG)
        )
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        match (self.source_epsg, self.target_epsg) {
            (WGS84_EPSG, WEB_MERCATOR_EPSG) => {
                mercator::geographic_to_web_mercator(Geographic::from_degrees(x, y))
            }
            _ => mercator::web_mercator_to_geographic(x, y).to_degrees(),
        }
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Geometry {
        geom.map_coords(|c| {
            let (x, y) = self.transform_point(c.x, c.y);
            Coord { x, y }
        })
    }
}
