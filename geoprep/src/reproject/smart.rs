//! Reprojection intelligente : ReprojectorLite en priorité, fallback sur PROJ

use geo::Geometry;

use super::ReprojectorLite;
use crate::GeoprepError;

/// Reprojection intelligente
///
/// Essaie d'abord la version pure Rust, puis PROJ si la feature `reproject` est activée.
pub enum SmartReprojector {
    /// Reprojection légère (pure Rust)
    Lite(ReprojectorLite),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(super::Reprojector),
    /// Pas de reprojection (source == cible)
    Identity,
}

impl SmartReprojector {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeoprepError> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            return Ok(Self::Lite(ReprojectorLite::new(source_epsg, target_epsg)?));
        }

        #[cfg(feature = "reproject")]
        {
            let proj = super::Reprojector::new(source_epsg, target_epsg)?;
            return Ok(Self::Proj(proj));
        }

        #[cfg(not(feature = "reproject"))]
        {
            return Err(GeoprepError::reprojection(format!(
                "EPSG:{} → EPSG:{} not supported.\n\
                 Built-in projections: 4326 (WGS84) ↔ 3857 (Web Mercator)\n\
                 For other projections, build with: cargo build --features reproject",
                source_epsg, target_epsg
            )));
        }
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, GeoprepError> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite(lite) => Ok(lite.transform_geometry(geom)),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Lite(_) => "built-in web mercator",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}
