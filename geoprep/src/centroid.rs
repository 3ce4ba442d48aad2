//! Centroïdes calculés en projection métrique
//!
//! Un centroïde calculé directement en degrés est déformé par l'échelle des
//! coordonnées géographiques. Les géométries sont donc projetées dans un CRS
//! métrique, le centroïde y est calculé, puis ramené en coordonnées
//! géographiques.

use geo::{Centroid, Geometry, Point};
use tracing::debug;

use crate::reproject::SmartReprojector;
use crate::types::{WEB_MERCATOR_EPSG, WGS84_EPSG};
use crate::GeoprepError;

/// Calcul des centroïdes (longitude, latitude) via une projection métrique
pub struct CentroidDeriver {
    to_metric: SmartReprojector,
    to_geographic: SmartReprojector,
}

impl CentroidDeriver {
    /// Crée un deriver entre un CRS géographique et un CRS métrique
    pub fn new(geographic_epsg: u32, metric_epsg: u32) -> Result<Self, GeoprepError> {
        let to_metric = SmartReprojector::new(geographic_epsg, metric_epsg)?;
        let to_geographic = SmartReprojector::new(metric_epsg, geographic_epsg)?;

        debug!(
            geographic_epsg,
            metric_epsg,
            reprojector = to_metric.description(),
            "Centroid deriver ready"
        );

        Ok(Self {
            to_metric,
            to_geographic,
        })
    }

    /// Deriver WGS84 ↔ Web Mercator
    pub fn web_mercator() -> Result<Self, GeoprepError> {
        Self::new(WGS84_EPSG, WEB_MERCATOR_EPSG)
    }

    /// Centroïde d'une géométrie, `None` si elle est vide
    pub fn centroid(&self, geometry: &Geometry) -> Result<Option<(f64, f64)>, GeoprepError> {
        let projected = self.to_metric.transform_geometry(geometry)?;

        let Some(center) = projected.centroid() else {
            return Ok(None);
        };

        match self
            .to_geographic
            .transform_geometry(&Geometry::Point(center))?
        {
            Geometry::Point(Point(c)) => Ok(Some((c.x, c.y))),
            other => Err(GeoprepError::reprojection(format!(
                "centroid reprojection returned a non-point geometry: {:?}",
                other
            ))),
        }
    }

    /// Centroïdes alignés sur l'ordre des géométries ; `None` pour les absentes ou vides
    pub fn derive(
        &self,
        geometries: &[Option<Geometry>],
    ) -> Result<Vec<Option<(f64, f64)>>, GeoprepError> {
        geometries
            .iter()
            .map(|g| match g {
                Some(geometry) => self.centroid(geometry),
                None => Ok(None),
            })
            .collect()
    }
}
