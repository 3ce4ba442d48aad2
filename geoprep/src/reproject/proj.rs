//! Reprojection via PROJ (feature `reproject`)

use geo::{Coord, Geometry, LineString, MapCoords, MultiPolygon, Polygon};
use proj::Proj;

use crate::GeoprepError;

/// Transformation PROJ entre deux codes EPSG
pub struct Reprojector {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reprojector(EPSG:{} -> EPSG:{})", self.source_epsg, self.target_epsg)
    }
}

impl Reprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeoprepError> {
        let from = format!("EPSG:{}", source_epsg);
        let to = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&from, &to, None).map_err(|e| {
            GeoprepError::reprojection(format!("No PROJ transformation {} -> {}: {}", from, to, e))
        })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Les anneaux et lignes sont convertis par lot, le reste point par point
    pub fn transform_geometry(&self, geometry: &Geometry) -> Result<Geometry, GeoprepError> {
        Ok(match geometry {
            Geometry::LineString(line) => Geometry::LineString(self.ring(line)?),
            Geometry::Polygon(polygon) => Geometry::Polygon(self.polygon(polygon)?),
            Geometry::MultiPolygon(multi) => Geometry::MultiPolygon(MultiPolygon::new(
                multi
                    .iter()
                    .map(|p| self.polygon(p))
                    .collect::<Result<_, _>>()?,
            )),
            other => other.try_map_coords(|c| {
                let (x, y) = self
                    .proj
                    .convert((c.x, c.y))
                    .map_err(|e| GeoprepError::reprojection(e.to_string()))?;
                Ok(Coord { x, y })
            })?,
        })
    }

    fn ring(&self, line: &LineString) -> Result<LineString, GeoprepError> {
        let mut points: Vec<(f64, f64)> = line.coords().map(|c| (c.x, c.y)).collect();
        self.proj
            .convert_array(&mut points)
            .map_err(|e| GeoprepError::reprojection(e.to_string()))?;
        Ok(points.into_iter().map(|(x, y)| Coord { x, y }).collect())
    }

    fn polygon(&self, polygon: &Polygon) -> Result<Polygon, GeoprepError> {
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.ring(ring))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(self.ring(polygon.exterior())?, interiors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};

    #[test]
    fn test_utm_point_to_wgs84() {
        // Denver, UTM 13N
        let reprojector = Reprojector::new(32613, 4326).unwrap();

        let denver = Geometry::Point(Point::new(500_000.0, 4_398_000.0));
        let Geometry::Point(p) = reprojector.transform_geometry(&denver).unwrap() else {
            panic!("Expected Point geometry");
        };
        assert!((p.x() - (-105.0)).abs() < 0.1, "lon={}", p.x());
        assert!((p.y() - 39.74).abs() < 0.1, "lat={}", p.y());
    }

    #[test]
    fn test_polygon_keeps_ring_length() {
        let reprojector = Reprojector::new(4326, 32613).unwrap();
        let tract = Geometry::Polygon(polygon![
            (x: -105.00, y: 39.70),
            (x: -104.98, y: 39.70),
            (x: -104.98, y: 39.72),
            (x: -105.00, y: 39.70),
        ]);

        let Geometry::Polygon(p) = reprojector.transform_geometry(&tract).unwrap() else {
            panic!("Expected Polygon geometry");
        };
        assert_eq!(p.exterior().0.len(), 4);
        assert!(p.exterior().0[0].x > 400_000.0);
    }

    #[test]
    fn test_unknown_epsg() {
        assert!(Reprojector::new(99999, 4326).is_err());
    }
}
