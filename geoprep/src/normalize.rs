//! Normalisation des géométries en 2D (suppression des ordonnées Z/M)

use geojson::{PolygonType, Position, Value};

use crate::GeoprepError;

/// Nom GeoJSON du type de géométrie
pub fn geometry_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Vérifie si le type fait partie de {Point, LineString, Polygon, MultiPolygon}
pub fn ensure_supported(value: &Value) -> Result<(), GeoprepError> {
    match value {
        Value::Point(_) | Value::LineString(_) | Value::Polygon(_) | Value::MultiPolygon(_) => {
            Ok(())
        }
        other => Err(GeoprepError::UnsupportedGeometryType(
            geometry_type(other).to_string(),
        )),
    }
}

/// Une géométrie sans aucune coordonnée
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Point(p) => p.is_empty(),
        Value::MultiPoint(points) => points.is_empty(),
        Value::LineString(line) => line.is_empty(),
        Value::MultiLineString(lines) => lines.iter().all(|l| l.is_empty()),
        Value::Polygon(rings) => rings.iter().all(|r| r.is_empty()),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .all(|rings| rings.iter().all(|r| r.is_empty())),
        Value::GeometryCollection(members) => members.iter().all(|g| is_empty(&g.value)),
    }
}

/// Vérifie que chaque position porte au moins x et y, quel que soit le type.
///
/// À appeler avant toute conversion vers `geo`, qui panique sur une position courte.
pub fn check_positions(value: &Value) -> Result<(), GeoprepError> {
    match value {
        Value::Point(p) if p.is_empty() => Ok(()),
        Value::Point(p) => first_short(std::iter::once(p)),
        Value::MultiPoint(points) | Value::LineString(points) => first_short(points.iter()),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            first_short(lines.iter().flatten())
        }
        Value::MultiPolygon(polygons) => first_short(polygons.iter().flatten().flatten()),
        Value::GeometryCollection(members) => members
            .iter()
            .try_for_each(|g| check_positions(&g.value)),
    }
}

fn first_short<'a>(mut positions: impl Iterator<Item = &'a Position>) -> Result<(), GeoprepError> {
    match positions.find(|p| p.len() < 2) {
        Some(p) => Err(GeoprepError::MalformedPosition(p.len())),
        None => Ok(()),
    }
}

/// Réduit chaque coordonnée à ses deux premières ordonnées (x, y).
///
/// Les géométries vides sont renvoyées telles quelles. Tout type hors de
/// {Point, LineString, Polygon, MultiPolygon} est rejeté avec
/// [`GeoprepError::UnsupportedGeometryType`].
pub fn force_2d(value: &Value) -> Result<Value, GeoprepError> {
    ensure_supported(value)?;

    if is_empty(value) {
        return Ok(value.clone());
    }

    match value {
        Value::Point(p) => Ok(Value::Point(position_2d(p)?)),
        Value::LineString(line) => Ok(Value::LineString(ring_2d(line)?)),
        Value::Polygon(rings) => Ok(Value::Polygon(polygon_2d(rings)?)),
        Value::MultiPolygon(polygons) => {
            let polygons: Result<Vec<PolygonType>, GeoprepError> =
                polygons.iter().map(|p| polygon_2d(p)).collect();
            Ok(Value::MultiPolygon(polygons?))
        }
        // Écarté par ensure_supported
        other => Err(GeoprepError::UnsupportedGeometryType(
            geometry_type(other).to_string(),
        )),
    }
}

fn position_2d(position: &Position) -> Result<Position, GeoprepError> {
    match position.as_slice() {
        [x, y, ..] => Ok(vec![*x, *y]),
        other => Err(GeoprepError::MalformedPosition(other.len())),
    }
}

fn ring_2d(ring: &[Position]) -> Result<Vec<Position>, GeoprepError> {
    ring.iter().map(position_2d).collect()
}

fn polygon_2d(rings: &[Vec<Position>]) -> Result<PolygonType, GeoprepError> {
    rings.iter().map(|r| ring_2d(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_drops_z() {
        let point = Value::Point(vec![1.0, 2.0, 3.0]);
        assert_eq!(force_2d(&point).unwrap(), Value::Point(vec![1.0, 2.0]));
    }

    #[test]
    fn test_polygon_keeps_xy_sequence() {
        let polygon = Value::Polygon(vec![
            vec![
                vec![0.0, 0.0, 10.0],
                vec![4.0, 0.0, 11.0],
                vec![4.0, 4.0, 12.0],
                vec![0.0, 4.0, 13.0],
                vec![0.0, 0.0, 10.0],
            ],
            vec![
                vec![1.0, 1.0, 5.0, 99.0],
                vec![1.0, 2.0, 5.0, 99.0],
                vec![2.0, 2.0, 5.0, 99.0],
                vec![1.0, 1.0, 5.0, 99.0],
            ],
        ]);

        let Value::Polygon(rings) = force_2d(&polygon).unwrap() else {
            panic!("Expected Polygon");
        };
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0][1], vec![4.0, 0.0]);
        assert_eq!(rings[1][2], vec![2.0, 2.0]);
        assert!(rings.iter().flatten().all(|p| p.len() == 2));
    }

    #[test]
    fn test_multipolygon() {
        let square = vec![vec![
            vec![0.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0],
        ]];
        let multi = Value::MultiPolygon(vec![square.clone(), square]);

        let Value::MultiPolygon(polygons) = force_2d(&multi).unwrap() else {
            panic!("Expected MultiPolygon");
        };
        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().flatten().flatten().all(|p| p.len() == 2));
    }

    #[test]
    fn test_empty_passes_through() {
        let empty = Value::Polygon(vec![]);
        assert_eq!(force_2d(&empty).unwrap(), empty);

        let empty_point = Value::Point(vec![]);
        assert_eq!(force_2d(&empty_point).unwrap(), empty_point);
    }

    #[test]
    fn test_unsupported_types() {
        let cases = vec![
            Value::MultiPoint(vec![vec![0.0, 0.0]]),
            Value::MultiLineString(vec![vec![vec![0.0, 0.0], vec![1.0, 1.0]]]),
            Value::GeometryCollection(vec![]),
        ];

        for value in cases {
            let name = geometry_type(&value);
            match force_2d(&value) {
                Err(GeoprepError::UnsupportedGeometryType(t)) => assert_eq!(t, name),
                other => panic!("Expected unsupported error for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_malformed_position() {
        let point = Value::Point(vec![1.0]);
        assert!(matches!(
            force_2d(&point),
            Err(GeoprepError::MalformedPosition(1))
        ));
    }

    #[test]
    fn test_check_positions() {
        let line = Value::LineString(vec![vec![0.0, 0.0], vec![1.0]]);
        assert!(matches!(
            check_positions(&line),
            Err(GeoprepError::MalformedPosition(1))
        ));

        let nested = Value::GeometryCollection(vec![geojson::Geometry::new(Value::MultiPoint(
            vec![vec![0.0, 0.0], vec![]],
        ))]);
        assert!(matches!(
            check_positions(&nested),
            Err(GeoprepError::MalformedPosition(0))
        ));

        assert!(check_positions(&Value::Point(vec![])).is_ok());
        assert!(check_positions(&Value::Point(vec![1.0, 2.0, 3.0])).is_ok());
    }
}
