//! Contrôle de validité topologique des géométries 2D
//!
//! Règles appliquées :
//! - ordonnées finies
//! - LineString : au moins deux positions distinctes
//! - ring : fermé, au moins quatre positions, simple
//! - Polygon : trous à l'intérieur de l'extérieur, sans croisement ni imbrication,
//!   extérieur anti-horaire et trous horaires (RFC 7946)
//! - MultiPolygon : parties valides, sans croisement ni inclusion mutuelle

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Contains, Coord, Geometry, Line, LineString, MultiPolygon, Polygon, Winding};

/// Retourne la raison de l'invalidité, ou `None` si la géométrie est valide
pub fn validity_error(geometry: &Geometry) -> Option<String> {
    match geometry {
        Geometry::Point(p) => non_finite(std::iter::once(p.0)),
        Geometry::MultiPoint(mp) => non_finite(mp.iter().map(|p| p.0)),
        Geometry::Line(line) => linestring_error(&LineString::new(vec![line.start, line.end])),
        Geometry::LineString(ls) => linestring_error(ls),
        Geometry::MultiLineString(mls) => mls.iter().find_map(linestring_error),
        Geometry::Polygon(poly) => polygon_error(poly),
        Geometry::MultiPolygon(mp) => multipolygon_error(mp),
        Geometry::Rect(rect) => polygon_error(&rect.to_polygon()),
        Geometry::Triangle(triangle) => polygon_error(&triangle.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.iter().find_map(validity_error),
    }
}

/// Contrôle des rings tels qu'écrits dans le GeoJSON.
///
/// La conversion vers `geo` referme les rings sans le signaler : un ring
/// ouvert ou trop court doit donc être détecté sur les positions d'origine.
pub fn ring_structure_error(value: &geojson::Value) -> Option<String> {
    match value {
        geojson::Value::Polygon(rings) => rings.iter().find_map(|r| open_ring_error(r)),
        geojson::Value::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .find_map(|r| open_ring_error(r)),
        _ => None,
    }
}

/// Ring GeoJSON : au moins quatre positions, première et dernière identiques en x/y
pub(crate) fn open_ring_error<P: AsRef<[f64]>>(ring: &[P]) -> Option<String> {
    if ring.len() < 4 {
        return Some(format!(
            "ring has {} positions, at least 4 required",
            ring.len()
        ));
    }
    let first = ring[0].as_ref();
    let last = ring[ring.len() - 1].as_ref();
    if first.get(..2) != last.get(..2) {
        return Some("ring is not closed".to_string());
    }
    None
}

/// Vérifie si la géométrie est topologiquement valide
pub fn is_valid(geometry: &Geometry) -> bool {
    validity_error(geometry).is_none()
}

fn non_finite(mut coords: impl Iterator<Item = Coord>) -> Option<String> {
    coords
        .find(|c| !c.x.is_finite() || !c.y.is_finite())
        .map(|c| format!("non-finite coordinate ({}, {})", c.x, c.y))
}

fn linestring_error(ls: &LineString) -> Option<String> {
    if ls.0.is_empty() {
        return None;
    }
    if let Some(reason) = non_finite(ls.coords().copied()) {
        return Some(reason);
    }
    if dedup_coords(&ls.0).len() < 2 {
        return Some("too few distinct points in linestring".to_string());
    }
    None
}

/// Supprime les positions consécutives identiques
pub(crate) fn dedup_coords(coords: &[Coord]) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(coords.len());
    for &c in coords {
        if out.last() != Some(&c) {
            out.push(c);
        }
    }
    out
}

fn ring_segments(ring: &LineString) -> Vec<Line> {
    dedup_coords(&ring.0)
        .windows(2)
        .map(|w| Line::new(w[0], w[1]))
        .collect()
}

fn ring_error(ring: &LineString) -> Option<String> {
    if let Some(reason) = non_finite(ring.coords().copied()) {
        return Some(reason);
    }
    let coords = dedup_coords(&ring.0);
    if coords.len() < 4 {
        return Some(format!(
            "ring has {} distinct positions, at least 4 required",
            coords.len()
        ));
    }
    if !ring.is_closed() {
        return Some("ring is not closed".to_string());
    }

    let segments = ring_segments(ring);
    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            if !boxes_overlap(&segments[i], &segments[j]) {
                continue;
            }
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    return Some(format!(
                        "ring self-intersection at ({}, {})",
                        intersection.x, intersection.y
                    ));
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    return Some(format!(
                        "ring self-overlap at ({}, {})",
                        intersection.start.x, intersection.start.y
                    ));
                }
            }
        }
    }
    None
}

fn polygon_error(poly: &Polygon) -> Option<String> {
    if poly.exterior().0.is_empty() {
        return None;
    }

    if let Some(reason) = ring_error(poly.exterior()) {
        return Some(format!("exterior {}", reason));
    }
    for (i, interior) in poly.interiors().iter().enumerate() {
        if let Some(reason) = ring_error(interior) {
            return Some(format!("interior ring {} {}", i, reason));
        }
    }

    if !poly.exterior().is_ccw() {
        return Some("invalid ring orientation: exterior ring must be counter-clockwise".into());
    }
    if poly.interiors().iter().any(|ring| !ring.is_cw()) {
        return Some("invalid ring orientation: interior rings must be clockwise".into());
    }

    let shell = Polygon::new(poly.exterior().clone(), vec![]);
    for (i, interior) in poly.interiors().iter().enumerate() {
        if rings_cross(poly.exterior(), interior) {
            return Some(format!("interior ring {} crosses the exterior ring", i));
        }
        if !shell.contains(interior) {
            return Some(format!("interior ring {} lies outside the exterior ring", i));
        }
    }

    let interiors = poly.interiors();
    for i in 0..interiors.len() {
        for j in (i + 1)..interiors.len() {
            if rings_cross(&interiors[i], &interiors[j]) {
                return Some(format!("interior rings {} and {} cross", i, j));
            }
            let a = Polygon::new(interiors[i].clone(), vec![]);
            let b = Polygon::new(interiors[j].clone(), vec![]);
            if a.contains(&interiors[j]) || b.contains(&interiors[i]) {
                return Some(format!("interior rings {} and {} are nested", i, j));
            }
        }
    }

    None
}

fn multipolygon_error(mp: &MultiPolygon) -> Option<String> {
    for (i, poly) in mp.iter().enumerate() {
        if let Some(reason) = polygon_error(poly) {
            return Some(format!("polygon {}: {}", i, reason));
        }
    }

    let parts: Vec<&Polygon> = mp.iter().filter(|p| !p.exterior().0.is_empty()).collect();
    for i in 0..parts.len() {
        for j in (i + 1)..parts.len() {
            let (a, b) = (parts[i], parts[j]);
            let crossing = std::iter::once(a.exterior())
                .chain(a.interiors())
                .any(|ra| {
                    std::iter::once(b.exterior())
                        .chain(b.interiors())
                        .any(|rb| rings_cross(ra, rb))
                });
            if crossing {
                return Some(format!("polygons {} and {} overlap", i, j));
            }
            if a.contains(b.exterior()) || b.contains(a.exterior()) {
                return Some(format!("polygons {} and {} are nested", i, j));
            }
        }
    }

    None
}

/// Deux rings se croisent ou partagent un segment (un contact ponctuel est admis)
fn rings_cross(a: &LineString, b: &LineString) -> bool {
    let segments_b = ring_segments(b);
    ring_segments(a).iter().any(|sa| {
        segments_b.iter().any(|sb| {
            boxes_overlap(sa, sb)
                && matches!(
                    line_intersection(*sa, *sb),
                    Some(LineIntersection::SinglePoint { is_proper: true, .. })
                        | Some(LineIntersection::Collinear { .. })
                )
        })
    })
}

fn boxes_overlap(a: &Line, b: &Line) -> bool {
    a.start.x.min(a.end.x) <= b.start.x.max(b.end.x)
        && b.start.x.min(b.end.x) <= a.start.x.max(a.end.x)
        && a.start.y.min(a.end.y) <= b.start.y.max(b.end.y)
        && b.start.y.min(b.end.y) <= a.start.y.max(a.end.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};

    fn unit_square() -> Polygon {
        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)]
    }

    #[test]
    fn test_valid_square() {
        assert!(is_valid(&Geometry::Polygon(unit_square())));
    }

    #[test]
    fn test_bowtie_is_invalid() {
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)];
        let reason = validity_error(&Geometry::Polygon(bowtie)).unwrap();
        assert!(reason.contains("self-intersection"), "{}", reason);
    }

    #[test]
    fn test_clockwise_exterior_is_invalid() {
        let cw = polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0)];
        let reason = validity_error(&Geometry::Polygon(cw)).unwrap();
        assert!(reason.contains("orientation"), "{}", reason);
    }

    #[test]
    fn test_hole_inside_is_valid() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 2.0, y: 4.0), (x: 4.0, y: 4.0), (x: 4.0, y: 2.0), (x: 2.0, y: 2.0)]]
        );
        assert!(is_valid(&Geometry::Polygon(poly)));
    }

    #[test]
    fn test_hole_outside_is_invalid() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 20.0, y: 20.0), (x: 20.0, y: 24.0), (x: 24.0, y: 24.0), (x: 24.0, y: 20.0), (x: 20.0, y: 20.0)]]
        );
        let reason = validity_error(&Geometry::Polygon(poly)).unwrap();
        assert!(reason.contains("outside"), "{}", reason);
    }

    #[test]
    fn test_overlapping_multipolygon_is_invalid() {
        let a = unit_square();
        let b = polygon![(x: 0.5, y: 0.5), (x: 1.5, y: 0.5), (x: 1.5, y: 1.5), (x: 0.5, y: 1.5), (x: 0.5, y: 0.5)];
        let reason = validity_error(&Geometry::MultiPolygon(MultiPolygon::new(vec![a, b]))).unwrap();
        assert!(reason.contains("overlap"), "{}", reason);
    }

    #[test]
    fn test_touching_multipolygon_is_valid() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)];
        let b = polygon![(x: 1.0, y: 1.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 1.0, y: 1.0)];
        assert!(is_valid(&Geometry::MultiPolygon(MultiPolygon::new(vec![a, b]))));
    }

    #[test]
    fn test_degenerate_linestring() {
        let ls = LineString::from(vec![(1.0, 1.0), (1.0, 1.0)]);
        assert!(!is_valid(&Geometry::LineString(ls)));
        assert!(is_valid(&Geometry::Point(Point::new(1.0, 1.0))));
    }

    #[test]
    fn test_empty_polygon_is_valid() {
        let empty = Polygon::new(LineString::new(vec![]), vec![]);
        assert!(is_valid(&Geometry::Polygon(empty)));
    }

    #[test]
    fn test_open_ring_in_source_text() {
        let open = geojson::Value::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
        ]]);
        assert_eq!(ring_structure_error(&open).as_deref(), Some("ring is not closed"));

        // La conversion geo referme le ring : plus rien à signaler côté geo
        let planar = Geometry::<f64>::try_from(open).unwrap();
        assert!(validity_error(&planar).is_none());
    }

    #[test]
    fn test_short_ring_in_source_text() {
        let triangle = geojson::Value::MultiPolygon(vec![vec![vec![
            vec![0.0, 0.0, 5.0],
            vec![1.0, 0.0, 5.0],
            vec![0.0, 1.0, 5.0],
        ]]]);
        assert!(ring_structure_error(&triangle)
            .unwrap()
            .contains("3 positions"));
    }

    #[test]
    fn test_closed_ring_ignores_z() {
        let ring = vec![
            vec![0.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0],
            vec![0.0, 0.0, 2.0],
        ];
        assert!(open_ring_error(&ring).is_none());
    }
}
