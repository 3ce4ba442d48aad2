//! Découpage d'un ring auto-intersectant en boucles simples

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Coord, Line, LineString, Polygon};

use crate::validity::dedup_coords;

/// Découpe un ring en boucles fermées simples.
///
/// Le ring est d'abord noeudé à chacune de ses auto-intersections, puis
/// parcouru : chaque retour sur une position déjà visitée referme une boucle.
/// Les boucles de moins de quatre positions ou d'aire nulle (pointes, arêtes
/// repliées) sont écartées.
pub fn split_simple_loops(ring: &LineString) -> Vec<LineString> {
    let mut coords = dedup_coords(&ring.0);
    if coords.len() < 3 {
        return Vec::new();
    }

    if !coords_equal(coords[0], coords[coords.len() - 1]) {
        tracing::warn!(points = coords.len(), "Auto-closing unclosed ring");
        coords.push(coords[0]);
    }
    if coords.len() < 4 {
        return Vec::new();
    }

    let noded = node_ring(&coords);

    let mut loops = Vec::new();
    let mut path: Vec<Coord> = Vec::with_capacity(noded.len());

    for c in noded {
        match path.iter().position(|p| coords_equal(*p, c)) {
            Some(pos) => {
                let mut ring_coords = path.split_off(pos);
                let start = ring_coords[0];
                ring_coords.push(start);
                path.push(start);
                if is_usable_loop(&ring_coords) {
                    loops.push(LineString::new(ring_coords));
                }
            }
            None => path.push(c),
        }
    }

    loops
}

/// Insère les points d'intersection dans les segments qui les portent
fn node_ring(coords: &[Coord]) -> Vec<Coord> {
    let segments: Vec<Line> = coords.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let mut splits: Vec<Vec<Coord>> = vec![Vec::new(); segments.len()];

    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    splits[i].push(intersection);
                    splits[j].push(intersection);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for c in [intersection.start, intersection.end] {
                        splits[i].push(c);
                        splits[j].push(c);
                    }
                }
            }
        }
    }

    let mut noded = Vec::with_capacity(coords.len());
    for (segment, mut points) in segments.iter().zip(splits) {
        noded.push(segment.start);

        points.retain(|p| !coords_equal(*p, segment.start) && !coords_equal(*p, segment.end));
        points.sort_by(|a, b| {
            distance2(segment.start, *a)
                .partial_cmp(&distance2(segment.start, *b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        points.dedup_by(|a, b| coords_equal(*a, *b));
        noded.extend(points);
    }
    noded.push(coords[coords.len() - 1]);

    noded
}

fn is_usable_loop(coords: &[Coord]) -> bool {
    if coords.len() < 4 {
        return false;
    }
    let polygon = Polygon::new(LineString::new(coords.to_vec()), vec![]);
    polygon.unsigned_area() > 0.0
}

fn distance2(a: Coord, b: Coord) -> f64 {
    (a.x - b.x).powi(2) + (a.y - b.y).powi(2)
}

/// Compare deux coordonnées avec tolérance
pub(crate) fn coords_equal(a: Coord, b: Coord) -> bool {
    const TOLERANCE: f64 = 1e-9;
    (a.x - b.x).abs() < TOLERANCE && (a.y - b.y).abs() < TOLERANCE
}
