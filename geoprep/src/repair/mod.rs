//! Réparation des géométries invalides puis normalisation 2D

pub mod ring;
pub mod topology;

use geo::orient::{Direction, Orient};
use geo::{BooleanOps, Geometry, LineString, MultiPolygon, Point, Polygon};
use geojson::Value;
use tracing::{debug, warn};

use crate::normalize::{check_positions, ensure_supported, force_2d, geometry_type, is_empty};
use crate::validity::{dedup_coords, ring_structure_error, validity_error};
use crate::GeoprepError;

/// Répare une géométrie si elle est invalide, puis la réduit en 2D.
///
/// C'est le point de composition : la réparation passe toujours avant
/// [`force_2d`]. Une géométrie valide conserve ses x/y d'origine à l'identique.
/// Un ring ouvert ou de moins de quatre positions passe par la réparation,
/// qui le referme. Un polygone vide s'écrit `"coordinates": []`.
pub fn clean_geometry(value: &Value) -> Result<Value, GeoprepError> {
    ensure_supported(value)?;

    if is_empty(value) {
        return Ok(empty_value(value));
    }

    check_positions(value)?;
    let planar = Geometry::<f64>::try_from(value.clone())?;

    match ring_structure_error(value).or_else(|| validity_error(&planar)) {
        None => force_2d(value),
        Some(reason) => {
            debug!(
                geometry_type = geometry_type(value),
                reason = %reason,
                "Repairing invalid geometry"
            );
            let repaired = make_valid(&planar);
            force_2d(&to_value(&repaired))
        }
    }
}

/// Forme canonique d'une géométrie vide (`[[]]` devient `[]`)
fn empty_value(value: &Value) -> Value {
    match value {
        Value::Polygon(_) => Value::Polygon(vec![]),
        Value::MultiPolygon(_) => Value::MultiPolygon(vec![]),
        other => other.clone(),
    }
}

fn to_value(geometry: &Geometry) -> Value {
    match geometry {
        Geometry::Polygon(poly) if poly.exterior().0.is_empty() => Value::Polygon(vec![]),
        other => Value::from(other),
    }
}

/// Produit un équivalent valide d'une géométrie.
///
/// - Polygon : rings noeudés et découpés en boucles simples, boucles dégénérées
///   écartées, réorganisation par inclusion puis orientation RFC 7946
/// - MultiPolygon : chaque partie réparée, parties fusionnées si elles se chevauchent
/// - LineString sans deux positions distinctes : réduit à un Point
pub fn make_valid(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Point(p) => Geometry::Point(*p),
        Geometry::LineString(ls) => repair_linestring(ls),
        Geometry::Polygon(poly) => polygons_to_geometry(repair_polygon(poly)),
        Geometry::MultiPolygon(mp) => {
            let parts: Vec<Polygon> = mp.iter().flat_map(repair_polygon).collect();
            let merged = MultiPolygon::new(parts);

            if validity_error(&Geometry::MultiPolygon(merged.clone())).is_none() {
                polygons_to_geometry(merged.0)
            } else {
                debug!(parts = merged.0.len(), "Merging overlapping polygons");
                polygons_to_geometry(union_all(merged.0))
            }
        }
        other => other.clone(),
    }
}

fn repair_linestring(ls: &LineString) -> Geometry {
    let coords = dedup_coords(&ls.0);
    match coords.len() {
        0 => Geometry::LineString(ls.clone()),
        1 => Geometry::Point(Point(coords[0])),
        _ => Geometry::LineString(LineString::new(coords)),
    }
}

/// Répare un polygone en une liste de polygones valides (éventuellement vide)
fn repair_polygon(poly: &Polygon) -> Vec<Polygon> {
    let mut loops = ring::split_simple_loops(poly.exterior());
    for interior in poly.interiors() {
        loops.extend(ring::split_simple_loops(interior));
    }

    if loops.is_empty() {
        warn!(
            points = poly.exterior().0.len(),
            "Polygon collapsed during repair, no area left"
        );
        return Vec::new();
    }

    let polygons = topology::organize_rings(loops.clone());
    let candidate = Geometry::MultiPolygon(MultiPolygon::new(polygons.clone()));
    if validity_error(&candidate).is_none() {
        return polygons;
    }

    // Rings distincts qui se croisent : différence symétrique de toutes les boucles
    debug!(loops = loops.len(), "Ring organization left overlaps, using symmetric difference");
    let xor = loops.into_iter().fold(MultiPolygon::new(vec![]), |acc, ring| {
        let part = MultiPolygon::new(vec![Polygon::new(ring, vec![]).orient(Direction::Default)]);
        acc.xor(&part)
    });
    xor.orient(Direction::Default).0
}

fn union_all(parts: Vec<Polygon>) -> Vec<Polygon> {
    parts
        .into_iter()
        .fold(MultiPolygon::new(vec![]), |acc, poly| {
            acc.union(&MultiPolygon::new(vec![poly]))
        })
        .orient(Direction::Default)
        .0
}

fn polygons_to_geometry(mut polygons: Vec<Polygon>) -> Geometry {
    match polygons.len() {
        0 => Geometry::Polygon(Polygon::new(LineString::new(vec![]), vec![])),
        1 => Geometry::Polygon(polygons.remove(0)),
        _ => Geometry::MultiPolygon(MultiPolygon::new(polygons)),
    }
}
