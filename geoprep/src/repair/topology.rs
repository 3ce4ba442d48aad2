//! Gestion de la topologie (trous, multipolygones)

use geo::orient::{Direction, Orient};
use geo::{Area, Contains, InteriorPoint, LineString, Polygon};

/// Organise des rings simples en polygones avec trous.
///
/// Un ring contenu dans un nombre impair d'autres rings devient un trou du
/// plus petit ring qui le contient ; les autres deviennent des extérieurs.
/// Les polygones sont orientés extérieur anti-horaire, trous horaires.
pub fn organize_rings(rings: Vec<LineString>) -> Vec<Polygon> {
    if rings.is_empty() {
        return Vec::new();
    }

    if rings.len() == 1 {
        return rings
            .into_iter()
            .map(|r| Polygon::new(r, vec![]).orient(Direction::Default))
            .collect();
    }

    let shells: Vec<Polygon> = rings
        .iter()
        .map(|r| Polygon::new(r.clone(), vec![]))
        .collect();
    let areas: Vec<f64> = shells.iter().map(|p| p.unsigned_area()).collect();

    // Parent (plus petit contenant) et profondeur d'imbrication de chaque ring
    let mut parent: Vec<Option<usize>> = vec![None; rings.len()];
    let mut depth: Vec<usize> = vec![0; rings.len()];

    for i in 0..rings.len() {
        let Some(probe) = shells[i].interior_point() else {
            continue;
        };

        for j in 0..rings.len() {
            if i == j || areas[j] <= areas[i] {
                continue;
            }
            if shells[j].contains(&probe) {
                depth[i] += 1;
                let tighter = parent[i].map_or(true, |p| areas[j] < areas[p]);
                if tighter {
                    parent[i] = Some(j);
                }
            }
        }
    }

    let mut holes: std::collections::HashMap<usize, Vec<LineString>> =
        std::collections::HashMap::new();
    let mut outer_indices: Vec<usize> = Vec::new();

    for i in 0..rings.len() {
        match parent[i] {
            Some(p) if depth[i] % 2 == 1 => {
                holes.entry(p).or_default().push(rings[i].clone());
            }
            _ => outer_indices.push(i),
        }
    }

    outer_indices
        .into_iter()
        .map(|outer_idx| {
            let interiors = holes.remove(&outer_idx).unwrap_or_default();
            Polygon::new(rings[outer_idx].clone(), interiors).orient(Direction::Default)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Winding;

    fn square(min: f64, max: f64) -> LineString {
        LineString::from(vec![(min, min), (max, min), (max, max), (min, max), (min, min)])
    }

    #[test]
    fn test_organize_single_ring() {
        let ring = LineString::from(vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)]);

        let polygons = organize_rings(vec![ring]);
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].interiors().is_empty());
        assert!(polygons[0].exterior().is_ccw());
    }

    #[test]
    fn test_nested_ring_becomes_hole() {
        let polygons = organize_rings(vec![square(2.0, 4.0), square(0.0, 10.0)]);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].interiors().len(), 1);
        assert!(polygons[0].interiors()[0].is_cw());
    }

    #[test]
    fn test_island_in_hole_is_outer() {
        let polygons = organize_rings(vec![square(0.0, 10.0), square(2.0, 8.0), square(4.0, 6.0)]);
        assert_eq!(polygons.len(), 2);
        let total_holes: usize = polygons.iter().map(|p| p.interiors().len()).sum();
        assert_eq!(total_holes, 1);
    }

    #[test]
    fn test_disjoint_rings() {
        let polygons = organize_rings(vec![square(0.0, 1.0), square(5.0, 6.0)]);
        assert_eq!(polygons.len(), 2);
    }
}
