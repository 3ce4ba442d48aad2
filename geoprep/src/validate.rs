//! Validation de la géométrie sérialisée (texte GeoJSON) avant envoi
//!
//! Dernier contrôle avant que les données ne quittent le processus : un
//! Polygon/MultiPolygon doit être valide, et aucune position ne doit porter
//! plus de deux ordonnées.

use geozero::geojson::GeoJson;
use geozero::ToGeo;
use serde_json::Value;

use crate::validity::{open_ring_error, validity_error};
use crate::GeoprepError;

/// Valide un texte GeoJSON de géométrie et le renvoie inchangé.
///
/// # Errors
///
/// - [`GeoprepError::InvalidGeometry`] si un Polygon/MultiPolygon est invalide
/// - [`GeoprepError::ExcessDimension`] si une position a plus de deux ordonnées
/// - [`GeoprepError::Json`] / [`GeoprepError::MalformedGeoJson`] si le texte est illisible
pub fn validate_geojson(text: &str) -> Result<&str, GeoprepError> {
    let data: Value = serde_json::from_str(text)?;

    let geometry_type = data
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeoprepError::MalformedGeoJson("missing `type` member".to_string()))?;

    if matches!(geometry_type, "Polygon" | "MultiPolygon") {
        // Avant décodage : geozero referme les rings ouverts
        check_rings(geometry_type, &data["coordinates"])?;

        if has_positions(&data["coordinates"]) {
            let geometry = GeoJson(text)
                .to_geo()
                .map_err(|e| GeoprepError::MalformedGeoJson(e.to_string()))?;

            if let Some(reason) = validity_error(&geometry) {
                return Err(GeoprepError::invalid_geometry(
                    geometry_type,
                    format!("contains self-intersections or invalid ring orientation ({reason})"),
                ));
            }
        }
    }

    check_dimensions(&data)?;

    Ok(text)
}

/// Rings fermés d'au moins quatre positions, sur le texte d'origine
fn check_rings(geometry_type: &str, coordinates: &Value) -> Result<(), GeoprepError> {
    let polygons: Vec<&Value> = match geometry_type {
        "Polygon" => vec![coordinates],
        _ => coordinates.as_array().map(|a| a.iter().collect()).unwrap_or_default(),
    };

    for ring in polygons.into_iter().filter_map(Value::as_array).flatten() {
        let positions: Vec<Vec<f64>> = ring
            .as_array()
            .ok_or_else(|| GeoprepError::MalformedGeoJson(format!("ring is not an array: {ring}")))?
            .iter()
            .map(|p| {
                p.as_array()
                    .map(|ordinates| ordinates.iter().filter_map(Value::as_f64).collect())
                    .unwrap_or_default()
            })
            .collect();

        if let Some(reason) = open_ring_error(&positions) {
            return Err(GeoprepError::invalid_geometry(geometry_type, reason));
        }
    }
    Ok(())
}

/// Parcourt `coordinates` (et `geometries` pour les collections)
fn check_dimensions(geometry: &Value) -> Result<(), GeoprepError> {
    if let Some(coordinates) = geometry.get("coordinates") {
        check_positions(coordinates)?;
    }
    if let Some(Value::Array(members)) = geometry.get("geometries") {
        members.iter().try_for_each(check_dimensions)?;
    }
    Ok(())
}

fn check_positions(coordinates: &Value) -> Result<(), GeoprepError> {
    match coordinates {
        Value::Array(items) if is_position(items) => {
            if items.len() > 2 {
                Err(GeoprepError::ExcessDimension {
                    ordinates: items.len(),
                })
            } else {
                Ok(())
            }
        }
        Value::Array(items) => items.iter().try_for_each(check_positions),
        _ => Ok(()),
    }
}

fn has_positions(coordinates: &Value) -> bool {
    match coordinates {
        Value::Array(items) if is_position(items) => true,
        Value::Array(items) => items.iter().any(has_positions),
        _ => false,
    }
}

fn is_position(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_number)
}
