//! Projection Web Mercator (EPSG:3857)
//!
//! Aussi connu sous le nom de Pseudo-Mercator ou Spherical Mercator.

use super::Geographic;

/// Rayon de la sphère : demi-grand axe de WGS84, en mètres
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude maximale avant que Y ne diverge
const MAX_LATITUDE_DEG: f64 = 85.0;

/// Convertit coordonnées géographiques vers Web Mercator (EPSG:3857)
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    let r = EARTH_RADIUS;

    let lat = geo.lat.clamp(
        (-MAX_LATITUDE_DEG).to_radians(),
        MAX_LATITUDE_DEG.to_radians(),
    );

    // X = R * longitude
    let x = r * geo.lon;

    // Y = R * ln(tan(π/4 + lat/2))
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Convertit Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Geographic {
    let r = EARTH_RADIUS;

    // Longitude = x / R
    let lon = x / r;

    // Latitude = 2 * atan(exp(y/R)) - π/2
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;

    Geographic::new(lon, lat)
}
