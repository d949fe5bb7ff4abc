//! Geofencing: great-circle distance and zone membership

use crate::models::activity::{Coordinates, LocationRequirement};

/// Mean Earth radius used for all distance computations, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points in meters.
pub fn haversine_distance(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    // Clamp guards asin against rounding slightly above 1 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Result of checking a position against an activity's location requirement
#[derive(Debug, Clone, PartialEq)]
pub struct GeoCheck {
    pub valid: bool,
    /// Distance to the matching zone, or to the nearest one on failure
    pub distance_m: Option<f64>,
    pub message: Option<String>,
}

impl GeoCheck {
    fn unrestricted() -> Self {
        Self { valid: true, distance_m: None, message: None }
    }

    fn inside(distance_m: f64) -> Self {
        Self { valid: true, distance_m: Some(distance_m), message: None }
    }

    fn outside(distance_m: f64, message: String) -> Self {
        Self { valid: false, distance_m: Some(distance_m), message: Some(message) }
    }
}

/// Decide whether `point` satisfies `requirement`.
///
/// With several zones the point is accepted if it lies inside any of them,
/// whatever time slot each zone was declared for. Callers must pass finite
/// coordinates.
pub fn validate_location(point: Coordinates, requirement: &LocationRequirement) -> GeoCheck {
    match requirement {
        LocationRequirement::None => GeoCheck::unrestricted(),
        LocationRequirement::Single(zone) => {
            let distance = haversine_distance(point, zone.center);
            if distance <= zone.radius_m {
                GeoCheck::inside(distance)
            } else {
                GeoCheck::outside(
                    distance,
                    format!(
                        "too far from venue: {:.0}m away, allowed radius is {:.0}m",
                        distance, zone.radius_m
                    ),
                )
            }
        }
        LocationRequirement::Multi { zones } => {
            let measured = zones
                .iter()
                .map(|zone| (zone, haversine_distance(point, zone.center())));

            let mut nearest = None;
            for (zone, distance) in measured {
                if distance <= zone.radius_m {
                    return GeoCheck::inside(distance);
                }
                match nearest {
                    Some((_, best)) if best <= distance => {}
                    _ => nearest = Some((zone, distance)),
                }
            }

            match nearest {
                Some((zone, distance)) => GeoCheck::outside(
                    distance,
                    format!(
                        "too far from venue: {:.0}m away from the {} location, allowed radius is {:.0}m",
                        distance, zone.time_slot, zone.radius_m
                    ),
                ),
                // No zones declared: nothing to enforce
                None => GeoCheck::unrestricted(),
            }
        }
    }
}
