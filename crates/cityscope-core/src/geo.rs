// crates/cityscope-core/src/geo.rs

use crate::model::{City, Location};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points using the haversine formula.
///
/// Returns distance in kilometers.
pub fn haversine_km(from: Location, to: Location) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Fresh copy of `cities` with `distance` set relative to `origin`.
pub fn with_distances(cities: &[City], origin: Location) -> Vec<City> {
    cities
        .iter()
        .map(|city| {
            let here = Location::new(city.latitude, city.longitude);
            City {
                distance: Some(haversine_km(origin, here)),
                ..city.clone()
            }
        })
        .collect()
}
