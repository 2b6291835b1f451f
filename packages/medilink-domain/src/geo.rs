use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Coordinate {
	pub lat: f64,
	pub lng: f64,
}
impl Coordinate {
	/// Returns `None` for non-finite or out-of-range values.
	pub fn new(lat: f64, lng: f64) -> Option<Self> {
		if !lat.is_finite() || !lng.is_finite() {
			return None;
		}
		if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
			return None;
		}

		Some(Self { lat, lng })
	}
}

/// Great-circle distance in meters.
pub fn haversine_m(from: Coordinate, to: Coordinate) -> f64 {
	let phi1 = from.lat.to_radians();
	let phi2 = to.lat.to_radians();
	let d_phi = (to.lat - from.lat).to_radians();
	let d_lambda = (to.lng - from.lng).to_radians();
	let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
	let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

	EARTH_RADIUS_M * c
}

pub fn directions_url(origin: Coordinate, destination: Coordinate) -> String {
	format!(
		"https://www.google.com/maps/dir/?api=1&origin={},{}&destination={},{}&travelmode=driving",
		origin.lat, origin.lng, destination.lat, destination.lng
	)
}
