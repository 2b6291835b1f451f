use serde::{Deserialize, Serialize};

use medilink_domain::geo::Coordinate;
use medilink_providers::overpass::{Pharmacy, PharmacySearch};

use crate::{Error, MedilinkService, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct PharmacyRequest {
	pub lat: f64,
	pub lng: f64,
	pub radius_m: Option<u32>,
	/// Case-insensitive name filter.
	pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PharmacyResponse {
	pub origin: Coordinate,
	pub radius_m: u32,
	pub pharmacies: Vec<Pharmacy>,
}

impl MedilinkService {
	/// Pharmacies around a point, nearest first, each with a directions link.
	pub async fn find_pharmacies(&self, req: PharmacyRequest) -> Result<PharmacyResponse> {
		let cfg = &self.cfg.pharmacy;
		let origin = Coordinate::new(req.lat, req.lng)
			.ok_or_else(|| Error::invalid("lat must be within ±90 and lng within ±180."))?;
		let radius_m = req.radius_m.unwrap_or(cfg.default_radius_m);

		if radius_m == 0 || radius_m > cfg.max_radius_m {
			return Err(Error::invalid(format!(
				"radius_m must be between 1 and {}.",
				cfg.max_radius_m
			)));
		}

		let search = PharmacySearch {
			origin,
			radius_m,
			name: req.name.filter(|name| !name.trim().is_empty()),
			max_results: cfg.max_results as usize,
		};
		let pharmacies = self.providers.pharmacy.search(&search).await.map_err(|err| {
			tracing::warn!(error = %err, "Pharmacy lookup failed.");

			Error::from(err)
		})?;

		Ok(PharmacyResponse { origin, radius_m, pharmacies })
	}
}
