use std::{cmp::Ordering, time::Duration};

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use medilink_domain::geo::{self, Coordinate};

use crate::{Error, Result};

const UNNAMED: &str = "Unnamed Pharmacy";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pharmacy {
	pub osm_id: i64,
	pub name: String,
	pub address: Option<String>,
	pub phone: Option<String>,
	pub opening_hours: Option<String>,
	pub location: Coordinate,
	pub distance_m: f64,
	pub directions_url: String,
}

#[derive(Clone, Debug)]
pub struct PharmacySearch {
	pub origin: Coordinate,
	pub radius_m: u32,
	/// Case-insensitive substring the pharmacy name must contain.
	pub name: Option<String>,
	pub max_results: usize,
}

pub struct PharmacyLocator {
	client: Client,
	endpoint: String,
}
impl PharmacyLocator {
	pub fn new(cfg: &medilink_config::Pharmacy) -> Result<Self> {
		if cfg.overpass_url.trim().is_empty() {
			return Err(Error::InvalidConfig {
				message: "pharmacy.overpass_url must be non-empty.".to_string(),
			});
		}

		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { client, endpoint: cfg.overpass_url.clone() })
	}

	/// Pharmacies within the search radius, nearest first.
	pub async fn search(&self, search: &PharmacySearch) -> Result<Vec<Pharmacy>> {
		let query = build_query(search.origin, search.radius_m);
		let res = self.client.get(&self.endpoint).query(&[("data", query.as_str())]).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_overpass_response(&json, search)
	}
}

pub fn build_query(origin: Coordinate, radius_m: u32) -> String {
	format!(
		"[out:json];node[amenity=pharmacy](around:{radius_m},{},{});out;",
		origin.lat, origin.lng
	)
}

pub fn parse_overpass_response(json: &Value, search: &PharmacySearch) -> Result<Vec<Pharmacy>> {
	let elements = json.get("elements").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Overpass response is missing elements array.".to_string() }
	})?;
	let needle = search
		.name
		.as_deref()
		.map(str::trim)
		.filter(|name| !name.is_empty())
		.map(str::to_lowercase);
	let mut pharmacies = Vec::with_capacity(elements.len());

	for element in elements {
		let (Some(lat), Some(lng)) =
			(element.get("lat").and_then(|v| v.as_f64()), element.get("lon").and_then(|v| v.as_f64()))
		else {
			continue;
		};
		let Some(location) = Coordinate::new(lat, lng) else {
			continue;
		};
		let tags = element.get("tags");
		let tag = |key: &str| {
			tags.and_then(|t| t.get(key))
				.and_then(|v| v.as_str())
				.map(str::trim)
				.filter(|v| !v.is_empty())
				.map(str::to_string)
		};
		let name = tag("name").unwrap_or_else(|| UNNAMED.to_string());

		if let Some(needle) = needle.as_deref()
			&& !name.to_lowercase().contains(needle)
		{
			continue;
		}

		let address = [tag("addr:housenumber"), tag("addr:street"), tag("addr:city")]
			.into_iter()
			.flatten()
			.collect::<Vec<_>>()
			.join(", ");

		pharmacies.push(Pharmacy {
			osm_id: element.get("id").and_then(|v| v.as_i64()).unwrap_or_default(),
			name,
			address: (!address.is_empty()).then_some(address),
			phone: tag("phone").or_else(|| tag("contact:phone")),
			opening_hours: tag("opening_hours"),
			location,
			distance_m: geo::haversine_m(search.origin, location),
			directions_url: geo::directions_url(search.origin, location),
		});
	}

	pharmacies.sort_by(|a, b| {
		a.distance_m.partial_cmp(&b.distance_m).unwrap_or(Ordering::Equal).then(a.osm_id.cmp(&b.osm_id))
	});
	pharmacies.truncate(search.max_results);

	Ok(pharmacies)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn search(name: Option<&str>, max_results: usize) -> PharmacySearch {
		PharmacySearch {
			origin: Coordinate { lat: 44.6488, lng: -63.5752 },
			radius_m: 5_000,
			name: name.map(str::to_string),
			max_results,
		}
	}

	fn sample() -> Value {
		serde_json::json!({
			"elements": [
				{
					"type": "node",
					"id": 2,
					"lat": 44.66,
					"lon": -63.59,
					"tags": { "amenity": "pharmacy", "name": "Lawtons Drugs" }
				},
				{
					"type": "node",
					"id": 1,
					"lat": 44.649,
					"lon": -63.576,
					"tags": {
						"amenity": "pharmacy",
						"name": "Shoppers Drug Mart",
						"addr:housenumber": "5524",
						"addr:street": "Spring Garden Road",
						"addr:city": "Halifax",
						"phone": "+1 902 555 0100"
					}
				},
				{ "type": "node", "id": 3, "lat": 44.70, "lon": -63.60, "tags": {} },
				{ "type": "node", "id": 4, "tags": { "name": "No coordinates" } }
			]
		})
	}

	#[test]
	fn builds_around_query() {
		let query = build_query(Coordinate { lat: 44.6488, lng: -63.5752 }, 5_000);

		assert_eq!(query, "[out:json];node[amenity=pharmacy](around:5000,44.6488,-63.5752);out;");
	}

	#[test]
	fn parses_and_sorts_by_distance() {
		let parsed = parse_overpass_response(&sample(), &search(None, 10)).expect("parse failed");
		let names: Vec<&str> = parsed.iter().map(|p| p.name.as_str()).collect();

		assert_eq!(names, vec!["Shoppers Drug Mart", "Lawtons Drugs", UNNAMED]);
		assert_eq!(parsed[0].address.as_deref(), Some("5524, Spring Garden Road, Halifax"));
		assert_eq!(parsed[0].phone.as_deref(), Some("+1 902 555 0100"));
		assert_eq!(parsed[1].address, None);
		assert!(parsed[0].distance_m < parsed[1].distance_m);
		assert!(parsed[0].directions_url.contains("destination=44.649,-63.576"));
	}

	#[test]
	fn filters_by_name_and_caps_results() {
		let parsed =
			parse_overpass_response(&sample(), &search(Some("  DRUG "), 10)).expect("parse failed");

		assert_eq!(parsed.len(), 2);

		let capped = parse_overpass_response(&sample(), &search(None, 1)).expect("parse failed");

		assert_eq!(capped.len(), 1);
		assert_eq!(capped[0].osm_id, 1);
	}

	#[test]
	fn rejects_response_without_elements() {
		let err = parse_overpass_response(&serde_json::json!({ "remark": "timeout" }), &search(None, 5))
			.expect_err("Missing elements should fail.");

		assert!(matches!(err, Error::InvalidResponse { .. }));
	}
}
