use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub auth: Auth,
	#[serde(default)]
	pub scheduling: Scheduling,
	#[serde(default)]
	pub notifications: Notifications,
	#[serde(default)]
	pub pharmacy: Pharmacy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Browser origin allowed by CORS, e.g. "http://localhost:3000".
	pub client_url: String,
	#[serde(default = "default_request_timeout_seconds")]
	pub request_timeout_seconds: u64,
	#[serde(default = "default_max_body_bytes")]
	pub max_body_bytes: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Auth {
	pub jwt_secret: String,
	#[serde(default = "default_jwt_issuer")]
	pub jwt_issuer: String,
	#[serde(default = "default_token_ttl_seconds")]
	pub token_ttl_seconds: u64,
	#[serde(default = "default_min_password_chars")]
	pub min_password_chars: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Scheduling {
	/// How far ahead of today a patient may book.
	pub max_advance_days: i64,
	/// When true, bookings must hit a slot the doctor has published.
	pub require_availability: bool,
	/// Offset of the clinic's wall clock from UTC. Appointment dates and times are wall-clock
	/// values in this offset.
	pub utc_offset_minutes: i32,
}
impl Default for Scheduling {
	fn default() -> Self {
		Self { max_advance_days: 90, require_availability: true, utc_offset_minutes: 0 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Notifications {
	pub reminder_lead_minutes: i64,
	pub poll_interval_ms: u64,
	/// Run the reminder scheduler inside the API process instead of a separate worker.
	pub embedded_scheduler: bool,
	pub webhook_url: Option<String>,
	pub webhook_timeout_ms: u64,
}
impl Default for Notifications {
	fn default() -> Self {
		Self {
			reminder_lead_minutes: 1_440,
			poll_interval_ms: 5_000,
			embedded_scheduler: false,
			webhook_url: None,
			webhook_timeout_ms: 5_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Pharmacy {
	pub overpass_url: String,
	pub default_radius_m: u32,
	pub max_radius_m: u32,
	pub max_results: u32,
	pub timeout_ms: u64,
}
impl Default for Pharmacy {
	fn default() -> Self {
		Self {
			overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
			default_radius_m: 5_000,
			max_radius_m: 25_000,
			max_results: 50,
			timeout_ms: 10_000,
		}
	}
}

fn default_request_timeout_seconds() -> u64 {
	30
}

fn default_max_body_bytes() -> usize {
	2 * 1_024 * 1_024
}

fn default_jwt_issuer() -> String {
	"medilink".to_string()
}

fn default_token_ttl_seconds() -> u64 {
	86_400
}

fn default_min_password_chars() -> u32 {
	8
}
