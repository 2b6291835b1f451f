mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Auth, Config, Notifications, Pharmacy, Postgres, Scheduling, Service, Storage};

use std::{env, fs, net::SocketAddr, path::Path};

pub const ENV_CLIENT_URL: &str = "CLIENT_URL";
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
pub const ENV_PORT: &str = "PORT";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

const MIN_JWT_SECRET_CHARS: usize = 16;
const MAX_ADVANCE_DAYS: i64 = 3_650;
const MAX_REMINDER_LEAD_MINUTES: i64 = 10_080;

pub fn load(path: &Path) -> Result<Config> {
	load_with_env(path, |name| env::var(name).ok())
}

/// Loads the config file, then applies environment overrides looked up through `lookup`.
pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<Config>
where
	F: Fn(&str) -> Option<String>,
{
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	apply_env_overrides(&mut cfg, lookup)?;
	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(client_url) = lookup(ENV_CLIENT_URL) {
		cfg.service.client_url = client_url;
	}
	if let Some(secret) = lookup(ENV_JWT_SECRET) {
		cfg.auth.jwt_secret = secret;
	}
	if let Some(dsn) = lookup(ENV_DATABASE_URL) {
		cfg.storage.postgres.dsn = dsn;
	}
	if let Some(raw_port) = lookup(ENV_PORT) {
		let port: u16 = raw_port.trim().parse().map_err(|_| Error::Env {
			name: ENV_PORT,
			message: format!("{raw_port:?} is not a valid port number."),
		})?;
		let mut addr: SocketAddr = cfg.service.http_bind.parse().map_err(|_| Error::Env {
			name: ENV_PORT,
			message: "service.http_bind must be a socket address to apply a port override."
				.to_string(),
		})?;

		addr.set_port(port);

		cfg.service.http_bind = addr.to_string();
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.parse::<SocketAddr>().is_err() {
		return Err(Error::Validation {
			message: "service.http_bind must be a socket address such as 0.0.0.0:5050."
				.to_string(),
		});
	}
	if cfg.service.client_url.is_empty() {
		return Err(Error::Validation {
			message: "service.client_url must be non-empty.".to_string(),
		});
	}
	if !is_http_url(&cfg.service.client_url) {
		return Err(Error::Validation {
			message: "service.client_url must start with http:// or https://.".to_string(),
		});
	}
	if cfg.service.request_timeout_seconds == 0 {
		return Err(Error::Validation {
			message: "service.request_timeout_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.service.max_body_bytes == 0 {
		return Err(Error::Validation {
			message: "service.max_body_bytes must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.auth.jwt_secret.chars().count() < MIN_JWT_SECRET_CHARS {
		return Err(Error::Validation {
			message: format!("auth.jwt_secret must be at least {MIN_JWT_SECRET_CHARS} characters."),
		});
	}
	if cfg.auth.jwt_issuer.is_empty() {
		return Err(Error::Validation { message: "auth.jwt_issuer must be non-empty.".to_string() });
	}
	if cfg.auth.token_ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "auth.token_ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.auth.min_password_chars == 0 {
		return Err(Error::Validation {
			message: "auth.min_password_chars must be greater than zero.".to_string(),
		});
	}
	if !(1..=MAX_ADVANCE_DAYS).contains(&cfg.scheduling.max_advance_days) {
		return Err(Error::Validation {
			message: format!("scheduling.max_advance_days must be between 1 and {MAX_ADVANCE_DAYS}."),
		});
	}
	if !(-720..=840).contains(&cfg.scheduling.utc_offset_minutes) {
		return Err(Error::Validation {
			message: "scheduling.utc_offset_minutes must be between -720 and 840.".to_string(),
		});
	}
	if !(1..=MAX_REMINDER_LEAD_MINUTES).contains(&cfg.notifications.reminder_lead_minutes) {
		return Err(Error::Validation {
			message: format!(
				"notifications.reminder_lead_minutes must be between 1 and {MAX_REMINDER_LEAD_MINUTES}."
			),
		});
	}
	if cfg.notifications.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "notifications.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if let Some(url) = cfg.notifications.webhook_url.as_deref()
		&& !is_http_url(url)
	{
		return Err(Error::Validation {
			message: "notifications.webhook_url must start with http:// or https://.".to_string(),
		});
	}
	if cfg.notifications.webhook_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "notifications.webhook_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !is_http_url(&cfg.pharmacy.overpass_url) {
		return Err(Error::Validation {
			message: "pharmacy.overpass_url must start with http:// or https://.".to_string(),
		});
	}
	if cfg.pharmacy.default_radius_m == 0 {
		return Err(Error::Validation {
			message: "pharmacy.default_radius_m must be greater than zero.".to_string(),
		});
	}
	if cfg.pharmacy.default_radius_m > cfg.pharmacy.max_radius_m {
		return Err(Error::Validation {
			message: "pharmacy.default_radius_m must not exceed pharmacy.max_radius_m."
				.to_string(),
		});
	}
	if cfg.pharmacy.max_results == 0 {
		return Err(Error::Validation {
			message: "pharmacy.max_results must be greater than zero.".to_string(),
		});
	}
	if cfg.pharmacy.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "pharmacy.timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.client_url = cfg.service.client_url.trim().trim_end_matches('/').to_string();
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.auth.jwt_issuer = cfg.auth.jwt_issuer.trim().to_string();

	if cfg
		.notifications
		.webhook_url
		.as_deref()
		.map(|url| url.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.notifications.webhook_url = None;
	}
}

fn is_http_url(value: &str) -> bool {
	value.starts_with("http://") || value.starts_with("https://")
}
