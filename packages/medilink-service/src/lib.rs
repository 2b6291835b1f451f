pub mod appointments;
pub mod auth;
pub mod availability;
pub mod messages;
pub mod notifications;
pub mod pharmacies;
pub mod records;
pub mod time_serde;
pub mod users;

mod error;

pub use appointments::{
	AppointmentListRequest, AppointmentListResponse, AppointmentView, BookRequest,
	StatusChangeRequest, StatusChangeResponse, UpdateAppointmentRequest,
};
pub use auth::{AuthResponse, Claims, LoginRequest, Principal, RegisterRequest};
pub use availability::{AvailabilityResponse, OpenSlotsResponse, SetAvailabilityRequest};
pub use error::{Error, Result};
pub use messages::{
	ConversationRequest, ConversationResponse, ConversationSummaryView, MarkReadResponse,
	MessageView, SendMessageRequest,
};
pub use notifications::{
	NewNotification, NotificationListRequest, NotificationListResponse, NotificationView,
};
pub use pharmacies::{PharmacyRequest, PharmacyResponse};
pub use records::{
	CreateRecordRequest, DeleteRecordResponse, RecordListRequest, RecordView, UpdateRecordRequest,
};
pub use users::{DoctorListRequest, UpdateProfileRequest, UserProfile};

use std::{future::Future, pin::Pin, sync::Arc};

use time::UtcOffset;

use medilink_config::Config;
use medilink_domain::schedule;
use medilink_providers::overpass::{Pharmacy, PharmacyLocator, PharmacySearch};
use medilink_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait PharmacyProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		search: &'a PharmacySearch,
	) -> BoxFuture<'a, medilink_providers::Result<Vec<Pharmacy>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub pharmacy: Arc<dyn PharmacyProvider>,
}
impl Providers {
	pub fn new(pharmacy: Arc<dyn PharmacyProvider>) -> Self {
		Self { pharmacy }
	}

	pub fn from_config(cfg: &Config) -> Result<Self> {
		let locator = PharmacyLocator::new(&cfg.pharmacy)?;

		Ok(Self { pharmacy: Arc::new(locator) })
	}
}

impl PharmacyProvider for PharmacyLocator {
	fn search<'a>(
		&'a self,
		search: &'a PharmacySearch,
	) -> BoxFuture<'a, medilink_providers::Result<Vec<Pharmacy>>> {
		Box::pin(PharmacyLocator::search(self, search))
	}
}

pub struct MedilinkService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}
impl MedilinkService {
	pub fn new(cfg: Config, db: Db) -> Result<Self> {
		let providers = Providers::from_config(&cfg)?;

		Ok(Self { cfg, db, providers })
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}

	pub(crate) fn clinic_offset(&self) -> Result<UtcOffset> {
		Ok(schedule::clinic_offset(self.cfg.scheduling.utc_offset_minutes)?)
	}
}

/// Clamps a caller supplied page size into `1..=max`, using `default` when absent.
pub(crate) fn page_limit(requested: Option<u32>, default: u32, max: u32) -> i64 {
	i64::from(requested.unwrap_or(default).clamp(1, max))
}

/// Trims `value` and rejects it when empty or longer than `max_chars`.
pub(crate) fn required_text(field: &str, value: &str, max_chars: usize) -> Result<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Err(Error::invalid(format!("{field} is required.")));
	}
	if trimmed.chars().count() > max_chars {
		return Err(Error::invalid(format!("{field} must be at most {max_chars} characters.")));
	}

	Ok(trimmed.to_string())
}

/// Like [`required_text`] but blank input becomes `None`.
pub(crate) fn optional_text(field: &str, value: Option<&str>, max_chars: usize) -> Result<Option<String>> {
	match value.map(str::trim).filter(|value| !value.is_empty()) {
		Some(value) => required_text(field, value, max_chars).map(Some),
		None => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn page_limit_is_clamped() {
		assert_eq!(page_limit(None, 50, 200), 50);
		assert_eq!(page_limit(Some(0), 50, 200), 1);
		assert_eq!(page_limit(Some(5_000), 50, 200), 200);
	}

	#[test]
	fn text_fields_are_trimmed_and_bounded() {
		assert_eq!(required_text("name", "  Ada  ", 10).expect("valid"), "Ada");
		assert!(matches!(required_text("name", "   ", 10), Err(Error::InvalidRequest { .. })));
		assert!(required_text("name", "abcdefghijk", 10).is_err());
		assert_eq!(optional_text("phone", Some("  "), 10).expect("valid"), None);
		assert_eq!(optional_text("phone", None, 10).expect("valid"), None);
	}
}
