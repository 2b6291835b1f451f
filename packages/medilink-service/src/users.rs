use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use medilink_domain::role::Role;
use medilink_storage::{
	appointments,
	models::User,
	users::{self, ProfileUpdate},
};

use crate::{Error, MedilinkService, Principal, Result};

const MAX_NAME_CHARS: usize = 100;
const MAX_PHONE_CHARS: usize = 32;
const MAX_SPECIALIZATION_CHARS: usize = 100;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserProfile {
	pub user_id: Uuid,
	pub name: String,
	/// Absent when the caller may not contact the user directly.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	pub role: Role,
	pub phone: Option<String>,
	pub specialization: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl UserProfile {
	pub(crate) fn from_row(user: User) -> Result<Self> {
		let role = parse_stored_role(&user)?;

		Ok(Self {
			user_id: user.user_id,
			name: user.name,
			email: Some(user.email),
			role,
			phone: user.phone,
			specialization: user.specialization,
			created_at: user.created_at,
		})
	}

	fn without_contact(self) -> Self {
		Self { email: None, phone: None, ..self }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DoctorListRequest {
	pub specialization: Option<String>,
}

/// Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
	pub name: Option<String>,
	pub phone: Option<String>,
	pub specialization: Option<String>,
}

impl MedilinkService {
	pub async fn list_doctors(&self, req: DoctorListRequest) -> Result<Vec<UserProfile>> {
		let specialization =
			req.specialization.as_deref().map(str::trim).filter(|value| !value.is_empty());
		let rows = users::list_doctors(&self.db.pool, specialization).await?;

		rows.into_iter().map(UserProfile::from_row).collect()
	}

	/// Patients who have booked with the calling doctor.
	pub async fn list_my_patients(&self, principal: &Principal) -> Result<Vec<UserProfile>> {
		principal.require(Role::Doctor, "list patients")?;

		let rows = users::list_patients_of_doctor(&self.db.pool, principal.user_id).await?;

		rows.into_iter().map(UserProfile::from_row).collect()
	}

	/// Doctor profiles are public. A patient's email and phone are shown only to the patient and
	/// to doctors they have an appointment with.
	pub async fn get_user(&self, principal: &Principal, user_id: Uuid) -> Result<UserProfile> {
		let user = users::find_user(&self.db.pool, user_id)
			.await?
			.ok_or_else(|| Error::not_found("User not found."))?;
		let profile = UserProfile::from_row(user)?;
		let shows_contact = match (profile.role, principal.role) {
			(Role::Doctor, _) => true,
			_ if profile.user_id == principal.user_id => true,
			(Role::Patient, Role::Doctor) =>
				appointments::has_care_relationship(
					&self.db.pool,
					principal.user_id,
					profile.user_id,
				)
				.await?,
			(Role::Patient, Role::Patient) => false,
		};

		if shows_contact { Ok(profile) } else { Ok(profile.without_contact()) }
	}

	pub async fn update_profile(
		&self,
		principal: &Principal,
		req: UpdateProfileRequest,
	) -> Result<UserProfile> {
		let now = OffsetDateTime::now_utc();
		let name = match req.name.as_deref() {
			Some(name) => Some(crate::required_text("name", name, MAX_NAME_CHARS)?),
			None => None,
		};
		let phone = req
			.phone
			.as_deref()
			.map(|phone| crate::required_text("phone", phone, MAX_PHONE_CHARS))
			.transpose()?;
		let specialization = match req.specialization.as_deref() {
			Some(_) if principal.role != Role::Doctor =>
				return Err(Error::forbidden("Only a doctor can set a specialization.")),
			Some(value) =>
				Some(crate::required_text("specialization", value, MAX_SPECIALIZATION_CHARS)?),
			None => None,
		};
		let update = ProfileUpdate {
			name: name.as_deref(),
			phone: phone.as_deref(),
			specialization: specialization.as_deref(),
		};
		let user = users::update_profile(&self.db.pool, principal.user_id, &update, now)
			.await?
			.ok_or_else(|| Error::not_found("User not found."))?;

		UserProfile::from_row(user)
	}
}

pub(crate) fn parse_stored_role(user: &User) -> Result<Role> {
	Role::parse(&user.role).ok_or_else(|| Error::Storage {
		message: format!("User {} has unknown role {:?}.", user.user_id, user.role),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn contact_fields_are_dropped_from_the_serialized_profile() {
		let profile = UserProfile {
			user_id: Uuid::nil(),
			name: "Ada Lovelace".to_string(),
			email: Some("ada@example.com".to_string()),
			role: Role::Patient,
			phone: Some("555-0100".to_string()),
			specialization: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
		}
		.without_contact();
		let json = serde_json::to_value(&profile).expect("Profile should serialize.");

		assert_eq!(json["name"], "Ada Lovelace");
		assert!(json.get("email").is_none());
		assert!(json["phone"].is_null());
	}
}
