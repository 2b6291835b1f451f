//! Registration, login and bearer tokens.
//!
//! Passwords are stored as Argon2 PHC strings. Access tokens are HS256 JWTs signed with
//! `auth.jwt_secret` and carry the user id and role, so request authentication never touches the
//! database.

use argon2::{
	Argon2,
	password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use medilink_domain::role::Role;
use medilink_storage::{models::User, users};

use crate::{Error, MedilinkService, Result, UserProfile};

const MAX_NAME_CHARS: usize = 100;
const MAX_EMAIL_CHARS: usize = 254;
const MAX_PASSWORD_CHARS: usize = 256;
const MAX_PHONE_CHARS: usize = 32;
const MAX_SPECIALIZATION_CHARS: usize = 100;
const BAD_CREDENTIALS: &str = "Email or password is incorrect.";
/// Verified when the email is unknown, so both login failures cost one Argon2 run. Uses the
/// default Argon2 parameters; the digest matches no password.
const UNKNOWN_USER_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$dmLQLE4YdlwpX/T+1+L2Wg$oUfMUUY2GArZDX02/JO3ICaKG6vd2XVLTYDTGws4KtU";

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterRequest {
	pub name: String,
	pub email: String,
	pub password: String,
	pub role: Role,
	#[serde(default)]
	pub phone: Option<String>,
	#[serde(default)]
	pub specialization: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
	pub email: String,
	pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthResponse {
	pub token: String,
	pub token_type: &'static str,
	#[serde(with = "crate::time_serde")]
	pub expires_at: OffsetDateTime,
	pub user: UserProfile,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
	pub sub: Uuid,
	pub role: Role,
	pub iss: String,
	pub iat: i64,
	pub exp: i64,
}

/// The authenticated caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Principal {
	pub user_id: Uuid,
	pub role: Role,
}
impl Principal {
	pub(crate) fn require(&self, role: Role, action: &str) -> Result<()> {
		if self.role != role {
			return Err(Error::forbidden(format!("Only a {} can {action}.", role.as_str())));
		}

		Ok(())
	}
}

impl MedilinkService {
	pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
		let now = OffsetDateTime::now_utc();
		let name = crate::required_text("name", &req.name, MAX_NAME_CHARS)?;
		let email = normalize_email(&req.email)?;

		self.check_password(&req.password)?;

		let phone = crate::optional_text("phone", req.phone.as_deref(), MAX_PHONE_CHARS)?;
		let specialization = match req.role {
			Role::Doctor => crate::optional_text(
				"specialization",
				req.specialization.as_deref(),
				MAX_SPECIALIZATION_CHARS,
			)?,
			Role::Patient => None,
		};
		let user = User {
			user_id: Uuid::new_v4(),
			name,
			email,
			password_hash: hash_password(&req.password)?,
			role: req.role.as_str().to_string(),
			phone,
			specialization,
			created_at: now,
			updated_at: now,
		};

		users::insert_user(&self.db.pool, &user).await?;

		tracing::info!(user_id = %user.user_id, role = user.role.as_str(), "Registered user.");

		self.auth_response(user, now)
	}

	pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
		let now = OffsetDateTime::now_utc();
		let email = req.email.trim();

		if email.is_empty() || req.password.is_empty() {
			return Err(Error::invalid("email and password are required."));
		}

		let Some(user) = users::find_user_by_email(&self.db.pool, email).await? else {
			verify_password(&req.password, UNKNOWN_USER_HASH);

			return Err(Error::Unauthorized { message: BAD_CREDENTIALS.to_string() });
		};

		if !verify_password(&req.password, &user.password_hash) {
			tracing::info!(user_id = %user.user_id, "Rejected login with wrong password.");

			return Err(Error::Unauthorized { message: BAD_CREDENTIALS.to_string() });
		}

		self.auth_response(user, now)
	}

	pub async fn me(&self, principal: &Principal) -> Result<UserProfile> {
		let user = users::find_user(&self.db.pool, principal.user_id)
			.await?
			.ok_or_else(|| Error::Unauthorized { message: "Account no longer exists.".to_string() })?;

		UserProfile::from_row(user)
	}

	pub fn issue_token(&self, user_id: Uuid, role: Role, now: OffsetDateTime) -> Result<(String, OffsetDateTime)> {
		let ttl = i64::try_from(self.cfg.auth.token_ttl_seconds)
			.map_err(|_| Error::invalid("auth.token_ttl_seconds is too large."))?;
		let expires_at = now + Duration::seconds(ttl);
		let claims = Claims {
			sub: user_id,
			role,
			iss: self.cfg.auth.jwt_issuer.clone(),
			iat: now.unix_timestamp(),
			exp: expires_at.unix_timestamp(),
		};
		let token = jsonwebtoken::encode(
			&Header::new(Algorithm::HS256),
			&claims,
			&EncodingKey::from_secret(self.cfg.auth.jwt_secret.as_bytes()),
		)
		.map_err(|err| Error::Storage { message: format!("Failed to sign token: {err}.") })?;

		Ok((token, expires_at))
	}

	/// Validates signature, issuer and expiry and returns the caller.
	pub fn verify_token(&self, token: &str) -> Result<Principal> {
		let mut validation = Validation::new(Algorithm::HS256);

		validation.set_issuer(&[self.cfg.auth.jwt_issuer.as_str()]);
		validation.set_required_spec_claims(&["exp", "iss", "sub"]);

		let data = jsonwebtoken::decode::<Claims>(
			token,
			&DecodingKey::from_secret(self.cfg.auth.jwt_secret.as_bytes()),
			&validation,
		)
		.map_err(|err| Error::Unauthorized { message: format!("Invalid access token: {err}.") })?;

		Ok(Principal { user_id: data.claims.sub, role: data.claims.role })
	}

	fn check_password(&self, password: &str) -> Result<()> {
		let chars = password.chars().count();
		let min = self.cfg.auth.min_password_chars as usize;

		if chars < min {
			return Err(Error::invalid(format!("password must be at least {min} characters.")));
		}
		if chars > MAX_PASSWORD_CHARS {
			return Err(Error::invalid(format!(
				"password must be at most {MAX_PASSWORD_CHARS} characters."
			)));
		}

		Ok(())
	}

	fn auth_response(&self, user: User, now: OffsetDateTime) -> Result<AuthResponse> {
		let profile = UserProfile::from_row(user)?;
		let (token, expires_at) = self.issue_token(profile.user_id, profile.role, now)?;

		Ok(AuthResponse { token, token_type: "Bearer", expires_at, user: profile })
	}
}

pub fn hash_password(password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = Argon2::default()
		.hash_password(password.as_bytes(), &salt)
		.map_err(|err| Error::Storage { message: format!("Failed to hash password: {err}.") })?
		.to_string();

	Ok(hash)
}

/// False for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
	let Ok(parsed) = PasswordHash::new(stored_hash) else {
		return false;
	};

	Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

fn normalize_email(raw: &str) -> Result<String> {
	let email = raw.trim().to_lowercase();
	let Some((local, domain)) = email.split_once('@') else {
		return Err(Error::invalid("email must be a valid address."));
	};

	if local.is_empty()
		|| domain.is_empty()
		|| domain.contains('@')
		|| !domain.contains('.')
		|| domain.starts_with('.')
		|| domain.ends_with('.')
		|| email.chars().any(char::is_whitespace)
	{
		return Err(Error::invalid("email must be a valid address."));
	}
	if email.chars().count() > MAX_EMAIL_CHARS {
		return Err(Error::invalid(format!("email must be at most {MAX_EMAIL_CHARS} characters.")));
	}

	Ok(email)
}
