//! Bearer token extraction.

use axum::{
	extract::FromRequestParts,
	http::{StatusCode, header::AUTHORIZATION, request::Parts},
};

use medilink_service::Principal;

use crate::{routes::ApiError, state::AppState};

/// The authenticated caller, taken from `Authorization: Bearer <token>`.
#[derive(Clone, Copy, Debug)]
pub struct Caller(pub Principal);

impl FromRequestParts<AppState> for Caller {
	type Rejection = ApiError;

	async fn from_request_parts(
		parts: &mut Parts,
		state: &AppState,
	) -> Result<Self, Self::Rejection> {
		let token = bearer_token(parts).ok_or_else(|| {
			ApiError::new(
				StatusCode::UNAUTHORIZED,
				"UNAUTHORIZED",
				"A bearer access token is required.",
				None,
			)
		})?;
		let principal = state.service.verify_token(token)?;

		Ok(Self(principal))
	}
}

fn bearer_token(parts: &Parts) -> Option<&str> {
	let raw = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = raw.trim().split_once(' ')?;

	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}

	let token = token.trim();

	(!token.is_empty()).then_some(token)
}
