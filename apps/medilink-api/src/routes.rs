use std::time::Duration;

use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::{
		HeaderName, HeaderValue, Method, Request, StatusCode,
		header::{AUTHORIZATION, CONTENT_SECURITY_POLICY, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
	},
	response::{IntoResponse, Response},
	routing::{get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::{
	LatencyUnit,
	compression::CompressionLayer,
	cors::CorsLayer,
	limit::RequestBodyLimitLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	set_header::SetResponseHeaderLayer,
	timeout::TimeoutLayer,
	trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

use medilink_service::{
	AppointmentListRequest, AppointmentListResponse, AppointmentView, AuthResponse,
	AvailabilityResponse, BookRequest, ConversationRequest, ConversationResponse,
	ConversationSummaryView, CreateRecordRequest, DeleteRecordResponse, DoctorListRequest,
	Error as ServiceError, LoginRequest, MarkReadResponse, MessageView, NotificationListRequest,
	NotificationListResponse, NotificationView, OpenSlotsResponse, PharmacyRequest,
	PharmacyResponse, RecordListRequest, RecordView, RegisterRequest, SendMessageRequest,
	SetAvailabilityRequest, StatusChangeRequest, StatusChangeResponse, UpdateAppointmentRequest,
	UpdateProfileRequest, UpdateRecordRequest, UserProfile,
};

use crate::{auth::Caller, metrics, state::AppState};

const REQUEST_ID_HEADER: &str = "x-request-id";
const CONTENT_SECURITY_POLICY_VALUE: &str = "default-src 'self'; script-src 'self'; \
style-src 'self' 'unsafe-inline'; img-src 'self' data:; connect-src 'self'; frame-ancestors 'none'";

#[derive(Debug, Deserialize)]
struct OpenSlotsQuery {
	date: String,
}

pub fn router(state: AppState) -> Router {
	let service_cfg = &state.service.cfg.service;
	let timeout = Duration::from_secs(service_cfg.request_timeout_seconds);
	let max_body_bytes = service_cfg.max_body_bytes;
	let cors = cors_layer(&service_cfg.client_url);
	let api = Router::new()
		.route("/api/auth/register", post(register))
		.route("/api/auth/login", post(login))
		.route("/api/auth/me", get(me))
		.route("/api/users/doctors", get(list_doctors))
		.route("/api/users/patients", get(list_patients))
		.route("/api/users/me", patch(update_profile))
		.route("/api/users/{user_id}", get(get_user))
		.route("/api/availability", put(set_availability))
		.route("/api/availability/{doctor_id}", get(open_slots))
		.route("/api/appointments", post(book_appointment).get(list_appointments))
		.route("/api/appointments/{appointment_id}", get(get_appointment).patch(update_appointment))
		.route("/api/appointments/{appointment_id}/status", post(change_status))
		.route("/api/messages", post(send_message).get(list_conversations))
		.route("/api/messages/{peer_id}", get(conversation))
		.route("/api/messages/{peer_id}/read", post(mark_conversation_read))
		.route("/api/records", post(create_record).get(list_records))
		.route(
			"/api/records/{record_id}",
			get(get_record).patch(update_record).delete(delete_record),
		)
		.route("/api/notifications", get(list_notifications))
		.route("/api/notifications/{notification_id}/read", post(mark_notification_read))
		.route("/api/pharmacies", get(find_pharmacies))
		.route("/health", get(health))
		.route("/metrics", get(metrics::metrics_handler))
		.with_state(state);

	apply_layers(api, timeout, max_body_bytes, cors)
}

fn apply_layers(
	router: Router,
	timeout: Duration,
	max_body_bytes: usize,
	cors: CorsLayer,
) -> Router {
	let trace = TraceLayer::new_for_http()
		.make_span_with(|request: &Request<_>| {
			let request_id = request
				.headers()
				.get(REQUEST_ID_HEADER)
				.and_then(|value| value.to_str().ok())
				.unwrap_or("-");

			tracing::info_span!(
				"http.request",
				method = %request.method(),
				uri = %request.uri(),
				request_id = %request_id
			)
		})
		.on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis));
	let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

	router
		.layer(metrics::MetricsLayer)
		.layer(trace)
		.layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
		.layer(RequestBodyLimitLayer::new(max_body_bytes))
		.layer(CompressionLayer::new())
		.layer(SetResponseHeaderLayer::if_not_present(
			CONTENT_SECURITY_POLICY,
			HeaderValue::from_static(CONTENT_SECURITY_POLICY_VALUE),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			X_CONTENT_TYPE_OPTIONS,
			HeaderValue::from_static("nosniff"),
		))
		.layer(PropagateRequestIdLayer::new(request_id_header.clone()))
		.layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
		.layer(cors)
}

/// Allows the configured web client origin, with credentials.
fn cors_layer(client_url: &str) -> CorsLayer {
	let layer = CorsLayer::new()
		.allow_methods([
			Method::GET,
			Method::POST,
			Method::PUT,
			Method::PATCH,
			Method::DELETE,
			Method::OPTIONS,
		])
		.allow_headers([AUTHORIZATION, CONTENT_TYPE])
		.allow_credentials(true)
		.max_age(Duration::from_secs(60 * 60));

	match HeaderValue::from_str(client_url.trim_end_matches('/')) {
		Ok(origin) => layer.allow_origin(origin),
		Err(err) => {
			tracing::warn!(
				error = %err,
				client_url,
				"Client URL is not a valid origin; CORS is disabled."
			);

			layer
		},
	}
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn register(
	State(state): State<AppState>,
	Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
	let response = state.service.register(payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
	State(state): State<AppState>,
	Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
	let response = state.service.login(payload).await?;

	Ok(Json(response))
}

async fn me(
	State(state): State<AppState>,
	Caller(principal): Caller,
) -> Result<Json<UserProfile>, ApiError> {
	let response = state.service.me(&principal).await?;

	Ok(Json(response))
}

async fn list_doctors(
	State(state): State<AppState>,
	Caller(_): Caller,
	Query(query): Query<DoctorListRequest>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
	let response = state.service.list_doctors(query).await?;

	Ok(Json(response))
}

async fn list_patients(
	State(state): State<AppState>,
	Caller(principal): Caller,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
	let response = state.service.list_my_patients(&principal).await?;

	Ok(Json(response))
}

async fn get_user(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(user_id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
	let response = state.service.get_user(&principal, user_id).await?;

	Ok(Json(response))
}

async fn update_profile(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
	let response = state.service.update_profile(&principal, payload).await?;

	Ok(Json(response))
}

async fn set_availability(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<SetAvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
	let response = state.service.set_availability(&principal, payload).await?;

	Ok(Json(response))
}

async fn open_slots(
	State(state): State<AppState>,
	Caller(_): Caller,
	Path(doctor_id): Path<Uuid>,
	Query(query): Query<OpenSlotsQuery>,
) -> Result<Json<OpenSlotsResponse>, ApiError> {
	let response = state.service.open_slots(doctor_id, &query.date).await?;

	Ok(Json(response))
}

async fn book_appointment(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<BookRequest>,
) -> Result<(StatusCode, Json<AppointmentView>), ApiError> {
	let response = state.service.book_appointment(&principal, payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn list_appointments(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Query(query): Query<AppointmentListRequest>,
) -> Result<Json<AppointmentListResponse>, ApiError> {
	let response = state.service.list_appointments(&principal, query).await?;

	Ok(Json(response))
}

async fn get_appointment(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentView>, ApiError> {
	let response = state.service.get_appointment(&principal, appointment_id).await?;

	Ok(Json(response))
}

async fn update_appointment(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(appointment_id): Path<Uuid>,
	Json(payload): Json<UpdateAppointmentRequest>,
) -> Result<Json<AppointmentView>, ApiError> {
	let response = state.service.update_appointment(&principal, appointment_id, payload).await?;

	Ok(Json(response))
}

async fn change_status(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(appointment_id): Path<Uuid>,
	Json(payload): Json<StatusChangeRequest>,
) -> Result<Json<StatusChangeResponse>, ApiError> {
	let response =
		state.service.change_appointment_status(&principal, appointment_id, payload).await?;

	Ok(Json(response))
}

async fn send_message(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
	let response = state.service.send_message(&principal, payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn list_conversations(
	State(state): State<AppState>,
	Caller(principal): Caller,
) -> Result<Json<Vec<ConversationSummaryView>>, ApiError> {
	let response = state.service.list_conversations(&principal).await?;

	Ok(Json(response))
}

async fn conversation(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(peer_id): Path<Uuid>,
	Query(query): Query<ConversationRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
	let response = state.service.conversation(&principal, peer_id, query).await?;

	Ok(Json(response))
}

async fn mark_conversation_read(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(peer_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
	let response = state.service.mark_conversation_read(&principal, peer_id).await?;

	Ok(Json(response))
}

async fn create_record(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<RecordView>), ApiError> {
	let response = state.service.create_record(&principal, payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn list_records(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Query(query): Query<RecordListRequest>,
) -> Result<Json<Vec<RecordView>>, ApiError> {
	let response = state.service.list_records(&principal, query).await?;

	Ok(Json(response))
}

async fn get_record(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(record_id): Path<Uuid>,
) -> Result<Json<RecordView>, ApiError> {
	let response = state.service.get_record(&principal, record_id).await?;

	Ok(Json(response))
}

async fn update_record(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(record_id): Path<Uuid>,
	Json(payload): Json<UpdateRecordRequest>,
) -> Result<Json<RecordView>, ApiError> {
	let response = state.service.update_record(&principal, record_id, payload).await?;

	Ok(Json(response))
}

async fn delete_record(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(record_id): Path<Uuid>,
) -> Result<Json<DeleteRecordResponse>, ApiError> {
	let response = state.service.delete_record(&principal, record_id).await?;

	Ok(Json(response))
}

async fn list_notifications(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Query(query): Query<NotificationListRequest>,
) -> Result<Json<NotificationListResponse>, ApiError> {
	let response = state.service.list_notifications(&principal, query).await?;

	Ok(Json(response))
}

async fn mark_notification_read(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(notification_id): Path<Uuid>,
) -> Result<Json<NotificationView>, ApiError> {
	let response = state.service.mark_notification_read(&principal, notification_id).await?;

	Ok(Json(response))
}

async fn find_pharmacies(
	State(state): State<AppState>,
	Caller(_): Caller,
	Query(query): Query<PharmacyRequest>,
) -> Result<Json<PharmacyResponse>, ApiError> {
	let response = state.service.find_pharmacies(query).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	pub fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None),
			ServiceError::Unauthorized { message } =>
				ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, None),
			ServiceError::Forbidden { message } =>
				ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message, None),
			ServiceError::NotFound { message } =>
				ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
			ServiceError::Conflict { message } =>
				ApiError::new(StatusCode::CONFLICT, "CONFLICT", message, None),
			ServiceError::Provider { message } => {
				tracing::warn!(error = %message, "Upstream provider failed.");

				ApiError::new(
					StatusCode::BAD_GATEWAY,
					"PROVIDER_ERROR",
					"An upstream service failed.",
					None,
				)
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Request failed with a storage error.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORAGE_ERROR",
					"Internal storage error.",
					None,
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}
