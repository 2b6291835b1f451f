//! Prometheus registry and the HTTP latency layer.

use std::{
	future::Future,
	pin::Pin,
	sync::OnceLock,
	task::{Context, Poll},
	time::Instant,
};

use axum::{
	extract::MatchedPath,
	http::{HeaderValue, Request, StatusCode, header},
	response::{IntoResponse, Response},
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, Registry, TextEncoder};
use tower::{Layer, Service};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

const DURATION_BUCKETS_MS: [f64; 8] = [50.0, 100.0, 200.0, 300.0, 400.0, 500.0, 1_000.0, 2_000.0];
const UNMATCHED_ROUTE: &str = "unmatched";

struct Metrics {
	registry: Registry,
	http_request_duration_ms: HistogramVec,
}
impl Metrics {
	fn build() -> prometheus::Result<Self> {
		let registry = Registry::new();
		let http_request_duration_ms = HistogramVec::new(
			HistogramOpts::new(
				"http_request_duration_ms",
				"Duration of HTTP requests in milliseconds.",
			)
			.buckets(DURATION_BUCKETS_MS.to_vec()),
			&["method", "route", "code"],
		)?;

		registry.register(Box::new(http_request_duration_ms.clone()))?;

		#[cfg(target_os = "linux")]
		registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

		Ok(Self { registry, http_request_duration_ms })
	}
}

static METRICS: OnceLock<Option<Metrics>> = OnceLock::new();

fn metrics() -> Option<&'static Metrics> {
	METRICS
		.get_or_init(|| match Metrics::build() {
			Ok(metrics) => Some(metrics),
			Err(err) => {
				tracing::error!(error = %err, "Failed to initialize metrics registry.");

				None
			},
		})
		.as_ref()
}

pub fn record_http_request(method: &str, route: &str, code: u16, elapsed_ms: f64) {
	let Some(metrics) = metrics() else {
		return;
	};

	metrics
		.http_request_duration_ms
		.with_label_values(&[method, route, code.to_string().as_str()])
		.observe(elapsed_ms);
}

/// Renders every registered metric in the Prometheus text format.
pub async fn metrics_handler() -> Response {
	let Some(metrics) = metrics() else {
		return (StatusCode::SERVICE_UNAVAILABLE, "Metrics are unavailable.").into_response();
	};
	let mut buffer = Vec::new();

	if let Err(err) = TextEncoder::new().encode(&metrics.registry.gather(), &mut buffer) {
		tracing::error!(error = %err, "Failed to encode metrics.");

		return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics.").into_response();
	}

	([(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE))], buffer).into_response()
}

/// Records `http_request_duration_ms` for every request, labelled by the matched route template.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
	type Service = MetricsService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		MetricsService { inner }
	}
}

#[derive(Clone, Debug)]
pub struct MetricsService<S> {
	inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
	S: Service<Request<ReqBody>, Response = axum::http::Response<ResBody>> + Send + 'static,
	S::Future: Send + 'static,
	S::Error: Send + 'static,
	ResBody: Send + 'static,
{
	type Error = S::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
	type Response = axum::http::Response<ResBody>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
		let method = request.method().to_string();
		let route = request
			.extensions()
			.get::<MatchedPath>()
			.map(|path| path.as_str().to_string())
			.unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
		let start = Instant::now();
		let fut = self.inner.call(request);

		Box::pin(async move {
			let result = fut.await;
			let code = match &result {
				Ok(response) => response.status().as_u16(),
				Err(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
			};

			record_http_request(&method, &route, code, start.elapsed().as_secs_f64() * 1_000.0);

			result
		})
	}
}
