use std::{sync::Arc, time::Duration};

use aide::{axum::ApiRouter, openapi::OpenApi};
use axum::{http::Response, Extension, Router};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{Level, Span};

use crate::{openapi, AppState};

pub mod actualite;
pub mod blog;
pub mod comment;
pub mod docs;
pub mod model;
pub mod user;

/// Builds the application router with its documentation and shared middleware.
pub fn router(state: AppState) -> Router {
	aide::gen::extract_schemas(true);

	let mut api = OpenApi::default();

	ApiRouter::new()
		.nest("/user", user::routes())
		.nest("/blog", blog::routes())
		.nest("/comment", comment::routes())
		.nest("/actualites", actualite::routes())
		.nest("/docs", docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		.layer(Extension(Arc::new(api)))
		.layer(
			ServiceBuilder::new()
				.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
				.layer(
					TraceLayer::new_for_http()
						.make_span_with(DefaultMakeSpan::new().level(Level::INFO))
						.on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
							tracing::info!(
								histogram.latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
								status = response.status().as_u16(),
								"request completed"
							);
						}),
				)
				.layer(PropagateRequestIdLayer::x_request_id())
				.layer(CompressionLayer::new()),
		)
		.with_state(state)
}
