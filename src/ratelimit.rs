use std::{sync::Arc, time::Duration};

use axum::{
	body::Body,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use governor::{
	clock::QuantaInstant,
	middleware::{RateLimitingMiddleware, StateInformationMiddleware},
};
use tower_governor::{
	governor::{GovernorConfig, GovernorConfigBuilder},
	key_extractor::{KeyExtractor, PeerIpKeyExtractor},
	GovernorError,
};

use crate::{config::Config, error};

pub type Limits = Arc<GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>>;

#[derive(Debug, thiserror::Error)]
enum Error {
	#[error("too many requests, retry in {0} seconds")]
	TooManyRequests(u64),
	#[error("could not identify the client")]
	UnknownClient,
	#[error("{1}")]
	Other(StatusCode, String),
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::TooManyRequests(..) => StatusCode::TOO_MANY_REQUESTS,
			Self::UnknownClient => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Other(status, ..) => *status,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = match self {
			Self::TooManyRequests(wait) => error::Message::new("rate_limited")
				.content(self.to_string())
				.detail("retryAfter", wait),
			Self::UnknownClient => error::Message::new("internal_error").content(self.to_string()),
			Self::Other(..) => error::Message::new("rate_limited").content(self.to_string()),
		};

		message.into_vec()
	}
}

/// The number of milliseconds between two replenished requests
/// when allowing `per_second` requests every second.
fn replenish_interval(per_second: u64) -> Option<u64> {
	(per_second > 0).then(|| (1000 / per_second).max(1))
}

/// Builds the per-ip limits from the configured rate and burst size.
///
/// Returns [`None`] when either value is zero.
pub fn from_config(config: &Config) -> Option<Limits> {
	let interval = replenish_interval(config.rate_limit_per_second)?;

	GovernorConfigBuilder::default()
		.per_millisecond(interval)
		.burst_size(config.rate_limit_burst)
		.use_headers()
		.error_handler(error_handler)
		.finish()
		.map(Arc::new)
}

fn error_handler(error: GovernorError) -> Response<Body> {
	let (error, headers) = match error {
		GovernorError::TooManyRequests { wait_time, headers } => {
			(Error::TooManyRequests(wait_time), headers)
		}
		GovernorError::UnableToExtractKey => (Error::UnknownClient, None),
		GovernorError::Other { code, msg, headers } => (
			Error::Other(code, msg.unwrap_or_else(|| "request refused".into())),
			headers,
		),
	};

	let mut response = error::RouteError::from(error).into_response();

	if let Some(headers) = headers {
		response.headers_mut().extend(headers);
	}

	response
}

/// Periodically drops the state of clients that have not been seen recently.
pub fn cleanup_old_limits<T, M>(configs: &[&Arc<GovernorConfig<T, M>>])
where
	T: KeyExtractor,
	<T as KeyExtractor>::Key: Send + Sync + 'static,
	M: RateLimitingMiddleware<QuantaInstant> + Send + Sync + 'static,
{
	let limiters = configs
		.iter()
		.map(|config| config.limiter().clone())
		.collect::<Vec<_>>();
	let interval = Duration::from_secs(60);

	std::thread::spawn(move || loop {
		std::thread::sleep(interval);

		for limiter in &limiters {
			tracing::debug!("rate limiting storage size: {}", limiter.len());

			limiter.retain_recent();
		}
	});
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_too_many_requests_shape() {
		let response = error_handler(GovernorError::TooManyRequests {
			wait_time: 3,
			headers: None,
		});

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
	}

	#[test]
	fn test_replenish_interval() {
		assert_eq!(replenish_interval(10), Some(100));
		assert_eq!(replenish_interval(1), Some(1000));
		assert_eq!(replenish_interval(5000), Some(1));
		assert_eq!(replenish_interval(0), None);
	}

	#[test]
	fn test_unknown_client_is_server_error() {
		let response = error_handler(GovernorError::UnableToExtractKey);

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}
}
