use std::{borrow::Cow, convert::Infallible};

use axum::{
	body::Body,
	extract::rejection::{JsonRejection, PathRejection, QueryRejection},
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use schemars::JsonSchema;
use serde::Serialize;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// A single error message presented to the client.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message<'a> {
	/// A stable, machine-readable error code.
	pub code: Cow<'a, str>,
	/// A human-readable description of the error.
	pub content: Cow<'a, str>,
	/// The input field that caused the error, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'a, str>>,
	/// Extra context about the error.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Cow<'a, Map>>,
}

impl<'a> Message<'a> {
	pub fn new(code: impl Into<Cow<'a, str>>) -> Self {
		let code = code.into();

		Self {
			content: code.clone(),
			code,
			field: None,
			details: None,
		}
	}

	#[must_use]
	pub fn content(mut self, content: impl Into<Cow<'a, str>>) -> Self {
		self.content = content.into();
		self
	}

	#[must_use]
	pub fn field(mut self, field: impl Into<Cow<'a, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	#[must_use]
	pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(|| Cow::Owned(Map::new()))
			.to_mut()
			.insert(key.into(), value.into());
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

/// The body of every error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse {
	pub success: bool,
	/// The first error's description, for clients that only show one line.
	pub message: String,
	pub errors: Vec<Message<'static>>,
}

/// Describes how a route-specific error is presented to the client.
///
/// The [`std::fmt::Display`] implementation is only logged, so it can
/// contain sensitive information. Anything client-facing comes from
/// [`ErrorShape::into_errors`].
pub trait ErrorShape: std::error::Error {
	fn status(&self) -> StatusCode;

	fn into_errors(self) -> Vec<Message<'static>>;
}

impl ErrorShape for Infallible {
	fn status(&self) -> StatusCode {
		match *self {}
	}

	fn into_errors(self) -> Vec<Message<'static>> {
		match self {}
	}
}

/// Error type returned by route handlers.
///
/// `T` carries the errors specific to a group of routes, while the other
/// variants cover failures shared by every route.
#[derive(Debug, thiserror::Error)]
pub enum RouteError<T = Infallible> {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] JsonRejection),
	#[error("body error: {0}")]
	Body(#[from] BodyError),
	#[error("query error: {0}")]
	Query(#[from] QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] PathRejection),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error(transparent)]
	Route(T),
}

/// A well-formed JSON body that does not match the expected input.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct BodyError {
	pub source: serde_json::Error,
	/// The top-level field serde complained about, when it can be told.
	pub field: Option<String>,
}

/// Error type for failures that are not tied to a group of routes,
/// such as extractor rejections.
pub type AppError = RouteError;

impl<T: ErrorShape> From<T> for RouteError<T> {
	fn from(error: T) -> Self {
		Self::Route(error)
	}
}

impl<T> aide::OperationOutput for RouteError<T> {
	type Inner = ErrorResponse;
}

fn validation_messages(errors: &validator::ValidationErrors) -> Vec<Message<'static>> {
	let mut messages = errors
		.field_errors()
		.into_iter()
		.flat_map(|(field, errors)| {
			errors.iter().map(move |error| {
				let content = error
					.message
					.as_ref()
					.map_or_else(|| error.code.to_string(), ToString::to_string);
				let message = Message::new(error.code.to_string()).content(content);

				if field == "__all__" {
					message
				} else {
					message.field(field.to_string())
				}
			})
		})
		.collect::<Vec<_>>();

	messages.sort_by(|a, b| a.field.cmp(&b.field));
	messages
}

impl<T> IntoResponse for RouteError<T>
where
	T: ErrorShape,
{
	fn into_response(self) -> Response<Body> {
		let (status, errors) = match self {
			Self::Validation(errors) => (StatusCode::BAD_REQUEST, validation_messages(&errors)),
			Self::Json(rejection) => (
				StatusCode::BAD_REQUEST,
				Message::new("invalid_body")
					.content(rejection.body_text())
					.into_vec(),
			),
			Self::Body(error) => {
				let message = Message::new("invalid_body").content(error.source.to_string());
				let message = match error.field {
					Some(field) => message.field(field),
					None => message,
				};

				(StatusCode::BAD_REQUEST, message.into_vec())
			}
			Self::Query(rejection) => (
				StatusCode::BAD_REQUEST,
				Message::new("invalid_query")
					.content(rejection.body_text())
					.into_vec(),
			),
			Self::Path(rejection) => (
				StatusCode::BAD_REQUEST,
				Message::new("invalid_path")
					.content(rejection.body_text())
					.into_vec(),
			),
			Self::Database(error) => {
				tracing::error!(%error, "database error");

				(
					StatusCode::INTERNAL_SERVER_ERROR,
					Message::new("internal_error")
						.content("An unexpected error occurred.")
						.into_vec(),
				)
			}
			Self::Route(error) => {
				let status = error.status();

				if status.is_server_error() {
					tracing::error!(%error, "route error");
				}

				(status, error.into_errors())
			}
		};

		let message = errors
			.first()
			.map_or_else(|| "error".to_string(), |error| error.content.to_string());

		(
			status,
			Json(ErrorResponse {
				success: false,
				message,
				errors,
			}),
		)
			.into_response()
	}
}

#[cfg(test)]
mod test {
	use validator::Validate;

	use super::*;

	#[derive(Debug, thiserror::Error)]
	#[error("missing thing")]
	struct Missing;

	impl ErrorShape for Missing {
		fn status(&self) -> StatusCode {
			StatusCode::NOT_FOUND
		}

		fn into_errors(self) -> Vec<Message<'static>> {
			Message::new("missing")
				.content("The thing is missing.")
				.detail("thing", "widget")
				.into_vec()
		}
	}

	#[derive(Validate)]
	struct Input {
		#[validate(length(min = 3))]
		name: String,
	}

	#[test]
	fn test_route_error_status() {
		let response = RouteError::from(Missing).into_response();

		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[test]
	fn test_validation_messages_carry_field() {
		let errors = Input { name: "ab".into() }.validate().unwrap_err();
		let messages = validation_messages(&errors);

		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].field.as_deref(), Some("name"));
		assert_eq!(messages[0].code, "length");
	}

	#[test]
	fn test_message_builder() {
		let message = Message::new("code").content("text").detail("id", 3);

		assert_eq!(message.code, "code");
		assert_eq!(message.content, "text");
		assert_eq!(message.details.unwrap()["id"], 3);
	}
}
