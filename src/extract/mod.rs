mod session;

pub use session::{Admin, MaybeSession, Session};

use aide::OperationIo;
use axum::{
	body::Body,
	extract::{FromRequest, FromRequestParts, Request},
	http::{request, Response},
	response::IntoResponse,
};
use serde::de;
use serde_json::Value;
use validator::Validate;

use crate::error::{AppError, BodyError};

/// Runs the input's validation rules, turning failures into a client error.
fn validated<T: Validate>(input: T) -> Result<T, AppError> {
	input.validate()?;
	Ok(input)
}

/// Returns the name between backticks that follows `prefix` in a serde message.
fn quoted_after<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
	message
		.strip_prefix(prefix)?
		.strip_prefix('`')?
		.split('`')
		.next()
}

/// Finds the top-level field a serde data error is about.
///
/// Missing and unknown fields are named by serde. An unknown variant is
/// traced back to the field holding that string, such as a `type` tag.
fn offending_field(body: &Value, error: &serde_json::Error) -> Option<String> {
	let message = error.to_string();

	if let Some(field) = quoted_after(&message, "missing field ")
		.or_else(|| quoted_after(&message, "unknown field "))
	{
		return Some(field.to_string());
	}

	let variant = quoted_after(&message, "unknown variant ")?;

	body.as_object()?
		.iter()
		.find(|(_, value)| value.as_str() == Some(variant))
		.map(|(field, _)| field.clone())
}

/// Extractor that deserializes a JSON body and validates it.
///
/// The body is parsed in two steps: syntax and content type are checked by
/// [`axum::Json`], then the value is matched against `T` so that errors can
/// point at the field that caused them.
///
/// ```rust
/// async fn route(Json(actualite): Json<ActualiteInput>) {
///   // ...
/// }
/// ```
#[derive(OperationIo)]
#[aide(
	input_with = "axum::Json<T>",
	output_with = "axum::Json<T>",
	json_schema
)]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
	T: serde::Serialize,
{
	fn into_response(self) -> Response<Body> {
		axum::Json(self.0).into_response()
	}
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
	T: de::DeserializeOwned + Validate,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let axum::Json(body) = axum::Json::<Value>::from_request(req, state).await?;
		let input = <T as de::Deserialize>::deserialize(&body).map_err(|source| BodyError {
			field: offending_field(&body, &source),
			source,
		})?;

		validated(input).map(Self)
	}
}

/// Extractor that deserializes a query string and validates it.
///
/// This is similar to [`Json<T>`], but does not consume the body.
///
/// ```rust
/// async fn route(Query(params): Query<Params>) {
///   // ...
/// }
/// ```
#[derive(OperationIo)]
#[aide(
	input_with = "axum::extract::Query<T>",
	output_with = "axum::Json<T>",
	json_schema
)]
pub struct Query<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
	T: de::DeserializeOwned + Validate,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let axum::extract::Query(input) =
			axum::extract::Query::<T>::from_request_parts(parts, state).await?;

		validated(input).map(Self)
	}
}

/// Extractor that deserializes path parameters and validates them.
#[derive(OperationIo)]
#[aide(
	input_with = "axum::extract::Path<T>",
	output_with = "axum::Json<T>",
	json_schema
)]
pub struct Path<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for Path<T>
where
	T: de::DeserializeOwned + Validate + Send,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let axum::extract::Path(input) =
			axum::extract::Path::<T>::from_request_parts(parts, state).await?;

		validated(input).map(Self)
	}
}
