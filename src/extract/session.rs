use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::SECURITY_SCHEME_SESSION,
	route::user::{self, model::User},
	session, Database,
};

/// Extracts the session and related user from the request.
///
/// If it does not exist, a [`user::Error::NoSessionCookie`] is returned.
/// If the session is unknown or expired, a [`user::Error::InvalidSessionCookie`] is returned.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub id: Uuid,
	pub user: User,
}

fn session_id(parts: &request::Parts) -> Result<Uuid, user::Error> {
	let cookies = parts
		.headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok());

	let session_id = cookies
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == session::COOKIE_NAME)
		.ok_or(user::Error::NoSessionCookie)?;

	Uuid::parse_str(session_id.value()).map_err(|_| user::Error::InvalidSessionCookie)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<user::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let session_id = session_id(parts)?;

		let database = Database::from_ref(state);
		let user = sqlx::query_as::<_, User>(
			r#"
				SELECT "user".* FROM "user"
				JOIN session ON session.user_id = "user".id
				WHERE session.id = $1 AND session.expires_at > $2
			"#,
		)
		.bind(session_id)
		.bind(chrono::Utc::now())
		.fetch_optional(&database)
		.await?;

		let user = user.ok_or(user::Error::InvalidSessionCookie)?;

		Ok(Session {
			user,
			id: session_id,
		})
	}
}

impl OperationInput for Session {
	/// Operation input for the session extractor.
	///
	/// This adds a session cookie requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.push(
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		);
	}
}

/// Extracts the session if the request carries a valid one.
///
/// Used by routes that are public but show more to authenticated users.
/// Database failures are still reported instead of being treated as anonymous.
#[derive(Debug)]
pub struct MaybeSession(pub Option<Session>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<user::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		match Session::from_request_parts(parts, state).await {
			Ok(session) => Ok(Self(Some(session))),
			Err(RouteError::Route(
				user::Error::NoSessionCookie | user::Error::InvalidSessionCookie,
			)) => Ok(Self(None)),
			Err(error) => Err(error),
		}
	}
}

impl OperationInput for MaybeSession {}

/// Extracts a session whose user has the admin role.
///
/// Rejects with [`user::Error::NotAdmin`] otherwise.
#[derive(Debug)]
pub struct Admin(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Admin
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<user::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let session = Session::from_request_parts(parts, state).await?;

		if !session.user.is_admin() {
			return Err(user::Error::NotAdmin.into());
		}

		Ok(Self(session))
	}
}

impl OperationInput for Admin {
	fn operation_input(ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		Session::operation_input(ctx, operation);
	}
}
