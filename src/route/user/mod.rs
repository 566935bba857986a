use aide::axum::{
	routing::{get_with, patch_with, post_with, put_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{error, AppState};

pub mod model;
pub mod route;

/// An error that can occur during authentication or account management.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidEmailOrPassword,
	#[error("email address is not verified")]
	EmailNotVerified,
	#[error("password hashing error")]
	Argon(#[from] argon2::Error),
	#[error("no session cookie")]
	NoSessionCookie,
	#[error("invalid session cookie")]
	InvalidSessionCookie,
	#[error("admin role required")]
	NotAdmin,
	#[error("username already taken")]
	UsernameTaken,
	#[error("email already taken")]
	EmailTaken,
	#[error("unknown or expired verification token")]
	UnknownToken,
	#[error("unknown user {0}")]
	UnknownUser(uuid::Uuid),
	#[error("this email is linked to another google account")]
	GoogleAccountConflict,
	#[error("google sign-in is not configured")]
	GoogleUnavailable,
	#[error("google sign-in failed: {0}")]
	Google(#[from] crate::google::GoogleError),
	#[error("could not send email: {0}")]
	Mail(#[from] crate::mail::MailError),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			post_with(register, register_docs).get_with(list_users, list_users_docs),
		)
		.api_route("/login", post_with(login, login_docs))
		.api_route("/google", post_with(google_login, google_login_docs))
		.api_route("/logout", post_with(logout, logout_docs))
		.api_route("/verify/:token", get_with(verify_email, verify_email_docs))
		.api_route(
			"/current",
			get_with(get_current, get_current_docs).delete_with(delete_current, delete_current_docs),
		)
		.api_route("/profile", put_with(update_profile, update_profile_docs))
		.api_route("/:id/role", patch_with(update_role, update_role_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidEmailOrPassword
			| Self::NoSessionCookie
			| Self::InvalidSessionCookie
			| Self::Google(
				crate::google::GoogleError::InvalidToken
				| crate::google::GoogleError::WrongAudience(..)
				| crate::google::GoogleError::UnverifiedEmail,
			) => StatusCode::UNAUTHORIZED,
			Self::EmailNotVerified | Self::NotAdmin => StatusCode::FORBIDDEN,
			Self::UnknownToken | Self::UnknownUser(..) => StatusCode::NOT_FOUND,
			Self::UsernameTaken | Self::EmailTaken | Self::GoogleAccountConflict => {
				StatusCode::CONFLICT
			}
			Self::GoogleUnavailable => StatusCode::SERVICE_UNAVAILABLE,
			Self::Argon(..) | Self::Mail(..) | Self::Google(crate::google::GoogleError::Request(..)) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let code = match self {
			Self::InvalidEmailOrPassword => "invalid_credentials",
			Self::EmailNotVerified => "email_not_verified",
			Self::Argon(..) | Self::Mail(..) => "internal_error",
			Self::NoSessionCookie => "no_session",
			Self::InvalidSessionCookie => "invalid_session",
			Self::NotAdmin => "not_admin",
			Self::UsernameTaken => "username_taken",
			Self::EmailTaken => "email_taken",
			Self::UnknownToken => "unknown_token",
			Self::UnknownUser(..) => "unknown_user",
			Self::GoogleAccountConflict => "google_conflict",
			Self::GoogleUnavailable => "google_unavailable",
			Self::Google(..) => "google_rejected",
		};

		let message = match self {
			Self::Argon(..) | Self::Mail(..) => {
				error::Message::new(code).content("An unexpected error occurred.")
			}
			Self::Google(..) => error::Message::new(code).content("Google sign-in failed."),
			Self::UnknownUser(id) => error::Message::new(code)
				.content(self.to_string())
				.detail("user", id.to_string()),
			_ => error::Message::new(code).content(self.to_string()),
		};

		message.into_vec()
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[sqlx::test]
	async fn test_signup_flow(pool: Database) {
		let app = server(pool.clone());

		let response = app
			.post("/user")
			.json(&json!({
				"email": "john@smith.com",
				"username": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 201);
		assert_eq!(response.json::<Value>()["emailVerified"], false);

		let credentials = json!({
			"email": "john@smith.com",
			"password": "hunter2hunter",
		});

		let response = app.post("/user/login").json(&credentials).await;

		assert_eq!(response.status_code(), 403);

		let token = verification_token(&pool, "john@smith.com").await;
		let response = app.get(&format!("/user/verify/{token}")).await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["emailVerified"], true);

		// tokens are single-use
		let response = app.get(&format!("/user/verify/{token}")).await;

		assert_eq!(response.status_code(), 404);

		let response = app.post("/user/login").json(&credentials).await;

		assert_eq!(response.status_code(), 200);
		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.contains("session="));

		let response = app.get("/user/current").await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert_eq!(body["username"], "john");
		assert_eq!(body["email"], "john@smith.com");
		assert!(body.get("password").is_none());
	}

	#[sqlx::test]
	async fn test_duplicate_registration(pool: Database) {
		let app = server(pool.clone());

		register(&app, &pool, "alice").await;

		let response = app
			.post("/user")
			.json(&json!({
				"email": "alice@example.com",
				"username": "alice2",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 409);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "email_taken");

		let response = app
			.post("/user")
			.json(&json!({
				"email": "other@example.com",
				"username": "alice",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 409);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "username_taken");
	}

	#[sqlx::test]
	async fn test_wrong_password(pool: Database) {
		let app = server(pool.clone());

		register(&app, &pool, "alice").await;

		let response = app
			.post("/user/login")
			.json(&json!({
				"email": "alice@example.com",
				"password": "wrongwrongwrong",
			}))
			.await;

		assert_eq!(response.status_code(), 401);
		assert_eq!(response.json::<Value>()["success"], false);
	}

	#[sqlx::test]
	async fn test_current_requires_session(pool: Database) {
		let app = server(pool);

		let response = app.get("/user/current").await;

		assert_eq!(response.status_code(), 401);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "no_session");
	}

	#[sqlx::test]
	async fn test_logout(pool: Database) {
		let app = server(pool.clone());

		login(&app, &pool, "alice").await;

		let response = app.post("/user/logout").await;

		assert_eq!(response.status_code(), 204);

		let response = app.get("/user/current").await;

		assert_eq!(response.status_code(), 401);
	}

	#[sqlx::test]
	async fn test_update_profile(pool: Database) {
		let app = server(pool.clone());
		let other = server(pool.clone());

		login(&app, &pool, "alice").await;
		login(&other, &pool, "bob").await;

		let response = app
			.put("/user/profile")
			.json(&json!({ "bio": "Fromagère à Lyon", "firstName": "Alice" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert_eq!(body["bio"], "Fromagère à Lyon");
		assert_eq!(body["firstName"], "Alice");
		assert_eq!(body["username"], "alice");

		let response = other
			.put("/user/profile")
			.json(&json!({ "username": "alice" }))
			.await;

		assert_eq!(response.status_code(), 409);
	}

	#[sqlx::test]
	async fn test_google_login_creates_then_links(pool: Database) {
		let app = server(pool.clone());

		let response = app
			.post("/user/google")
			.json(&json!({ "credential": "valid:g-1:marie.curie@example.com" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = app.get("/user/current").await;
		let body = response.json::<Value>();

		assert_eq!(body["provider"], "google");
		assert_eq!(body["username"], "mariecurie");
		assert_eq!(body["emailVerified"], true);

		// an unverified local account with the same email is taken over instead of duplicated
		let local = server(pool.clone());

		register(&local, &pool, "alice").await;

		let response = local
			.post("/user/google")
			.json(&json!({ "credential": "valid:g-2:alice@example.com" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = local.get("/user/current").await;

		assert_eq!(response.json::<Value>()["username"], "alice");

		let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user""#)
			.fetch_one(&pool)
			.await
			.unwrap();

		assert_eq!(count, 2);

		let response = app
			.post("/user/google")
			.json(&json!({ "credential": "forged" }))
			.await;

		assert_eq!(response.status_code(), 401);
	}

	#[sqlx::test]
	async fn test_google_claims_unverified_account(pool: Database) {
		let squatter = server(pool.clone());
		let owner = server(pool.clone());

		register(&squatter, &pool, "mallory").await;

		let credentials = json!({ "email": "mallory@example.com", "password": PASSWORD });
		let response = squatter.post("/user/login").json(&credentials).await;

		assert_eq!(response.status_code(), 403);

		let response = owner
			.post("/user/google")
			.json(&json!({ "credential": "valid:g-9:mallory@example.com" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = owner.get("/user/current").await;

		assert_eq!(response.json::<Value>()["provider"], "google");

		// the password chosen before google proved ownership no longer works
		let response = squatter.post("/user/login").json(&credentials).await;

		assert_eq!(response.status_code(), 401);

		let pending: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_verification")
			.fetch_one(&pool)
			.await
			.unwrap();

		assert_eq!(pending, 0);
	}

	#[sqlx::test]
	async fn test_google_links_verified_account(pool: Database) {
		let app = server(pool.clone());
		let google = server(pool.clone());

		login(&app, &pool, "alice").await;

		let response = google
			.post("/user/google")
			.json(&json!({ "credential": "valid:g-3:alice@example.com" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = google.get("/user/current").await;
		let body = response.json::<Value>();

		assert_eq!(body["username"], "alice");
		assert_eq!(body["provider"], "local");

		// the password keeps working once google is linked
		let response = app
			.post("/user/login")
			.json(&json!({ "email": "alice@example.com", "password": PASSWORD }))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = google
			.post("/user/google")
			.json(&json!({ "credential": "valid:g-4:alice@example.com" }))
			.await;

		assert_eq!(response.status_code(), 409);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "google_conflict");
	}

	#[sqlx::test]
	async fn test_google_unavailable(pool: Database) {
		let app = server_with(pool, |state| state.google = None);

		let response = app
			.post("/user/google")
			.json(&json!({ "credential": "valid:g-1:alice@example.com" }))
			.await;

		assert_eq!(response.status_code(), 503);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "google_unavailable");
	}

	#[sqlx::test]
	async fn test_registration_undone_when_mail_fails(pool: Database) {
		let app = server_with(pool.clone(), |state| {
			state.mailer = std::sync::Arc::new(FailingMailer);
		});

		let response = app
			.post("/user")
			.json(&json!({
				"email": "alice@example.com",
				"username": "alice",
				"password": PASSWORD,
			}))
			.await;

		assert_eq!(response.status_code(), 500);

		let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user""#)
			.fetch_one(&pool)
			.await
			.unwrap();

		assert_eq!(count, 0);
	}

	#[sqlx::test]
	async fn test_expired_session(pool: Database) {
		let app = server(pool.clone());

		login(&app, &pool, "alice").await;

		app.get("/user/current").await.assert_status_ok();

		sqlx::query("UPDATE session SET expires_at = $1")
			.bind(chrono::Utc::now() - chrono::Duration::minutes(1))
			.execute(&pool)
			.await
			.unwrap();

		let response = app.get("/user/current").await;

		assert_eq!(response.status_code(), 401);
	}

	#[sqlx::test]
	async fn test_expired_verification_token(pool: Database) {
		let app = server(pool.clone());

		register(&app, &pool, "alice").await;

		let token = verification_token(&pool, "alice@example.com").await;

		sqlx::query("UPDATE email_verification SET expires_at = $1")
			.bind(chrono::Utc::now() - chrono::Duration::minutes(1))
			.execute(&pool)
			.await
			.unwrap();

		let response = app.get(&format!("/user/verify/{token}")).await;

		assert_eq!(response.status_code(), 404);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "unknown_token");
	}

	#[sqlx::test]
	async fn test_admin_routes(pool: Database) {
		let app = server(pool.clone());
		let admin = server(pool.clone());

		let user_id = login(&app, &pool, "alice").await;

		login(&admin, &pool, "root").await;
		make_admin(&pool, "root").await;

		let response = app.get("/user").await;

		assert_eq!(response.status_code(), 403);

		let response = admin.get("/user").await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 2);

		let response = admin
			.patch(&format!("/user/{user_id}/role"))
			.json(&json!({ "role": "admin" }))
			.await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["role"], "admin");

		let response = app.get("/user").await;

		assert_eq!(response.status_code(), 200);
	}

	#[sqlx::test]
	async fn test_delete_account(pool: Database) {
		let app = server(pool.clone());

		login(&app, &pool, "alice").await;

		let response = app.delete("/user/current").await;

		assert_eq!(response.status_code(), 204);

		let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user""#)
			.fetch_one(&pool)
			.await
			.unwrap();

		assert_eq!(count, 0);
	}
}
