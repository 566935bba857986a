use aide::axum::IntoApiResponse;
use argon2::Argon2;
use axum::{
	extract::State,
	http::{header, StatusCode},
	response::IntoResponse,
};
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Admin, Json, Path, Query, Session},
	google::GoogleIdentity,
	mail::Email,
	openapi::tag,
	session, AppState, Database,
};

use super::{model, Error, RouteError};

pub const KEY_LENGTH: usize = 32;

/// How long an emailed verification link stays valid.
const VERIFICATION_TTL_HOURS: i64 = 24;

/// Hashes a password with Argon2, using the user's id as a salt.
/// Since this is only used for logging in and creating a new password,
/// the scope of this function can remain in here with no issues.
fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Maps unique constraint violations on the user table to their client-facing errors.
fn map_conflict(error: sqlx::Error) -> RouteError {
	if let sqlx::Error::Database(ref database) = error {
		if database.is_unique_violation() {
			let message = database.message();

			if message.contains("user.email") {
				return Error::EmailTaken.into();
			}

			if message.contains("user.username") {
				return Error::UsernameTaken.into();
			}
		}
	}

	RouteError::from(error)
}

/// Derives a username candidate from a Google identity: alphanumeric,
/// at most 16 characters and at least 3.
fn username_base(identity: &GoogleIdentity) -> String {
	let local = identity.email.split('@').next().unwrap_or_default();
	let source = identity
		.name
		.as_deref()
		.filter(|name| name.chars().filter(|c| c.is_alphanumeric()).count() >= 3)
		.unwrap_or(local);

	let mut base = source
		.chars()
		.filter(|c| c.is_alphanumeric())
		.flat_map(char::to_lowercase)
		.take(16)
		.collect::<String>();

	while base.chars().count() < 3 {
		base.push('0');
	}

	base
}

/// Creates a session for the user and returns it with its cookie.
async fn start_session(
	state: &AppState,
	user_id: Uuid,
) -> Result<impl IntoApiResponse, RouteError> {
	let now = Utc::now();
	let session = sqlx::query_as::<_, model::Session>(
		r#"
			INSERT INTO session (id, user_id, created_at, expires_at)
			VALUES ($1, $2, $3, $4)
			RETURNING *
		"#,
	)
	.bind(Uuid::new_v4())
	.bind(user_id)
	.bind(now)
	.bind(session::expires_at(now))
	.fetch_one(&state.database)
	.await?;

	let cookie = session::create_cookie(session.id, state.secure_cookies);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Register account
/// Registers a new local account and emails a verification link.
/// The account can log in once the email address is verified.
#[route(tag = tag::USER, response(status = 201, description = "Registered successfully.", shape = "Json<model::User>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(input): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user_id = Uuid::new_v4();
	let email = input.email.to_lowercase();
	let hashed = hash_password(&state.hasher, &input.password, &user_id).map_err(Error::Argon)?;
	let now = Utc::now();

	let mut tx = state.database.begin().await?;

	let user = sqlx::query_as::<_, model::User>(
		r#"
			INSERT INTO "user" (id, email, username, password, provider, first_name, last_name, created_at, updated_at)
			VALUES ($1, $2, $3, $4, 'local', $5, $6, $7, $7)
			RETURNING *
		"#,
	)
	.bind(user_id)
	.bind(&email)
	.bind(&input.username)
	.bind(&hashed[..])
	.bind(&input.first_name)
	.bind(&input.last_name)
	.bind(now)
	.fetch_one(&mut *tx)
	.await
	.map_err(map_conflict)?;

	let token = Uuid::new_v4();

	sqlx::query("INSERT INTO email_verification (token, user_id, expires_at) VALUES ($1, $2, $3)")
		.bind(token)
		.bind(user_id)
		.bind(now + chrono::Duration::hours(VERIFICATION_TTL_HOURS))
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	let link = format!("{}/user/verify/{token}", state.public_url);

	// no write lock may be held across the smtp round-trip
	if let Err(error) = state
		.mailer
		.send(Email::verification(&email, &user.username, &link))
		.await
	{
		sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
			.bind(user.id)
			.execute(&state.database)
			.await?;

		return Err(Error::Mail(error).into());
	}

	tracing::info!(user = %user.id, "user registered");

	Ok((StatusCode::CREATED, Json(user)))
}

/// Verify email
/// Confirms an email address with the token sent at registration.
#[route(tag = tag::USER)]
pub async fn verify_email(
	State(database): State<Database>,
	Path(path): Path<model::VerifyInput>,
) -> Result<Json<model::User>, RouteError> {
	let mut tx = database.begin().await?;

	let user_id = sqlx::query_scalar::<_, Uuid>(
		"DELETE FROM email_verification WHERE token = $1 AND expires_at > $2 RETURNING user_id",
	)
	.bind(path.token)
	.bind(Utc::now())
	.fetch_optional(&mut *tx)
	.await?
	.ok_or(Error::UnknownToken)?;

	let user = sqlx::query_as::<_, model::User>(
		r#"
			UPDATE "user" SET email_verified = TRUE, updated_at = $1
			WHERE id = $2
			RETURNING *
		"#,
	)
	.bind(Utc::now())
	.bind(user_id)
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(Json(user))
}

/// Log in
/// Logs in to a local account, returning an associated session cookie.
#[route(tag = tag::USER, response(status = 200, description = "Logged in successfully.", shape = "Json<model::Session>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user = sqlx::query_as::<_, model::User>(r#"SELECT * FROM "user" WHERE email = $1"#)
		.bind(auth.email.to_lowercase())
		.fetch_optional(&state.database)
		.await?;

	let Some(user) = user else {
		return Err(Error::InvalidEmailOrPassword.into());
	};

	// accounts created through google have no password to compare against
	let Some(password) = &user.password else {
		return Err(Error::InvalidEmailOrPassword.into());
	};

	let hashed = hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if password[..] != hashed[..] {
		return Err(Error::InvalidEmailOrPassword.into());
	}

	if !user.email_verified {
		return Err(Error::EmailNotVerified.into());
	}

	start_session(&state, user.id).await
}

/// Log in with Google
/// Verifies a Google ID token and logs in to the matching account.
/// Accounts are matched by Google id first, then by email, and created otherwise.
#[route(tag = tag::USER, response(status = 200, description = "Logged in successfully.", shape = "Json<model::Session>"))]
pub async fn google_login(
	State(state): State<AppState>,
	Json(input): Json<model::GoogleLoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let verifier = state.google.as_ref().ok_or(Error::GoogleUnavailable)?;
	let identity = verifier
		.verify(&input.credential)
		.await
		.map_err(Error::Google)?;
	let now = Utc::now();

	let mut tx = state.database.begin().await?;

	let existing = sqlx::query_as::<_, model::User>(
		r#"SELECT * FROM "user" WHERE google_id = $1 OR email = $2 ORDER BY google_id = $1 DESC LIMIT 1"#,
	)
	.bind(&identity.id)
	.bind(&identity.email)
	.fetch_optional(&mut *tx)
	.await?;

	let user_id = match existing {
		Some(user) if user.google_id.as_deref() == Some(identity.id.as_str()) => user.id,
		Some(user) if user.google_id.is_some() => {
			return Err(Error::GoogleAccountConflict.into());
		}
		Some(user) if user.email_verified => {
			sqlx::query(
				r#"
					UPDATE "user"
					SET google_id = $1, avatar = COALESCE(avatar, $2), updated_at = $3
					WHERE id = $4
				"#,
			)
			.bind(&identity.id)
			.bind(&identity.picture)
			.bind(now)
			.bind(user.id)
			.execute(&mut *tx)
			.await?;

			tracing::info!(user = %user.id, "google account linked");
			user.id
		}
		Some(user) => {
			// the address was never verified, so the local credentials are not trusted
			sqlx::query(
				r#"
					UPDATE "user"
					SET google_id = $1, provider = 'google', password = NULL, email_verified = TRUE,
						avatar = COALESCE(avatar, $2), updated_at = $3
					WHERE id = $4
				"#,
			)
			.bind(&identity.id)
			.bind(&identity.picture)
			.bind(now)
			.bind(user.id)
			.execute(&mut *tx)
			.await?;

			sqlx::query("DELETE FROM session WHERE user_id = $1")
				.bind(user.id)
				.execute(&mut *tx)
				.await?;

			sqlx::query("DELETE FROM email_verification WHERE user_id = $1")
				.bind(user.id)
				.execute(&mut *tx)
				.await?;

			tracing::warn!(user = %user.id, "unverified account claimed through google");
			user.id
		}
		None => {
			let base = username_base(&identity);
			let prefix = base.chars().take(10).collect::<String>();
			let taken = sqlx::query_scalar::<_, String>(
				r#"SELECT username FROM "user" WHERE username LIKE $1 || '%'"#,
			)
			.bind(&prefix)
			.fetch_all(&mut *tx)
			.await?;

			let username = std::iter::once(base.clone())
				.chain((1..).map(|n: u32| {
					let suffix = n.to_string();
					let keep = 16 - suffix.len();

					format!("{}{suffix}", base.chars().take(keep).collect::<String>())
				}))
				.find(|candidate| !taken.contains(candidate))
				.unwrap_or_default();

			let user_id = Uuid::new_v4();

			sqlx::query(
				r#"
					INSERT INTO "user" (id, email, username, provider, google_id, email_verified, avatar, created_at, updated_at)
					VALUES ($1, $2, $3, 'google', $4, TRUE, $5, $6, $6)
				"#,
			)
			.bind(user_id)
			.bind(&identity.email)
			.bind(&username)
			.bind(&identity.id)
			.bind(&identity.picture)
			.bind(now)
			.execute(&mut *tx)
			.await
			.map_err(map_conflict)?;

			tracing::info!(user = %user_id, "user created from google account");
			user_id
		}
	};

	tx.commit().await?;

	start_session(&state, user_id).await
}

/// Log out
/// Logs out of the authenticated account and clears the session cookie.
#[route(tag = tag::USER, response(status = 204, description = "Logged out successfully."))]
pub async fn logout(
	State(state): State<AppState>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	sqlx::query("DELETE FROM session WHERE id = $1")
		.bind(session.id)
		.execute(&state.database)
		.await?;

	// Clear the session cookie
	Ok((
		[(
			header::SET_COOKIE,
			session::clear_cookie(state.secure_cookies).to_string(),
		)],
		StatusCode::NO_CONTENT,
	)
		.into_response())
}

/// Get current user
/// Returns the authenticated user, including their email address.
#[route(tag = tag::USER)]
pub async fn get_current(session: Session) -> Json<model::CurrentUser> {
	Json(session.user.into())
}

/// Update profile
/// Updates the public profile of the authenticated user. Omitted fields are left unchanged.
#[route(tag = tag::USER)]
pub async fn update_profile(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::UpdateProfileInput>,
) -> Result<Json<model::CurrentUser>, RouteError> {
	let user = sqlx::query_as::<_, model::User>(
		r#"
			UPDATE "user"
			SET
				username = COALESCE($1, username),
				avatar = COALESCE($2, avatar),
				first_name = COALESCE($3, first_name),
				last_name = COALESCE($4, last_name),
				bio = COALESCE($5, bio),
				updated_at = $6
			WHERE id = $7
			RETURNING *
		"#,
	)
	.bind(&input.username)
	.bind(&input.avatar)
	.bind(&input.first_name)
	.bind(&input.last_name)
	.bind(&input.bio)
	.bind(Utc::now())
	.bind(session.user.id)
	.fetch_one(&database)
	.await
	.map_err(map_conflict)?;

	Ok(Json(user.into()))
}

/// Delete account
/// Deletes the authenticated user and their related content. This action is irreversible.
#[route(tag = tag::USER, response(status = 204, description = "Account deleted."))]
pub async fn delete_current(
	State(state): State<AppState>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
		.bind(session.user.id)
		.execute(&state.database)
		.await?;

	tracing::info!(user = %session.user.id, "user deleted");

	// Clear the session cookie
	Ok((
		[(
			header::SET_COOKIE,
			session::clear_cookie(state.secure_cookies).to_string(),
		)],
		StatusCode::NO_CONTENT,
	)
		.into_response())
}

/// List users
/// Returns a paginated list of all users, oldest first. Requires the admin role.
#[route(tag = tag::USER)]
pub async fn list_users(
	State(database): State<Database>,
	_admin: Admin,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::User>>, RouteError> {
	let users = sqlx::query_as::<_, model::User>(
		r#"
			SELECT * FROM "user"
			ORDER BY created_at ASC
			LIMIT $1 OFFSET $2
		"#,
	)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(users))
}

/// Change role
/// Grants or revokes the admin role of a user. Requires the admin role.
#[route(tag = tag::USER)]
pub async fn update_role(
	State(database): State<Database>,
	Admin(admin): Admin,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::RoleInput>,
) -> Result<Json<model::User>, RouteError> {
	let user = sqlx::query_as::<_, model::User>(
		r#"UPDATE "user" SET role = $1, updated_at = $2 WHERE id = $3 RETURNING *"#,
	)
	.bind(input.role)
	.bind(Utc::now())
	.bind(path.id)
	.fetch_optional(&database)
	.await?
	.ok_or(Error::UnknownUser(path.id))?;

	tracing::info!(admin = %admin.user.id, user = %user.id, role = ?user.role, "role changed");

	Ok(Json(user))
}
