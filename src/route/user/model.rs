pub use crate::route::model::{IdInput, Paginate};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
	if username.chars().any(|c| !c.is_alphanumeric()) {
		return Err(ValidationError::new("username must be alphanumeric"));
	}

	Ok(())
}

/// What a user is allowed to do.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
	User,
	Admin,
}

/// Where the user's credentials come from.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Provider {
	Local,
	Google,
}

/// A single user.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The user's primary email address, used for logging in.
	#[serde(skip)]
	pub email: String,
	/// The hashed password. Absent for accounts created through Google.
	#[serde(skip)]
	pub password: Option<Vec<u8>>,
	/// The username that is displayed to the public.
	pub username: String,
	pub provider: Provider,
	#[serde(skip)]
	pub google_id: Option<String>,
	pub role: Role,
	pub email_verified: bool,
	pub avatar: Option<String>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub bio: Option<String>,
	/// The creation time of the user.
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl User {
	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}

	/// Whether the user wrote something owned by `author_id`, or may act on it as an admin.
	pub fn can_manage(&self, author_id: Uuid) -> bool {
		self.id == author_id || self.is_admin()
	}
}

/// The authenticated user, including fields only they may see.
#[derive(Debug, Serialize, JsonSchema)]
pub struct CurrentUser {
	#[serde(flatten)]
	pub user: User,
	pub email: String,
}

impl From<User> for CurrentUser {
	fn from(user: User) -> Self {
		Self {
			email: user.email.clone(),
			user,
		}
	}
}

#[derive(Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	/// The session id.
	#[serde(rename = "sessionId")]
	pub id: Uuid,
	/// The user that owns the session.
	#[serde(skip)]
	#[allow(dead_code)]
	pub user_id: Uuid,
	/// The creation time of the session.
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// The username that is displayed to the public.
	#[validate(length(min = 3, max = 16), custom(function = "validate_username"))]
	pub username: String,
	#[validate(length(max = 64))]
	pub first_name: Option<String>,
	#[validate(length(max = 64))]
	pub last_name: Option<String>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct GoogleLoginInput {
	/// The ID token returned by Google sign-in.
	#[validate(length(min = 1))]
	pub credential: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
	#[validate(length(min = 3, max = 16), custom(function = "validate_username"))]
	pub username: Option<String>,
	#[validate(length(max = 512))]
	pub avatar: Option<String>,
	#[validate(length(max = 64))]
	pub first_name: Option<String>,
	#[validate(length(max = 64))]
	pub last_name: Option<String>,
	#[validate(length(max = 2000))]
	pub bio: Option<String>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct VerifyInput {
	pub token: Uuid,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RoleInput {
	pub role: Role,
}
