use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub use crate::route::model::Paginate;

use crate::route::user::model::User;

pub const MAX_CONTENT_LENGTH: usize = 5000;

/// A comment left under a blog post.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
	pub id: Uuid,
	pub blog_id: Uuid,
	pub author_id: Uuid,
	/// The public username of the author.
	pub author_username: String,
	pub content: String,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Comment {
	/// Whether the user may delete this comment, either as its author or as an admin.
	pub fn deletable_by(&self, user: &User) -> bool {
		user.can_manage(self.author_id)
	}
}

fn validate_content(content: &str) -> Result<(), ValidationError> {
	let content = content.trim();

	if content.is_empty() {
		return Err(ValidationError::new("blank").with_message("comment cannot be empty".into()));
	}

	if content.chars().count() > MAX_CONTENT_LENGTH {
		return Err(ValidationError::new("length")
			.with_message("comment cannot be longer than 5000 characters".into()));
	}

	Ok(())
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateCommentInput {
	/// The text of the comment. Surrounding whitespace is removed.
	#[validate(custom(function = "validate_content"))]
	pub content: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlogPath {
	pub blog_id: Uuid,
}

#[derive(Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentPath {
	pub blog_id: Uuid,
	pub comment_id: Uuid,
}
