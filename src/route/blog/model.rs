pub use crate::route::model::{IdInput, Paginate};

use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A single blog post, written by an admin.
#[model]
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
	/// The unique identifier of the post.
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// The user that wrote the post, if their account still exists.
	#[serde(skip_deserializing)]
	pub author_id: Option<Uuid>,
	/// The title of the post.
	#[validate(length(min = 3, max = 200))]
	pub title: String,
	/// A short introduction shown in listings.
	#[validate(length(max = 500))]
	pub summary: Option<String>,
	/// The content of the post in Markdown format.
	#[validate(length(min = 1))]
	pub content: String,
	/// Asset key or url of the cover image.
	#[validate(length(max = 512))]
	pub image: Option<String>,
	#[validate(length(min = 1, max = 64))]
	pub category: Option<String>,
	/// The creation time of the post.
	#[serde(skip_deserializing)]
	pub created_at: chrono::DateTime<chrono::Utc>,
	#[serde(skip_deserializing)]
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A post with its comment and rating counters, as shown in listings.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BlogSummary {
	#[serde(flatten)]
	#[sqlx(flatten)]
	pub blog: Blog,
	pub comment_count: i64,
	pub rating_count: i64,
	/// The mean of all ratings, absent while the post has none.
	pub average_rating: Option<f64>,
}

/// A single rating given to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
	pub author_id: Uuid,
	/// Between 1 and 5.
	pub value: i64,
}

/// A post with every rating it received.
#[derive(Debug, Serialize, JsonSchema)]
pub struct BlogDetail {
	#[serde(flatten)]
	pub summary: BlogSummary,
	pub ratings: Vec<Rating>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RatingInput {
	#[validate(range(min = 1, max = 5))]
	pub value: i64,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct ListInput {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 1000))]
	#[serde(default = "crate::route::model::one")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "crate::route::model::twenty")]
	pub size: i64,
	/// Only return posts of this category.
	pub category: Option<String>,
}

impl ListInput {
	pub fn paginate(&self) -> Paginate {
		Paginate {
			page: self.page,
			size: self.size,
		}
	}
}

#[cfg(test)]
mod test {
	use validator::Validate;

	use super::*;

	#[test]
	fn test_create_input_skips_generated_fields() {
		let input = serde_json::from_value::<CreateBlogInput>(serde_json::json!({
			"title": "Les halles de Lyon",
			"content": "Un tour des étals.",
			"id": "00000000-0000-0000-0000-000000000000",
		}))
		.unwrap();

		assert_eq!(input.title, "Les halles de Lyon");
		assert!(input.summary.is_none());
		assert!(input.validate().is_ok());
	}

	#[test]
	fn test_update_input_is_partial() {
		let input =
			serde_json::from_value::<UpdateBlogInput>(serde_json::json!({ "title": "ab" })).unwrap();

		assert!(input.content.is_none());
		assert!(input.validate().is_err());
	}

	#[test]
	fn test_rating_range() {
		assert!(RatingInput { value: 0 }.validate().is_err());
		assert!(RatingInput { value: 5 }.validate().is_ok());
		assert!(RatingInput { value: 6 }.validate().is_err());
	}
}
