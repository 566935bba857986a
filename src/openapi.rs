use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_SESSION: &str = "Session";

pub mod tag {
	pub const USER: &str = "User";
	pub const BLOG: &str = "Blog";
	pub const COMMENT: &str = "Comment";
	pub const ACTUALITE: &str = "Actualité";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Actualités API")
		.summary("Local news, blog and community backend")
		.description(
			"Accounts with email or Google sign-in, an admin-written blog with \
			ratings and comments, and a moderated feed of local events and shops.",
		)
		.tag(Tag {
			name: tag::USER.into(),
			description: Some("Accounts, sessions and roles".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::BLOG.into(),
			description: Some("Blog posts and ratings".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::COMMENT.into(),
			description: Some("Comments under blog posts".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::ACTUALITE.into(),
			description: Some("Submission and moderation of local events and shops".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A user session cookie".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorResponse>, _>(|res| {
			res.example(error::ErrorResponse {
				success: false,
				message: "title must be between 3 and 200 characters".into(),
				errors: error::Message::new("length")
					.content("title must be between 3 and 200 characters")
					.field("title")
					.detail("min", 3)
					.into_vec(),
			})
		})
}
