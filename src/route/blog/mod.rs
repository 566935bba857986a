use aide::axum::{
	routing::{get_with, put_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown blog post {0}")]
	UnknownBlog(Uuid),
	#[error("no rating from this user on blog post {0}")]
	UnknownRating(Uuid),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_blogs, get_blogs_docs).post_with(create_blog, create_blog_docs),
		)
		.api_route(
			"/:id",
			get_with(get_blog, get_blog_docs)
				.put_with(update_blog, update_blog_docs)
				.delete_with(delete_blog, delete_blog_docs),
		)
		.api_route(
			"/:id/rating",
			put_with(rate_blog, rate_blog_docs).delete_with(unrate_blog, unrate_blog_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownBlog(..) | Self::UnknownRating(..) => StatusCode::NOT_FOUND,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = error::Message::new(match self {
			Self::UnknownBlog(..) => "unknown_blog",
			Self::UnknownRating(..) => "unknown_rating",
		})
		.content(self.to_string());

		match self {
			Self::UnknownBlog(blog) | Self::UnknownRating(blog) => {
				message.detail("blog", blog.to_string()).into_vec()
			}
		}
	}
}
