use aide::axum::{
	routing::{delete_with, get_with},
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
	#[error("unknown comment {0}")]
	UnknownComment(Uuid),
	#[error("only the author or an admin can delete this comment")]
	NotAuthor,
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/:blogId",
			get_with(get_comments, get_comments_docs).post_with(create_comment, create_comment_docs),
		)
		.api_route(
			"/:blogId/:commentId",
			delete_with(delete_comment, delete_comment_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownBlog(..) | Self::UnknownComment(..) => StatusCode::NOT_FOUND,
			Self::NotAuthor => StatusCode::FORBIDDEN,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = match self {
			Self::UnknownBlog(id) => error::Message::new("unknown_blog")
				.content(self.to_string())
				.detail("blog", id.to_string()),
			Self::UnknownComment(id) => error::Message::new("unknown_comment")
				.content(self.to_string())
				.detail("comment", id.to_string()),
			Self::NotAuthor => error::Message::new("not_author").content(self.to_string()),
		};

		message.into_vec()
	}
}
