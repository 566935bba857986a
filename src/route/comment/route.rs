use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Path, Query, Session},
	openapi::tag,
	route::blog,
	Database,
};

use super::{model, Error, RouteError};

async fn ensure_blog(database: &Database, blog_id: Uuid) -> Result<(), RouteError> {
	if blog::route::exists(database, blog_id).await? {
		Ok(())
	} else {
		Err(Error::UnknownBlog(blog_id).into())
	}
}

/// Get comments
/// Returns a paginated response of the comments of a blog post, oldest first.
#[route(tag = tag::COMMENT)]
pub async fn get_comments(
	State(database): State<Database>,
	Path(path): Path<model::BlogPath>,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Comment>>, RouteError> {
	ensure_blog(&database, path.blog_id).await?;

	let comments = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT comment.*, "user".username AS author_username
			FROM comment
			JOIN "user" ON "user".id = comment.author_id
			WHERE comment.blog_id = $1
			ORDER BY comment.created_at ASC
			LIMIT $2 OFFSET $3
		"#,
	)
	.bind(path.blog_id)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(comments))
}

/// Create comment
/// Comments on a blog post as the authenticated user.
#[route(tag = tag::COMMENT, response(status = 201, description = "Comment created.", shape = "Json<model::Comment>"))]
pub async fn create_comment(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::BlogPath>,
	Json(input): Json<model::CreateCommentInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	ensure_blog(&database, path.blog_id).await?;

	let comment_id = Uuid::new_v4();

	sqlx::query(
		r#"
			INSERT INTO comment (id, blog_id, author_id, content, created_at, updated_at)
			VALUES ($1, $2, $3, $4, $5, $5)
		"#,
	)
	.bind(comment_id)
	.bind(path.blog_id)
	.bind(session.user.id)
	.bind(input.content.trim())
	.bind(Utc::now())
	.execute(&database)
	.await?;

	let comment = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT comment.*, "user".username AS author_username
			FROM comment
			JOIN "user" ON "user".id = comment.author_id
			WHERE comment.id = $1
		"#,
	)
	.bind(comment_id)
	.fetch_one(&database)
	.await?;

	Ok((StatusCode::CREATED, Json(comment)))
}

/// Delete comment
/// Deletes a comment. Only its author or an admin may do so.
#[route(tag = tag::COMMENT, response(status = 204, description = "Comment deleted."))]
pub async fn delete_comment(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::CommentPath>,
) -> Result<impl IntoApiResponse, RouteError> {
	let comment = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT comment.*, "user".username AS author_username
			FROM comment
			JOIN "user" ON "user".id = comment.author_id
			WHERE comment.id = $1 AND comment.blog_id = $2
		"#,
	)
	.bind(path.comment_id)
	.bind(path.blog_id)
	.fetch_optional(&database)
	.await?
	.ok_or(Error::UnknownComment(path.comment_id))?;

	if !comment.deletable_by(&session.user) {
		return Err(Error::NotAuthor.into());
	}

	sqlx::query("DELETE FROM comment WHERE id = $1")
		.bind(comment.id)
		.execute(&database)
		.await?;

	tracing::info!(comment = %comment.id, user = %session.user.id, "comment deleted");

	Ok(StatusCode::NO_CONTENT.into_response())
}
