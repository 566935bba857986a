use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Admin, Json, Path, Query, Session},
	openapi::tag,
	Database,
};

use super::{model, Error, RouteError};

/// Selects posts along with their comment and rating counters.
const SELECT_SUMMARY: &str = r#"
	SELECT
		blog.*,
		(SELECT COUNT(*) FROM comment WHERE comment.blog_id = blog.id) AS comment_count,
		(SELECT COUNT(*) FROM blog_rating WHERE blog_rating.blog_id = blog.id) AS rating_count,
		(SELECT AVG(value) FROM blog_rating WHERE blog_rating.blog_id = blog.id) AS average_rating
	FROM blog
"#;

/// Fetches a post with every rating it received.
pub(crate) async fn fetch_detail(
	database: &Database,
	blog_id: Uuid,
) -> Result<Option<model::BlogDetail>, sqlx::Error> {
	let query = format!("{SELECT_SUMMARY} WHERE blog.id = $1");
	let Some(summary) = sqlx::query_as::<_, model::BlogSummary>(&query)
		.bind(blog_id)
		.fetch_optional(database)
		.await?
	else {
		return Ok(None);
	};

	let ratings = sqlx::query_as::<_, model::Rating>(
		r#"
			SELECT author_id, value FROM blog_rating
			WHERE blog_id = $1
			ORDER BY created_at ASC
		"#,
	)
	.bind(blog_id)
	.fetch_all(database)
	.await?;

	Ok(Some(model::BlogDetail { summary, ratings }))
}

/// Whether a post with this id exists.
pub(crate) async fn exists(database: &Database, blog_id: Uuid) -> Result<bool, sqlx::Error> {
	sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM blog WHERE id = $1)")
		.bind(blog_id)
		.fetch_one(database)
		.await
}

async fn detail_or_unknown(
	database: &Database,
	blog_id: Uuid,
) -> Result<Json<model::BlogDetail>, RouteError> {
	let detail = fetch_detail(database, blog_id)
		.await?
		.ok_or(Error::UnknownBlog(blog_id))?;

	Ok(Json(detail))
}

/// Get all posts
/// Returns a paginated response of all posts, newest first.
#[route(tag = tag::BLOG)]
pub async fn get_blogs(
	State(database): State<Database>,
	Query(input): Query<model::ListInput>,
) -> Result<Json<Vec<model::BlogSummary>>, RouteError> {
	let paginate = input.paginate();
	let query = format!(
		"{SELECT_SUMMARY} WHERE ($1 IS NULL OR blog.category = $1) ORDER BY blog.created_at DESC LIMIT $2 OFFSET $3"
	);

	let blogs = sqlx::query_as::<_, model::BlogSummary>(&query)
		.bind(&input.category)
		.bind(paginate.limit())
		.bind(paginate.offset())
		.fetch_all(&database)
		.await?;

	Ok(Json(blogs))
}

/// Get single post
/// Returns a single post by its unique id, with every rating it received.
#[route(tag = tag::BLOG)]
pub async fn get_blog(
	State(database): State<Database>,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::BlogDetail>, RouteError> {
	detail_or_unknown(&database, path.id).await
}

/// Create post
/// Creates a new post. Requires the admin role.
#[route(tag = tag::BLOG, response(status = 201, description = "Post created.", shape = "Json<model::BlogDetail>"))]
pub async fn create_blog(
	State(database): State<Database>,
	Admin(admin): Admin,
	Json(input): Json<model::CreateBlogInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let blog_id = Uuid::new_v4();

	sqlx::query(
		r#"
			INSERT INTO blog (id, author_id, title, summary, content, image, category, created_at, updated_at)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
		"#,
	)
	.bind(blog_id)
	.bind(admin.user.id)
	.bind(&input.title)
	.bind(&input.summary)
	.bind(&input.content)
	.bind(&input.image)
	.bind(&input.category)
	.bind(Utc::now())
	.execute(&database)
	.await?;

	tracing::info!(blog = %blog_id, admin = %admin.user.id, "blog post created");

	let detail = detail_or_unknown(&database, blog_id).await?;

	Ok((StatusCode::CREATED, detail))
}

/// Update post
/// Updates an existing post by its unique id. Omitted fields are left unchanged.
/// Requires the admin role.
#[route(tag = tag::BLOG)]
pub async fn update_blog(
	State(database): State<Database>,
	_admin: Admin,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::UpdateBlogInput>,
) -> Result<Json<model::BlogDetail>, RouteError> {
	let result = sqlx::query(
		r#"
			UPDATE blog
			SET
				title = COALESCE($1, title),
				summary = COALESCE($2, summary),
				content = COALESCE($3, content),
				image = COALESCE($4, image),
				category = COALESCE($5, category),
				updated_at = $6
			WHERE id = $7
		"#,
	)
	.bind(&input.title)
	.bind(&input.summary)
	.bind(&input.content)
	.bind(&input.image)
	.bind(&input.category)
	.bind(Utc::now())
	.bind(path.id)
	.execute(&database)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::UnknownBlog(path.id).into());
	}

	detail_or_unknown(&database, path.id).await
}

/// Delete post
/// Deletes an existing post by its unique id, along with its comments and ratings.
/// Requires the admin role.
#[route(tag = tag::BLOG, response(status = 204, description = "Post deleted."))]
pub async fn delete_blog(
	State(database): State<Database>,
	Admin(admin): Admin,
	Path(path): Path<model::IdInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let result = sqlx::query("DELETE FROM blog WHERE id = $1")
		.bind(path.id)
		.execute(&database)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::UnknownBlog(path.id).into());
	}

	tracing::info!(blog = %path.id, admin = %admin.user.id, "blog post deleted");

	Ok(StatusCode::NO_CONTENT.into_response())
}

/// Rate post
/// Rates a post from 1 to 5. Rating the same post again replaces the previous rating.
#[route(tag = tag::BLOG)]
pub async fn rate_blog(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::RatingInput>,
) -> Result<Json<model::BlogDetail>, RouteError> {
	if !exists(&database, path.id).await? {
		return Err(Error::UnknownBlog(path.id).into());
	}

	sqlx::query(
		r#"
			INSERT INTO blog_rating (blog_id, author_id, value, created_at, updated_at)
			VALUES ($1, $2, $3, $4, $4)
			ON CONFLICT (blog_id, author_id)
			DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
		"#,
	)
	.bind(path.id)
	.bind(session.user.id)
	.bind(input.value)
	.bind(Utc::now())
	.execute(&database)
	.await?;

	detail_or_unknown(&database, path.id).await
}

/// Remove rating
/// Removes your rating from a post.
#[route(tag = tag::BLOG)]
pub async fn unrate_blog(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::BlogDetail>, RouteError> {
	if !exists(&database, path.id).await? {
		return Err(Error::UnknownBlog(path.id).into());
	}

	let result = sqlx::query("DELETE FROM blog_rating WHERE blog_id = $1 AND author_id = $2")
		.bind(path.id)
		.bind(session.user.id)
		.execute(&database)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::UnknownRating(path.id).into());
	}

	detail_or_unknown(&database, path.id).await
}
