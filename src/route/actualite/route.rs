use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::{NaiveDate, Utc};
use macros::route;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::{
	assets,
	extract::{Admin, Json, MaybeSession, Path, Query, Session},
	openapi::tag,
	AppState, Database,
};

use super::{model, Error, RouteError};

/// The nullable columns holding kind-specific fields.
struct DetailColumns<'a> {
	event_title: Option<&'a str>,
	organizers: Option<&'a str>,
	month: Option<&'a str>,
	start_date: Option<NaiveDate>,
	end_date: Option<NaiveDate>,
	store_name: Option<&'a str>,
}

impl<'a> From<&'a model::Details> for DetailColumns<'a> {
	fn from(details: &'a model::Details) -> Self {
		match details {
			model::Details::Evenement {
				titre_evenement,
				organisateurs,
				mois,
				date_debut,
				date_fin,
			} => Self {
				event_title: Some(titre_evenement.trim()),
				organizers: Some(organisateurs.trim()),
				month: Some(mois.trim()),
				start_date: Some(*date_debut),
				end_date: *date_fin,
				store_name: None,
			},
			model::Details::Boutique { nom_magasin } => Self {
				event_title: None,
				organizers: None,
				month: None,
				start_date: None,
				end_date: None,
				store_name: Some(nom_magasin.trim()),
			},
		}
	}
}

fn into_documents(rows: Vec<model::ActualiteRow>) -> Result<Vec<model::Actualite>, RouteError> {
	let documents = rows
		.into_iter()
		.map(model::Actualite::try_from)
		.collect::<Result<Vec<_>, _>>()
		.map_err(Error::Corrupt)?;

	Ok(documents)
}

async fn fetch(database: &Database, id: Uuid) -> Result<model::Actualite, RouteError> {
	let row = sqlx::query_as::<_, model::ActualiteRow>("SELECT * FROM actualite WHERE id = $1")
		.bind(id)
		.fetch_optional(database)
		.await?
		.ok_or(Error::UnknownActualite(id))?;

	Ok(row.try_into().map_err(Error::Corrupt)?)
}

/// Fetches an actualité the user is allowed to see, hiding drafts from everyone else.
async fn fetch_visible(
	database: &Database,
	id: Uuid,
	user: Option<&crate::route::user::model::User>,
) -> Result<model::Actualite, RouteError> {
	let actualite = fetch(database, id).await?;

	if !actualite.visible_to(user) {
		return Err(Error::UnknownActualite(id).into());
	}

	Ok(actualite)
}

/// Moves the temporary image and photos to permanent storage, returning their new keys.
async fn publish_assets(
	state: &AppState,
	image: Option<&String>,
	photos: &[String],
) -> Result<(Option<String>, Vec<String>), RouteError> {
	let image = match image {
		Some(key) => Some(state.assets.publish(key).await.map_err(Error::Asset)?),
		None => None,
	};
	let photos = assets::publish_all(state.assets.as_ref(), photos)
		.await
		.map_err(Error::Asset)?;

	Ok((image, photos))
}

/// Get published actualités
/// Returns a paginated response of published actualités, newest first.
/// Results can be filtered by type, department and keyword.
#[route(tag = tag::ACTUALITE)]
pub async fn get_actualites(
	State(database): State<Database>,
	Query(input): Query<model::ListInput>,
) -> Result<Json<Vec<model::Actualite>>, RouteError> {
	let paginate = input.paginate();
	let keyword = input
		.keyword
		.as_deref()
		.map(|keyword| keyword.trim().to_lowercase());

	let rows = sqlx::query_as::<_, model::ActualiteRow>(
		r#"
			SELECT * FROM actualite
			WHERE is_validated = TRUE
				AND ($1 IS NULL OR kind = $1)
				AND ($2 IS NULL OR department = $2)
				AND ($3 IS NULL OR EXISTS (
					SELECT 1 FROM json_each(actualite.keywords) WHERE json_each.value = $3
				))
			ORDER BY created_at DESC
			LIMIT $4 OFFSET $5
		"#,
	)
	.bind(input.kind)
	.bind(&input.department)
	.bind(keyword)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(into_documents(rows)?))
}

/// Get pending actualités
/// Returns a paginated response of actualités awaiting validation, oldest first.
/// Requires the admin role.
#[route(tag = tag::ACTUALITE)]
pub async fn get_pending(
	State(database): State<Database>,
	_admin: Admin,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Actualite>>, RouteError> {
	let rows = sqlx::query_as::<_, model::ActualiteRow>(
		r#"
			SELECT * FROM actualite
			WHERE is_validated = FALSE
			ORDER BY created_at ASC
			LIMIT $1 OFFSET $2
		"#,
	)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(into_documents(rows)?))
}

/// Get own actualités
/// Returns a paginated response of your submissions, published or not, newest first.
#[route(tag = tag::ACTUALITE)]
pub async fn get_own(
	State(database): State<Database>,
	session: Session,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Actualite>>, RouteError> {
	let rows = sqlx::query_as::<_, model::ActualiteRow>(
		r#"
			SELECT * FROM actualite
			WHERE author_id = $1
			ORDER BY created_at DESC
			LIMIT $2 OFFSET $3
		"#,
	)
	.bind(session.user.id)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(into_documents(rows)?))
}

/// Get statistics
/// Counts actualités by validation state, type and department. Requires the admin role.
#[route(tag = tag::ACTUALITE)]
pub async fn get_stats(
	State(database): State<Database>,
	_admin: Admin,
) -> Result<Json<model::Stats>, RouteError> {
	let (total, validated) = sqlx::query_as::<_, (i64, i64)>(
		"SELECT COUNT(*), COALESCE(SUM(is_validated), 0) FROM actualite",
	)
	.fetch_one(&database)
	.await?;

	let by_type = sqlx::query_as::<_, model::Count>(
		"SELECT kind AS name, COUNT(*) AS count FROM actualite GROUP BY kind ORDER BY kind",
	)
	.fetch_all(&database)
	.await?;

	let by_department = sqlx::query_as::<_, model::Count>(
		r#"
			SELECT department AS name, COUNT(*) AS count FROM actualite
			GROUP BY department
			ORDER BY count DESC, department ASC
		"#,
	)
	.fetch_all(&database)
	.await?;

	Ok(Json(model::Stats {
		total,
		validated,
		pending: total - validated,
		by_type,
		by_department,
	}))
}

/// Get single actualité
/// Returns an actualité by its unique id. Drafts are only visible to their author and admins.
#[route(tag = tag::ACTUALITE)]
pub async fn get_actualite(
	State(database): State<Database>,
	MaybeSession(session): MaybeSession,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Actualite>, RouteError> {
	let user = session.as_ref().map(|session| &session.user);

	Ok(Json(fetch_visible(&database, path.id, user).await?))
}

/// Submit actualité
/// Submits a new actualité. It stays hidden from the public until an admin validates it.
#[route(tag = tag::ACTUALITE, response(status = 201, description = "Actualité submitted.", shape = "Json<model::Actualite>"))]
pub async fn create_actualite(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::ActualiteInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let columns = DetailColumns::from(&input.details);
	let now = Utc::now();

	let row = sqlx::query_as::<_, model::ActualiteRow>(
		r#"
			INSERT INTO actualite (
				id, author_id, kind, pitch, body, department, address, phone, email, image,
				photos, keywords, parking_easy, rates, hours, extra_info,
				event_title, organizers, month, start_date, end_date, store_name,
				created_at, updated_at
			)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $23)
			RETURNING *
		"#,
	)
	.bind(Uuid::new_v4())
	.bind(session.user.id)
	.bind(input.details.kind())
	.bind(input.pitch.trim())
	.bind(&input.body)
	.bind(input.department.trim())
	.bind(input.address.trim())
	.bind(&input.phone)
	.bind(&input.email)
	.bind(&input.image)
	.bind(SqlJson(&input.photos))
	.bind(SqlJson(input.normalized_keywords()))
	.bind(input.parking_easy)
	.bind(SqlJson(&input.rates))
	.bind(SqlJson(&input.hours))
	.bind(&input.extra_info)
	.bind(columns.event_title)
	.bind(columns.organizers)
	.bind(columns.month)
	.bind(columns.start_date)
	.bind(columns.end_date)
	.bind(columns.store_name)
	.bind(now)
	.fetch_one(&database)
	.await?;

	let actualite = model::Actualite::try_from(row).map_err(Error::Corrupt)?;

	tracing::info!(actualite = %actualite.id, author = %session.user.id, "actualite submitted");

	Ok((StatusCode::CREATED, Json(actualite)))
}

/// Replace actualité
/// Replaces the content of an actualité. Authors may edit their own drafts,
/// admins may edit any actualité. The validation state is left unchanged,
/// and new images of a published actualité are moved to permanent storage.
#[route(tag = tag::ACTUALITE)]
pub async fn update_actualite(
	State(state): State<AppState>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::ActualiteInput>,
) -> Result<Json<model::Actualite>, RouteError> {
	let current = fetch_visible(&state.database, path.id, Some(&session.user)).await?;

	if !current.editable_by(&session.user) {
		return Err(Error::Forbidden.into());
	}

	let (image, photos) = if current.is_validated {
		publish_assets(&state, input.image.as_ref(), &input.photos).await?
	} else {
		(input.image.clone(), input.photos.clone())
	};

	let columns = DetailColumns::from(&input.details);

	let row = sqlx::query_as::<_, model::ActualiteRow>(
		r#"
			UPDATE actualite
			SET
				kind = $1,
				pitch = $2,
				body = $3,
				department = $4,
				address = $5,
				phone = $6,
				email = $7,
				image = $8,
				photos = $9,
				keywords = $10,
				parking_easy = $11,
				rates = $12,
				hours = $13,
				extra_info = $14,
				event_title = $15,
				organizers = $16,
				month = $17,
				start_date = $18,
				end_date = $19,
				store_name = $20,
				updated_at = $21
			WHERE id = $22
			RETURNING *
		"#,
	)
	.bind(input.details.kind())
	.bind(input.pitch.trim())
	.bind(&input.body)
	.bind(input.department.trim())
	.bind(input.address.trim())
	.bind(&input.phone)
	.bind(&input.email)
	.bind(&image)
	.bind(SqlJson(&photos))
	.bind(SqlJson(input.normalized_keywords()))
	.bind(input.parking_easy)
	.bind(SqlJson(&input.rates))
	.bind(SqlJson(&input.hours))
	.bind(&input.extra_info)
	.bind(columns.event_title)
	.bind(columns.organizers)
	.bind(columns.month)
	.bind(columns.start_date)
	.bind(columns.end_date)
	.bind(columns.store_name)
	.bind(Utc::now())
	.bind(path.id)
	.fetch_optional(&state.database)
	.await?
	.ok_or(Error::UnknownActualite(path.id))?;

	Ok(Json(row.try_into().map_err(Error::Corrupt)?))
}

/// Delete actualité
/// Deletes an actualité. Only its author or an admin may do so.
#[route(tag = tag::ACTUALITE, response(status = 204, description = "Actualité deleted."))]
pub async fn delete_actualite(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let actualite = fetch_visible(&database, path.id, Some(&session.user)).await?;

	if !actualite.deletable_by(&session.user) {
		return Err(Error::Forbidden.into());
	}

	sqlx::query("DELETE FROM actualite WHERE id = $1")
		.bind(actualite.id)
		.execute(&database)
		.await?;

	tracing::info!(actualite = %actualite.id, user = %session.user.id, "actualite deleted");

	Ok(StatusCode::NO_CONTENT.into_response())
}

/// Validate actualité
/// Publishes an actualité and moves its uploaded images to permanent storage.
/// Validating a published actualité returns it unchanged. Requires the admin role.
#[route(tag = tag::ACTUALITE)]
pub async fn validate_actualite(
	State(state): State<AppState>,
	Admin(admin): Admin,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Actualite>, RouteError> {
	let actualite = fetch(&state.database, path.id).await?;

	if actualite.is_validated {
		return Ok(Json(actualite));
	}

	let (image, photos) =
		publish_assets(&state, actualite.image.as_ref(), &actualite.photos).await?;
	let now = Utc::now();

	let row = sqlx::query_as::<_, model::ActualiteRow>(
		r#"
			UPDATE actualite
			SET is_validated = TRUE, validated_at = $1, updated_at = $1, image = $2, photos = $3
			WHERE id = $4 AND is_validated = FALSE
			RETURNING *
		"#,
	)
	.bind(now)
	.bind(&image)
	.bind(SqlJson(&photos))
	.bind(path.id)
	.fetch_optional(&state.database)
	.await?;

	let Some(row) = row else {
		// validated concurrently by another admin
		return Ok(Json(fetch(&state.database, path.id).await?));
	};

	tracing::info!(actualite = %path.id, admin = %admin.user.id, "actualite validated");

	Ok(Json(row.try_into().map_err(Error::Corrupt)?))
}
