use aide::axum::{
	routing::{get_with, patch_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{assets::AssetError, error, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown actualite {0}")]
	UnknownActualite(Uuid),
	#[error("you are not allowed to change this actualite")]
	Forbidden,
	#[error(transparent)]
	Corrupt(model::CorruptRow),
	#[error("could not publish assets: {0}")]
	Asset(AssetError),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_actualites, get_actualites_docs)
				.post_with(create_actualite, create_actualite_docs),
		)
		.api_route("/pending", get_with(get_pending, get_pending_docs))
		.api_route("/me", get_with(get_own, get_own_docs))
		.api_route("/stats", get_with(get_stats, get_stats_docs))
		.api_route(
			"/:id",
			get_with(get_actualite, get_actualite_docs)
				.put_with(update_actualite, update_actualite_docs)
				.delete_with(delete_actualite, delete_actualite_docs),
		)
		.api_route(
			"/:id/validate",
			patch_with(validate_actualite, validate_actualite_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownActualite(..) => StatusCode::NOT_FOUND,
			Self::Forbidden => StatusCode::FORBIDDEN,
			Self::Asset(AssetError::Missing(..) | AssetError::InvalidKey(..)) => {
				StatusCode::BAD_REQUEST
			}
			Self::Corrupt(..) | Self::Asset(AssetError::Io(..)) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = match self {
			Self::UnknownActualite(id) => error::Message::new("unknown_actualite")
				.content(self.to_string())
				.detail("actualite", id.to_string()),
			Self::Forbidden => error::Message::new("forbidden").content(self.to_string()),
			Self::Asset(AssetError::Missing(key)) => error::Message::new("missing_asset")
				.content(format!("asset {key} was not uploaded"))
				.detail("key", key),
			Self::Asset(AssetError::InvalidKey(key)) => error::Message::new("invalid_asset")
				.content(format!("asset key {key} is not valid"))
				.detail("key", key),
			Self::Corrupt(..) | Self::Asset(AssetError::Io(..)) => {
				error::Message::new("internal_error").content("An unexpected error occurred.")
			}
		};

		message.into_vec()
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	fn event() -> Value {
		json!({
			"type": "Evenement",
			"titreEvenement": "Marché bio",
			"organisateurs": "Association des producteurs",
			"mois": "Juin",
			"dateDebut": "2025-06-01",
			"pitch": "Le marché revient sur la place.",
			"body": "Des producteurs locaux tous les samedis matin.",
			"department": "69",
			"address": "Place Bellecour, Lyon",
			"keywords": ["Bio", "Marché"],
			"hours": { "samedi": "8h-13h" },
		})
	}

	fn shop() -> Value {
		json!({
			"type": "Boutique",
			"nomMagasin": "La Fromagerie",
			"pitch": "Fromages affinés sur place.",
			"body": "Une cave d'affinage au cœur du quartier.",
			"department": "38",
			"address": "Rue Mercière, Grenoble",
			"parkingEasy": true,
		})
	}

	#[sqlx::test]
	async fn test_submit_then_validate(pool: Database) {
		let app = server(pool.clone());
		let admin = server(pool.clone());
		let anonymous = server(pool.clone());

		let response = anonymous.post("/actualites").json(&event()).await;

		assert_eq!(response.status_code(), 401);

		login(&app, &pool, "alice").await;
		login(&admin, &pool, "root").await;
		make_admin(&pool, "root").await;

		let response = app.post("/actualites").json(&event()).await;

		assert_eq!(response.status_code(), 201);

		let body = response.json::<Value>();
		let id = body["id"].as_str().unwrap().to_string();

		assert_eq!(body["isValidated"], false);
		assert_eq!(body["type"], "Evenement");
		assert_eq!(body["titreEvenement"], "Marché bio");
		assert_eq!(body["dateDebut"], "2025-06-01");
		assert_eq!(body["keywords"], json!(["bio", "marché"]));

		// drafts are hidden from the public
		let response = anonymous.get(&format!("/actualites/{id}")).await;

		assert_eq!(response.status_code(), 404);

		let response = anonymous.get("/actualites").await;

		assert_eq!(response.json::<Value>(), json!([]));

		let response = app.get(&format!("/actualites/{id}")).await;

		assert_eq!(response.status_code(), 200);

		let response = app.patch(&format!("/actualites/{id}/validate")).await;

		assert_eq!(response.status_code(), 403);

		let response = admin.get("/actualites/pending").await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

		let response = admin.patch(&format!("/actualites/{id}/validate")).await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert_eq!(body["isValidated"], true);
		assert!(body["validatedAt"].is_string());

		// validating twice changes nothing
		let response = admin.patch(&format!("/actualites/{id}/validate")).await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["validatedAt"], body["validatedAt"]);

		let response = anonymous.get("/actualites").await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

		let response = admin.get("/actualites/pending").await;

		assert_eq!(response.json::<Value>(), json!([]));
	}

	#[sqlx::test]
	async fn test_validation_cannot_be_revoked(pool: Database) {
		let app = server(pool.clone());
		let admin = server(pool.clone());

		login(&app, &pool, "alice").await;
		login(&admin, &pool, "root").await;
		make_admin(&pool, "root").await;

		let response = app.post("/actualites").json(&shop()).await;
		let id = response.json::<Value>()["id"].as_str().unwrap().to_string();

		admin.patch(&format!("/actualites/{id}/validate")).await;

		// admins may still edit, but never unpublish
		let response = admin.put(&format!("/actualites/{id}")).json(&shop()).await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["isValidated"], true);

		let result = sqlx::query("UPDATE actualite SET is_validated = FALSE")
			.execute(&pool)
			.await;

		assert!(result.is_err());
	}

	#[sqlx::test]
	async fn test_type_specific_fields(pool: Database) {
		let app = server(pool.clone());

		login(&app, &pool, "alice").await;

		let mut missing = event();

		missing.as_object_mut().unwrap().remove("titreEvenement");

		let response = app.post("/actualites").json(&missing).await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<Value>()["errors"][0]["field"], "titreEvenement");

		let mut unknown = shop();

		unknown["type"] = json!("Restaurant");

		let response = app.post("/actualites").json(&unknown).await;

		assert_eq!(response.status_code(), 400);

		let body = response.json::<Value>();

		assert_eq!(body["errors"][0]["code"], "invalid_body");
		assert_eq!(body["errors"][0]["field"], "type");

		let mut blank = shop();

		blank["nomMagasin"] = json!(" ");

		let response = app.post("/actualites").json(&blank).await;

		assert_eq!(response.status_code(), 400);

		// fields of the other type are dropped
		let mut mixed = shop();

		mixed["titreEvenement"] = json!("Soldes");

		let response = app.post("/actualites").json(&mixed).await;

		assert_eq!(response.status_code(), 201);

		let body = response.json::<Value>();
		let id = body["id"].as_str().unwrap().to_string();

		assert_eq!(body["nomMagasin"], "La Fromagerie");
		assert!(body.get("titreEvenement").is_none());

		// switching type replaces the type-specific fields
		let response = app.put(&format!("/actualites/{id}")).json(&event()).await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert_eq!(body["type"], "Evenement");
		assert!(body.get("nomMagasin").is_none());

		let store_name: Option<String> =
			sqlx::query_scalar("SELECT store_name FROM actualite WHERE kind = 'Evenement'")
				.fetch_one(&pool)
				.await
				.unwrap();

		assert!(store_name.is_none());
	}

	#[sqlx::test]
	async fn test_edit_and_delete_rights(pool: Database) {
		let app = server(pool.clone());
		let other = server(pool.clone());
		let admin = server(pool.clone());

		login(&app, &pool, "alice").await;
		login(&other, &pool, "bob").await;
		login(&admin, &pool, "root").await;
		make_admin(&pool, "root").await;

		let response = app.post("/actualites").json(&shop()).await;
		let id = response.json::<Value>()["id"].as_str().unwrap().to_string();

		// drafts of others look missing
		let response = other.put(&format!("/actualites/{id}")).json(&shop()).await;

		assert_eq!(response.status_code(), 404);

		let mut edited = shop();

		edited["pitch"] = json!("Nouveaux fromages chaque semaine.");

		let response = app.put(&format!("/actualites/{id}")).json(&edited).await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["pitch"], "Nouveaux fromages chaque semaine.");

		admin.patch(&format!("/actualites/{id}/validate")).await;

		// published entries are locked for their author
		let response = app.put(&format!("/actualites/{id}")).json(&shop()).await;

		assert_eq!(response.status_code(), 403);

		let response = other.delete(&format!("/actualites/{id}")).await;

		assert_eq!(response.status_code(), 403);

		let response = app.delete(&format!("/actualites/{id}")).await;

		assert_eq!(response.status_code(), 204);

		let response = app.post("/actualites").json(&event()).await;
		let id = response.json::<Value>()["id"].as_str().unwrap().to_string();

		let response = admin.delete(&format!("/actualites/{id}")).await;

		assert_eq!(response.status_code(), 204);

		let response = app.get("/actualites/me").await;

		assert_eq!(response.json::<Value>(), json!([]));
	}

	#[sqlx::test]
	async fn test_filters_and_stats(pool: Database) {
		let app = server(pool.clone());
		let admin = server(pool.clone());

		login(&app, &pool, "alice").await;
		login(&admin, &pool, "root").await;
		make_admin(&pool, "root").await;

		let mut ids = Vec::new();

		for document in [event(), shop(), shop()] {
			let response = app.post("/actualites").json(&document).await;

			ids.push(response.json::<Value>()["id"].as_str().unwrap().to_string());
		}

		for id in &ids[..2] {
			admin.patch(&format!("/actualites/{id}/validate")).await;
		}

		let response = app
			.get("/actualites")
			.add_query_param("type", "Boutique")
			.await;
		let body = response.json::<Value>();

		assert_eq!(body.as_array().unwrap().len(), 1);
		assert_eq!(body[0]["nomMagasin"], "La Fromagerie");

		let response = app
			.get("/actualites")
			.add_query_param("department", "69")
			.await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

		let response = app
			.get("/actualites")
			.add_query_param("keyword", "BIO")
			.await;
		let body = response.json::<Value>();

		assert_eq!(body.as_array().unwrap().len(), 1);
		assert_eq!(body[0]["type"], "Evenement");

		let response = app
			.get("/actualites")
			.add_query_param("size", 1)
			.add_query_param("page", 2)
			.await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

		let response = app.get("/actualites/stats").await;

		assert_eq!(response.status_code(), 403);

		let response = admin.get("/actualites/stats").await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(
			response.json::<Value>(),
			json!({
				"total": 3,
				"validated": 2,
				"pending": 1,
				"byType": [
					{ "name": "Boutique", "count": 2 },
					{ "name": "Evenement", "count": 1 },
				],
				"byDepartment": [
					{ "name": "38", "count": 2 },
					{ "name": "69", "count": 1 },
				],
			})
		);

		let response = app.get("/actualites/me").await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 3);
	}

	#[sqlx::test]
	async fn test_validation_publishes_assets(pool: Database) {
		let assets = tempfile::tempdir().unwrap();
		let app = server_with_assets(pool.clone(), assets.path());
		let admin = server_with_assets(pool.clone(), assets.path());

		login(&app, &pool, "alice").await;
		login(&admin, &pool, "root").await;
		make_admin(&pool, "root").await;

		std::fs::create_dir_all(assets.path().join("tmp")).unwrap();
		std::fs::write(assets.path().join("tmp/cover.jpg"), b"jpeg").unwrap();

		let mut document = shop();

		document["image"] = json!("tmp/cover.jpg");
		document["photos"] = json!(["tmp/missing.jpg", "https://cdn.example/front.jpg"]);

		let response = app.post("/actualites").json(&document).await;
		let id = response.json::<Value>()["id"].as_str().unwrap().to_string();

		let response = admin.patch(&format!("/actualites/{id}/validate")).await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "missing_asset");

		let response = app.get(&format!("/actualites/{id}")).await;

		assert_eq!(response.json::<Value>()["isValidated"], false);

		std::fs::write(assets.path().join("tmp/missing.jpg"), b"jpeg").unwrap();

		let response = admin.patch(&format!("/actualites/{id}/validate")).await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert_eq!(body["image"], "public/cover.jpg");
		assert_eq!(
			body["photos"],
			json!(["public/missing.jpg", "https://cdn.example/front.jpg"])
		);
		assert!(assets.path().join("public/cover.jpg").exists());
		assert!(!assets.path().join("tmp/cover.jpg").exists());
	}

	#[sqlx::test]
	async fn test_admin_edit_publishes_new_assets(pool: Database) {
		let assets = tempfile::tempdir().unwrap();
		let app = server_with_assets(pool.clone(), assets.path());
		let admin = server_with_assets(pool.clone(), assets.path());

		login(&app, &pool, "alice").await;
		login(&admin, &pool, "root").await;
		make_admin(&pool, "root").await;

		let response = app.post("/actualites").json(&shop()).await;
		let id = response.json::<Value>()["id"].as_str().unwrap().to_string();

		admin
			.patch(&format!("/actualites/{id}/validate"))
			.await
			.assert_status_ok();

		std::fs::create_dir_all(assets.path().join("tmp")).unwrap();
		std::fs::write(assets.path().join("tmp/new.jpg"), b"jpeg").unwrap();

		let mut edited = shop();

		edited["image"] = json!("tmp/new.jpg");

		let response = admin.put(&format!("/actualites/{id}")).json(&edited).await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert_eq!(body["image"], "public/new.jpg");
		assert_eq!(body["isValidated"], true);
		assert!(assets.path().join("public/new.jpg").exists());

		// a missing upload leaves the published entry untouched
		edited["photos"] = json!(["tmp/gone.jpg"]);

		let response = admin.put(&format!("/actualites/{id}")).json(&edited).await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "missing_asset");

		let response = app.get(&format!("/actualites/{id}")).await;

		assert_eq!(response.json::<Value>()["photos"], json!([]));
	}

	#[sqlx::test]
	async fn test_asset_keys_cannot_escape(pool: Database) {
		let app = server(pool.clone());

		login(&app, &pool, "alice").await;

		let mut document = shop();

		document["image"] = json!("tmp/../../etc/passwd");

		let response = app.post("/actualites").json(&document).await;

		assert_eq!(response.status_code(), 400);
	}
}
