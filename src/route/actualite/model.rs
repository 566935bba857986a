pub use crate::route::model::{IdInput, Paginate};

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::route::user::model::User;

/// What an actualité is about.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
pub enum Kind {
	Evenement,
	Boutique,
}

/// Fields that only exist for one kind of actualité.
///
/// Flattened into the document next to the `type` tag, so an event can never
/// carry a store name and a shop can never carry event dates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Details {
	#[serde(rename_all = "camelCase")]
	Evenement {
		titre_evenement: String,
		organisateurs: String,
		/// The month the event takes place in, as shown to readers.
		mois: String,
		date_debut: NaiveDate,
		date_fin: Option<NaiveDate>,
	},
	#[serde(rename_all = "camelCase")]
	Boutique { nom_magasin: String },
}

impl Details {
	pub fn kind(&self) -> Kind {
		match self {
			Self::Evenement { .. } => Kind::Evenement,
			Self::Boutique { .. } => Kind::Boutique,
		}
	}
}

fn required(value: &str, field: &'static str) -> Result<(), ValidationError> {
	if value.trim().is_empty() {
		let mut error = ValidationError::new("required");

		error.add_param("field".into(), &field);

		return Err(error.with_message(format!("{field} is required").into()));
	}

	Ok(())
}

fn validate_details(details: &Details) -> Result<(), ValidationError> {
	match details {
		Details::Evenement {
			titre_evenement,
			organisateurs,
			mois,
			date_debut,
			date_fin,
		} => {
			required(titre_evenement, "titreEvenement")?;
			required(organisateurs, "organisateurs")?;
			required(mois, "mois")?;

			if date_fin.is_some_and(|date_fin| date_fin < *date_debut) {
				return Err(ValidationError::new("date_range")
					.with_message("dateFin cannot be before dateDebut".into()));
			}
		}
		Details::Boutique { nom_magasin } => required(nom_magasin, "nomMagasin")?,
	}

	Ok(())
}

/// Rejects keys that could point outside of the asset store.
fn validate_asset_key(key: &str) -> Result<(), ValidationError> {
	if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
		return Err(ValidationError::new("asset_key").with_message("invalid asset key".into()));
	}

	Ok(())
}

fn validate_asset_keys(keys: &[String]) -> Result<(), ValidationError> {
	keys.iter().try_for_each(|key| validate_asset_key(key))
}

/// A local news entry: an event or a shop, moderated before publication.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Actualite {
	pub id: Uuid,
	pub author_id: Uuid,
	#[serde(flatten)]
	pub details: Details,
	/// A one-line hook shown in listings.
	pub pitch: String,
	pub body: String,
	pub department: String,
	pub address: String,
	pub phone: Option<String>,
	pub email: Option<String>,
	/// Asset key of the cover image.
	pub image: Option<String>,
	pub photos: Vec<String>,
	pub keywords: Vec<String>,
	pub parking_easy: bool,
	pub rates: Vec<String>,
	/// Opening hours, keyed by day.
	pub hours: BTreeMap<String, String>,
	pub extra_info: Option<String>,
	/// Whether an admin published the entry. Never goes back to `false`.
	pub is_validated: bool,
	pub validated_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Actualite {
	/// Published entries are public, drafts are only shown to their author and admins.
	pub fn visible_to(&self, user: Option<&User>) -> bool {
		self.is_validated || user.is_some_and(|user| user.can_manage(self.author_id))
	}

	/// Authors may edit their drafts, admins may edit anything.
	pub fn editable_by(&self, user: &User) -> bool {
		user.is_admin() || (user.id == self.author_id && !self.is_validated)
	}

	pub fn deletable_by(&self, user: &User) -> bool {
		user.can_manage(self.author_id)
	}
}

/// The database representation of an [`Actualite`], with one nullable
/// column per kind-specific field.
#[derive(Debug, sqlx::FromRow)]
pub struct ActualiteRow {
	pub id: Uuid,
	pub author_id: Uuid,
	pub kind: Kind,
	pub pitch: String,
	pub body: String,
	pub department: String,
	pub address: String,
	pub phone: Option<String>,
	pub email: Option<String>,
	pub image: Option<String>,
	pub photos: Json<Vec<String>>,
	pub keywords: Json<Vec<String>>,
	pub parking_easy: bool,
	pub rates: Json<Vec<String>>,
	pub hours: Json<BTreeMap<String, String>>,
	pub extra_info: Option<String>,
	pub event_title: Option<String>,
	pub organizers: Option<String>,
	pub month: Option<String>,
	pub start_date: Option<NaiveDate>,
	pub end_date: Option<NaiveDate>,
	pub store_name: Option<String>,
	pub is_validated: bool,
	pub validated_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A row whose kind-specific columns do not match its kind.
#[derive(Debug, thiserror::Error)]
#[error("actualite {0} is missing fields for its type")]
pub struct CorruptRow(pub Uuid);

impl TryFrom<ActualiteRow> for Actualite {
	type Error = CorruptRow;

	fn try_from(row: ActualiteRow) -> Result<Self, Self::Error> {
		let details = match row.kind {
			Kind::Evenement => match (row.event_title, row.organizers, row.month, row.start_date) {
				(Some(titre_evenement), Some(organisateurs), Some(mois), Some(date_debut)) => {
					Details::Evenement {
						titre_evenement,
						organisateurs,
						mois,
						date_debut,
						date_fin: row.end_date,
					}
				}
				_ => return Err(CorruptRow(row.id)),
			},
			Kind::Boutique => Details::Boutique {
				nom_magasin: row.store_name.ok_or(CorruptRow(row.id))?,
			},
		};

		Ok(Self {
			id: row.id,
			author_id: row.author_id,
			details,
			pitch: row.pitch,
			body: row.body,
			department: row.department,
			address: row.address,
			phone: row.phone,
			email: row.email,
			image: row.image,
			photos: row.photos.0,
			keywords: row.keywords.0,
			parking_easy: row.parking_easy,
			rates: row.rates.0,
			hours: row.hours.0,
			extra_info: row.extra_info,
			is_validated: row.is_validated,
			validated_at: row.validated_at,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

/// The submitted content of an actualité, used both to create and to replace one.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActualiteInput {
	#[serde(flatten)]
	#[validate(custom(function = "validate_details"))]
	pub details: Details,
	#[validate(length(min = 1, max = 280))]
	pub pitch: String,
	#[validate(length(min = 1, max = 20000))]
	pub body: String,
	#[validate(length(min = 1, max = 64))]
	pub department: String,
	#[validate(length(min = 1, max = 255))]
	pub address: String,
	#[validate(length(min = 3, max = 32))]
	pub phone: Option<String>,
	#[validate(email)]
	pub email: Option<String>,
	#[validate(length(max = 512), custom(function = "validate_asset_key"))]
	pub image: Option<String>,
	#[serde(default)]
	#[validate(length(max = 20), custom(function = "validate_asset_keys"))]
	pub photos: Vec<String>,
	#[serde(default)]
	#[validate(length(max = 20))]
	pub keywords: Vec<String>,
	#[serde(default)]
	pub parking_easy: bool,
	#[serde(default)]
	#[validate(length(max = 20))]
	pub rates: Vec<String>,
	#[serde(default)]
	pub hours: BTreeMap<String, String>,
	#[validate(length(max = 2000))]
	pub extra_info: Option<String>,
}

impl ActualiteInput {
	/// Keywords are matched case-insensitively, so they are stored trimmed and lowercase.
	pub fn normalized_keywords(&self) -> Vec<String> {
		let mut keywords = Vec::<String>::with_capacity(self.keywords.len());

		for keyword in &self.keywords {
			let keyword = keyword.trim().to_lowercase();

			if !keyword.is_empty() && !keywords.contains(&keyword) {
				keywords.push(keyword);
			}
		}

		keywords
	}
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
	/// Only return actualités of this type.
	#[serde(rename = "type")]
	pub kind: Option<Kind>,
	pub department: Option<String>,
	/// Only return actualités tagged with this keyword.
	pub keyword: Option<String>,
}

impl ListInput {
	pub fn paginate(&self) -> Paginate {
		Paginate {
			page: self.page,
			size: self.size,
		}
	}
}

/// How many actualités share a type or a department.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Count {
	pub name: String,
	pub count: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
	pub total: i64,
	pub validated: i64,
	pub pending: i64,
	pub by_type: Vec<Count>,
	pub by_department: Vec<Count>,
}
