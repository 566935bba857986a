use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::Level;

/// An error encountered while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("invalid value for {key}: {message}")]
	Invalid { key: &'static str, message: String },
	#[error("{key} must be set when {requires} is set")]
	Missing {
		key: &'static str,
		requires: &'static str,
	},
}

/// SMTP settings. Only present when `SMTP_HOST` is set.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
	pub host: String,
	pub port: u16,
	pub username: String,
	pub password: String,
	pub from: String,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub host: String,
	pub port: u16,
	/// Base url used when building links sent by email.
	pub public_url: String,
	pub secure_cookies: bool,
	/// Front-end origins allowed to call the api with credentials.
	pub cors_origins: Vec<String>,
	pub asset_dir: PathBuf,
	pub smtp: Option<SmtpConfig>,
	pub google_client_id: Option<String>,
	pub log_level: Level,
	pub otlp_enabled: bool,
	pub rate_limit_per_second: u64,
	pub rate_limit_burst: u32,
}

impl Config {
	/// Loads the configuration from the process environment,
	/// after merging in a `.env` file if one exists.
	pub fn from_env() -> Result<Self, ConfigError> {
		dotenvy::dotenv().ok();

		Ok(Self {
			database_url: var("DATABASE_URL")
				.unwrap_or_else(|| "sqlite://actualites.db?mode=rwc".into()),
			host: var("HOST").unwrap_or_else(|| "127.0.0.1".into()),
			port: parse("PORT", 3000)?,
			public_url: var("PUBLIC_URL")
				.unwrap_or_else(|| "http://localhost:3000".into())
				.trim_end_matches('/')
				.to_string(),
			secure_cookies: parse("SECURE_COOKIES", false)?,
			cors_origins: var("CORS_ORIGINS")
				.map(|origins| {
					origins
						.split(',')
						.map(str::trim)
						.filter(|origin| !origin.is_empty())
						.map(String::from)
						.collect()
				})
				.unwrap_or_default(),
			asset_dir: var("ASSET_DIR").map_or_else(|| PathBuf::from("./uploads"), PathBuf::from),
			smtp: smtp()?,
			google_client_id: var("GOOGLE_CLIENT_ID"),
			log_level: parse("LOG_LEVEL", Level::INFO)?,
			otlp_enabled: parse("OTLP_ENABLED", false)?,
			rate_limit_per_second: parse("RATE_LIMIT_PER_SECOND", 10)?,
			rate_limit_burst: parse("RATE_LIMIT_BURST", 50)?,
		})
	}
}

fn var(key: &str) -> Option<String> {
	env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	match var(key) {
		Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
			key,
			message: e.to_string(),
		}),
		None => Ok(default),
	}
}

fn smtp() -> Result<Option<SmtpConfig>, ConfigError> {
	let Some(host) = var("SMTP_HOST") else {
		return Ok(None);
	};

	let required = |key: &'static str| {
		var(key).ok_or(ConfigError::Missing {
			key,
			requires: "SMTP_HOST",
		})
	};

	Ok(Some(SmtpConfig {
		host,
		port: parse("SMTP_PORT", 587)?,
		username: required("SMTP_USERNAME")?,
		password: required("SMTP_PASSWORD")?,
		from: required("MAIL_FROM")?,
	}))
}
