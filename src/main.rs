#![warn(clippy::pedantic)]

mod assets;
mod config;
mod error;
mod extract;
mod google;
mod mail;
mod openapi;
mod ratelimit;
mod route;
mod session;
mod trace;

use std::{net::SocketAddr, sync::Arc};

use argon2::Argon2;
use axum::{
	extract::Request,
	http::{header, HeaderValue, Method},
	ServiceExt,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower::Layer;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, normalize_path::NormalizePathLayer};

use crate::{
	assets::{AssetStore, LocalAssetStore},
	config::Config,
	google::{GoogleVerifier, TokenInfoVerifier},
	mail::{LogMailer, Mailer, SmtpMailer},
};

pub type Database = sqlx::SqlitePool;
pub type AppState = State;

/// The shared application state.
///
/// This should contain all shared dependencies that handlers need to access,
/// such as a database connection pool, a hash configuration (if it's expensive to create),
/// or the clients of external services.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	pub mailer: Arc<dyn Mailer>,
	/// Absent when `GOOGLE_CLIENT_ID` is not configured.
	pub google: Option<Arc<dyn GoogleVerifier>>,
	pub assets: Arc<dyn AssetStore>,
	/// Base url used in links sent by email.
	pub public_url: Arc<str>,
	pub secure_cookies: bool,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn cors(config: &Config) -> Result<CorsLayer, BoxError> {
	if config.cors_origins.is_empty() {
		return Ok(CorsLayer::new());
	}

	let origins = config
		.cors_origins
		.iter()
		.map(|origin| HeaderValue::from_str(origin))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(CorsLayer::new()
		.allow_origin(origins)
		.allow_credentials(true)
		.allow_methods([
			Method::GET,
			Method::POST,
			Method::PUT,
			Method::PATCH,
			Method::DELETE,
		])
		.allow_headers([header::CONTENT_TYPE]))
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(error) = tokio::signal::ctrl_c().await {
			tracing::error!(%error, "failed to listen for ctrl-c");
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(error) => {
				tracing::error!(%error, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}

	tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
	let config = Config::from_env()?;
	let _guard = trace::init_tracing_subscriber(&config)?;

	let database = SqlitePoolOptions::new()
		.connect(&config.database_url)
		.await?;

	sqlx::migrate!().run(&database).await?;

	let mailer: Arc<dyn Mailer> = match &config.smtp {
		Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
		None => {
			tracing::warn!("SMTP_HOST is not set, emails will only be logged");
			Arc::new(LogMailer)
		}
	};

	let google = config.google_client_id.clone().map(|client_id| {
		Arc::new(TokenInfoVerifier::new(client_id)) as Arc<dyn GoogleVerifier>
	});

	if google.is_none() {
		tracing::warn!("GOOGLE_CLIENT_ID is not set, google sign-in is disabled");
	}

	let state = State {
		database,
		hasher: Argon2::default(),
		mailer,
		google,
		assets: Arc::new(LocalAssetStore::new(&config.asset_dir)),
		public_url: config.public_url.as_str().into(),
		secure_cookies: config.secure_cookies,
	};

	let limits = ratelimit::from_config(&config)
		.ok_or("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be greater than zero")?;

	ratelimit::cleanup_old_limits(&[&limits]);

	let app = route::router(state)
		.layer(cors(&config)?)
		.layer(GovernorLayer { config: limits });

	// Trailing slashes must be removed before routing, so this wraps the router itself
	let app = NormalizePathLayer::trim_trailing_slash().layer(app);

	let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;

	tracing::info!("listening on {}", listener.local_addr()?);

	axum::serve(
		listener,
		ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
	)
	.with_graceful_shutdown(shutdown_signal())
	.await?;

	Ok(())
}
