use async_trait::async_trait;
use serde::Deserialize;

const TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
	#[error("token rejected by google")]
	InvalidToken,
	#[error("token issued for another client: {0}")]
	WrongAudience(String),
	#[error("google account email is not verified")]
	UnverifiedEmail,
	#[error("request to google failed: {0}")]
	Request(#[from] reqwest::Error),
}

/// The identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
	/// The stable Google account id (`sub` claim).
	pub id: String,
	pub email: String,
	pub name: Option<String>,
	pub picture: Option<String>,
}

#[async_trait]
pub trait GoogleVerifier: Send + Sync {
	/// Verifies an ID token obtained by the front end through Google sign-in.
	async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleError>;
}

/// Claims returned by the `tokeninfo` endpoint. Booleans are sent as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
	aud: String,
	sub: String,
	email: String,
	#[serde(default)]
	email_verified: String,
	name: Option<String>,
	picture: Option<String>,
}

impl TokenInfo {
	fn into_identity(self, client_id: &str) -> Result<GoogleIdentity, GoogleError> {
		if self.aud != client_id {
			return Err(GoogleError::WrongAudience(self.aud));
		}

		if self.email_verified != "true" {
			return Err(GoogleError::UnverifiedEmail);
		}

		Ok(GoogleIdentity {
			id: self.sub,
			email: self.email.to_lowercase(),
			name: self.name,
			picture: self.picture,
		})
	}
}

/// Verifies ID tokens with Google's `tokeninfo` endpoint.
pub struct TokenInfoVerifier {
	client: reqwest::Client,
	client_id: String,
}

impl TokenInfoVerifier {
	pub fn new(client_id: String) -> Self {
		Self {
			client: reqwest::Client::new(),
			client_id,
		}
	}
}

#[async_trait]
impl GoogleVerifier for TokenInfoVerifier {
	#[tracing::instrument(skip_all)]
	async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleError> {
		let response = self
			.client
			.get(TOKEN_INFO_URL)
			.query(&[("id_token", credential)])
			.send()
			.await?;

		if response.status().is_client_error() {
			return Err(GoogleError::InvalidToken);
		}

		let info = response.error_for_status()?.json::<TokenInfo>().await?;

		info.into_identity(&self.client_id)
	}
}
