use std::{
	io,
	path::{Component, Path, PathBuf},
};

use async_trait::async_trait;

/// Prefix of keys uploaded by authors and not yet published.
pub const TEMPORARY_PREFIX: &str = "tmp/";
/// Prefix of keys that belong to published content.
pub const PERMANENT_PREFIX: &str = "public/";

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
	#[error("invalid asset key {0}")]
	InvalidKey(String),
	#[error("asset {0} does not exist")]
	Missing(String),
	#[error("asset io error: {0}")]
	Io(#[from] io::Error),
}

/// Storage for uploaded images.
///
/// Authors upload to [`TEMPORARY_PREFIX`]; publishing moves the asset
/// under [`PERMANENT_PREFIX`] so that drafts can be cleaned up independently.
#[async_trait]
pub trait AssetStore: Send + Sync {
	/// Moves a temporary asset to its permanent location and returns the new key.
	///
	/// Keys outside the temporary prefix are returned unchanged.
	async fn publish(&self, key: &str) -> Result<String, AssetError>;
}

/// Publishes every key, keeping their order.
pub async fn publish_all(
	store: &dyn AssetStore,
	keys: impl IntoIterator<Item = &String>,
) -> Result<Vec<String>, AssetError> {
	let mut published = Vec::new();

	for key in keys {
		published.push(store.publish(key).await?);
	}

	Ok(published)
}

/// An [`AssetStore`] backed by a local directory.
pub struct LocalAssetStore {
	root: PathBuf,
}

impl LocalAssetStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Resolves a key to a path inside the root, refusing anything that could escape it.
	fn resolve(&self, key: &str) -> Result<PathBuf, AssetError> {
		let relative = Path::new(key);

		if key.is_empty()
			|| !relative
				.components()
				.all(|component| matches!(component, Component::Normal(..)))
		{
			return Err(AssetError::InvalidKey(key.to_string()));
		}

		Ok(self.root.join(relative))
	}
}

#[async_trait]
impl AssetStore for LocalAssetStore {
	async fn publish(&self, key: &str) -> Result<String, AssetError> {
		let Some(name) = key.strip_prefix(TEMPORARY_PREFIX) else {
			return Ok(key.to_string());
		};

		let published = format!("{PERMANENT_PREFIX}{name}");
		let from = self.resolve(key)?;
		let to = self.resolve(&published)?;

		if !tokio::fs::try_exists(&from).await? {
			// an earlier attempt may have moved it before failing on another key
			if tokio::fs::try_exists(&to).await? {
				return Ok(published);
			}

			return Err(AssetError::Missing(key.to_string()));
		}

		if let Some(parent) = to.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		tokio::fs::rename(&from, &to).await?;
		tracing::debug!(from = %key, to = %published, "asset published");

		Ok(published)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn test_publish_moves_temporary_asset() {
		let root = tempfile::tempdir().unwrap();
		let store = LocalAssetStore::new(root.path());

		std::fs::create_dir_all(root.path().join("tmp/shops")).unwrap();
		std::fs::write(root.path().join("tmp/shops/front.jpg"), b"jpeg").unwrap();

		let key = store.publish("tmp/shops/front.jpg").await.unwrap();

		assert_eq!(key, "public/shops/front.jpg");
		assert!(root.path().join("public/shops/front.jpg").exists());
		assert!(!root.path().join("tmp/shops/front.jpg").exists());
	}

	#[tokio::test]
	async fn test_publish_keeps_permanent_keys() {
		let root = tempfile::tempdir().unwrap();
		let store = LocalAssetStore::new(root.path());

		let key = store.publish("public/logo.png").await.unwrap();

		assert_eq!(key, "public/logo.png");
	}

	#[tokio::test]
	async fn test_publish_missing_asset() {
		let root = tempfile::tempdir().unwrap();
		let store = LocalAssetStore::new(root.path());

		let result = store.publish("tmp/ghost.png").await;

		assert!(matches!(result, Err(AssetError::Missing(key)) if key == "tmp/ghost.png"));
	}

	#[tokio::test]
	async fn test_publish_is_repeatable() {
		let root = tempfile::tempdir().unwrap();
		let store = LocalAssetStore::new(root.path());

		std::fs::create_dir_all(root.path().join("tmp")).unwrap();
		std::fs::write(root.path().join("tmp/flyer.png"), b"png").unwrap();

		assert_eq!(store.publish("tmp/flyer.png").await.unwrap(), "public/flyer.png");
		assert_eq!(store.publish("tmp/flyer.png").await.unwrap(), "public/flyer.png");
	}

	#[tokio::test]
	async fn test_publish_refuses_traversal() {
		let root = tempfile::tempdir().unwrap();
		let store = LocalAssetStore::new(root.path());

		let result = store.publish("tmp/../../etc/passwd").await;

		assert!(matches!(result, Err(AssetError::InvalidKey(..))));
	}

	#[tokio::test]
	async fn test_publish_all_keeps_order() {
		let root = tempfile::tempdir().unwrap();
		let store = LocalAssetStore::new(root.path());

		std::fs::create_dir_all(root.path().join("tmp")).unwrap();
		std::fs::write(root.path().join("tmp/a.jpg"), b"a").unwrap();

		let keys = vec!["tmp/a.jpg".to_string(), "https://cdn.example/b.jpg".to_string()];
		let published = publish_all(&store, &keys).await.unwrap();

		assert_eq!(published, ["public/a.jpg", "https://cdn.example/b.jpg"]);
	}
}
