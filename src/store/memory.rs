//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{StoreFuture, StoredTokens, TokenStore},
};

type StoreCell = Arc<RwLock<StoredTokens>>;

/// Thread-safe storage backend that keeps the token pair in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreCell);
impl MemoryStore {
	/// Creates a store pre-seeded with `tokens`, as if a previous run had persisted them.
	pub fn seeded(tokens: StoredTokens) -> Self {
		Self(Arc::new(RwLock::new(tokens)))
	}

	/// Returns the currently stored pair without going through the async contract.
	pub fn snapshot(&self) -> StoredTokens {
		self.0.read().clone()
	}

	fn save_now(cell: StoreCell, tokens: StoredTokens) {
		*cell.write() = tokens;
	}

	fn clear_now(cell: StoreCell) {
		*cell.write() = StoredTokens::default();
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, tokens: StoredTokens) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			Self::save_now(cell, tokens);

			Ok(())
		})
	}

	fn load(&self) -> StoreFuture<'_, StoredTokens> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().clone()) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			Self::clear_now(cell);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::TokenSecret;

	#[tokio::test]
	async fn save_load_and_clear() {
		let store = MemoryStore::default();

		assert!(store.load().await.expect("Empty store should load.").is_empty());

		let tokens = StoredTokens {
			access: Some(TokenSecret::new("access")),
			refresh: Some(TokenSecret::new("refresh")),
		};

		store.save(tokens.clone()).await.expect("Saving into memory store should succeed.");

		assert_eq!(store.load().await.expect("Stored pair should load."), tokens);

		store.clear().await.expect("Clearing memory store should succeed.");

		assert!(store.snapshot().is_empty());
	}

	#[tokio::test]
	async fn save_replaces_whole_pair() {
		let store = MemoryStore::seeded(StoredTokens {
			access: Some(TokenSecret::new("old-access")),
			refresh: Some(TokenSecret::new("old-refresh")),
		});

		store
			.save(StoredTokens { access: Some(TokenSecret::new("new-access")), refresh: None })
			.await
			.expect("Saving replacement pair should succeed.");

		let loaded = store.snapshot();

		assert_eq!(loaded.access.as_ref().map(TokenSecret::expose), Some("new-access"));
		assert!(loaded.refresh.is_none());
	}
}
