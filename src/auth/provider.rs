//! The token provider contract shared by static, sign-in, secret-store, and cached sources.

// self
use crate::{
	_prelude::*,
	auth::{CachedTokenProvider, Token},
};

/// Boxed future returned by [`TokenProvider::token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Produces a fresh [`Token`] on demand.
///
/// Implementations are not required to cache or to tolerate concurrent refreshes; wrap them
/// in a [`CachedTokenProvider`] to get both.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Fetches a token.
	fn token(&self) -> TokenFuture<'_>;

	/// Returns the provider itself when it already is a [`CachedTokenProvider`].
	fn as_cached(self: Arc<Self>) -> Option<Arc<CachedTokenProvider>> {
		None
	}
}

/// A fixed token is its own provider.
impl TokenProvider for Token {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(std::future::ready(Ok(self.clone())))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn static_token_returns_itself() {
		let provider: Arc<dyn TokenProvider> = Arc::new(Token::new("static-value"));
		let token = provider.token().await.expect("Static tokens should never fail.");

		assert_eq!(token.expose(), "static-value");
		assert!(provider.as_cached().is_none());
	}
}
