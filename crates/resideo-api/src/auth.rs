// Access token plumbing.
//
// The OAuth exchange itself happens elsewhere (browser login helper). This
// crate only needs to read the current bearer token and to ask for a fresh
// one after a 401.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Error;

/// Process-wide source of the bearer token.
///
/// `access_token` is read on every request and must not block. `refresh` may
/// be called concurrently from several device loops after a burst of 401s.
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> SecretString;

    async fn refresh(&self) -> Result<(), Error>;
}

/// A token that only changes when someone calls [`StaticToken::replace`].
///
/// `refresh` is a no-op, which makes this the right source for one-shot CLI
/// commands and for tests.
pub struct StaticToken {
    current: ArcSwap<SecretString>,
}

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self {
            current: ArcSwap::from_pointee(token),
        }
    }

    /// Swap in a new token; in-flight requests keep the one they read.
    pub fn replace(&self, token: SecretString) {
        self.current.store(Arc::new(token));
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    fn access_token(&self) -> SecretString {
        SecretString::clone(&self.current.load())
    }

    async fn refresh(&self) -> Result<(), Error> {
        Ok(())
    }
}
