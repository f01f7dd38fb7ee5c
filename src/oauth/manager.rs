//! Validity-checked token retrieval, authorization completion and revocation.
//!
//! The manager is the only writer of token records. Every read path checks
//! `expires_at` against the injected [`Clock`] before handing a token out, and
//! every store or provider call is bounded by a timeout.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::config::{NpauthConfig, StoreKind};
use crate::error::NpauthError;
use crate::oauth::client::{AuthServerClient, HttpAuthServerClient};
use crate::oauth::clock::{Clock, SystemClock};
use crate::oauth::store::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::oauth::token::{TokenRecord, TokenState};

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub store: Duration,
    pub provider: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_secs(5),
            provider: Duration::from_secs(10),
        }
    }
}

type RefreshOutcome = Result<TokenRecord, NpauthError>;

pub struct TokenLifecycleManager {
    store: Arc<dyn TokenStore>,
    client: Arc<dyn AuthServerClient>,
    clock: Arc<dyn Clock>,
    timeouts: Timeouts,
    // One cell per identity with a refresh in flight; waiters share its outcome.
    refreshes: Mutex<HashMap<String, Arc<OnceCell<RefreshOutcome>>>>,
}

impl TokenLifecycleManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        client: Arc<dyn AuthServerClient>,
        clock: Arc<dyn Clock>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            store,
            client,
            clock,
            timeouts,
            refreshes: Mutex::new(HashMap::new()),
        }
    }

    /// Wire the HTTP provider client and the configured store.
    pub fn from_config(config: &NpauthConfig) -> Result<Self, NpauthError> {
        let client = HttpAuthServerClient::new(config.provider.clone())?;
        let store: Arc<dyn TokenStore> = match config.store.kind {
            StoreKind::File => Arc::new(FileTokenStore::new(config.store.resolved_directory())),
            StoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        };
        Ok(Self::new(
            store,
            Arc::new(client),
            Arc::new(SystemClock),
            Timeouts {
                store: config.store.timeout(),
                provider: config.provider.timeout(),
            },
        ))
    }

    /// Return a usable token for `user`, refreshing it first if it has expired.
    ///
    /// A failed refresh leaves the stale record in the store untouched.
    pub async fn get_valid_token(&self, user: &str) -> Result<TokenRecord, NpauthError> {
        let record = self
            .store_get(user)
            .await?
            .ok_or_else(|| NpauthError::TokenNotFound(user.to_string()))?;

        if !record.is_expired_at(self.clock.now()) {
            return Ok(record);
        }

        self.refresh_single_flight(user).await
    }

    /// Exchange an authorization code and persist the resulting record.
    pub async fn complete_authorization(
        &self,
        code: &str,
        user: &str,
    ) -> Result<TokenRecord, NpauthError> {
        let grant = bounded(self.timeouts.provider, self.client.exchange(code), || {
            NpauthError::ExchangeFailed(format!(
                "token endpoint did not answer within {}ms",
                self.timeouts.provider.as_millis()
            ))
        })
        .await?;

        let record = grant
            .into_record(user, None, self.clock.now())
            .map_err(|defect| NpauthError::ExchangeFailed(defect.to_string()))?;

        self.store_put(&record).await?;
        tracing::info!("Stored new token for {user}, expires at {}", record.expires_at);
        Ok(record)
    }

    pub async fn revoke(&self, user: &str) -> Result<(), NpauthError> {
        bounded(self.timeouts.store, self.store.delete(user), || {
            self.store_timeout("delete")
        })
        .await?;
        tracing::info!("Revoked token of {user}");
        Ok(())
    }

    /// Classify the stored record without refreshing it.
    pub async fn status(&self, user: &str) -> Result<TokenState, NpauthError> {
        let record = self.store_get(user).await?;
        Ok(TokenState::classify(record.as_ref(), self.clock.now()))
    }

    /// Pure; independent of anything stored for `user`.
    pub fn build_authorization_uri(&self, user: &str) -> String {
        self.client.authorization_uri(user)
    }

    async fn refresh_single_flight(&self, user: &str) -> Result<TokenRecord, NpauthError> {
        let cell = {
            let mut refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(refreshes.entry(user.to_string()).or_default())
        };
        let _slot = RefreshSlot {
            refreshes: &self.refreshes,
            user,
            cell: Arc::clone(&cell),
        };

        match cell.get_or_init(|| self.refresh_now(user)).await {
            Ok(record) => Ok(record.clone()),
            Err(err) => Err(share_error(err)),
        }
    }

    async fn refresh_now(&self, user: &str) -> RefreshOutcome {
        // Re-read under the single-flight cell: a refresh that landed after the
        // caller's first read must not be replayed with a rotated refresh token.
        let record = self
            .store_get(user)
            .await?
            .ok_or_else(|| NpauthError::TokenNotFound(user.to_string()))?;
        if !record.is_expired_at(self.clock.now()) {
            return Ok(record);
        }

        tracing::info!("Refreshing access token for user {user}");
        let grant = bounded(
            self.timeouts.provider,
            self.client.refresh(user, &record.refresh_token),
            || NpauthError::RefreshFailed {
                user: user.to_string(),
                reason: format!(
                    "token endpoint did not answer within {}ms",
                    self.timeouts.provider.as_millis()
                ),
            },
        )
        .await
        .inspect_err(|e| tracing::warn!("{e}"))?;

        let refreshed = grant
            .into_record(user, Some(&record.refresh_token), self.clock.now())
            .map_err(|defect| NpauthError::RefreshFailed {
                user: user.to_string(),
                reason: defect.to_string(),
            })?;

        self.store_put(&refreshed).await?;
        Ok(refreshed)
    }

    async fn store_get(&self, user: &str) -> Result<Option<TokenRecord>, NpauthError> {
        bounded(self.timeouts.store, self.store.get(user), || {
            self.store_timeout("read")
        })
        .await
    }

    async fn store_put(&self, record: &TokenRecord) -> Result<(), NpauthError> {
        bounded(self.timeouts.store, self.store.put(record), || {
            self.store_timeout("write")
        })
        .await
    }

    fn store_timeout(&self, op: &str) -> NpauthError {
        NpauthError::StoreUnavailable(format!(
            "store {op} did not complete within {}ms",
            self.timeouts.store.as_millis()
        ))
    }
}

/// Unregisters an identity's refresh cell when its caller finishes or is
/// cancelled. An unfinished cell stays while other waiters still hold it,
/// since one of them takes the refresh over.
struct RefreshSlot<'a> {
    refreshes: &'a Mutex<HashMap<String, Arc<OnceCell<RefreshOutcome>>>>,
    user: &'a str,
    cell: Arc<OnceCell<RefreshOutcome>>,
}

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        let mut refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(registered) = refreshes.get(self.user) else {
            return;
        };
        // Held by the map, this slot and the caller's local clone.
        let unshared = Arc::strong_count(registered) <= 3;
        if Arc::ptr_eq(registered, &self.cell) && (self.cell.initialized() || unshared) {
            refreshes.remove(self.user);
        }
    }
}

async fn bounded<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> NpauthError,
) -> Result<T, NpauthError>
where
    F: Future<Output = Result<T, NpauthError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| Err(on_timeout()))
}

/// Copy of a shared refresh failure for one of its waiters.
fn share_error(err: &NpauthError) -> NpauthError {
    match err {
        NpauthError::TokenNotFound(user) => NpauthError::TokenNotFound(user.clone()),
        NpauthError::RefreshFailed { user, reason } => NpauthError::RefreshFailed {
            user: user.clone(),
            reason: reason.clone(),
        },
        NpauthError::ExchangeFailed(reason) => NpauthError::ExchangeFailed(reason.clone()),
        NpauthError::StoreUnavailable(reason) => NpauthError::StoreUnavailable(reason.clone()),
        NpauthError::ConfigError { path, detail } => NpauthError::ConfigError {
            path: path.clone(),
            detail: detail.clone(),
        },
        NpauthError::StreamingApi(reason) => NpauthError::StreamingApi(reason.clone()),
        NpauthError::IoError(e) => NpauthError::StoreUnavailable(e.to_string()),
    }
}
