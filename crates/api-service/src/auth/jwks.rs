//! JWKS client for fetching and caching the identity provider's signing keys.
//!
//! The client fetches the provider's `/.well-known/jwks.json` document and
//! caches the usable RSA keys, keyed by `kid`, for a fixed TTL.
//!
//! # Caching
//!
//! - Expiry is checked per lookup; there is no background refresh task
//! - The cached set is an `Arc<KeySet>` replaced wholesale, so readers never
//!   see a partially updated set
//! - An unknown `kid` triggers exactly one refetch for that lookup
//! - Concurrent refetches are coalesced into one in-flight request whose
//!   outcome every waiter observes
//! - A failed refetch never clears the cache; a stale key is still served
//!   for its `kid` until a fetch succeeds

use crate::auth::{KeyError, KeyFetchError};
use crate::config::DEFAULT_JWKS_CACHE_TTL_SECONDS;
use crate::observability::metrics::{record_jwks_fetch, record_jwks_lookup};
use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Timeout for a single key-set request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The only algorithm a published key may be restricted to.
const SUPPORTED_KEY_ALG: &str = "RS256";

/// JSON Web Key as published by the identity provider.
///
/// Every field is optional at this stage so that one unusual record cannot
/// fail the whole document; unusable records are filtered out afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    /// Key type (must be "RSA").
    #[serde(default)]
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key use (absent or "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm restriction (absent or "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// Key-set document returned by the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// A public key usable for RS256 signature verification.
///
/// Immutable once built; shared by `Arc` between the cache and verifiers.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Build a signing key from a JWK, or `None` if the record is unusable.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if jwk.kty != "RSA" {
            tracing::debug!(target: "api.auth.jwks", kty = %jwk.kty, "Skipping non-RSA JWK");
            return None;
        }

        let kid = jwk.kid.as_deref().filter(|kid| !kid.is_empty())?;

        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            tracing::debug!(target: "api.auth.jwks", kid = %kid, "Skipping JWK not meant for signatures");
            return None;
        }

        if jwk.alg.as_deref().is_some_and(|a| a != SUPPORTED_KEY_ALG) {
            tracing::debug!(target: "api.auth.jwks", kid = %kid, "Skipping JWK restricted to another algorithm");
            return None;
        }

        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            tracing::debug!(target: "api.auth.jwks", kid = %kid, "Skipping JWK without RSA components");
            return None;
        };

        match DecodingKey::from_rsa_components(n, e) {
            Ok(decoding_key) => Some(Self {
                kid: kid.to_string(),
                decoding_key,
            }),
            Err(err) => {
                tracing::debug!(target: "api.auth.jwks", kid = %kid, error = %err, "Skipping JWK with invalid RSA components");
                None
            }
        }
    }

    /// Key identifier.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Key material for `jsonwebtoken::decode`.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// An immutable set of signing keys indexed by `kid`.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
}

impl KeySet {
    /// Build a key set from a fetched document, keeping only usable keys.
    ///
    /// A later record with a duplicate `kid` replaces the earlier one.
    pub fn from_document(document: &JwksDocument) -> Self {
        let keys = document
            .keys
            .iter()
            .filter_map(SigningKey::from_jwk)
            .map(|key| (key.kid.clone(), Arc::new(key)))
            .collect();

        Self { keys }
    }

    /// Look up a key by ID.
    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Cached key set with its fetch time.
struct CachedKeySet {
    set: Arc<KeySet>,
    fetched_at: Instant,
}

type KeySetCell = Arc<RwLock<Option<CachedKeySet>>>;

/// In-flight refetch shared by every caller that needs one.
type SharedFetch = Shared<BoxFuture<'static, Result<Arc<KeySet>, KeyFetchError>>>;

/// JWKS client for fetching and caching public keys.
///
/// One instance is created per process and shared by `Arc` between all
/// request handlers.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached key set.
    cache: KeySetCell,

    /// Refetch currently in flight, if any.
    in_flight: Mutex<Option<SharedFetch>>,

    /// Cache TTL duration.
    cache_ttl: Duration,
}

impl JwksClient {
    /// Create a new JWKS client with the default 10-minute TTL.
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS))
    }

    /// Create a new JWKS client with custom cache TTL.
    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "api.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            in_flight: Mutex::new(None),
            cache_ttl,
        }
    }

    /// Get a signing key by key ID.
    ///
    /// Serves from cache when the set is fresh and holds `kid`. Otherwise
    /// refetches once (joining any refetch already in flight) and retries
    /// the lookup against the new set.
    ///
    /// # Errors
    ///
    /// - `KeyError::NotFound` if `kid` is absent from a freshly fetched set
    /// - `KeyError::Fetch` if the refetch failed and no stale key for `kid` exists
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<SigningKey>, KeyError> {
        let stale = {
            let cache = self.cache.read().await;
            match cache.as_ref() {
                Some(cached) if cached.fetched_at.elapsed() < self.cache_ttl => {
                    if let Some(key) = cached.set.get(kid) {
                        tracing::debug!(target: "api.auth.jwks", "JWKS cache hit");
                        record_jwks_lookup("hit");
                        return Ok(key);
                    }
                    tracing::debug!(target: "api.auth.jwks", "Key not in fresh JWKS cache, refetching");
                    record_jwks_lookup("miss");
                    None
                }
                Some(cached) => {
                    tracing::debug!(target: "api.auth.jwks", "JWKS cache expired, refetching");
                    record_jwks_lookup("stale");
                    Some(Arc::clone(&cached.set))
                }
                None => {
                    record_jwks_lookup("miss");
                    None
                }
            }
        };

        match self.refresh().await {
            Ok(set) => set.get(kid).ok_or_else(|| {
                tracing::warn!(target: "api.auth.jwks", "Key not found in JWKS after refresh");
                KeyError::NotFound {
                    kid: kid.to_string(),
                }
            }),
            Err(err) => match stale.and_then(|set| set.get(kid)) {
                Some(key) => {
                    tracing::warn!(
                        target: "api.auth.jwks",
                        error = %err,
                        "JWKS refresh failed, serving stale key"
                    );
                    record_jwks_lookup("stale_fallback");
                    Ok(key)
                }
                None => Err(KeyError::Fetch(err)),
            },
        }
    }

    /// Refetch the key set now, through the same coalescing path as lookups.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; the existing cache is left untouched.
    #[cfg(test)]
    pub(crate) async fn force_refresh(&self) -> Result<(), KeyFetchError> {
        self.refresh().await.map(|_| ())
    }

    /// Join the in-flight refetch or start one.
    async fn refresh(&self) -> Result<Arc<KeySet>, KeyFetchError> {
        let fetch = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(fetch) => {
                    tracing::debug!(target: "api.auth.jwks", "Joining in-flight JWKS fetch");
                    fetch.clone()
                }
                None => {
                    let fetch = fetch_and_install(
                        self.http_client.clone(),
                        self.jwks_url.clone(),
                        Arc::clone(&self.cache),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(fetch.clone());
                    fetch
                }
            }
        };

        // Await a clone so `fetch` itself stays unpolled for the identity check
        let result = fetch.clone().await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&fetch)) {
            *slot = None;
        }

        result
    }

    /// Clear the cache.
    #[cfg(test)]
    pub(crate) async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Backdate the cached set so the next lookup sees it as expired.
    #[cfg(test)]
    pub(crate) async fn expire_cache(&self) {
        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_mut() {
            if let Some(past) = Instant::now().checked_sub(self.cache_ttl) {
                cached.fetched_at = past;
            }
        }
    }
}

/// Fetch the key set and, on success, swap it into the cache.
///
/// Runs as the shared in-flight future, so it installs the set for every
/// waiter regardless of which caller started it.
async fn fetch_and_install(
    http_client: reqwest::Client,
    jwks_url: String,
    cache: KeySetCell,
) -> Result<Arc<KeySet>, KeyFetchError> {
    let start = Instant::now();
    let document = match fetch_document(&http_client, &jwks_url).await {
        Ok(document) => document,
        Err(err) => {
            let status = match err {
                KeyFetchError::Transport(_) => "transport_error",
                KeyFetchError::Status(_) => "status_error",
                KeyFetchError::Body(_) => "body_error",
            };
            record_jwks_fetch(status, start.elapsed());
            return Err(err);
        }
    };
    record_jwks_fetch("success", start.elapsed());

    let set = Arc::new(KeySet::from_document(&document));
    tracing::info!(
        target: "api.auth.jwks",
        key_count = set.len(),
        published_count = document.keys.len(),
        "JWKS cache refreshed"
    );

    let mut cached = cache.write().await;
    *cached = Some(CachedKeySet {
        set: Arc::clone(&set),
        fetched_at: Instant::now(),
    });

    Ok(set)
}

#[instrument(skip(http_client))]
async fn fetch_document(
    http_client: &reqwest::Client,
    jwks_url: &str,
) -> Result<JwksDocument, KeyFetchError> {
    tracing::debug!(target: "api.auth.jwks", "Fetching JWKS");

    let response = http_client.get(jwks_url).send().await.map_err(|e| {
        tracing::error!(target: "api.auth.jwks", error = %e, "Failed to fetch JWKS");
        KeyFetchError::Transport(e.to_string())
    })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        tracing::error!(target: "api.auth.jwks", status = %status, "JWKS endpoint returned error");
        return Err(KeyFetchError::Status(status.as_u16()));
    }

    let body = response.bytes().await.map_err(|e| {
        tracing::error!(target: "api.auth.jwks", error = %e, "Failed to read JWKS response");
        KeyFetchError::Transport(e.to_string())
    })?;

    serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(target: "api.auth.jwks", error = %e, "Failed to parse JWKS response");
        KeyFetchError::Body(e.to_string())
    })
}
