use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Subject of a verified bearer token.
    User(String),
    /// SHA-256 of a configured API key, hex encoded.
    ApiKey(String),
    Ip(IpAddr),
}

impl Identity {
    pub fn key(&self) -> String {
        match self {
            Identity::User(id) => format!("user:{}", id),
            Identity::ApiKey(hash) => format!("key:{}", hash),
            Identity::Ip(ip) => format!("ip:{}", ip),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user public id
    pub exp: i64,
    pub iat: i64,
}

fn sha256_hex(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

/// Derives an [`Identity`] from request metadata, most specific first:
/// verified bearer token, known API key, proxy headers (only when trusted),
/// peer address.
///
/// Anything the client can choose freely is ignored unless it verifies, so a
/// caller cannot mint a fresh bucket per request.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    jwt_secret: Option<String>,
    api_key_hashes: HashSet<String>,
    trust_proxy_headers: bool,
}

impl IdentityResolver {
    /// Peer address only: no token secret, no API keys, proxy headers ignored.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let resolver = Self::new()
            .with_api_keys(&config.api_keys)
            .trust_proxy_headers(config.trust_proxy_headers);
        match &config.jwt_secret {
            Some(secret) => resolver.with_jwt_secret(secret.clone()),
            None => resolver,
        }
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    /// Keys accepted from `x-api-key`. Only their hashes are kept.
    pub fn with_api_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.api_key_hashes.extend(
            keys.into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .map(|k| sha256_hex(&k)),
        );
        self
    }

    /// Only enable behind a proxy that overwrites `x-real-ip` and appends to
    /// `x-forwarded-for`.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn resolve<B>(&self, req: &Request<B>) -> Option<Identity> {
        let headers = req.headers();

        if let Some(sub) = self.bearer_subject(headers) {
            return Some(Identity::User(sub));
        }

        if let Some(hash) = self.known_api_key(headers) {
            return Some(Identity::ApiKey(hash));
        }

        if self.trust_proxy_headers {
            if let Some(ip) = forwarded_ip(headers) {
                return Some(Identity::Ip(ip));
            }
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| Identity::Ip(ci.0.ip()))
    }

    fn bearer_subject(&self, headers: &HeaderMap) -> Option<String> {
        let secret = self.jwt_secret.as_ref()?;
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())?;

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                tracing::debug!("Ignoring unverifiable bearer token: {}", e);
                None
            }
        }
    }

    fn known_api_key(&self, headers: &HeaderMap) -> Option<String> {
        if self.api_key_hashes.is_empty() {
            return None;
        }

        let key = headers
            .get("x-api-key")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())?;

        let hash = sha256_hex(key);
        if self.api_key_hashes.contains(&hash) {
            Some(hash)
        } else {
            tracing::debug!("Ignoring unknown API key");
            None
        }
    }
}

/// `x-real-ip`, else the right-most `x-forwarded-for` entry: the one the
/// nearest proxy appended. Entries to its left are client supplied.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse().ok());

    real_ip.or_else(|| {
        headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|s| s.split(','))
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .last()
            .and_then(|s| s.parse().ok())
    })
}
