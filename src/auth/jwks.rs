use jsonwebtoken::{Algorithm, DecodingKey, decode_header};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::AuthConfig;

const JWKS_URL_TEMPLATE: &str = "https://{}.supabase.co/auth/v1/.well-known/jwks.json";
const KEY_TTL: Duration = Duration::from_secs(3600);

/// EC public key components of one JWK.
#[derive(Debug, Clone, PartialEq)]
struct JwkKey {
    x: String,
    y: String,
    algorithm: Algorithm,
}

/// Verifies Supabase session tokens against the project's signing keys.
/// Keys are cached by `kid` for an hour.
#[derive(Clone)]
pub struct JwksCache {
    cache: Arc<Cache<String, JwkKey>>,
    jwks_url: String,
    client: reqwest::Client,
    anon_key: String,
}

impl JwksCache {
    pub fn new(config: &AuthConfig) -> Self {
        let cache = Arc::new(
            Cache::builder()
                .time_to_live(KEY_TTL)
                .max_capacity(10)
                .build(),
        );

        Self {
            cache,
            jwks_url: JWKS_URL_TEMPLATE.replace("{}", &config.project_ref),
            client: reqwest::Client::new(),
            anon_key: config.anon_key.clone(),
        }
    }

    async fn fetch_jwks(&self) -> Result<serde_json::Value, String> {
        debug!("Fetching JWKS from {}", self.jwks_url);

        let response = self
            .client
            .get(&self.jwks_url)
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch JWKS: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Failed to fetch JWKS: HTTP {status}"));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse JWKS JSON: {e}"))
    }

    async fn key_for(&self, kid: &str) -> Result<JwkKey, String> {
        if let Some(cached) = self.cache.get(kid).await {
            return Ok(cached);
        }

        let jwks = self.fetch_jwks().await?;
        let key = find_key(&jwks, kid)?;

        self.cache.insert(kid.to_string(), key.clone()).await;
        Ok(key)
    }

    pub async fn validate_token(&self, token: &str) -> Result<super::jwt::Claims, String> {
        let header = decode_header(token).map_err(|e| format!("Failed to decode header: {e}"))?;
        let kid = header.kid.ok_or("No 'kid' in token header")?;

        let key = self.key_for(&kid).await?;
        let decoding_key = DecodingKey::from_ec_components(&key.x, &key.y)
            .map_err(|e| format!("Failed to create decoding key: {e}"))?;

        super::jwt::decode_claims(token, &decoding_key, key.algorithm)
    }
}

fn find_key(jwks: &serde_json::Value, kid: &str) -> Result<JwkKey, String> {
    let keys = jwks["keys"].as_array().ok_or("No keys in JWKS")?;
    let jwk = keys
        .iter()
        .find(|k| k["kid"].as_str() == Some(kid))
        .ok_or(format!("Key with kid={kid} not found in JWKS"))?;

    let component = |name: &str| {
        jwk[name]
            .as_str()
            .map(str::to_string)
            .ok_or(format!("Missing '{name}' in JWK"))
    };

    let algorithm = match jwk["alg"].as_str() {
        Some("ES384") => Algorithm::ES384,
        _ => Algorithm::ES256,
    };

    Ok(JwkKey {
        x: component("x")?,
        y: component("y")?,
        algorithm,
    })
}
