//! Authentification par compte de service Google (OAuth 2.0, assertion JWT RS256)

use std::future::Future;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::WarehouseError;

/// Scope OAuth pour BigQuery
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Point d'échange des assertions JWT
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Durée de validité demandée pour l'assertion
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Marge avant expiration sous laquelle le jeton est renouvelé
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Fichier de clé d'un compte de service
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Adresse du compte de service (émetteur de l'assertion)
    pub client_email: String,

    /// Clé privée RSA au format PEM
    pub private_key: String,

    /// Projet du compte de service
    #[serde(default)]
    pub project_id: Option<String>,

    /// Point d'échange des jetons
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Lit une clé depuis un fichier JSON
    pub fn from_file(path: &Path) -> Result<Self, WarehouseError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| WarehouseError::CredentialsFile {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, WarehouseError> {
        serde_json::from_str(content).map_err(|e| WarehouseError::Credentials(e.to_string()))
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'a str,
    typ: &'a str,
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: u64,
    iat: u64,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Jeton d'accès avec son instant d'expiration
#[derive(Debug, Clone)]
pub struct TemporaryToken {
    pub token: String,
    pub expiry: Instant,
}

/// Échange d'assertions JWT contre des jetons d'accès
pub struct OAuthProvider {
    issuer: String,
    scope: String,
    audience: String,
    key_pair: RsaKeyPair,
    jwt_header: String,
    random: SystemRandom,
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("issuer", &self.issuer)
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl OAuthProvider {
    pub fn new(key: &ServiceAccountKey, scope: &str) -> Result<Self, WarehouseError> {
        let key_pair = decode_first_rsa_key(&key.private_key)?;
        let jwt_header = b64_encode_obj(&JwtHeader {
            alg: "RS256",
            typ: "JWT",
        })?;

        Ok(Self {
            issuer: key.client_email.clone(),
            scope: scope.to_string(),
            audience: key.token_uri().to_string(),
            key_pair,
            jwt_header,
            random: SystemRandom::new(),
        })
    }

    /// Assertion signée `header.claims.signature` émise à `now` (secondes Unix)
    pub fn assertion(&self, now: u64) -> Result<String, WarehouseError> {
        let claims = TokenClaims {
            iss: &self.issuer,
            scope: &self.scope,
            aud: &self.audience,
            exp: now + ASSERTION_LIFETIME_SECS,
            iat: now,
        };

        let message = format!("{}.{}", self.jwt_header, b64_encode_obj(&claims)?);
        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &self.random,
                message.as_bytes(),
                &mut signature,
            )
            .map_err(|_| WarehouseError::Auth("failed to sign JWT assertion".to_string()))?;

        Ok(format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Demande un nouveau jeton d'accès
    pub async fn fetch_token(&self, client: &Client) -> Result<TemporaryToken, WarehouseError> {
        let jwt = self.assertion(seconds_since_epoch())?;
        let body = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        let response = client.post(&self.audience).form(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Auth(format!(
                "token endpoint returned {}: {}",
                status, text
            )));
        }

        let token: TokenResponse = response.json().await?;
        debug!(issuer = %self.issuer, expires_in = token.expires_in, "Fetched access token");

        Ok(TemporaryToken {
            token: token.access_token,
            expiry: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

/// Cache d'un jeton, renouvelé à l'approche de son expiration
#[derive(Debug, Default)]
pub struct TokenCache {
    cache: Mutex<Option<TemporaryToken>>,
}

impl TokenCache {
    pub async fn get_or_insert_with<F, Fut>(&self, f: F) -> Result<String, WarehouseError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<TemporaryToken, WarehouseError>> + Send,
    {
        let now = Instant::now();
        let mut locked = self.cache.lock().await;

        if let Some(cached) = locked.as_ref() {
            let remaining = cached.expiry.checked_duration_since(now).unwrap_or_default();
            if remaining > REFRESH_MARGIN {
                return Ok(cached.token.clone());
            }
        }

        let fresh = f().await?;
        let token = fresh.token.clone();
        *locked = Some(fresh);
        Ok(token)
    }
}

fn seconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn decode_first_rsa_key(private_key_pem: &str) -> Result<RsaKeyPair, WarehouseError> {
    use rustls_pemfile::Item;

    let mut reader = BufReader::new(Cursor::new(private_key_pem.as_bytes()));
    let item = rustls_pemfile::read_one(&mut reader)
        .map_err(|e| WarehouseError::Credentials(format!("unreadable PEM: {}", e)))?;

    let rejected = |e: ring::error::KeyRejected| {
        WarehouseError::Credentials(format!("invalid RSA key: {}", e))
    };

    match item {
        Some(Item::Pkcs8Key(key)) => RsaKeyPair::from_pkcs8(key.secret_pkcs8_der()).map_err(rejected),
        Some(Item::Pkcs1Key(key)) => RsaKeyPair::from_der(key.secret_pkcs1_der()).map_err(rejected),
        _ => Err(WarehouseError::Credentials(
            "no RSA private key found in PEM".to_string(),
        )),
    }
}

fn b64_encode_obj<T: Serialize>(obj: &T) -> Result<String, WarehouseError> {
    let json = serde_json::to_vec(obj)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
