//! Remote credentials - Basic auth check and short-lived JWT issue
use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RemoteAuth {
    username: String,
    password: String,
    secret: String,
    token_expiration: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Remote username
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

impl RemoteAuth {
    pub fn new(username: String, password: String, secret: String, expiration_minutes: u64) -> Self {
        Self {
            username,
            password,
            secret,
            token_expiration: Duration::minutes(expiration_minutes as i64),
        }
    }

    /// Build from config; without a configured secret, tokens only live as
    /// long as this process
    pub fn from_config(config: &RemoteConfig) -> Self {
        let secret = config
            .secret
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()));
        Self::new(
            config.username.clone(),
            config.password.clone(),
            secret,
            config.token_ttl_minutes,
        )
    }

    /// Check an `Authorization: Basic ...` header value
    pub fn verify_basic(&self, header: &str) -> Result<()> {
        let encoded = header
            .strip_prefix("Basic ")
            .ok_or_else(|| RemoteError::Auth("Expected Basic credentials".to_string()))?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| RemoteError::Auth("Malformed Basic credentials".to_string()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| RemoteError::Auth("Malformed Basic credentials".to_string()))?;

        match decoded.split_once(':') {
            Some((user, pass)) if user == self.username && pass == self.password => Ok(()),
            _ => Err(RemoteError::Auth("Invalid username or password".to_string())),
        }
    }

    /// Create a signed token
    pub fn create_token(&self) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.token_expiration;

        let claims = Claims {
            sub: self.username.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::default(), &claims, &encoding_key).map_err(RemoteError::from)
    }

    /// The header value handed out by `/credentials`
    pub fn credential_header(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.create_token()?))
    }

    /// Verify and decode a token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        if token_data.claims.sub != self.username {
            return Err(RemoteError::Auth("Token issued for another user".to_string()));
        }
        Ok(token_data.claims)
    }

    /// Check the `header` of an `authenticate` event: a bearer token from
    /// `/credentials`, or the Basic header itself
    pub fn verify_header(&self, header: &str) -> Result<()> {
        let header = header.trim();
        if let Some(token) = header.strip_prefix("Bearer ") {
            self.verify_token(token.trim()).map(|_| ())
        } else if header.starts_with("Basic ") {
            self.verify_basic(header)
        } else {
            Err(RemoteError::Auth("Unsupported credential".to_string()))
        }
    }
}
