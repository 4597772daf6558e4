use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Config;
use crate::response::AppError;

type HmacSha256 = Hmac<Sha256>;

// ==================== Roles ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Parent,
    Teacher,
    Tutor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Parent => "parent",
            Self::Teacher => "teacher",
            Self::Tutor => "tutor",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Self::Student),
            "parent" => Some(Self::Parent),
            "teacher" => Some(Self::Teacher),
            "tutor" => Some(Self::Tutor),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Teachers, tutors and admins.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Teacher | Self::Tutor | Self::Admin)
    }
}

pub const STAFF: &[Role] = &[Role::Admin, Role::Teacher, Role::Tutor];
pub const MANAGERS: &[Role] = &[Role::Admin, Role::Teacher];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

// ==================== Tokens ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// A freshly issued pair plus what the session table needs to know.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub refresh_hash: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication token is missing")]
    MissingToken,
    #[error("Invalid authentication token")]
    InvalidToken,
    #[error("Authentication token has expired")]
    ExpiredToken,
    #[error("Wrong token type")]
    WrongTokenType,
    #[error("missing JWT_SECRET")]
    MissingSecret,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("User account is deactivated")]
    InactiveUser,
    #[error("password hash error: {0}")]
    Hash(String),
}

/// The caller behind a verified access token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden("Insufficient permissions"))
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn sign_token(
    secret: &str,
    user_id: i64,
    role: Role,
    kind: TokenKind,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let exp = now.checked_add_signed(ttl).ok_or(AuthError::InvalidToken)?;
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        kind,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    let header_json = serde_json::json!({
        "alg": "HS256",
        "typ": "JWT",
    });

    let header_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header_json).map_err(|_| AuthError::InvalidToken)?);
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok((format!("{signing_input}.{sig_b64}"), exp))
}

pub fn verify_token(
    token: &str,
    secret: &str,
    expected: TokenKind,
    now: DateTime<Utc>,
) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let payload_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let sig_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;

    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::InvalidToken)?;
    if header_json.get("alg").and_then(|value| value.as_str()) != Some("HS256") {
        return Err(AuthError::InvalidToken);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: Claims =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidToken)?;

    if now.timestamp() >= claims.exp {
        return Err(AuthError::ExpiredToken);
    }
    if claims.kind != expected {
        return Err(AuthError::WrongTokenType);
    }

    Ok(claims)
}

/// Sign an access/refresh pair using the configured lifetimes.
pub fn issue_tokens(config: &Config, user_id: i64, role: Role) -> Result<IssuedTokens, AuthError> {
    let secret = config.jwt_secret.as_deref().ok_or(AuthError::MissingSecret)?;
    let now = Utc::now();

    let (access_token, _) = sign_token(
        secret,
        user_id,
        role,
        TokenKind::Access,
        Duration::minutes(config.access_token_minutes),
        now,
    )?;
    let (refresh_token, refresh_expires_at) = sign_token(
        secret,
        user_id,
        role,
        TokenKind::Refresh,
        Duration::days(config.refresh_token_days),
        now,
    )?;

    Ok(IssuedTokens {
        refresh_hash: hash_token(&refresh_token),
        refresh_expires_at,
        pair: TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer",
        },
    })
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_cost(password, bcrypt::DEFAULT_COST)
}

fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|err| AuthError::Hash(err.to_string()))
}

pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(password, hashed).unwrap_or(false)
}

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Refresh tokens are stored by digest only.
pub fn hash_token(token: &str) -> String {
    sha256_hex(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_access_token_roundtrip() {
        let (token, exp) = sign_token(SECRET, 42, Role::Teacher, TokenKind::Access, Duration::minutes(30), now()).unwrap();
        assert_eq!(exp, now() + Duration::minutes(30));

        let claims = verify_token(&token, SECRET, TokenKind::Access, now()).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Teacher);
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_each_token_has_unique_jti() {
        let (a, _) = sign_token(SECRET, 1, Role::Student, TokenKind::Refresh, Duration::days(7), now()).unwrap();
        let (b, _) = sign_token(SECRET, 1, Role::Student, TokenKind::Refresh, Duration::days(7), now()).unwrap();
        assert_ne!(a, b);
        assert_ne!(hash_token(&a), hash_token(&b));
    }

    #[test]
    fn test_rejects_other_secret() {
        let (token, _) = sign_token("other", 1, Role::Admin, TokenKind::Access, Duration::minutes(5), now()).unwrap();
        assert!(matches!(
            verify_token(&token, SECRET, TokenKind::Access, now()),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_rejects_expired() {
        let (token, _) = sign_token(SECRET, 1, Role::Admin, TokenKind::Access, Duration::minutes(5), now()).unwrap();
        let later = now() + Duration::minutes(5);
        assert!(matches!(
            verify_token(&token, SECRET, TokenKind::Access, later),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_rejects_wrong_type() {
        let (token, _) = sign_token(SECRET, 1, Role::Admin, TokenKind::Refresh, Duration::days(1), now()).unwrap();
        assert!(matches!(
            verify_token(&token, SECRET, TokenKind::Access, now()),
            Err(AuthError::WrongTokenType)
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        for token in ["", "a.b", "a.b.c.d", "not.a.jwt"] {
            assert!(verify_token(token, SECRET, TokenKind::Access, now()).is_err());
        }
    }

    #[test]
    fn test_issue_tokens_requires_secret() {
        let config = Config::default();
        assert!(matches!(
            issue_tokens(&config, 1, Role::Student),
            Err(AuthError::MissingSecret)
        ));

        let config = Config {
            jwt_secret: Some(SECRET.to_string()),
            ..Config::default()
        };
        let issued = issue_tokens(&config, 1, Role::Student).unwrap();
        assert_eq!(issued.pair.token_type, "bearer");
        assert_eq!(issued.refresh_hash, hash_token(&issued.pair.refresh_token));
        assert_eq!(issued.refresh_hash.len(), 64);
    }

    #[test]
    fn test_password_hashing() {
        let hashed = hash_password_with_cost("correct horse", 4).unwrap();
        assert!(verify_password("correct horse", &hashed));
        assert!(!verify_password("wrong horse", &hashed));
        assert!(!verify_password("correct horse", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn test_role_checks() {
        let parent = AuthUser { id: 3, role: Role::Parent };
        assert!(parent.require_role(STAFF).is_err());
        assert!(!parent.is_staff());

        let tutor = AuthUser { id: 4, role: Role::Tutor };
        assert!(tutor.require_role(STAFF).is_ok());
        assert!(tutor.require_role(MANAGERS).is_err());
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
    }
}
