//! Entitlement gate: verifies the session token and checks for a feature key.
//!
//! The token is read from the session cookie, falling back to an
//! `Authorization: Bearer` header. Signatures and expiry are always verified.

use axum::http::{header, HeaderMap};
use cookie::Cookie;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AuthConfig, VerificationKey};

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Missing entitlement '{feature}'")]
    Forbidden { feature: String },

    #[error("Session token carries neither a subject nor an email")]
    MissingSubject,
}

/// Claims carried by the session token. Entitlements may sit under a nested
/// `claims` object or at the top level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entitlements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<NestedClaims>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NestedClaims {
    #[serde(default)]
    pub entitlements: Vec<String>,
}

impl SessionClaims {
    pub fn entitlements(&self) -> &[String] {
        match &self.claims {
            Some(nested) if !nested.entitlements.is_empty() => &nested.entitlements,
            _ => &self.entitlements,
        }
    }

    pub fn has_entitlement(&self, feature_key: &str) -> bool {
        self.entitlements().iter().any(|e| e == feature_key)
    }

    /// Stable user identifier: `sub`, falling back to `email`.
    pub fn owner(&self) -> Option<&str> {
        self.sub
            .as_deref()
            .or(self.email.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Best identifier for log lines.
    pub fn subject(&self) -> &str {
        self.email
            .as_deref()
            .or(self.sub.as_deref())
            .unwrap_or("unknown")
    }
}

pub struct EntitlementGate {
    cookie_name: String,
    key: DecodingKey,
    validation: Validation,
}

impl EntitlementGate {
    pub fn new(config: &AuthConfig) -> Result<Self, EntitlementError> {
        let (key, algorithm) = match &config.verification_key {
            VerificationKey::Secret(secret) => {
                (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
            VerificationKey::RsaPublicPem(pem) => {
                (DecodingKey::from_rsa_pem(pem.as_bytes())?, Algorithm::RS256)
            }
        };

        let mut validation = Validation::new(algorithm);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            cookie_name: config.cookie_name.clone(),
            key,
            validation,
        })
    }

    /// Session cookie first, then bearer header. Empty values count as absent.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|c| c.name() == self.cookie_name)
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty());

        from_cookie.or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, EntitlementError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }

    /// Succeeds only for a verified token whose entitlements include `feature_key`.
    pub fn require_feature(
        &self,
        headers: &HeaderMap,
        feature_key: &str,
    ) -> Result<SessionClaims, EntitlementError> {
        let token = self
            .token_from_headers(headers)
            .ok_or(EntitlementError::Unauthenticated)?;
        let claims = self.verify(&token)?;

        if !claims.has_entitlement(feature_key) {
            return Err(EntitlementError::Forbidden {
                feature: feature_key.to_string(),
            });
        }
        if claims.owner().is_none() {
            return Err(EntitlementError::MissingSubject);
        }
        Ok(claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    pub(crate) const SECRET: &str = "test-signing-secret";

    pub(crate) fn auth_config() -> AuthConfig {
        AuthConfig {
            cookie_name: "outseta_jwt".to_string(),
            verification_key: VerificationKey::Secret(SECRET.to_string()),
            audience: None,
            feature_key: "premium".to_string(),
        }
    }

    pub(crate) fn sign(claims: &SessionClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    pub(crate) fn claims_with(entitlements: &[&str]) -> SessionClaims {
        SessionClaims {
            sub: Some("user-1".to_string()),
            email: Some("jane@x.com".to_string()),
            exp: in_one_hour(),
            entitlements: entitlements.iter().map(|e| e.to_string()).collect(),
            claims: None,
        }
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; outseta_jwt={token}; lang=en")).unwrap(),
        );
        headers
    }

    fn gate() -> EntitlementGate {
        EntitlementGate::new(&auth_config()).unwrap()
    }

    #[test]
    fn test_valid_token_with_feature_passes() {
        let token = sign(&claims_with(&["premium"]), SECRET);
        let claims = gate()
            .require_feature(&cookie_headers(&token), "premium")
            .unwrap();
        assert_eq!(claims.subject(), "jane@x.com");
    }

    #[test]
    fn test_token_missing_feature_is_forbidden() {
        let token = sign(&claims_with(&["basic"]), SECRET);
        let err = gate()
            .require_feature(&cookie_headers(&token), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::Forbidden { feature } if feature == "premium"));
    }

    #[test]
    fn test_no_token_is_unauthenticated() {
        let err = gate()
            .require_feature(&HeaderMap::new(), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::Unauthenticated));
    }

    #[test]
    fn test_empty_cookie_is_unauthenticated() {
        let err = gate()
            .require_feature(&cookie_headers(""), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::Unauthenticated));
    }

    #[test]
    fn test_wrong_signature_is_invalid_token() {
        let token = sign(&claims_with(&["premium"]), "some-other-secret");
        let err = gate()
            .require_feature(&cookie_headers(&token), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::InvalidToken(_)));
    }

    #[test]
    fn test_garbage_token_is_invalid_token() {
        let err = gate()
            .require_feature(&cookie_headers("not-a-jwt"), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::InvalidToken(_)));
    }

    #[test]
    fn test_expired_token_is_invalid_token() {
        let mut claims = claims_with(&["premium"]);
        claims.exp = (chrono::Utc::now().timestamp() - 3600) as u64;
        let token = sign(&claims, SECRET);
        let err = gate()
            .require_feature(&cookie_headers(&token), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::InvalidToken(_)));
    }

    #[test]
    fn test_nested_entitlements_take_precedence() {
        let mut claims = claims_with(&[]);
        claims.claims = Some(NestedClaims {
            entitlements: vec!["premium".to_string()],
        });
        let token = sign(&claims, SECRET);
        assert!(gate()
            .require_feature(&cookie_headers(&token), "premium")
            .is_ok());
    }

    #[test]
    fn test_anonymous_token_is_rejected() {
        let mut claims = claims_with(&["premium"]);
        claims.sub = None;
        claims.email = None;
        let token = sign(&claims, SECRET);
        let err = gate()
            .require_feature(&cookie_headers(&token), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::MissingSubject));
    }

    #[test]
    fn test_owner_prefers_subject_over_email() {
        let mut claims = claims_with(&[]);
        assert_eq!(claims.owner(), Some("user-1"));
        claims.sub = None;
        assert_eq!(claims.owner(), Some("jane@x.com"));
    }

    #[test]
    fn test_bearer_header_is_accepted() {
        let token = sign(&claims_with(&["premium"]), SECRET);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert!(gate().require_feature(&headers, "premium").is_ok());
    }

    #[test]
    fn test_audience_is_enforced_when_configured() {
        let config = AuthConfig {
            audience: Some("resume-builder".to_string()),
            ..auth_config()
        };
        let gate = EntitlementGate::new(&config).unwrap();
        let token = sign(&claims_with(&["premium"]), SECRET);
        let err = gate
            .require_feature(&cookie_headers(&token), "premium")
            .unwrap_err();
        assert!(matches!(err, EntitlementError::InvalidToken(_)));
    }

    #[test]
    fn test_invalid_rsa_key_is_rejected_at_startup() {
        let config = AuthConfig {
            verification_key: VerificationKey::RsaPublicPem("not a pem".to_string()),
            ..auth_config()
        };
        assert!(EntitlementGate::new(&config).is_err());
    }
}
