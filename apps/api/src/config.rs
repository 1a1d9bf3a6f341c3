use anyhow::{bail, Context, Result};

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_SESSION_COOKIE: &str = "outseta_jwt";
const DEFAULT_FEATURE_KEY: &str = "resume_builder";
/// Matches the upload hint shown to users (10 MB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
/// Upper bound on retries so the backoff delay cannot overflow.
const MAX_LLM_RETRIES: u32 = 8;

/// Application configuration loaded from environment variables.
/// Startup fails if the token verification key is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub max_upload_bytes: usize,
    /// Sessions idle for this long are evicted.
    pub session_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

/// Settings for the generation service adapter.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Absent keys are reported per call, not at startup.
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

/// Settings for the entitlement gate.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub verification_key: VerificationKey,
    pub audience: Option<String>,
    pub feature_key: String,
}

#[derive(Debug, Clone)]
pub enum VerificationKey {
    /// HS256 shared secret.
    Secret(String),
    /// RS256 public key, PEM encoded.
    RsaPublicPem(String),
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            llm: LlmConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        Ok(LlmConfig {
            api_key: optional_env("GEMINI_API_KEY"),
            model: optional_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            api_base: optional_env("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            max_retries: parse_env("LLM_MAX_RETRIES", 2)?.min(MAX_LLM_RETRIES),
            retry_base_delay_ms: parse_env("LLM_RETRY_BASE_DELAY_MS", 1000)?,
        })
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: 120,
            max_retries: 2,
            retry_base_delay_ms: 1000,
        }
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self> {
        let verification_key = match (
            optional_env("SESSION_JWT_SECRET"),
            optional_env("SESSION_JWT_PUBLIC_KEY"),
        ) {
            (Some(_), Some(_)) => {
                bail!("Set only one of SESSION_JWT_SECRET and SESSION_JWT_PUBLIC_KEY")
            }
            (Some(secret), None) => VerificationKey::Secret(secret),
            (None, Some(pem)) => VerificationKey::RsaPublicPem(pem),
            (None, None) => bail!(
                "Required environment variable 'SESSION_JWT_SECRET' or 'SESSION_JWT_PUBLIC_KEY' is not set"
            ),
        };

        Ok(AuthConfig {
            cookie_name: optional_env("SESSION_COOKIE_NAME")
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            verification_key,
            audience: optional_env("SESSION_JWT_AUDIENCE"),
            feature_key: optional_env("RESUME_FEATURE_KEY")
                .unwrap_or_else(|| DEFAULT_FEATURE_KEY.to_string()),
        })
    }
}

/// Empty values count as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
