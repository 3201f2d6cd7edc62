/*!
 * Application Configuration
 * Read once at startup from the environment (with `.env` support) and shared
 * through the application state.
 */

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::DbConfig;
use crate::logging::config::LogConfig;

/// Signing key used when `JWT_SECRET` is unset. Refused in production.
pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

pub const IMAGE_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const VIDEO_MAX_BYTES: u64 = 200 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error(
        "JWT_SECRET must be set to a secure, unique value in production; \
         refusing to start with the default secret"
    )]
    InsecureJwtSecret,

    #[error("invalid bind address {0}")]
    InvalidAddress(String),
}

/// Whether the auth gate trusts a valid signature alone, or also requires the
/// token's subject to still exist in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenPolicy {
    #[default]
    Stateless,
    VerifyUser,
}

impl FromStr for TokenPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stateless" => Ok(TokenPolicy::Stateless),
            "verify-user" | "verify_user" => Ok(TokenPolicy::VerifyUser),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// `None` disables admin creation entirely.
    pub setup_key: Option<String>,
    pub token_policy: TokenPolicy,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    /// Check leading bytes against known image/video signatures.
    pub sniff_content: bool,
    pub image_max_bytes: u64,
    pub video_max_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub allowed_origins: Vec<String>,
    pub content_cache_ttl: Option<Duration>,
    pub content_seed_file: Option<PathBuf>,
    /// `None` when `DATABASE_URL` is unset; the in-memory store is used then.
    pub database: Option<DbConfig>,
    pub log: LogConfig,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        _ => Ok(default),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment =
            non_empty(&lookup, "ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let is_production = environment == "production";

        let jwt_secret = match non_empty(&lookup, "JWT_SECRET") {
            Some(secret) if !(is_production && secret == DEFAULT_JWT_SECRET) => secret,
            _ if is_production => return Err(ConfigError::InsecureJwtSecret),
            _ => DEFAULT_JWT_SECRET.to_string(),
        };

        let token_policy = match non_empty(&lookup, "AUTH_TOKEN_POLICY") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "AUTH_TOKEN_POLICY",
                value: raw,
            })?,
            None => TokenPolicy::default(),
        };

        let bcrypt_cost: u32 = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let auth = AuthConfig {
            jwt_secret,
            setup_key: non_empty(&lookup, "SETUP_KEY"),
            token_policy,
            bcrypt_cost,
        };

        let upload = UploadConfig {
            dir: non_empty(&lookup, "UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            sniff_content: parse_or(&lookup, "UPLOAD_SNIFF_CONTENT", false)?,
            image_max_bytes: IMAGE_MAX_BYTES,
            video_max_bytes: VIDEO_MAX_BYTES,
        };

        let allowed_origins = non_empty(&lookup, "ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .or_else(|| non_empty(&lookup, "FRONTEND_ORIGIN").map(|origin| vec![origin]))
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let content_cache_ttl = match non_empty(&lookup, "CONTENT_CACHE_TTL_SECS") {
            Some(_) => Some(Duration::from_secs(parse_or(
                &lookup,
                "CONTENT_CACHE_TTL_SECS",
                0u64,
            )?)),
            None => None,
        };

        let log = LogConfig {
            level: non_empty(&lookup, "LOG_LEVEL")
                .unwrap_or_else(|| (if is_production { "info" } else { "debug" }).to_string()),
            dir: non_empty(&lookup, "LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            json: is_production,
        };

        Ok(Self {
            host: non_empty(&lookup, "HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 3001)?,
            auth,
            upload,
            allowed_origins,
            content_cache_ttl,
            content_seed_file: non_empty(&lookup, "CONTENT_SEED_FILE").map(PathBuf::from),
            database: DbConfig::from_lookup(&lookup),
            log,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:3001");
        assert_eq!(config.auth.jwt_secret, DEFAULT_JWT_SECRET);
        assert!(config.auth.setup_key.is_none());
        assert_eq!(config.auth.token_policy, TokenPolicy::Stateless);
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.upload.dir, PathBuf::from("uploads"));
        assert!(!config.upload.sniff_content);
        assert!(config.content_cache_ttl.is_none());
        assert!(config.database.is_none());
        assert_eq!(config.log.level, "debug");
        assert!(!config.log.json);
    }

    #[test]
    fn test_production_refuses_default_secret() {
        assert!(matches!(
            load(&[("ENVIRONMENT", "production")]),
            Err(ConfigError::InsecureJwtSecret)
        ));
        assert!(matches!(
            load(&[
                ("ENVIRONMENT", "production"),
                ("JWT_SECRET", DEFAULT_JWT_SECRET)
            ]),
            Err(ConfigError::InsecureJwtSecret)
        ));

        let config = load(&[("ENVIRONMENT", "production"), ("JWT_SECRET", "s3cr3t")]).unwrap();
        assert!(config.is_production());
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_token_policy_parsing() {
        let config = load(&[("AUTH_TOKEN_POLICY", "verify-user")]).unwrap();
        assert_eq!(config.auth.token_policy, TokenPolicy::VerifyUser);

        let err = load(&[("AUTH_TOKEN_POLICY", "sometimes")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "AUTH_TOKEN_POLICY",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("BCRYPT_COST", "-1")]).is_err());
        assert!(load(&[("BCRYPT_COST", "99")]).is_err());
        assert!(load(&[("UPLOAD_SNIFF_CONTENT", "maybe")]).is_err());
    }

    #[test]
    fn test_origins_fall_back_to_frontend_origin() {
        let config = load(&[("FRONTEND_ORIGIN", "https://residencia.example")]).unwrap();
        assert_eq!(config.allowed_origins, vec!["https://residencia.example"]);

        let config = load(&[(
            "ALLOWED_ORIGINS",
            "https://a.example, https://b.example",
        )])
        .unwrap();
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_optional_settings() {
        let config = load(&[
            ("SETUP_KEY", "open-sesame"),
            ("CONTENT_CACHE_TTL_SECS", "30"),
            ("CONTENT_SEED_FILE", "seed/content.json"),
            ("DATABASE_URL", "postgresql://localhost/carehome"),
        ])
        .unwrap();
        assert_eq!(config.auth.setup_key.as_deref(), Some("open-sesame"));
        assert_eq!(config.content_cache_ttl, Some(Duration::from_secs(30)));
        assert_eq!(
            config.content_seed_file,
            Some(PathBuf::from("seed/content.json"))
        );
        assert!(config.database.is_some());
    }
}
