use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;

/// Signing secrets shorter than this abort startup; a guessable key would
/// silently void every other control in the service.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct CaseConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    /// Public base URL used in emailed links.
    pub app_base_url: String,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub retention: RetentionConfig,
    pub smtp: Option<SmtpConfig>,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub flush_debounce_ms: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub refresh_token_expiry_days: i64,
    pub refresh_cookie_name: String,
    pub csrf_cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSitePolicy,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Emails escalated to the admin role at registration and login.
    pub admin_emails: Vec<String>,
    pub lockout_threshold: u32,
    pub lockout_duration_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub global_days: u32,
    pub sweep_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl CaseConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let smtp_host = env::var("SMTP_HOST").ok().filter(|s| !s.is_empty());
        let email_from = env::var("EMAIL_FROM").ok().filter(|s| !s.is_empty());
        let smtp = match (smtp_host, email_from) {
            (Some(host), Some(from_address)) => Some(SmtpConfig {
                host,
                port: parse_num(get_env("SMTP_PORT", Some("587"), is_prod)?, "SMTP_PORT")?,
                username: get_env("SMTP_USERNAME", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_address,
            }),
            _ => None,
        };

        let config = CaseConfig {
            common,
            environment,
            service_name: get_env("SERVICE_NAME", Some("case-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            app_base_url: get_env("APP_BASE_URL", Some("http://localhost:3000"), is_prod)?,
            store: StoreConfig {
                db_path: PathBuf::from(get_env("STORE_PATH", Some("./cases.db"), is_prod)?),
                uploads_dir: PathBuf::from(get_env("UPLOADS_DIR", Some("./uploads"), is_prod)?),
                flush_debounce_ms: parse_num(
                    get_env("STORE_FLUSH_DEBOUNCE_MS", Some("1500"), is_prod)?,
                    "STORE_FLUSH_DEBOUNCE_MS",
                )?,
            },
            jwt: JwtConfig {
                secret: get_env(
                    "JWT_SECRET",
                    // Dev convenience only; prod must set its own.
                    Some("insecure-dev-signing-secret-0123456789abcdef"),
                    is_prod,
                )?,
                access_token_expiry_minutes: parse_num(
                    get_env("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", Some("15"), is_prod)?,
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                )?,
            },
            session: SessionConfig {
                refresh_token_expiry_days: parse_num(
                    get_env("REFRESH_TOKEN_EXPIRY_DAYS", Some("30"), is_prod)?,
                    "REFRESH_TOKEN_EXPIRY_DAYS",
                )?,
                refresh_cookie_name: get_env(
                    "REFRESH_COOKIE_NAME",
                    Some("refresh_session"),
                    is_prod,
                )?,
                csrf_cookie_name: get_env("CSRF_COOKIE_NAME", Some("csrf_token"), is_prod)?,
                cookie_secure: get_env("COOKIE_SECURE", Some("false"), is_prod)?
                    .parse()
                    .map_err(|e: std::str::ParseBoolError| {
                        AppError::ConfigError(anyhow::anyhow!("COOKIE_SECURE: {e}"))
                    })?,
                cookie_same_site: get_env("COOKIE_SAME_SITE", Some("strict"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            security: SecurityConfig {
                allowed_origins: split_list(&get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?),
                admin_emails: split_list(&get_env("ADMIN_EMAILS", Some(""), is_prod)?)
                    .into_iter()
                    .map(|e| e.to_lowercase())
                    .collect(),
                lockout_threshold: parse_num(
                    get_env("LOCKOUT_THRESHOLD", Some("8"), is_prod)?,
                    "LOCKOUT_THRESHOLD",
                )?,
                lockout_duration_minutes: parse_num(
                    get_env("LOCKOUT_DURATION_MINUTES", Some("15"), is_prod)?,
                    "LOCKOUT_DURATION_MINUTES",
                )?,
            },
            retention: RetentionConfig {
                global_days: parse_num(
                    get_env("RETENTION_DAYS", Some("90"), is_prod)?,
                    "RETENTION_DAYS",
                )?,
                sweep_interval_hours: parse_num(
                    get_env("PURGE_INTERVAL_HOURS", Some("6"), is_prod)?,
                    "PURGE_INTERVAL_HOURS",
                )?,
            },
            smtp,
            rate_limit: RateLimitConfig {
                login_attempts: parse_num(
                    get_env("RATE_LIMIT_LOGIN_ATTEMPTS", Some("10"), is_prod)?,
                    "RATE_LIMIT_LOGIN_ATTEMPTS",
                )?,
                login_window_seconds: parse_num(
                    get_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", Some("60"), is_prod)?,
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                )?,
                global_ip_limit: parse_num(
                    get_env("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"), is_prod)?,
                    "RATE_LIMIT_GLOBAL_IP_LIMIT",
                )?,
                global_ip_window_seconds: parse_num(
                    get_env("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", Some("60"), is_prod)?,
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Running insecurely is worse than not running; every violation here
    /// aborts startup.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_err("PORT must be greater than 0"));
        }

        if self.jwt.secret.len() < MIN_JWT_SECRET_LEN {
            return Err(config_err(format!(
                "JWT_SECRET must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(config_err("JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"));
        }

        if self.session.refresh_token_expiry_days <= 0 {
            return Err(config_err("REFRESH_TOKEN_EXPIRY_DAYS must be positive"));
        }

        if self.security.lockout_threshold == 0 {
            return Err(config_err("LOCKOUT_THRESHOLD must be positive"));
        }

        if self.security.lockout_duration_minutes <= 0 {
            return Err(config_err("LOCKOUT_DURATION_MINUTES must be positive"));
        }

        if self.retention.global_days == 0 {
            return Err(config_err("RETENTION_DAYS must be positive"));
        }

        if self.store.flush_debounce_ms == 0 {
            return Err(config_err("STORE_FLUSH_DEBOUNCE_MS must be positive"));
        }

        if self.session.cookie_same_site == SameSitePolicy::None && !self.session.cookie_secure {
            return Err(config_err(
                "COOKIE_SAME_SITE=none requires COOKIE_SECURE=true",
            ));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_err("Wildcard CORS origin not allowed in production"));
            }
            if !self.session.cookie_secure {
                return Err(config_err(
                    "COOKIE_SECURE must be true in production",
                ));
            }
        }

        Ok(())
    }
}

fn config_err(msg: impl std::fmt::Display) -> AppError {
    AppError::ConfigError(anyhow::anyhow!("{msg}"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_num<T: std::str::FromStr>(raw: String, key: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{key}: {e}")))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(config_err(format!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(config_err(format!("{} is required but not set", key)))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SameSitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(SameSitePolicy::Strict),
            "lax" => Ok(SameSitePolicy::Lax),
            "none" => Ok(SameSitePolicy::None),
            _ => Err(format!("Invalid SameSite policy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CaseConfig {
        CaseConfig {
            common: core_config::Config { port: 8080 },
            environment: Environment::Dev,
            service_name: "case-service".to_string(),
            service_version: "0.0.0".to_string(),
            log_level: "info".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            store: StoreConfig {
                db_path: PathBuf::from("./cases.db"),
                uploads_dir: PathBuf::from("./uploads"),
                flush_debounce_ms: 1500,
            },
            jwt: JwtConfig {
                secret: "0123456789abcdef0123456789abcdef".to_string(),
                access_token_expiry_minutes: 15,
            },
            session: SessionConfig {
                refresh_token_expiry_days: 30,
                refresh_cookie_name: "refresh_session".to_string(),
                csrf_cookie_name: "csrf_token".to_string(),
                cookie_secure: false,
                cookie_same_site: SameSitePolicy::Strict,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
                admin_emails: vec![],
                lockout_threshold: 8,
                lockout_duration_minutes: 15,
            },
            retention: RetentionConfig {
                global_days: 90,
                sweep_interval_hours: 6,
            },
            smtp: None,
            rate_limit: RateLimitConfig {
                login_attempts: 10,
                login_window_seconds: 60,
                global_ip_limit: 100,
                global_ip_window_seconds: 60,
            },
        }
    }

    #[test]
    fn short_signing_secret_is_fatal() {
        let mut config = base_config();
        config.jwt.secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn wildcard_cors_rejected_in_prod() {
        let mut config = base_config();
        config.environment = Environment::Prod;
        config.session.cookie_secure = true;
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn insecure_cookies_rejected_in_prod() {
        let mut config = base_config();
        config.environment = Environment::Prod;
        config.session.cookie_secure = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn samesite_none_requires_secure() {
        let mut config = base_config();
        config.session.cookie_same_site = SameSitePolicy::None;
        config.session.cookie_secure = false;
        assert!(config.validate().is_err());

        config.session.cookie_secure = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn dev_defaults_validate() {
        assert!(base_config().validate().is_ok());
    }
}
