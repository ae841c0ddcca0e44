use std::env;
use std::path::PathBuf;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// The minimum length of the token signing secret in bytes.
const MIN_SECRET_LEN: usize = 32;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database. `None` selects the in-memory stores.
    pub database_url: Option<String>,
    /// The address the HTTP server binds to.
    pub bind_addr: String,
    /// The secret used to sign credentials.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    /// How long an issued credential stays valid, in days.
    pub jwt_expire_days: i64,
    /// The directory uploaded book photos are written to.
    pub file_upload_path: PathBuf,
    /// The maximum accepted photo size in bytes.
    pub max_file_upload: usize,
    /// Seconds between replenished login/register attempts per client IP.
    pub auth_rate_per_second: u64,
    /// Login/register attempts a client IP may burst.
    pub auth_rate_burst: u32,
    /// The browser origin allowed by CORS.
    pub cors_origin: String,
    /// Accounts promoted to admin on startup.
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = Zeroizing::new(
            env::var("JWT_SECRET")
                .context("JWT_SECRET must be set (generate with: openssl rand -hex 32)")?
                .into_bytes(),
        );

        if jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} bytes", MIN_SECRET_LEN);
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            jwt_secret,
            jwt_expire_days: env::var("JWT_EXPIRE_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid JWT_EXPIRE_DAYS")?,
            file_upload_path: env::var("FILE_UPLOAD_PATH")
                .unwrap_or_else(|_| "./public/uploads".to_string())
                .into(),
            max_file_upload: env::var("MAX_FILE_UPLOAD")
                .unwrap_or_else(|_| "1000000".to_string())
                .parse()
                .context("Invalid MAX_FILE_UPLOAD")?,
            auth_rate_per_second: env::var("AUTH_RATE_PER_SECOND")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("Invalid AUTH_RATE_PER_SECOND")?,
            auth_rate_burst: env::var("AUTH_RATE_BURST")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid AUTH_RATE_BURST")?,
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|list| parse_list(&list))
                .unwrap_or_default(),
        })
    }

    /// A configuration suitable for tests and local tooling.
    pub fn for_tests(file_upload_path: impl Into<PathBuf>) -> Self {
        Self {
            database_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: Zeroizing::new(b"test-secret-that-is-long-enough-for-hs256".to_vec()),
            jwt_expire_days: 1,
            file_upload_path: file_upload_path.into(),
            max_file_upload: 1_000_000,
            auth_rate_per_second: 1,
            auth_rate_burst: 1_000,
            cors_origin: "http://localhost:3000".to_string(),
            admin_emails: Vec::new(),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_skips_blanks() {
        assert_eq!(
            parse_list(" a@uni.edu, ,b@uni.edu,"),
            vec!["a@uni.edu".to_string(), "b@uni.edu".to_string()]
        );
    }
}
