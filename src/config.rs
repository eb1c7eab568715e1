//! # Configuration Management
//!
//! Configuration comes from the environment (12-factor style), with a `.env`
//! file picked up for local development.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 8080)
//! - `RP_ID`: WebAuthn Relying Party ID (usually your domain)
//! - `RP_ORIGIN`: WebAuthn Relying Party Origin (full URL)
//! - `RP_NAME`: Human-readable name for your service
//! - `TIMEOUT_MS`: Ceremony timeout handed to the browser (advisory)
//! - `CHALLENGE_TTL_SECS`: Maximum challenge age at finish time, `0` disables
//! - `USER_VERIFICATION`: `preferred`, `required` or `discouraged`

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::Serialize;
use std::env;
use std::str::FromStr;
use url::Url;

/// Application configuration
///
/// ## WebAuthn Terminology
/// - **RP (Relying Party)**: the application that relies on the authentication
/// - **RP ID**: your domain name (e.g., "example.com" or "localhost")
/// - **RP Origin**: full URL of the application (e.g., "https://example.com")
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host/IP address to bind to
    pub host: String,

    pub port: u16,

    /// WebAuthn Relying Party ID
    /// Must be the domain the app is served from, without scheme or port
    pub rp_id: String,

    /// WebAuthn Relying Party Origin
    /// For local development: "http://localhost:8080"
    pub rp_origin: String,

    /// Shown to users during passkey creation
    pub rp_name: String,

    /// Advisory ceremony timeout in milliseconds
    /// Passed to the browser; the server does not enforce it
    pub timeout_ms: u64,

    /// Maximum age of a challenge when the ceremony finishes, in seconds
    /// 0 means challenges never expire
    pub challenge_ttl_secs: u64,

    pub user_verification: UserVerification,
}

/// User verification policy (PIN, biometric) requested from the authenticator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    /// Verifier rejects responses without the UV flag
    Required,
    Preferred,
    Discouraged,
}

impl FromStr for UserVerification {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(UserVerification::Required),
            "preferred" => Ok(UserVerification::Preferred),
            "discouraged" => Ok(UserVerification::Discouraged),
            other => bail!("unknown user verification policy '{other}'"),
        }
    }
}

/// Relying party parameters the ceremonies run with
///
/// Built from a validated `Config`. `origin` is normalized to
/// `scheme://host[:port]`, the exact form browsers put in client data.
#[derive(Debug, Clone)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
    pub origin: String,
    pub timeout_ms: u64,
    pub user_verification: UserVerification,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// ## Example .env file
    /// ```text
    /// HOST=127.0.0.1
    /// PORT=8080
    /// RP_ID=localhost
    /// RP_ORIGIN=http://localhost:8080
    /// RP_NAME=Passkey Demo
    /// TIMEOUT_MS=60000
    /// CHALLENGE_TTL_SECS=300
    /// USER_VERIFICATION=preferred
    /// ```
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
            rp_id: env::var("RP_ID").unwrap_or_else(|_| "localhost".to_string()),
            rp_origin: env::var("RP_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            rp_name: env::var("RP_NAME").unwrap_or_else(|_| "Passkey Demo".to_string()),
            timeout_ms: env::var("TIMEOUT_MS")
                .unwrap_or_else(|_| "60000".to_string())
                .parse()
                .context("TIMEOUT_MS must be a number of milliseconds")?,
            challenge_ttl_secs: env::var("CHALLENGE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("CHALLENGE_TTL_SECS must be a number of seconds")?,
            user_verification: env::var("USER_VERIFICATION")
                .unwrap_or_else(|_| "preferred".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ceremonies cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.rp_id.trim().is_empty() {
            bail!("RP_ID must be configured");
        }
        if self.rp_name.trim().is_empty() {
            bail!("RP_NAME must be configured");
        }
        if self.rp_origin.trim().is_empty() {
            bail!("RP_ORIGIN must be configured");
        }
        if self.timeout_ms == 0 {
            bail!("TIMEOUT_MS must be greater than 0");
        }
        self.normalized_origin()?;
        Ok(())
    }

    pub fn relying_party(&self) -> Result<RelyingParty> {
        Ok(RelyingParty {
            id: self.rp_id.trim().to_string(),
            name: self.rp_name.trim().to_string(),
            origin: self.normalized_origin()?,
            timeout_ms: self.timeout_ms,
            user_verification: self.user_verification,
        })
    }

    /// `None` when expiry is disabled
    pub fn challenge_max_age(&self) -> Option<Duration> {
        match self.challenge_ttl_secs {
            0 => None,
            secs => Some(Duration::seconds(secs as i64)),
        }
    }

    /// Combines host and port into "127.0.0.1:8080" form for the TCP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn normalized_origin(&self) -> Result<String> {
        let url = Url::parse(self.rp_origin.trim())
            .with_context(|| format!("RP_ORIGIN '{}' is not a valid URL", self.rp_origin))?;
        if url.host_str().is_none() {
            bail!("RP_ORIGIN '{}' has no host", self.rp_origin);
        }
        Ok(url.origin().ascii_serialization())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rp_id: "localhost".to_string(),
            rp_origin: "http://localhost:8080/".to_string(),
            rp_name: "Passkey Demo".to_string(),
            timeout_ms: 60_000,
            challenge_ttl_secs: 300,
            user_verification: UserVerification::Preferred,
        }
    }

    #[test]
    fn origin_is_normalized() {
        let rp = config().relying_party().unwrap();
        assert_eq!(rp.origin, "http://localhost:8080");

        let mut https = config();
        https.rp_origin = "https://example.com:443/login".to_string();
        assert_eq!(https.relying_party().unwrap().origin, "https://example.com");
    }

    #[test]
    fn validation_rejects_blank_and_invalid_values() {
        let mut blank_id = config();
        blank_id.rp_id = "  ".to_string();
        assert!(blank_id.validate().is_err());

        let mut zero_timeout = config();
        zero_timeout.timeout_ms = 0;
        assert!(zero_timeout.validate().is_err());

        let mut bad_origin = config();
        bad_origin.rp_origin = "not a url".to_string();
        assert!(bad_origin.validate().is_err());

        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let mut cfg = config();
        assert_eq!(cfg.challenge_max_age(), Some(Duration::minutes(5)));
        cfg.challenge_ttl_secs = 0;
        assert_eq!(cfg.challenge_max_age(), None);
    }

    #[test]
    fn user_verification_parses_case_insensitively() {
        assert_eq!(
            "Required".parse::<UserVerification>().unwrap(),
            UserVerification::Required
        );
        assert!("sometimes".parse::<UserVerification>().is_err());
    }
}
