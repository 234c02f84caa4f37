use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// The sample secret from `.env.example`, which MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string"];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Browser origin allowed by CORS; any origin when unset.
    pub client_origin: Option<String>,
    pub gemini_api_key: String,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
}

impl Config {
    /// Read configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("SOLACE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SOLACE_JWT_SECRET is unset or still a placeholder");
        }

        let gemini_api_key = get("GEMINI_API_KEY")
            .filter(|k| !k.is_empty())
            .context("GEMINI_API_KEY is required")?;

        let host = get("SOLACE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("SOLACE_PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("SOLACE_PORT is not a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path: get("SOLACE_DB_PATH").unwrap_or_else(|| "solace.db".into()).into(),
            addr,
            client_origin: get("SOLACE_CLIENT_ORIGIN").filter(|o| !o.is_empty()),
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").filter(|m| !m.is_empty()),
            gemini_base_url: get("GEMINI_BASE_URL").filter(|u| !u.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("SOLACE_JWT_SECRET", "s3cret"), ("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("solace.db"));
        assert!(cfg.client_origin.is_none());
        assert!(cfg.gemini_model.is_none());
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(config(&[("SOLACE_JWT_SECRET", "change-me-to-a-random-string"), ("GEMINI_API_KEY", "k")]).is_err());
        assert!(config(&[("GEMINI_API_KEY", "k")]).is_err());
    }

    #[test]
    fn sample_env_file_secret_is_refused() {
        let sample = include_str!("../../../.env.example");
        let secret = sample
            .lines()
            .find_map(|l| l.strip_prefix("SOLACE_JWT_SECRET="))
            .unwrap();
        assert!(PLACEHOLDER_SECRETS.contains(&secret));
    }

    #[test]
    fn api_key_and_port_are_checked() {
        assert!(config(&[("SOLACE_JWT_SECRET", "s3cret")]).is_err());
        assert!(config(&[("SOLACE_JWT_SECRET", "s3cret"), ("GEMINI_API_KEY", "k"), ("SOLACE_PORT", "http")]).is_err());

        let cfg = config(&[
            ("SOLACE_JWT_SECRET", "s3cret"),
            ("GEMINI_API_KEY", "k"),
            ("SOLACE_HOST", "127.0.0.1"),
            ("SOLACE_PORT", "8080"),
            ("SOLACE_CLIENT_ORIGIN", "http://localhost:5173"),
        ])
        .unwrap();
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(cfg.client_origin.as_deref(), Some("http://localhost:5173"));
    }
}
