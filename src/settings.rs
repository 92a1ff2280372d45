use crate::poller::DEFAULT_POLL_INTERVAL;
use config::ConfigError;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub image_url: String,
    pub product_name: String,
    pub highlight: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub poll_interval_ms: u64,
    /// Saved session token from a previous login.
    pub token: Option<String>,
    /// Identity-provider token used to sign in when no session token is saved.
    pub id_token: Option<String>,
    /// Job to submit before watching, when an image url is configured.
    pub job: Option<JobSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let poll_interval_ms = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::Message(format!("POLL_INTERVAL_MS={:?}: {}", raw, e))
            })?,
            None => DEFAULT_POLL_INTERVAL.as_millis() as u64,
        };
        if poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let job = match lookup("VIDGEN_IMAGE_URL").filter(|v| !v.is_empty()) {
            Some(image_url) => Some(JobSettings {
                image_url,
                product_name: lookup("VIDGEN_PRODUCT_NAME").unwrap_or_default(),
                highlight: lookup("VIDGEN_HIGHLIGHT").unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Settings {
            api_url: lookup("VIDGEN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            poll_interval_ms,
            token: lookup("VIDGEN_TOKEN").filter(|v| !v.is_empty()),
            id_token: lookup("VIDGEN_ID_TOKEN").filter(|v| !v.is_empty()),
            job,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.api_url, DEFAULT_API_URL);
        assert_eq!(s.poll_interval(), Duration::from_millis(5000));
        assert!(s.token.is_none());
        assert!(s.job.is_none());
    }

    #[test]
    fn reads_job_when_image_is_set() {
        let s = settings(&[
            ("VIDGEN_IMAGE_URL", "https://img.host/p.png"),
            ("VIDGEN_PRODUCT_NAME", "Serum"),
            ("VIDGEN_HIGHLIGHT", "glow"),
        ])
        .unwrap();
        assert_eq!(
            s.job,
            Some(JobSettings {
                image_url: "https://img.host/p.png".into(),
                product_name: "Serum".into(),
                highlight: "glow".into(),
            })
        );

        let s = settings(&[("VIDGEN_PRODUCT_NAME", "Serum")]).unwrap();
        assert!(s.job.is_none());
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("VIDGEN_API_URL", "https://api.example.com"),
            ("POLL_INTERVAL_MS", "2500"),
            ("VIDGEN_TOKEN", "jwt"),
            ("VIDGEN_ID_TOKEN", ""),
        ])
        .unwrap();
        assert_eq!(s.api_url, "https://api.example.com");
        assert_eq!(s.poll_interval_ms, 2500);
        assert_eq!(s.token.as_deref(), Some("jwt"));
        assert!(s.id_token.is_none());
    }

    #[test]
    fn rejects_bad_interval() {
        assert!(settings(&[("POLL_INTERVAL_MS", "soon")]).is_err());
        assert!(settings(&[("POLL_INTERVAL_MS", "0")]).is_err());
    }
}
