use std::env;
use std::time::Duration;

use crate::chat::{ContextMode, WireFormat};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub wire_format: WireFormat,
    pub context_mode: ContextMode,
    pub connect_timeout: Duration,
}

impl AppConfig {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
            wire_format: WireFormat::default(),
            context_mode: ContextMode::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_or_default<T>(var: &str) -> T
where
    T: std::str::FromStr<Err = String> + Default,
{
    match env::var(var) {
        Ok(value) => value.parse().unwrap_or_else(|e: String| {
            tracing::warn!("Ignoring {}: {}", var, e);
            T::default()
        }),
        Err(_) => T::default(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let api_url =
            env::var("HNCHAT_API_URL").unwrap_or_else(|_| "http://localhost:8000/api".to_string());
        let token = env::var("HNCHAT_TOKEN").ok().filter(|t| !t.trim().is_empty());
        let wire_format = parse_or_default::<WireFormat>("HNCHAT_WIRE_FORMAT");
        let context_mode = parse_or_default::<ContextMode>("HNCHAT_CONTEXT");
        let connect_timeout = env::var("HNCHAT_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(10));

        Self {
            token,
            wire_format,
            context_mode,
            connect_timeout,
            ..Self::new(&api_url)
        }
    }
}
