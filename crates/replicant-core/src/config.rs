use std::{env, net::SocketAddr, path::PathBuf};

use crate::{
    model::ReplicateOptions,
    predictions::{DEFAULT_BASE_URL, PollPolicy},
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_bind: SocketAddr,
    pub model_provider: String,
    pub replicate_api_token: Option<String>,
    pub replicate_base_url: String,
    pub replicate: ReplicateOptions,
    pub summarize_template_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` reads the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = lookup("PORT").unwrap_or_else(|| "8080".to_owned());
        let http_bind = lookup("HTTP_BIND").unwrap_or_else(|| format!("0.0.0.0:{port}"));
        let http_bind = http_bind.parse()?;

        let defaults = ReplicateOptions::default();
        let poll_defaults = PollPolicy::default();
        let replicate = ReplicateOptions {
            temperature: parse_or(&lookup, "REPLICATE_TEMPERATURE", defaults.temperature),
            completion_model_name: lookup("REPLICATE_COMPLETION_MODEL")
                .unwrap_or(defaults.completion_model_name),
            embeddings_model_name: lookup("REPLICATE_EMBEDDINGS_MODEL")
                .unwrap_or(defaults.embeddings_model_name),
            dimensions: parse_or(&lookup, "REPLICATE_DIMENSIONS", defaults.dimensions),
            poll: PollPolicy {
                // Zero would turn polling into a busy loop against the provider.
                interval_ms: parse_opt(&lookup, "REPLICATE_POLL_INTERVAL_MS")
                    .filter(|&interval_ms: &u64| interval_ms > 0)
                    .unwrap_or(poll_defaults.interval_ms),
                max_attempts: parse_opt(&lookup, "REPLICATE_MAX_POLL_ATTEMPTS"),
                max_wait_sec: parse_opt(&lookup, "REPLICATE_MAX_WAIT_SEC"),
            },
        };

        Ok(Self {
            http_bind,
            model_provider: lookup("MODEL_PROVIDER").unwrap_or_else(|| "auto".to_owned()),
            replicate_api_token: lookup("REPLICATE_API_TOKEN")
                .filter(|token| !token.trim().is_empty()),
            replicate_base_url: lookup("REPLICATE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            replicate,
            summarize_template_path: lookup("SUMMARIZE_TEMPLATE_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    parse_opt(lookup, name).unwrap_or(default)
}

fn parse_opt<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    lookup(name).and_then(|raw| raw.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::AppConfig;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned()).expect("config should load")
    }

    #[test]
    fn defaults_match_replicate_adapter_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.http_bind.to_string(), "0.0.0.0:8080");
        assert_eq!(config.model_provider, "auto");
        assert!(config.replicate_api_token.is_none());
        assert_eq!(config.replicate_base_url, "https://api.replicate.com/v1");
        assert_eq!(config.replicate.temperature, 0.01);
        assert_eq!(config.replicate.completion_model_name, "replicate/vicuna-13b");
        assert_eq!(
            config.replicate.embeddings_model_name,
            "creatorrr/all-mpnet-base-v2"
        );
        assert_eq!(config.replicate.dimensions, 384);
        assert_eq!(config.replicate.poll.interval_ms, 1_000);
        assert_eq!(config.replicate.poll.max_attempts, None);
        assert_eq!(config.replicate.poll.max_wait_sec, None);
        assert!(config.summarize_template_path.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("MODEL_PROVIDER", "replicate"),
            ("REPLICATE_API_TOKEN", "r8_abc"),
            ("REPLICATE_TEMPERATURE", "0.5"),
            ("REPLICATE_COMPLETION_MODEL", "meta/llama-2-7b-chat"),
            ("REPLICATE_DIMENSIONS", "768"),
            ("REPLICATE_POLL_INTERVAL_MS", "250"),
            ("REPLICATE_MAX_POLL_ATTEMPTS", "40"),
            ("REPLICATE_MAX_WAIT_SEC", "120"),
            ("SUMMARIZE_TEMPLATE_PATH", "/etc/replicant/summarize.json"),
        ]);

        assert_eq!(config.http_bind.port(), 9000);
        assert_eq!(config.model_provider, "replicate");
        assert_eq!(config.replicate_api_token.as_deref(), Some("r8_abc"));
        assert_eq!(config.replicate.temperature, 0.5);
        assert_eq!(config.replicate.completion_model_name, "meta/llama-2-7b-chat");
        assert_eq!(config.replicate.dimensions, 768);
        assert_eq!(config.replicate.poll.interval_ms, 250);
        assert_eq!(config.replicate.poll.max_attempts, Some(40));
        assert_eq!(config.replicate.poll.max_wait_sec, Some(120));
        assert!(config.summarize_template_path.is_some());
    }

    #[test]
    fn invalid_numbers_fall_back_and_blank_token_is_ignored() {
        let config = config_from(&[
            ("REPLICATE_TEMPERATURE", "warm"),
            ("REPLICATE_MAX_POLL_ATTEMPTS", "-1"),
            ("REPLICATE_API_TOKEN", "  "),
        ]);

        assert_eq!(config.replicate.temperature, 0.01);
        assert_eq!(config.replicate.poll.max_attempts, None);
        assert!(config.replicate_api_token.is_none());
    }

    #[test]
    fn zero_poll_interval_falls_back_to_default() {
        let config = config_from(&[("REPLICATE_POLL_INTERVAL_MS", "0")]);
        assert_eq!(config.replicate.poll.interval_ms, 1_000);
    }

    #[test]
    fn bad_bind_address_is_an_error() {
        let result = AppConfig::from_lookup(|name| {
            (name == "HTTP_BIND").then(|| "not-an-address".to_owned())
        });
        assert!(result.is_err());
    }
}
