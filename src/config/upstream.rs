use log::info;
use std::time::Duration;
use url::Url;

use super::ConfigError;
use crate::cli::ServeArgs;
use crate::llm::LlmConfig;

/// Candidate OpenAI-compatible endpoints. One is picked by index; there is no
/// failover between them.
pub const SERVICE_URLS: &[&str] = &[
    "https://api.gpt.ge/v1",
    "https://api.vveai.com/v1",
    "https://api.v3.cm/v1",
    "https://api.v36.cm/v1",
    "https://run.v36.cm/v1",
    "https://cf.v36.cm/v1",
];

pub const DEFAULT_SERVICE_INDEX: usize = 5;

pub fn select_base_url(override_url: Option<&str>, index: usize) -> Result<Url, ConfigError> {
    let raw = match override_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => url,
        None =>
            *SERVICE_URLS.get(index).ok_or(ConfigError::InvalidServiceIndex {
                index,
                available: SERVICE_URLS.len(),
            })?,
    };

    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

pub fn llm_config_from_args(args: &ServeArgs) -> Result<LlmConfig, ConfigError> {
    let api_key = Some(args.chat_api_key.clone()).filter(|k| !k.trim().is_empty());
    if api_key.is_none() {
        return Err(ConfigError::MissingApiKey);
    }

    let base_url = select_base_url(args.chat_base_url.as_deref(), args.service_url_index)?;
    info!("Upstream model endpoint: {}", base_url);

    Ok(LlmConfig {
        api_key,
        completion_model: Some(args.chat_model.clone()),
        base_url: Some(base_url.as_str().trim_end_matches('/').to_string()),
        request_timeout: Some(Duration::from_secs(args.max_duration_secs)).filter(|d| !d.is_zero()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_index_picks_cf_endpoint() {
        let url = select_base_url(None, DEFAULT_SERVICE_INDEX).unwrap();
        assert_eq!(url.as_str(), "https://cf.v36.cm/v1");
    }

    #[test]
    fn override_wins_over_index() {
        let url = select_base_url(Some("http://localhost:8080/v1"), 99).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let err = select_base_url(None, SERVICE_URLS.len()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServiceIndex { available: 6, .. }));
    }

    #[test]
    fn rejects_non_http_override() {
        assert!(matches!(
            select_base_url(Some("ftp://example.com"), 0),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(select_base_url(Some("not a url"), 0), Err(ConfigError::InvalidUrl { .. })));
    }
}
