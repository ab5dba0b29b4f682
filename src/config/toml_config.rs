use crate::utils::error::{LookupError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Placeholder substituted with the identifier in path-templated endpoints.
pub const ID_PLACEHOLDER: &str = "{id}";

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Linux; Android 13) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub http: HttpSettings,
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub meter_actions: ActionEndpoint,
    pub customer_resolution: PathEndpoint,
    pub account_detail: PathEndpoint,
}

/// Stage 1 endpoint: a server action invoked with a POSTed JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEndpoint {
    pub url: String,
    #[serde(default = "default_action_header")]
    pub action_header: String,
    pub action_id: String,
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

fn default_action_header() -> String {
    "Next-Action".to_string()
}

/// GET endpoint with the identifier embedded in the URL path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEndpoint {
    pub url: String,
    pub headers: Option<HashMap<String, String>>,
}

impl PathEndpoint {
    /// Request URL with `identifier` substituted as one percent-encoded path segment.
    ///
    /// `.` and `..` are rejected: URL parsing resolves them (encoded or not).
    pub fn url_for(&self, identifier: &str) -> Result<Url> {
        if matches!(identifier, "" | "." | "..") {
            return Err(LookupError::ValidationError {
                message: format!("'{}' cannot be used as a URL path segment", identifier),
            });
        }

        let segment = encode_path_segment(identifier)?;
        let raw = self.url.replace(ID_PLACEHOLDER, &segment);
        Url::parse(&raw).map_err(|e| LookupError::InvalidConfigValueError {
            field: "url".to_string(),
            value: self.url.clone(),
            reason: format!("Invalid URL format: {}", e),
        })
    }
}

/// Encodes `/`, `?`, `#`, `%` and friends so the value stays inside one segment.
fn encode_path_segment(identifier: &str) -> Result<String> {
    let encoding_error = || LookupError::ValidationError {
        message: format!("could not encode '{}' as a URL path segment", identifier),
    };

    let mut scratch = Url::parse("http://localhost/").map_err(|_| encoding_error())?;
    scratch
        .path_segments_mut()
        .map_err(|_| encoding_error())?
        .pop_if_empty()
        .push(identifier);

    Ok(scratch.path().trim_start_matches('/').to_string())
}

impl LookupConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${ACTION_ID})
    fn substitute_env_vars(content: &str) -> String {
        let re = env_var_pattern();
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http.timeout_seconds)
    }
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid")
    })
}

impl Validate for LookupConfig {
    fn validate(&self) -> Result<()> {
        let endpoints = &self.endpoints;

        validation::validate_url("endpoints.meter_actions.url", &endpoints.meter_actions.url)?;
        validation::validate_non_empty_string(
            "endpoints.meter_actions.action_id",
            &endpoints.meter_actions.action_id,
        )?;
        validation::validate_non_empty_string(
            "endpoints.meter_actions.action_header",
            &endpoints.meter_actions.action_header,
        )?;

        for (field, endpoint) in [
            ("endpoints.customer_resolution.url", &endpoints.customer_resolution),
            ("endpoints.account_detail.url", &endpoints.account_detail),
        ] {
            let sample = endpoint
                .url_for("0")
                .map_err(|e| LookupError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: endpoint.url.clone(),
                    reason: e.to_string(),
                })?;
            validation::validate_url(field, sample.as_str())?;
            if !endpoint.url.contains(ID_PLACEHOLDER) {
                return Err(LookupError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: endpoint.url.clone(),
                    reason: format!("URL template must contain {}", ID_PLACEHOLDER),
                });
            }
        }

        validation::validate_range("http.timeout_seconds", self.http.timeout_seconds, 1, 300)?;
        validation::validate_non_empty_string("http.user_agent", &self.http.user_agent)?;

        Ok(())
    }
}
