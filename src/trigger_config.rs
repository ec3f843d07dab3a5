use crate::cli_args::CliArgs;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("SIT3_URL '{url}' is not a valid absolute URL: {reason}")]
  InvalidTargetUrl { url: String, reason: String },
  #[error("SIT3_URL '{0}' must use the http or https scheme")]
  UnsupportedScheme(String),
  #[error("SIT3_HEADERS_JSON must be valid JSON: {0}")]
  HeadersNotJson(#[source] serde_json::Error),
  #[error("SIT3_HEADERS_JSON must be a JSON object")]
  HeadersNotObject,
  #[error("SIT3_HEADERS_JSON contains an invalid header name '{0}'")]
  InvalidHeaderName(String),
  #[error("SIT3_HEADERS_JSON contains an invalid value for header '{0}'")]
  InvalidHeaderValue(String),
  #[error("unable to prepare log file '{}': {source}", .path.display())]
  LogPath {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("unable to build the upstream http client: {0}")]
  HttpClient(#[from] reqwest::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Header {
  pub name: HeaderName,
  pub value: HeaderValue,
}

impl TryFrom<(&str, &str)> for Header {
  type Error = ConfigError;

  fn try_from((name, value): (&str, &str)) -> Result<Self, Self::Error> {
    let header_name = HeaderName::try_from(name).map_err(|_| ConfigError::InvalidHeaderName(name.to_string()))?;
    let header_value = HeaderValue::try_from(value).map_err(|_| ConfigError::InvalidHeaderValue(name.to_string()))?;

    Ok(Header {
      name: header_name,
      value: header_value,
    })
  }
}

/// Immutable settings shared by every `/trigger` call.
#[derive(Clone, Debug)]
pub struct TriggerConfig {
  pub target_url: Url,
  pub extra_headers: Box<[Header]>,
  pub log_path: PathBuf,
  pub timeout: Duration,
  pub forward_query: bool,
}

impl TriggerConfig {
  /// Validates the raw arguments and creates the log directory if it is missing.
  pub fn from_args(args: &CliArgs) -> Result<TriggerConfig, ConfigError> {
    let target_url = parse_target_url(&args.target_url)?;
    let extra_headers = parse_extra_headers(args.headers_json.as_deref())?;
    ensure_log_dir(&args.log_path)?;

    Ok(TriggerConfig {
      target_url,
      extra_headers,
      log_path: args.log_path.clone(),
      timeout: Duration::from_secs(args.timeout_secs),
      forward_query: args.forward_query,
    })
  }
}

pub fn parse_target_url(raw: &str) -> Result<Url, ConfigError> {
  let url = Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidTargetUrl {
    url: raw.to_string(),
    reason: err.to_string(),
  })?;

  match url.scheme() {
    "http" | "https" => Ok(url),
    _ => Err(ConfigError::UnsupportedScheme(raw.to_string())),
  }
}

/// Non-string JSON values are sent as their JSON text.
pub fn parse_extra_headers(raw: Option<&str>) -> Result<Box<[Header]>, ConfigError> {
  let raw = match raw.map(str::trim) {
    Some(content) if !content.is_empty() => content,
    _ => return Ok(Box::default()),
  };

  let parsed: Value = serde_json::from_str(raw).map_err(ConfigError::HeadersNotJson)?;
  let Value::Object(entries) = parsed else {
    return Err(ConfigError::HeadersNotObject);
  };

  let headers: Vec<Header> = entries
    .iter()
    .map(|(name, value)| match value {
      Value::String(text) => Header::try_from((name.as_str(), text.as_str())),
      other => Header::try_from((name.as_str(), other.to_string().as_str())),
    })
    .collect::<Result<_, _>>()?;

  Ok(Box::from(headers))
}

fn ensure_log_dir(log_path: &Path) -> Result<(), ConfigError> {
  match log_path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(|source| ConfigError::LogPath {
      path: log_path.to_path_buf(),
      source,
    }),
    _ => Ok(()),
  }
}
