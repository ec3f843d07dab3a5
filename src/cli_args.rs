use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

pub const DEFAULT_LOG_PATH: &str = "logs/trigger.log";

/// Every option can be given as a flag or through its environment variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "trigger_proxy", version, about = "Forwards GET /trigger to a fixed upstream URL")]
pub struct CliArgs {
  /// Upstream URL that /trigger forwards to.
  #[arg(long, env = "SIT3_URL")]
  pub target_url: String,

  /// JSON object of extra headers attached to every upstream request.
  #[arg(long, env = "SIT3_HEADERS_JSON")]
  pub headers_json: Option<String>,

  #[arg(long, env = "SIT3_LOG_PATH", default_value = DEFAULT_LOG_PATH)]
  pub log_path: PathBuf,

  /// Upstream request timeout in seconds.
  #[arg(long, env = "SIT3_TIMEOUT_SECS", default_value_t = 10)]
  pub timeout_secs: u64,

  /// Append the inbound query string to the upstream request.
  #[arg(long, env = "SIT3_FORWARD_QUERY", default_value_t = false)]
  pub forward_query: bool,

  #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0")]
  pub bind: String,

  #[arg(long, env = "HTTP_PORT", default_value_t = 8000)]
  pub port: u16,

  #[arg(long, env = "HTTP_WORKER_COUNT", default_value_t = 4)]
  pub workers: usize,

  #[arg(long, env = "HTTP_PROXY_URL")]
  pub proxy_url: Option<String>,

  #[arg(long, env = "HTTP_PROXY_USER")]
  pub proxy_user: Option<String>,

  #[arg(long, env = "HTTP_PROXY_PASS")]
  pub proxy_pass: Option<String>,

  #[arg(long, env = "LOG_LEVEL", default_value = "info")]
  pub log_level: LevelFilter,
}
