mod cli_args;
mod health;
mod http_client;
mod routes;
mod std_logger;
mod trigger_config;
mod trigger_log;
mod trigger_service;

use actix_web::{App, HttpServer};
use clap::Parser;
use cli_args::CliArgs;
use http_client::HttpClientConfig;
use log::info;
use routes::AppState;
use std::io::{ErrorKind, Result};
use std::sync::Arc;
use std_logger::StdLogger;
use trigger_config::{ConfigError, TriggerConfig};
use trigger_log::LogSink;

#[actix_web::main]
async fn main() -> Result<()> {
  let args = CliArgs::parse();

  StdLogger::init(args.log_level).map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;

  let state = build_state(&args).map_err(|err| {
    log::error!("{}", err);
    std::io::Error::new(ErrorKind::Other, err)
  })?;

  info!(
    "Forwarding GET /trigger to '{}' with {} extra header(s), logging to '{}'.",
    state.config.target_url,
    state.config.extra_headers.len(),
    state.log_sink.path().display()
  );
  info!("Listening on {}:{} with {} workers.", args.bind, args.port, args.workers);

  HttpServer::new(move || {
    let state = state.clone();
    App::new().configure(move |cfg| state.configure(cfg))
  })
  .workers(args.workers)
  .bind((args.bind.as_str(), args.port))?
  .run()
  .await
}

fn build_state(args: &CliArgs) -> std::result::Result<AppState, ConfigError> {
  let config = TriggerConfig::from_args(args)?;

  let http_client = HttpClientConfig {
    http_proxy: args.proxy_url.clone(),
    user: args.proxy_user.clone(),
    pass: args.proxy_pass.clone(),
    timeout: config.timeout,
  }
  .to_client()?;

  let log_sink = LogSink::open(&config.log_path).map_err(|source| ConfigError::LogPath {
    path: config.log_path.clone(),
    source,
  })?;

  Ok(AppState {
    config: Arc::new(config),
    http_client,
    log_sink: Arc::new(log_sink),
  })
}
