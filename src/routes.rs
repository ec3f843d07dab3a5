use crate::health;
use crate::trigger_config::TriggerConfig;
use crate::trigger_log::LogSink;
use crate::trigger_service::trigger_factory::TriggerRouteServiceFactory;
use actix_web::{guard, web};
use reqwest::Client;
use std::sync::Arc;

/// Shared, read-only dependencies handed to every worker.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<TriggerConfig>,
  pub http_client: Client,
  pub log_sink: Arc<LogSink>,
}

impl AppState {
  pub fn configure(&self, cfg: &mut web::ServiceConfig) {
    let trigger_factory =
      TriggerRouteServiceFactory::create(self.http_client.clone(), self.config.clone(), self.log_sink.clone());

    cfg
      .service(web::resource("/health").route(web::get().to(health::health)))
      .service(web::service("/trigger").guard(guard::Get()).finish(trigger_factory));
  }
}
