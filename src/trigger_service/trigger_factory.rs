use crate::trigger_config::TriggerConfig;
use crate::trigger_log::LogSink;
use crate::trigger_service::trigger_route_service::TriggerRouteService;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::Error;
use futures_core::future::LocalBoxFuture;
use reqwest::Client;
use std::sync::Arc;

pub struct TriggerRouteServiceFactory {
  pub config: Arc<TriggerConfig>,
  pub http_client: Client,
  pub log_sink: Arc<LogSink>,
}

impl ServiceFactory<ServiceRequest> for TriggerRouteServiceFactory {
  type Response = ServiceResponse;
  type Error = Error;
  type Config = ();
  type Service = TriggerRouteService;
  type InitError = ();
  type Future = LocalBoxFuture<'static, Result<Self::Service, Self::InitError>>;

  fn new_service(&self, _: Self::Config) -> Self::Future {
    let service = TriggerRouteService {
      config: self.config.clone(),
      http_client: self.http_client.clone(),
      log_sink: self.log_sink.clone(),
    };

    Box::pin(async move { Ok(service) })
  }
}

impl TriggerRouteServiceFactory {
  pub fn create(http_client: Client, config: Arc<TriggerConfig>, log_sink: Arc<LogSink>) -> Self {
    Self {
      config,
      http_client,
      log_sink,
    }
  }
}
