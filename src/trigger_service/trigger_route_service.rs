use crate::trigger_config::TriggerConfig;
use crate::trigger_log::{LogEntry, LogSink, RequestContext};
use crate::trigger_service::upstream::{UpstreamError, UpstreamReply};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse};
use actix_web::web::Query;
use actix_web::{dev, Error, HttpRequest};
use futures_core::future::LocalBoxFuture;
use log::{debug, warn};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Url};
use std::sync::Arc;

pub struct TriggerRouteService {
  pub(super) config: Arc<TriggerConfig>,
  pub(super) http_client: Client,
  pub(super) log_sink: Arc<LogSink>,
}

impl Service<ServiceRequest> for TriggerRouteService {
  type Response = ServiceResponse;
  type Error = Error;
  type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

  dev::always_ready!();

  fn call(&self, req: ServiceRequest) -> Self::Future {
    let (http_request, _) = req.into_parts();
    let context = RequestContext::capture(&http_request);
    let upstream_request = self.init_request(&http_request);
    let target_url = self.config.target_url.clone();
    let log_sink = self.log_sink.clone();

    Box::pin(TriggerRouteService::exec(
      upstream_request,
      http_request,
      context,
      target_url,
      log_sink,
    ))
  }
}

impl TriggerRouteService {
  async fn exec(
    builder: RequestBuilder,
    http: HttpRequest,
    context: RequestContext,
    target_url: Url,
    log_sink: Arc<LogSink>,
  ) -> Result<ServiceResponse, Error> {
    let outcome = match builder.send().await {
      Ok(response) => UpstreamReply::read(response).await,
      Err(err) => Err(UpstreamError::from(err)),
    };

    let (entry, response) = match outcome {
      Ok(reply) => {
        debug!("Upstream {} answered {}", target_url, reply.status);
        let entry = LogEntry::success(
          context,
          target_url.as_str(),
          reply.status.as_u16(),
          reply.headers.iter(),
          &reply.body,
        );
        (entry, reply.to_http_response())
      }
      Err(err) => {
        warn!("Upstream request to {} failed: {}", target_url, err);
        let entry = LogEntry::failure(context, target_url.as_str(), err.kind().as_str(), err.message());
        (entry, err.to_http_response(target_url.as_str()))
      }
    };

    log_sink.append(&entry);

    Ok(ServiceResponse::new(http, response))
  }

  /// Caller headers are not forwarded; only the configured extra headers are.
  fn init_request(&self, source_request: &HttpRequest) -> RequestBuilder {
    let mut builder = self.http_client.get(self.config.target_url.clone());

    if self.config.forward_query && !source_request.query_string().is_empty() {
      match Query::<Vec<(String, String)>>::from_query(source_request.query_string()) {
        Ok(query_params) => {
          builder = builder.query(&query_params.into_inner());
        }
        Err(err) => {
          warn!("Unable to parse query parameters {}", err);
        }
      }
    }

    if !self.config.extra_headers.is_empty() {
      let mut header_map = HeaderMap::new();

      for header in self.config.extra_headers.iter() {
        header_map.append(&header.name, header.value.clone());
      }

      builder = builder.headers(header_map);
    }

    builder
  }
}
