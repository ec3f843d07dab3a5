use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
struct HealthStatus {
  status: &'static str,
}

pub async fn health() -> HttpResponse {
  HttpResponse::Ok().json(HealthStatus { status: "ok" })
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::{test, web, App};

  #[actix_web::test]
  async fn reports_ok() {
    let app = test::init_service(App::new().route("/health", web::get().to(health))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
  }
}
