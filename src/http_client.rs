use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

pub struct HttpClientConfig {
  pub http_proxy: Option<String>,
  pub user: Option<String>,
  pub pass: Option<String>,
  pub timeout: Duration,
}

impl HttpClientConfig {
  /// Redirects are not followed so 3xx responses reach the caller unchanged.
  /// Only the explicitly configured proxy is used, never the system one.
  pub fn to_client(self) -> Result<Client, reqwest::Error> {
    let HttpClientConfig {
      http_proxy,
      user,
      pass,
      timeout,
    } = self;
    let mut client_builder = reqwest::ClientBuilder::new();

    if let Some(proxy_url) = http_proxy {
      let mut proxy = reqwest::Proxy::all(proxy_url)?;

      if let (Some(user_name), Some(password)) = (user, pass) {
        proxy = proxy.basic_auth(&user_name, &password);
      }

      client_builder = client_builder.proxy(proxy);
    } else {
      client_builder = client_builder.no_proxy();
    }

    let client = client_builder.redirect(Policy::none()).timeout(timeout).build()?;

    Ok(client)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(http_proxy: Option<&str>) -> HttpClientConfig {
    HttpClientConfig {
      http_proxy: http_proxy.map(String::from),
      user: Some("user".into()),
      pass: Some("pass".into()),
      timeout: Duration::from_secs(10),
    }
  }

  #[test]
  fn builds_without_proxy() {
    assert!(config(None).to_client().is_ok());
  }

  #[test]
  fn builds_with_authenticated_proxy() {
    assert!(config(Some("http://127.0.0.1:3128")).to_client().is_ok());
  }

  #[test]
  fn rejects_malformed_proxy_url() {
    assert!(config(Some("not a url")).to_client().is_err());
  }
}
