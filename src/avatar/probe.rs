// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Liveness checks for cached avatar URLs.

use std::future::Future;
use std::time::Duration;

use url::Url;

use super::error::ValidationFailure;

/// Default deadline for one liveness check.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Checks whether a cached URL still resolves.
pub trait LivenessProbe: Send + Sync {
    fn check(&self, url: &str) -> impl Future<Output = Result<(), ValidationFailure>> + Send;
}

/// HEAD-request probe over HTTP(S).
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Probe sharing an existing client; `timeout` is applied per request.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl LivenessProbe for HttpProbe {
    async fn check(&self, url: &str) -> Result<(), ValidationFailure> {
        let parsed = Url::parse(url).map_err(|e| ValidationFailure::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationFailure::InvalidUrl(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .head(parsed)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ValidationFailure::Timeout(self.timeout)
                } else {
                    ValidationFailure::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ValidationFailure::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve() -> String {
        let app = Router::new()
            .route("/ok.jpg", get(|| async { "image" }))
            .route("/gone.jpg", get(|| async { StatusCode::NOT_FOUND }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn success_status_is_valid() {
        let base = serve().await;
        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        assert_eq!(probe.check(&format!("{base}/ok.jpg")).await, Ok(()));
    }

    #[tokio::test]
    async fn not_found_is_invalid() {
        let base = serve().await;
        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        assert_eq!(
            probe.check(&format!("{base}/gone.jpg")).await,
            Err(ValidationFailure::Status(404))
        );
    }

    #[tokio::test]
    async fn malformed_url_is_invalid() {
        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            probe.check("not a url").await,
            Err(ValidationFailure::InvalidUrl(_))
        ));
        assert!(matches!(
            probe.check("ftp://cdn.example.com/a.jpg").await,
            Err(ValidationFailure::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            probe.check(&format!("http://{addr}/a.jpg")).await,
            Err(ValidationFailure::Unreachable(_))
        ));
    }
}
