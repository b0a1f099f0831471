//! HTTP probe backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};

use crate::error::Result;
use crate::port::{HttpProbe, ProbeError, ProbeResponse};

/// Probe that issues real HTTP GET requests.
///
/// Redirects are not followed: a `302` to a login page is itself proof
/// that the service is serving.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    /// Create a probe whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("stagehand/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn classify(error: &reqwest::Error) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout(error.to_string())
    } else if error.is_connect() {
        ProbeError::Connect(error.to_string())
    } else {
        ProbeError::Other(error.to_string())
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> std::result::Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        // A body that fails mid-read still carries a usable status.
        let body = response.text().await.unwrap_or_default();
        Ok(ProbeResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_is_classified_as_connect() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let probe = ReqwestProbe::new(Duration::from_secs(2)).unwrap();
        let err = probe
            .get(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn reads_status_without_following_redirects() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 302 Found\r\nLocation: /login\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .await
                .unwrap();
        });

        let probe = ReqwestProbe::new(Duration::from_secs(2)).unwrap();
        let response = probe.get(&format!("http://{addr}/")).await.unwrap();
        assert_eq!(response.status, 302);
    }
}
