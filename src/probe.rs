// OpenUI Controller - Readiness probing
// Polls a service's HTTP endpoint until it answers 200 or the attempt budget runs out

use crate::config::ReadinessPolicy;
use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// One probe attempt; `true` only when the endpoint answered HTTP 200.
    async fn is_ready(&self, url: &str) -> bool;
}

/// HTTP GET probe
#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn is_ready(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                tracing::debug!(url, status = %resp.status(), "probe returned non-200");
                false
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "probe connection error (retrying)");
                false
            }
        }
    }
}

/// Wait for `url` to become ready
///
/// Returns the attempt number that succeeded. Sleeps `policy.interval`
/// between attempts, never after the last one.
pub async fn wait_until_ready(
    probe: &dyn ReadinessProbe,
    service: &str,
    url: &str,
    policy: &ReadinessPolicy,
) -> Result<u32> {
    tracing::info!(service, url, "waiting for readiness");

    for attempt in 1..=policy.max_attempts {
        if probe.is_ready(url).await {
            tracing::info!(service, attempt, "service is ready");
            return Ok(attempt);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    tracing::warn!(service, url, attempts = policy.max_attempts, "readiness wait timed out");
    Err(LifecycleError::ReadinessTimeout {
        service: service.to_string(),
        url: url.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct CountingProbe {
        calls: AtomicU32,
        ready_from: Option<u32>,
    }

    #[async_trait]
    impl ReadinessProbe for CountingProbe {
        async fn is_ready(&self, _url: &str) -> bool {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.ready_from.is_some_and(|from| call >= from)
        }
    }

    /// Serve one canned HTTP response per connection
    async fn canned_server(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}/api/tags")
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_thirty_attempts_one_second_apart() {
        let probe = CountingProbe {
            calls: AtomicU32::new(0),
            ready_from: None,
        };
        let policy = ReadinessPolicy::default();
        let started = tokio::time::Instant::now();

        let err = wait_until_ready(&probe, "Ollama", "http://localhost:11434/api/tags", &policy)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 30);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(29), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(30), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn returns_the_successful_attempt() {
        let probe = CountingProbe {
            calls: AtomicU32::new(0),
            ready_from: Some(4),
        };

        let attempt = wait_until_ready(&probe, "WebUI", "http://localhost:8080", &ReadinessPolicy::default())
            .await
            .unwrap();

        assert_eq!(attempt, 4);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn http_probe_accepts_only_200() {
        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();

        let ok_url = canned_server("HTTP/1.1 200 OK").await;
        let not_found_url = canned_server("HTTP/1.1 404 Not Found").await;

        assert!(probe.is_ready(&ok_url).await);
        assert!(!probe.is_ready(&not_found_url).await);
    }

    #[tokio::test]
    async fn http_probe_treats_refused_connection_as_not_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(Duration::from_millis(500)).unwrap();
        assert!(!probe.is_ready(&format!("http://{addr}/")).await);
    }
}
