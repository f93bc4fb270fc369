use std::time::{Duration, Instant};

use async_trait::async_trait;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Readiness check for a freshly spawned worker. Seam between the
/// supervisor and the wire, like `Spawner` is for processes.
#[async_trait]
pub(crate) trait ReadyCheck: Send + Sync + 'static {
    /// True once the worker on `port` answered, false when `timeout`
    /// elapsed first.
    async fn wait_ready(&self, port: u16, timeout: Duration) -> bool;
}

/// Polls a worker's ready endpoint over HTTP.
pub(crate) struct HttpProber {
    client: reqwest::Client,
    host: String,
}

impl HttpProber {
    pub fn new(host: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, host }
    }
}

#[async_trait]
impl ReadyCheck for HttpProber {
    async fn wait_ready(&self, port: u16, timeout: Duration) -> bool {
        let url = format!("http://{}:{}/internal/ready", self.host, port);
        let start = Instant::now();

        while start.elapsed() < timeout {
            tokio::time::sleep(POLL_INTERVAL).await;

            if let Ok(response) = self.client.get(&url).send().await
                && response.status().is_success()
            {
                return true;
            }
        }

        false
    }
}
