#![allow(clippy::missing_errors_doc, dead_code, missing_docs)]
use std::time::Duration;

use anyhow::Context;
use backon::{ConstantBuilder, ExponentialBuilder, Retryable};
use rstest::fixture;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use mock_oauth_server::{ClientRegistration, Event, launch};

pub const PROJECT: &str = "oauth-test";
pub const SERVICE_ACCOUNT: &str = "system:serviceaccount:oauth-test:default";
pub const SECRET: &str = "service-account-token";

pub const FULL_FLOW: [&str; 9] = [
    "GET /oauth/authorize",
    "received challenge",
    "GET /oauth/authorize",
    "redirect to /oauth/authorize/approve",
    "form",
    "POST /oauth/authorize/approve",
    "redirect to /oauth/authorize",
    "redirect to /oauthcallback",
    "code",
];

pub fn init_tracing() {
    // should be run once, fail otherwise, we skip that error
    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    info!("Tracing initialized");
}

#[fixture]
pub async fn app() -> TestApp {
    init_tracing();
    match TestApp::start().await {
        Ok(app) => app,
        Err(error) => {
            panic!("fail to start test app: {error:?}");
        }
    }
}

/// A running mock server, aborted on drop.
#[derive(Debug)]
pub struct TestApp {
    pub url: Url,
    admin: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestApp {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding listener")?;
        let url = Url::parse(&format!("http://{}", listener.local_addr()?))?;
        let handle = tokio::spawn(async move {
            if let Err(error) = launch(listener).await {
                error!(?error, "Server launch failed");
            }
        });

        let app = Self {
            url,
            admin: reqwest::Client::new(),
            handle,
        };
        app.wait_for_health().await?;
        Ok(app)
    }

    async fn wait_for_health(&self) -> anyhow::Result<()> {
        let health = self.url.join("/health")?;
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_secs(1))
            .with_max_times(10);

        let health = &health;
        let admin = &self.admin;

        (|| async move { admin.get(health.clone()).send().await?.error_for_status() })
            .retry(backoff)
            .notify(|err, delay| debug!(?err, ?delay, "server not healthy yet"))
            .await
            .context("waiting for server health")?;
        Ok(())
    }

    pub async fn register_client(&self, client_id: &str, redirect_uri: &str) -> anyhow::Result<()> {
        let url = self.url.join(&format!("/admin/clients/{client_id}"))?;
        let registration = ClientRegistration {
            secret: SECRET.to_string(),
            redirect_uris: vec![redirect_uri.to_string()],
        };
        self.admin
            .put(url)
            .json(&registration)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn events(&self) -> anyhow::Result<Vec<Event>> {
        let events = self
            .admin
            .get(self.url.join("/admin/events")?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(events)
    }

    /// Polls the events until at least `count` are recorded, for up to 5 seconds.
    pub async fn wait_for_events(&self, count: usize) -> anyhow::Result<Vec<Event>> {
        let backoff = ConstantBuilder::default()
            .with_delay(Duration::from_millis(100))
            .with_max_times(50);

        let events = (|| async move {
            let events = self.events().await?;
            if events.len() < count {
                anyhow::bail!("{} events recorded, expected {count}", events.len());
            }
            Ok::<_, anyhow::Error>(events)
        })
        .retry(backoff)
        .await?;
        Ok(events)
    }

    pub async fn clear_events(&self) -> anyhow::Result<()> {
        self.admin
            .delete(self.url.join("/admin/events")?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
