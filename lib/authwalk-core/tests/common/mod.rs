use axum::Router;
use axum::http::HeaderMap;
use tokio::task::JoinHandle;
use tracing::info;
use url::Url;

use authwalk_core::callback::CallbackServer;
use authwalk_core::{ClientConfig, ClientConfigBuilder};

/// `Basic` credentials of `harold:any-pass`.
pub const HAROLD: &str = "Basic aGFyb2xkOmFueS1wYXNz";

pub fn init_tracing() {
    // should be run once, fail otherwise, we skip that error
    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    info!("Tracing initialized");
}

/// An ad-hoc authorization server, aborted on drop.
pub struct StubServer {
    pub url: Url,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(router: Router) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let url = Url::parse(&format!("http://{}", listener.local_addr()?))?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { url, handle })
    }

    pub fn client(&self, callback: &CallbackServer) -> anyhow::Result<ClientConfig> {
        let config = ClientConfigBuilder::for_server("test-client", &self.url)?
            .with_client_secret("test-secret")
            .with_redirect_url(callback.redirect_url().as_str())
            .add_scope("user:info")
            .build()?;
        Ok(config)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
