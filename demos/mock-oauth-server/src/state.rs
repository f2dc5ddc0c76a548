use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;
use url::Url;

/// Reason of the warning recorded when a client has no usable redirect URI.
pub const NO_REDIRECT_URIS_REASON: &str = "NoSAOAuthRedirectURIs";

/// A client, as registered through the admin endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub secret: String,
    pub redirect_uris: Vec<String>,
}

/// A warning recorded by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub reason: String,
    pub client_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub(crate) struct IssuedCode {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

#[derive(Debug, Default)]
struct Registry {
    clients: HashMap<String, ClientRegistration>,
    grants: HashSet<(String, String)>,
    codes: HashMap<String, IssuedCode>,
    events: Vec<Event>,
}

/// The application state
#[derive(Debug, Clone, Default)]
pub(crate) struct AppState {
    registry: Arc<RwLock<Registry>>,
}

impl AppState {
    pub(crate) async fn register(&self, client_id: String, registration: ClientRegistration) {
        let mut registry = self.registry.write().await;
        registry
            .grants
            .retain(|(_, granted_client)| *granted_client != client_id);
        registry.clients.insert(client_id, registration);
    }

    pub(crate) async fn client(&self, client_id: &str) -> Option<ClientRegistration> {
        self.registry.read().await.clients.get(client_id).cloned()
    }

    /// Keeps the absolute `http`/`https` redirect URIs of a client.
    ///
    /// Records a warning event when none is left.
    pub(crate) async fn valid_redirect_uris(
        &self,
        client_id: &str,
        registration: &ClientRegistration,
    ) -> Vec<String> {
        let mut problems = Vec::new();
        let mut valid = Vec::new();
        for uri in &registration.redirect_uris {
            match Url::parse(uri) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => valid.push(uri.clone()),
                Ok(_) => {}
                Err(error) => problems.push(format!("parse {uri}: {error}")),
            }
        }
        if !valid.is_empty() {
            return valid;
        }

        let summary = format!(
            "{client_id} has no redirectURIs; register at least one absolute http(s) redirect URI"
        );
        let message = if problems.is_empty() {
            summary
        } else {
            problems.push(summary);
            format!("[{}]", problems.join(", "))
        };
        warn!(%client_id, %message, "client without usable redirect URI");

        self.registry.write().await.events.push(Event {
            reason: NO_REDIRECT_URIS_REASON.to_string(),
            client_id: client_id.to_string(),
            message,
        });
        valid
    }

    pub(crate) async fn is_granted(&self, username: &str, client_id: &str) -> bool {
        self.registry
            .read()
            .await
            .grants
            .contains(&(username.to_string(), client_id.to_string()))
    }

    pub(crate) async fn grant(&self, username: &str, client_id: &str) {
        self.registry
            .write()
            .await
            .grants
            .insert((username.to_string(), client_id.to_string()));
    }

    pub(crate) async fn issue_code(&self, issued: IssuedCode) -> String {
        let code = uuid::Uuid::new_v4().simple().to_string();
        self.registry
            .write()
            .await
            .codes
            .insert(code.clone(), issued);
        code
    }

    /// Codes are single use.
    pub(crate) async fn redeem_code(&self, code: &str) -> Option<IssuedCode> {
        self.registry.write().await.codes.remove(code)
    }

    pub(crate) async fn events(&self) -> Vec<Event> {
        self.registry.read().await.events.clone()
    }

    pub(crate) async fn clear_events(&self) {
        self.registry.write().await.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(redirect_uri: &str) -> ClientRegistration {
        ClientRegistration {
            secret: "secret".to_string(),
            redirect_uris: vec![redirect_uri.to_string()],
        }
    }

    #[tokio::test]
    async fn should_keep_http_redirect_uris() {
        let state = AppState::default();

        let valid = state
            .valid_redirect_uris("client", &registration("http://127.0.0.1:1234/oauthcallback"))
            .await;

        assert_eq!(valid, vec!["http://127.0.0.1:1234/oauthcallback"]);
        assert!(state.events().await.is_empty());
    }

    #[tokio::test]
    async fn should_record_event_for_unusable_scheme() {
        let state = AppState::default();

        let valid = state
            .valid_redirect_uris("client", &registration("foo:foo"))
            .await;

        assert!(valid.is_empty());
        let events = state.events().await;
        insta::assert_debug_snapshot!(events, @r#"
        [
            Event {
                reason: "NoSAOAuthRedirectURIs",
                client_id: "client",
                message: "client has no redirectURIs; register at least one absolute http(s) redirect URI",
            },
        ]
        "#);
    }

    #[tokio::test]
    async fn should_report_parse_error_in_event() {
        let state = AppState::default();

        state.valid_redirect_uris("client", &registration("::")).await;

        let events = state.events().await;
        assert_eq!(
            events.first().map(|event| event.message.as_str()),
            Some("[parse ::: relative URL without a base, client has no redirectURIs; register at least one absolute http(s) redirect URI]")
        );
    }

    #[tokio::test]
    async fn should_redeem_code_once() {
        let state = AppState::default();
        let code = state
            .issue_code(IssuedCode {
                client_id: "client".to_string(),
                redirect_uri: "http://127.0.0.1/cb".to_string(),
                scope: "user:info".to_string(),
            })
            .await;

        assert!(state.redeem_code(&code).await.is_some());
        assert!(state.redeem_code(&code).await.is_none());
    }
}
