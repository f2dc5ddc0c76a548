use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use headers::authorization::Basic;
use headers::{Authorization, HeaderMapExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::{Url, form_urlencoded};

use crate::errors::{AuthorizeError, TokenError};
use crate::state::{AppState, ClientRegistration, Event, IssuedCode};

const CSRF_HEADER: &str = "x-csrf-token";
const CSRF_TOKEN: &str = "1";

/// The application router
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/oauth/authorize", get(authorize))
        .route(
            "/oauth/authorize/approve",
            get(approval_page).post(approve),
        )
        .route("/oauth/token", post(token))
        .route("/admin/clients/{client_id}", put(register_client))
        .route("/admin/events", get(list_events).delete(clear_events))
        .route("/health", get(|| async move { "OK" }))
}

/// Any user is accepted with a non-empty password.
fn authenticated_user(headers: &HeaderMap) -> Result<String, AuthorizeError> {
    match headers.typed_get::<Authorization<Basic>>() {
        Some(Authorization(basic)) if !basic.password().is_empty() => {
            Ok(basic.username().to_string())
        }
        _ => Err(AuthorizeError::Unauthenticated),
    }
}

fn with_params(
    client_id: &str,
    redirect_uri: &str,
    params: &[(&str, &str)],
) -> Result<Url, AuthorizeError> {
    let mut url = Url::parse(redirect_uri).map_err(|_| AuthorizeError::InvalidRedirectUri {
        client_id: client_id.to_string(),
        redirect_uri: redirect_uri.to_string(),
    })?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url)
}

fn is_known_scope(scope: &str) -> bool {
    scope == "user:info" || scope == "user:full" || scope.starts_with("role:")
}

#[derive(Debug, Deserialize)]
struct AuthorizeParams {
    response_type: Option<String>,
    client_id: String,
    redirect_uri: String,
    #[serde(default)]
    scope: String,
    state: Option<String>,
}

async fn authorize(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect, AuthorizeError> {
    let username = authenticated_user(&headers)?;

    let response_type = params.response_type.as_deref().unwrap_or_default();
    if response_type != "code" {
        return Err(AuthorizeError::UnsupportedResponseType {
            response_type: response_type.to_string(),
        });
    }

    let Some(client) = state.client(&params.client_id).await else {
        return Err(AuthorizeError::UnknownClient {
            client_id: params.client_id,
        });
    };
    let redirect_uris = state.valid_redirect_uris(&params.client_id, &client).await;
    if !redirect_uris.contains(&params.redirect_uri) {
        return Err(AuthorizeError::InvalidRedirectUri {
            client_id: params.client_id,
            redirect_uri: params.redirect_uri,
        });
    }

    let mut answer = Vec::new();
    if let Some(client_state) = &params.state {
        answer.push(("state", client_state.as_str()));
    }

    if let Some(unknown) = params
        .scope
        .split_whitespace()
        .find(|scope| !is_known_scope(scope))
    {
        debug!(%unknown, "rejecting unknown scope");
        answer.insert(0, ("error", "invalid_scope"));
        let target = with_params(&params.client_id, &params.redirect_uri, &answer)?;
        return Ok(Redirect::to(target.as_str()));
    }

    if !state.is_granted(&username, &params.client_id).await {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("then", &uri.to_string())
            .append_pair("client_id", &params.client_id)
            .append_pair("redirect_uri", &params.redirect_uri);
        if let Some(client_state) = &params.state {
            query.append_pair("state", client_state);
        }
        let target = format!("/oauth/authorize/approve?{}", query.finish());
        return Ok(Redirect::to(&target));
    }

    let code = state
        .issue_code(IssuedCode {
            client_id: params.client_id.clone(),
            redirect_uri: params.redirect_uri.clone(),
            scope: params.scope.clone(),
        })
        .await;
    info!(%username, client_id = %params.client_id, "authorization code issued");
    answer.insert(0, ("code", code.as_str()));
    let target = with_params(&params.client_id, &params.redirect_uri, &answer)?;
    Ok(Redirect::to(target.as_str()))
}

#[derive(Debug, Deserialize)]
struct Approval {
    then: String,
    client_id: String,
    redirect_uri: String,
    state: Option<String>,
    approve: Option<String>,
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

async fn approval_page(
    headers: HeaderMap,
    Query(approval): Query<Approval>,
) -> Result<Html<String>, AuthorizeError> {
    let username = authenticated_user(&headers)?;
    let client_state = approval.state.as_deref().map_or_else(String::new, |value| {
        format!(
            r#"<input type="hidden" name="state" value="{}">"#,
            escape(value)
        )
    });

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html>
  <body>
    <p>Hello {username}, {client_id} requests access to your account.</p>
    <form method="POST" action="approve">
      <input type="hidden" name="then" value="{then}">
      <input type="hidden" name="client_id" value="{client_id}">
      <input type="hidden" name="redirect_uri" value="{redirect_uri}">
      {client_state}
      <input type="checkbox" name="scope" value="user:info" checked>
      <input type="submit" name="approve" value="Allow selected permissions">
      <input type="submit" name="deny" value="Deny">
    </form>
  </body>
</html>"#,
        username = escape(&username),
        client_id = escape(&approval.client_id),
        then = escape(&approval.then),
        redirect_uri = escape(&approval.redirect_uri),
    )))
}

async fn approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(approval): Form<Approval>,
) -> Result<Redirect, AuthorizeError> {
    let username = authenticated_user(&headers)?;
    if headers.get(CSRF_HEADER).and_then(|value| value.to_str().ok()) != Some(CSRF_TOKEN) {
        return Err(AuthorizeError::Csrf);
    }
    if !approval.then.starts_with("/oauth/authorize?") {
        return Err(AuthorizeError::InvalidRedirectUri {
            client_id: approval.client_id,
            redirect_uri: approval.then,
        });
    }

    if approval.approve.is_none() {
        info!(%username, client_id = %approval.client_id, "access denied");
        let mut answer = vec![("error", "access_denied")];
        if let Some(client_state) = &approval.state {
            answer.push(("state", client_state.as_str()));
        }
        let denied = with_params(&approval.client_id, &approval.redirect_uri, &answer)?;
        return Ok(Redirect::to(denied.as_str()));
    }

    state.grant(&username, &approval.client_id).await;
    info!(%username, client_id = %approval.client_id, "access granted");
    Ok(Redirect::to(&approval.then))
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    grant_type: String,
    code: String,
    redirect_uri: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Result<impl IntoResponse, TokenError> {
    if request.grant_type != "authorization_code" {
        return Err(TokenError::UnsupportedGrantType);
    }

    let (client_id, secret) = match headers.typed_get::<Authorization<Basic>>() {
        Some(Authorization(basic)) => (form_decode(basic.username()), form_decode(basic.password())),
        None => (
            request.client_id.clone().unwrap_or_default(),
            request.client_secret.clone().unwrap_or_default(),
        ),
    };
    let client = state
        .client(&client_id)
        .await
        .filter(|client| client.secret == secret)
        .ok_or(TokenError::InvalidClient)?;
    debug!(%client_id, redirect_uris = ?client.redirect_uris, "client authenticated");

    let issued = state
        .redeem_code(&request.code)
        .await
        .filter(|issued| issued.client_id == client_id && issued.redirect_uri == request.redirect_uri)
        .ok_or(TokenError::InvalidGrant)?;

    let access_token = uuid::Uuid::new_v4().simple().to_string();
    info!(%client_id, "access token issued");
    Ok((
        StatusCode::OK,
        Json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 300,
            "scope": issued.scope,
        })),
    ))
}

/// Client credentials are form-encoded before Basic encoding (RFC 6749 §2.3.1).
fn form_decode(value: &str) -> String {
    form_urlencoded::parse(value.as_bytes())
        .map(|(decoded, _)| decoded)
        .collect()
}

async fn register_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Json(registration): Json<ClientRegistration>,
) -> StatusCode {
    info!(%client_id, redirect_uris = ?registration.redirect_uris, "client registered");
    state.register(client_id, registration).await;
    StatusCode::NO_CONTENT
}

async fn list_events(State(state): State<AppState>) -> Json<Vec<Event>> {
    Json(state.events().await)
}

async fn clear_events(State(state): State<AppState>) -> StatusCode {
    state.clear_events().await;
    StatusCode::NO_CONTENT
}
