//! The front-controller pipeline.
//!
//! Every request walks the same six steps: extract the command token,
//! resolve it against the registry, execute the handler, decorate the
//! outcome with request-independent context, stamp the no-cache headers,
//! and render (JSON body or redirect). Errors short-circuit into the shared
//! error view with a severity-appropriate log line carrying the query
//! string and referer.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::RawQuery;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use tracing::{error, warn};

use col_auth::Principal;
use col_dispatch::{CommandError, CommandOutcome, DispatchError, RequestContext, Severity};
use col_storage::StorageError;

use super::errors::{code_for, status_for};
use super::AppState;

pub async fn handle_read(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    dispatch(state, principal, false, query.unwrap_or_default(), None, headers).await
}

pub async fn handle_write(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    dispatch(
        state,
        principal,
        true,
        query.unwrap_or_default(),
        Some(body),
        headers,
    )
    .await
}

async fn dispatch(
    state: Arc<AppState>,
    principal: Principal,
    write: bool,
    query: String,
    form_body: Option<String>,
    headers: HeaderMap,
) -> Response {
    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // 1. extract the token (and every other parameter with it)
    let params = match parse_params(&query, form_body.as_deref()) {
        Ok(params) => params,
        Err(reason) => {
            let err = DispatchError::BadRequest(reason);
            return render_error(&state, &err, &query, referer.as_deref(), &headers);
        }
    };
    let token = params
        .get(state.config.command_param.as_str())
        .map(String::as_str);

    // 2. resolve
    let handler = match state.registry.lookup(token) {
        Ok(handler) => handler,
        Err(err) => return render_error(&state, &err, &query, referer.as_deref(), &headers),
    };

    // 3. execute
    let ctx = RequestContext::new(write, params, query.clone(), referer.clone(), principal);
    match handler.execute(&ctx).await {
        Ok(outcome) => render(&state, outcome, &headers),
        Err(err) => render_error(&state, &fault_for(err), &query, referer.as_deref(), &headers),
    }
}

/// A storage outage inside a handler is an infrastructure fault, not a
/// business refusal.
fn fault_for(err: CommandError) -> DispatchError {
    match err {
        CommandError::Storage(StorageError::Connection(reason)) => {
            DispatchError::Unexpected(format!("storage connection failure: {reason}"))
        }
        other => DispatchError::Command(other),
    }
}

/// Repeated keys join into a comma-separated value, so multi-select form
/// fields survive the flattening (`id_list` splits them back apart).
fn parse_params(query: &str, form_body: Option<&str>) -> Result<HashMap<String, String>, String> {
    let mut params: HashMap<String, String> = HashMap::new();
    for raw in [Some(query), form_body].into_iter().flatten() {
        if raw.is_empty() {
            continue;
        }
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
            .map_err(|e| format!("unparseable request parameters: {e}"))?;
        for (key, value) in pairs {
            match params.entry(key) {
                Entry::Occupied(mut slot) => {
                    let joined = slot.get_mut();
                    joined.push(',');
                    joined.push_str(&value);
                }
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
            }
        }
    }
    Ok(params)
}

/// `scheme://host/context-path/`, omitting the port when it is 80.
fn base_href(state: &AppState, headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let host = match host.rsplit_once(':') {
        Some((name, "80")) => name,
        _ => host,
    };
    format!("{scheme}://{host}{}/", state.config.context_path)
}

/// 5. every response leaves with caching disabled.
fn apply_no_cache(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}

/// 4. add request-independent context without overriding anything the
/// handler set.
fn decorate(state: &AppState, payload: &mut Value, headers: &HeaderMap) {
    let Value::Object(map) = payload else { return };
    let defaults = [
        ("base_href", Value::String(base_href(state, headers))),
        ("year", json!(Utc::now().year())),
        ("template", Value::String(state.config.template_view.clone())),
        ("header", Value::Bool(true)),
        ("footer", Value::Bool(true)),
        (
            "menu",
            serde_json::to_value(state.registry.menu()).unwrap_or_default(),
        ),
    ];
    for (key, value) in defaults {
        map.entry(key).or_insert(value);
    }
}

/// 6. forward to the view, or answer the redirect the handler asked for.
fn render(state: &AppState, outcome: CommandOutcome, headers: &HeaderMap) -> Response {
    let mut response = if let Some(redirect) = &outcome.redirect {
        let location = format!("{}?{}", base_href(state, headers), redirect);
        match HeaderValue::from_str(&location) {
            Ok(value) => {
                let mut response = StatusCode::SEE_OTHER.into_response();
                response.headers_mut().insert(header::LOCATION, value);
                response
            }
            Err(e) => {
                error!(error = %e, "redirect target not representable");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    } else {
        let mut payload = serde_json::to_value(&outcome).unwrap_or_default();
        decorate(state, &mut payload, headers);
        axum::Json(payload).into_response()
    };
    apply_no_cache(&mut response);
    response
}

/// Shared error rendering: the configured error view, decorated and
/// no-cache-stamped like any other response.
fn render_error(
    state: &AppState,
    err: &DispatchError,
    query: &str,
    referer: Option<&str>,
    headers: &HeaderMap,
) -> Response {
    match err.severity() {
        Severity::Warning => {
            warn!(error = %err, query_string = query, referer, "request rejected")
        }
        Severity::Severe => {
            error!(error = %err, query_string = query, referer, "request failed")
        }
    }

    let mut payload = json!({
        "view": state.config.error_view,
        "error": code_for(err),
        "message": err.to_string(),
    });
    decorate(state, &mut payload, headers);
    let mut response = (status_for(err), axum::Json(payload)).into_response();
    apply_no_cache(&mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use col_core::CommandDescriptor;
    use col_dispatch::{builtin_factories, CommandRegistry};
    use col_storage::{InMemoryGateway, StorageGateway};

    async fn state() -> AppState {
        let gateway: Arc<dyn StorageGateway> = Arc::new(InMemoryGateway::new().with_descriptor(
            CommandDescriptor::new("home", "HomeCommand", "landing", "Home", 1),
        ));
        let registry = CommandRegistry::load(gateway, &builtin_factories(), "home")
            .await
            .unwrap();
        AppState {
            config: AppConfig::default(),
            registry,
        }
    }

    fn host(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, value.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn base_href_omits_port_80_only() {
        let state = state().await;
        assert_eq!(
            base_href(&state, &host("col.example:80")),
            "http://col.example/"
        );
        assert_eq!(
            base_href(&state, &host("col.example:8443")),
            "http://col.example:8443/"
        );
        assert_eq!(base_href(&state, &host("col.example")), "http://col.example/");
    }

    #[tokio::test]
    async fn decoration_never_overrides_handler_values() {
        let state = state().await;
        let mut payload = json!({"view": "landing", "header": false});
        decorate(&state, &mut payload, &host("col.example"));
        assert_eq!(payload["header"], json!(false));
        assert_eq!(payload["footer"], json!(true));
        assert_eq!(payload["base_href"], json!("http://col.example/"));
    }

    #[test]
    fn form_body_parameters_join_the_query_string() {
        let params = parse_params("ent=conv&op=upd", Some("id=42&title=New")).unwrap();
        assert_eq!(params.get("ent").map(String::as_str), Some("conv"));
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert_eq!(params.get("title").map(String::as_str), Some("New"));
    }

    #[test]
    fn repeated_keys_accumulate_comma_joined() {
        let params = parse_params("ent=conv", Some("contractors=7&contractors=8")).unwrap();
        assert_eq!(params.get("contractors").map(String::as_str), Some("7,8"));
    }

    #[test]
    fn storage_outage_becomes_an_unexpected_fault() {
        let outage = fault_for(CommandError::Storage(StorageError::Connection("down".into())));
        assert!(matches!(outage, DispatchError::Unexpected(_)));
        assert_eq!(status_for(&outage), StatusCode::INTERNAL_SERVER_ERROR);

        let missing = fault_for(CommandError::Storage(StorageError::NotFound));
        assert!(matches!(missing, DispatchError::Command(_)));
    }

    #[tokio::test]
    async fn error_responses_carry_the_error_view_and_no_cache() {
        let state = state().await;
        let err = DispatchError::CommandNotFound { token: "xx".into() };
        let response = render_error(&state, &err, "ent=xx", None, &host("col.example"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(response.headers().get(header::PRAGMA).unwrap(), "no-cache");
        assert_eq!(response.headers().get(header::EXPIRES).unwrap(), "0");
    }
}
