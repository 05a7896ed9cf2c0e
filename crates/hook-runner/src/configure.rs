//! Preparación de transacciones crudas antes de cargar hooks.
use std::collections::HashSet;
use std::env::consts::{ARCH, OS};

use hook_core::{ExpectedResponse, Header, RawTransaction, Request, RunConfig, Transaction};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::{Map, Value};
use url::Url;

use crate::errors::RunError;

/// Convierte cada transacción cruda en una ejecutable contra `config.endpoint`.
pub fn configure_transactions(raw: &[RawTransaction], config: &RunConfig) -> Result<Vec<Transaction>, RunError> {
    let server = parse_server_url(&config.endpoint)?;
    let api_names: HashSet<Option<&str>> = raw.iter().map(RawTransaction::api_name).collect();
    let multi_api = api_names.len() > 1;
    debug!("configuring {} transactions against {server} (multi-api: {multi_api})", raw.len());
    Ok(raw.iter().map(|t| configure_transaction(t, &server, config, multi_api)).collect())
}

pub fn configure_transaction(raw: &RawTransaction, server: &Url, config: &RunConfig, multi_api: bool) -> Transaction {
    let mut headers = headers_to_map(&raw.request.headers);
    if !headers.keys().any(|name| name.eq_ignore_ascii_case("user-agent")) {
        headers.insert("User-Agent".to_string(), user_agent());
    }
    for header in &config.header {
        match header.split_once(':') {
            Some((name, value)) => {
                headers.insert(name.to_string(), value.to_string());
            }
            None => warn!("ignoring header without ':' separator: {header}"),
        }
    }
    let request = Request { method: raw.request.method.clone(),
                            uri: raw.request.uri.clone(),
                            headers,
                            body: raw.request.body.clone() };

    let response = &raw.response;
    let expected = ExpectedResponse { status_code: response.status.clone(),
                                      headers: headers_to_map(&response.headers),
                                      body: response.body.clone().filter(|b| !b.is_empty()),
                                      body_schema: response.schema.as_ref().map(parse_schema) };

    let mut name = raw.name.clone();
    if !multi_api {
        if let Some(api_name) = raw.api_name() {
            name = name.replacen(&format!("{api_name} > "), "", 1);
        }
    }

    let id = format!("{} ({}) {}", request.method, expected.status_code, request.uri);
    Transaction { name,
                  id,
                  host: server.host_str().map(String::from),
                  port: server.port(),
                  protocol: Some(format!("{}:", server.scheme())),
                  full_path: full_path(server.path(), &raw.request.uri),
                  request,
                  expected,
                  origin: raw.origin.clone(),
                  skip: skipped_by_default(raw),
                  extra: Map::new(),
                  ..Transaction::default() }
}

/// Sin esquema se asume `http://`, descartando `:` y `/` iniciales.
pub fn parse_server_url(endpoint: &str) -> Result<Url, RunError> {
    let endpoint = endpoint.trim();
    let lower = endpoint.to_ascii_lowercase();
    let normalized = if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint.trim_start_matches([':', '/']))
    };
    Url::parse(&normalized).map_err(|e| RunError::Setup(format!("Invalid server URL '{endpoint}': {e}")))
}

/// Une la ruta del servidor con la de la petición.
pub fn full_path(server_path: &str, request_path: &str) -> String {
    if server_path == "/" {
        return request_path.to_string();
    }
    if request_path.is_empty() {
        return server_path.to_string();
    }
    let trim = |segment: &str| -> String {
        let segment = segment.strip_prefix('/').unwrap_or(segment);
        segment.strip_suffix('/').unwrap_or(segment).to_string()
    };
    let trailing = if request_path != "/" && request_path.ends_with('/') { "/" } else { "" };
    format!("/{}/{}{trailing}", trim(server_path), trim(request_path))
}

fn headers_to_map(headers: &[Header]) -> IndexMap<String, String> {
    headers.iter().map(|h| (h.name.clone(), h.value.clone())).collect()
}

fn user_agent() -> String {
    format!("hookflow/{} ({OS}; {ARCH})", env!("CARGO_PKG_VERSION"))
}

// El schema puede venir como texto JSON.
fn parse_schema(schema: &Value) -> Value {
    match schema {
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| schema.clone()),
        other => other.clone(),
    }
}

/// OpenAPI/Swagger: respuestas fuera de 2xx arrancan saltadas.
fn skipped_by_default(raw: &RawTransaction) -> bool {
    let Some(media_type) = raw.media_type.as_deref() else {
        return false;
    };
    if !(media_type.contains("swagger") || media_type.contains("openapi")) {
        return false;
    }
    match raw.response.status.trim().parse::<u16>() {
        Ok(status) => !(200..300).contains(&status),
        Err(_) => true,
    }
}
