//! Firestore document store over the REST API.
//!
//! A merge-write is a `PATCH` on the document with one
//! `updateMask.fieldPaths` entry per written field: Firestore then only
//! touches the masked fields and creates the document if it is missing.
//! JSON values are converted to Firestore's typed `Value` encoding and back
//! in pure functions for testability.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};

use super::{Document, DocumentPath, DocumentStore, StoreError};
use crate::config::FirebaseConfig;

pub struct FirestoreStore {
    http: reqwest::Client,
    documents_url: String,
}

impl FirestoreStore {
    /// Build a client for the `(default)` database of the configured project.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| StoreError::HttpClientBuild(e.to_string()))?;
        let documents_url = format!("{}/projects/{}/databases/(default)/documents", config.firestore_url, config.project_id);
        Ok(Self { http, documents_url })
    }

    fn document_url(&self, path: &DocumentPath) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url,
            urlencoding::encode(&path.collection),
            urlencoding::encode(&path.id)
        )
    }

    fn authorize(request: reqwest::RequestBuilder, bearer: Option<&str>) -> reqwest::RequestBuilder {
        match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreStore {
    async fn merge(&self, path: &DocumentPath, fields: &Document, bearer: Option<&str>) -> Result<(), StoreError> {
        let mask: Vec<(&str, String)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", field_path(k)))
            .collect();
        let body = json!({ "fields": encode_fields(fields) });

        let request = self
            .http
            .patch(self.document_url(path))
            .query(&mask)
            .json(&body);
        let response = Self::authorize(request, bearer)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        tracing::debug!(%status, %path, "firestore rejected merge");
        Err(parse_error(status, &text))
    }

    async fn get(&self, path: &DocumentPath, bearer: Option<&str>) -> Result<Option<Document>, StoreError> {
        let request = self.http.get(self.document_url(path));
        let response = Self::authorize(request, bearer)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(parse_error(status, &text));
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))?;
        let fields = body.get("fields").cloned().unwrap_or_else(|| json!({}));
        decode_fields(&fields).map(Some)
    }
}

// =============================================================================
// FIELD PATHS
// =============================================================================

/// Quote a field name for `updateMask.fieldPaths` unless it is a simple
/// identifier.
fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        return name.to_owned();
    }
    let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{escaped}`")
}

// =============================================================================
// VALUE ENCODING
// =============================================================================

fn encode_fields(fields: &Document) -> Value {
    let encoded: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(encoded)
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_fields(fields: &Value) -> Result<Document, StoreError> {
    let Some(map) = fields.as_object() else {
        return Err(StoreError::Parse("fields is not an object".into()));
    };
    map.iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Err(StoreError::Parse(format!("untyped value: {value}")));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue" | "bytesValue"
        | "geoPointValue" => Ok(inner.clone()),
        "integerValue" => {
            let raw = inner.as_str().unwrap_or_default();
            raw.parse::<i64>()
                .map(Value::from)
                .map_err(|_| StoreError::Parse(format!("bad integerValue: {inner}")))
        }
        "arrayValue" => {
            let items = inner
                .get("values")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            items
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => {
            let fields = inner.get("fields").cloned().unwrap_or_else(|| json!({}));
            decode_fields(&fields).map(Value::Object)
        }
        other => Err(StoreError::Parse(format!("unknown value type: {other}"))),
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: String,
}

fn parse_error(status: StatusCode, body: &str) -> StoreError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => StoreError::Rejected { status: envelope.error.status, message: envelope.error.message },
        Err(_) => StoreError::Rejected { status: status.as_str().to_owned(), message: format!("document store returned {status}") },
    }
}

#[cfg(test)]
#[path = "firestore_test.rs"]
mod tests;
