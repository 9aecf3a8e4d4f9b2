use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ApiResponse, Business, BusinessStatus, CreateBusinessRequest, IncomeRecord,
    IncomeRecordRequest, Profile, UpdateBusinessRequest, UpdateStatusRequest,
};

pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// Error reported by a remote directory service, by the shape of its body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Detail(String),
    #[error("{}", .0.join(", "))]
    DetailList(Vec<String>),
    #[error("{}", .0.join(", "))]
    NonFieldErrors(Vec<String>),
    #[error("{}", join_field_errors(.0))]
    FieldErrors(Vec<(String, Vec<String>)>),
    #[error("An unexpected error occurred")]
    Unstructured { status: Option<u16> },
}

fn join_field_errors(fields: &[(String, Vec<String>)]) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn detail_entry(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("msg")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

impl RemoteError {
    /// Classifies an error body, most specific shape first.
    pub fn from_body(body: &Value) -> Self {
        if let Value::String(message) = body {
            return RemoteError::Message(message.clone());
        }

        match body.get("detail") {
            Some(Value::String(detail)) => return RemoteError::Detail(detail.clone()),
            Some(Value::Array(entries)) => {
                return RemoteError::DetailList(entries.iter().filter_map(detail_entry).collect())
            }
            _ => {}
        }

        // `error` is where this service's own envelope puts the message.
        for key in ["message", "error"] {
            if let Some(message) = body.get(key).and_then(Value::as_str) {
                if !message.is_empty() {
                    return RemoteError::Message(message.to_string());
                }
            }
        }

        if let Some(errors) = body.get("non_field_errors").and_then(string_list) {
            return RemoteError::NonFieldErrors(errors);
        }

        if let Value::Object(map) = body {
            let fields: Vec<(String, Vec<String>)> = map
                .iter()
                .filter_map(|(field, value)| match value {
                    Value::String(_) | Value::Array(_) => {
                        string_list(value).map(|messages| (field.clone(), messages))
                    }
                    _ => None,
                })
                .collect();
            if !fields.is_empty() {
                return RemoteError::FieldErrors(fields);
            }
        }

        RemoteError::Unstructured { status: None }
    }

    fn from_response(status: StatusCode, text: &str) -> Self {
        let parsed = match serde_json::from_str::<Value>(text) {
            Ok(body) => RemoteError::from_body(&body),
            Err(_) if !text.trim().is_empty() => RemoteError::Message(text.trim().to_string()),
            Err(_) => RemoteError::Unstructured { status: None },
        };
        match parsed {
            RemoteError::Unstructured { .. } => RemoteError::Unstructured {
                status: Some(status.as_u16()),
            },
            other => other,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Typed client for another instance of the directory API.
#[derive(Clone)]
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl DirectoryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(base_url),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::from_response(status, &text));
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&text).map_err(|err| {
            log::warn!("Unexpected response body from directory service: {err}");
            RemoteError::Unstructured {
                status: Some(status.as_u16()),
            }
        })?;
        envelope.data.ok_or(RemoteError::Unstructured {
            status: Some(status.as_u16()),
        })
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(method, path).json(body)).await
    }

    pub async fn verified_businesses(&self) -> Result<Vec<Business>, RemoteError> {
        self.send(self.request(Method::GET, "/businesses/verified")).await
    }

    pub async fn all_businesses(&self) -> Result<Vec<Business>, RemoteError> {
        self.send(self.request(Method::GET, "/businesses")).await
    }

    pub async fn my_businesses(&self) -> Result<Vec<Business>, RemoteError> {
        self.send(self.request(Method::GET, "/user/businesses")).await
    }

    pub async fn business(&self, id: Uuid) -> Result<Business, RemoteError> {
        self.send(self.request(Method::GET, &format!("/user/businesses/{id}")))
            .await
    }

    pub async fn create_business(
        &self,
        business: &CreateBusinessRequest,
    ) -> Result<Business, RemoteError> {
        self.send_json(Method::POST, "/user/businesses", business).await
    }

    pub async fn update_business(
        &self,
        id: Uuid,
        updates: &UpdateBusinessRequest,
    ) -> Result<Business, RemoteError> {
        self.send_json(Method::PATCH, &format!("/user/businesses/{id}"), updates)
            .await
    }

    pub async fn delete_business(&self, id: Uuid) -> Result<(), RemoteError> {
        let response = self
            .request(Method::DELETE, &format!("/user/businesses/{id}"))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await?;
        Err(RemoteError::from_response(status, &text))
    }

    /// The server derives `verified_at` from the status.
    pub async fn update_business_status(
        &self,
        id: Uuid,
        status: BusinessStatus,
        trust_score: Option<i32>,
    ) -> Result<Business, RemoteError> {
        let body = UpdateStatusRequest {
            status,
            trust_score,
        };
        self.send_json(Method::PATCH, &format!("/businesses/{id}"), &body)
            .await
    }

    pub async fn income_records(&self, business_id: Uuid) -> Result<Vec<IncomeRecord>, RemoteError> {
        self.send(self.request(
            Method::GET,
            &format!("/businesses/{business_id}/income-records"),
        ))
        .await
    }

    pub async fn add_income_record(
        &self,
        business_id: Uuid,
        amount: i64,
        month: &str,
    ) -> Result<IncomeRecord, RemoteError> {
        let body = IncomeRecordRequest {
            amount,
            month: month.to_string(),
        };
        self.send_json(
            Method::POST,
            &format!("/businesses/{business_id}/income-records"),
            &body,
        )
        .await
    }

    pub async fn profile_me(&self) -> Result<Profile, RemoteError> {
        self.send(self.request(Method::GET, "/profile/me")).await
    }
}

fn normalize_base_url(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.ends_with("/api/v1") {
        trimmed.to_string()
    } else {
        format!("{}/api/v1", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_always_ends_in_api_prefix() {
        assert_eq!(normalize_base_url("http://host:8082"), "http://host:8082/api/v1");
        assert_eq!(normalize_base_url("http://host:8082/"), "http://host:8082/api/v1");
        assert_eq!(normalize_base_url("http://host/api/v1/"), "http://host/api/v1");
    }

    #[test]
    fn plain_strings_and_detail_strings_pass_through() {
        assert_eq!(RemoteError::from_body(&json!("Rate limited")).message(), "Rate limited");
        assert_eq!(
            RemoteError::from_body(&json!({ "detail": "Not found." })),
            RemoteError::Detail("Not found.".into())
        );
    }

    #[test]
    fn detail_lists_join_msg_or_message() {
        let body = json!({ "detail": [{ "msg": "field required" }, { "message": "too short" }, "bad"] });
        let err = RemoteError::from_body(&body);
        assert_eq!(err.message(), "field required, too short, bad");
    }

    #[test]
    fn message_wins_over_field_errors() {
        let body = json!({ "message": "Slow down", "name": ["required"] });
        assert_eq!(RemoteError::from_body(&body).message(), "Slow down");
    }

    #[test]
    fn envelope_error_field_is_read() {
        let body = json!({ "success": false, "data": null, "error": "Business not found" });
        assert_eq!(RemoteError::from_body(&body).message(), "Business not found");
    }

    #[test]
    fn non_field_errors_accept_a_list_or_a_string() {
        let list = json!({ "non_field_errors": ["Account locked", "Try later"] });
        assert_eq!(RemoteError::from_body(&list).message(), "Account locked, Try later");

        let single = json!({ "non_field_errors": "Account locked" });
        assert_eq!(RemoteError::from_body(&single).message(), "Account locked");
    }

    #[test]
    fn field_maps_are_flattened() {
        let body = json!({ "email": ["is invalid", "is taken"], "phone": "too short", "count": 3 });
        let err = RemoteError::from_body(&body);
        assert!(matches!(err, RemoteError::FieldErrors(_)));
        assert_eq!(err.message(), "email: is invalid, is taken; phone: too short");
    }

    #[test]
    fn unknown_shapes_fall_back_to_the_generic_message() {
        for body in [json!({}), json!(42), json!({ "count": 3 })] {
            assert_eq!(RemoteError::from_body(&body).message(), UNEXPECTED_ERROR);
        }
    }

    #[test]
    fn response_status_is_kept_for_unstructured_bodies() {
        let err = RemoteError::from_response(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err, RemoteError::Unstructured { status: Some(502) });

        let err = RemoteError::from_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.message(), "upstream down");
    }
}
