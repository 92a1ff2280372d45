use crate::error::ApiError;
use crate::schemas::generate::{
    GenerateTaskRequest, GenerateTaskResponse, PreviewPromptRequest, PreviewPromptResponse,
};
use crate::schemas::task::{TaskListResponse, VideoTask};
use crate::schemas::user::{
    AckResponse, AdminUser, ApiKeyStatus, AuthUser, CreditBalanceResponse, LoginRequest,
    LoginResponse, SaveApiKeyRequest, UserListResponse,
};
use chrono::Utc;
use http::{Method, StatusCode};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Thin client over the video generation backend.
///
/// Cloning is cheap and every clone shares the connection pool and the
/// session token, so the session and the poller can hold their own copies.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Client>,
    base_url: Arc<str>,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: Arc::new(Client::new()),
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // ── Auth ──────────────────────────

    /// Exchanges an identity-provider token for a session token.
    pub async fn login(&self, id_token: &str) -> Result<(String, AuthUser), ApiError> {
        let response: LoginResponse = self
            .send(
                self.request(Method::POST, "/api/auth/google")
                    .json(&LoginRequest { id_token }),
            )
            .await?;

        match (response.success, response.token, response.user) {
            (true, Some(token), Some(user)) => Ok((token, user)),
            _ => Err(ApiError::Rejected(
                response.error.unwrap_or_else(|| "Login failed".to_string()),
            )),
        }
    }

    pub async fn me(&self) -> Result<AuthUser, ApiError> {
        let response: LoginResponse = self
            .send(self.request(Method::GET, "/api/auth/me"))
            .await?;

        match response.user {
            Some(user) if response.success => Ok(user),
            _ => Err(ApiError::Unauthorized(
                response
                    .error
                    .unwrap_or_else(|| "Not authenticated".to_string()),
            )),
        }
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        match self
            .send::<Value>(self.request(Method::POST, "/api/auth/logout"))
            .await
        {
            Ok(_) | Err(ApiError::Decode(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // ── Tasks ─────────────────────────

    /// Every task owned by the session, newest first.
    pub async fn get_tasks(&self) -> Result<Vec<VideoTask>, ApiError> {
        let response: TaskListResponse = self
            .send(self.request(Method::GET, "/api/tasks"))
            .await?;
        let now = Utc::now();
        Ok(response
            .tasks
            .into_iter()
            .map(|record| record.into_task(now))
            .collect())
    }

    pub async fn check_status(&self, task_ids: &[String]) -> Result<Vec<VideoTask>, ApiError> {
        let ids = task_ids.join(",");
        let response: TaskListResponse = self
            .send(
                self.request(Method::GET, "/api/status")
                    .query(&[("ids", ids.as_str())]),
            )
            .await?;
        let now = Utc::now();
        Ok(response
            .tasks
            .into_iter()
            .map(|record| record.into_task(now))
            .collect())
    }

    /// Submits a generation job; returns one task id per batch item accepted.
    pub async fn generate_task(
        &self,
        request: &GenerateTaskRequest<'_>,
    ) -> Result<Vec<String>, ApiError> {
        let response: GenerateTaskResponse = self
            .send(self.request(Method::POST, "/api/generate-task").json(request))
            .await?;

        if response.success && !response.task_ids.is_empty() {
            return Ok(response.task_ids);
        }
        Err(ApiError::Rejected(response.error.unwrap_or_else(|| {
            "Failed to create task. Make sure your API key is set in Settings.".to_string()
        })))
    }

    pub async fn preview_prompt(
        &self,
        request: &PreviewPromptRequest<'_>,
    ) -> Result<PreviewPromptResponse, ApiError> {
        self.send(self.request(Method::POST, "/api/preview-prompt").json(request))
            .await
    }

    // ── User ──────────────────────────

    pub async fn credit_balance(&self) -> Result<i64, ApiError> {
        let response: CreditBalanceResponse = self
            .send(self.request(Method::GET, "/api/user/credit-balance"))
            .await?;

        match response.credits {
            Some(credits) if response.success => Ok(credits),
            _ => Err(ApiError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "credit balance unavailable".to_string()),
            )),
        }
    }

    pub async fn api_keys(&self) -> Result<ApiKeyStatus, ApiError> {
        self.send(self.request(Method::GET, "/api/user/api-keys"))
            .await
    }

    pub async fn save_api_key(&self, kie_api_key: &str) -> Result<(), ApiError> {
        let response: AckResponse = self
            .send(
                self.request(Method::PUT, "/api/user/api-keys")
                    .json(&SaveApiKeyRequest { kie_api_key }),
            )
            .await?;
        ack(response, "Failed to save API key")
    }

    // ── Admin ─────────────────────────

    pub async fn list_users(&self) -> Result<Vec<AdminUser>, ApiError> {
        let response: UserListResponse = self
            .send(self.request(Method::GET, "/api/admin/users"))
            .await?;
        Ok(response.users)
    }

    pub async fn approve_user(&self, user_id: i64) -> Result<(), ApiError> {
        let path = format!("/api/admin/users/{}/approve", user_id);
        let response: AckResponse = self.send(self.request(Method::PUT, &path)).await?;
        ack(response, "Failed to approve user")
    }

    pub async fn reject_user(&self, user_id: i64) -> Result<(), ApiError> {
        let path = format!("/api/admin/users/{}/reject", user_id);
        let response: AckResponse = self.send(self.request(Method::PUT, &path)).await?;
        ack(response, "Failed to reject user")
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .inner
            .request(method, url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        if let Some(token) = self.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let request = builder.build().map_err(ApiError::transport)?;
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            path = request.url().path(),
            "sending request"
        );

        let response = self
            .inner
            .execute(request)
            .await
            .map_err(ApiError::transport)?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(request_id = %request_id, "request unauthorized: {}", body);
                Err(ApiError::Unauthorized(detail(&body, "Not authenticated")))
            }
            StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                let detail = detail(&body, "Forbidden");
                if detail.to_lowercase().contains("pending approval") {
                    Err(ApiError::PendingApproval)
                } else {
                    Err(ApiError::Forbidden(detail))
                }
            }
            status if !status.is_success() => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("HTTP error: {}", status));
                tracing::warn!(
                    request_id = %request_id,
                    "request failed with status {}: {}",
                    status,
                    body
                );
                Err(ApiError::Status { status, body })
            }
            _ => {
                let bytes = response.bytes().await.map_err(ApiError::transport)?;
                serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
            }
        }
    }
}

fn ack(response: AckResponse, fallback: &str) -> Result<(), ApiError> {
    if response.success {
        Ok(())
    } else {
        Err(ApiError::Rejected(
            response.message.unwrap_or_else(|| fallback.to_string()),
        ))
    }
}

// FastAPI reports errors as `{"detail": "..."}`.
fn detail(body: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                fallback.to_string()
            } else {
                body.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fastapi_detail() {
        assert_eq!(
            detail(r#"{"detail":"Account pending approval"}"#, "x"),
            "Account pending approval"
        );
        assert_eq!(detail("", "Not authenticated"), "Not authenticated");
        assert_eq!(detail("plain text", "x"), "plain text");
    }

    #[test]
    fn trims_trailing_slash_and_shares_token() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");

        let clone = client.clone();
        client.set_token(Some("jwt".into()));
        assert_eq!(clone.token().as_deref(), Some("jwt"));
    }
}
