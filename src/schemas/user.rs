use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_approved: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub id_token: &'a str,
}

/// Shared by `POST /api/auth/google` and `GET /api/auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: Option<String>,
    pub user: Option<AuthUser>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditBalanceResponse {
    pub success: bool,
    pub credits: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiKeyStatus {
    pub success: bool,
    #[serde(default)]
    pub kie_api_key_masked: String,
    #[serde(default)]
    pub has_kie_key: bool,
}

#[derive(Debug, Serialize)]
pub struct SaveApiKeyRequest<'a> {
    pub kie_api_key: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub is_approved: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<AdminUser>,
}
