use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError};
use crate::session::SessionUser;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    #[serde(alias = "token")]
    pub access_token: String,
    pub user: SessionUser,
    /// Mirrors the `his_force_password_change` cookie the backend sets
    #[serde(default)]
    pub force_password_change: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, ClientError> {
        const FAILED: &str = "로그인에 실패했습니다.";
        self.client
            .post("/login", &LoginRequest { username, password }, FAILED)
            .await?
            .require(FAILED)
    }

    /// Succeeds on `success: true` alone; the backend sends no result
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let body = ChangePasswordRequest {
            current_password,
            new_password,
        };
        self.client
            .put::<_, serde_json::Value>(
                "/password",
                &body,
                "비밀번호를 변경하지 못했습니다.",
            )
            .await?;
        Ok(())
    }
}
