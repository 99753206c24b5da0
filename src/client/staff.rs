use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError};
use crate::access::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub department: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl StaffMember {
    pub fn normalized_role(&self) -> Role {
        Role::normalize(&self.role)
    }
}

#[derive(Debug, Clone)]
pub struct StaffApi {
    client: ApiClient,
}

impl StaffApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<StaffMember>, ClientError> {
        Ok(self
            .client
            .get("", &[], "직원 목록을 불러오지 못했습니다.")
            .await?
            .or_empty())
    }

    pub async fn get(&self, id: i64) -> Result<StaffMember, ClientError> {
        const FAILED: &str = "직원 정보를 불러오지 못했습니다.";
        self.client
            .get(&format!("/{}", id), &[], FAILED)
            .await?
            .require(FAILED)
    }
}
