use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub department: String,
    pub status: VisitStatus,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisit {
    pub patient_id: i64,
    pub department: String,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct StatusChange {
    status: VisitStatus,
}

#[derive(Debug, Clone)]
pub struct ReceptionApi {
    client: ApiClient,
}

impl ReceptionApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn today_visits(&self) -> Result<Vec<Visit>, ClientError> {
        Ok(self
            .client
            .get("/visits/today", &[], "오늘 접수 목록을 불러오지 못했습니다.")
            .await?
            .or_empty())
    }

    pub async fn register_visit(&self, visit: &NewVisit) -> Result<Visit, ClientError> {
        const FAILED: &str = "접수를 등록하지 못했습니다.";
        self.client.post("/visits", visit, FAILED).await?.require(FAILED)
    }

    pub async fn update_status(
        &self,
        visit_id: i64,
        status: VisitStatus,
    ) -> Result<Visit, ClientError> {
        const FAILED: &str = "접수 상태를 변경하지 못했습니다.";
        self.client
            .put(&format!("/visits/{}/status", visit_id), &StatusChange { status }, FAILED)
            .await?
            .require(FAILED)
    }
}
