use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub chart_no: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PatientsApi {
    client: ApiClient,
}

impl PatientsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// An absent result means no matches
    pub async fn search(&self, keyword: &str) -> Result<Vec<Patient>, ClientError> {
        let query = [("keyword", keyword.to_string())];
        Ok(self
            .client
            .get("", &query, "환자 목록을 불러오지 못했습니다.")
            .await?
            .or_empty())
    }

    pub async fn get(&self, id: i64) -> Result<Patient, ClientError> {
        const FAILED: &str = "환자 정보를 불러오지 못했습니다.";
        self.client
            .get(&format!("/{}", id), &[], FAILED)
            .await?
            .require(FAILED)
    }

    pub async fn register(&self, patient: &NewPatient) -> Result<Patient, ClientError> {
        const FAILED: &str = "환자를 등록하지 못했습니다.";
        self.client.post("", patient, FAILED).await?.require(FAILED)
    }
}
