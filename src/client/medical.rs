use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: i64,
    pub visit_id: i64,
    pub drug_code: String,
    pub drug_name: String,
    pub dosage: String,
    pub days: u32,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrescription {
    pub visit_id: i64,
    pub drug_code: String,
    pub dosage: String,
    pub days: u32,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MedicalApi {
    client: ApiClient,
}

impl MedicalApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// A visit without prescriptions comes back with no result
    pub async fn prescriptions_for_visit(
        &self,
        visit_id: i64,
    ) -> Result<Vec<Prescription>, ClientError> {
        Ok(self
            .client
            .get(
                "/prescriptions",
                &[("visitId", visit_id.to_string())],
                "처방 내역을 불러오지 못했습니다.",
            )
            .await?
            .or_empty())
    }

    pub async fn prescribe(
        &self,
        prescription: &NewPrescription,
    ) -> Result<Prescription, ClientError> {
        const FAILED: &str = "처방을 저장하지 못했습니다.";
        self.client
            .post("/prescriptions", prescription, FAILED)
            .await?
            .require(FAILED)
    }
}
