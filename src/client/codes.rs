use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError};

/// Entry of a backend code table (departments, visit types, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    pub group: String,
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub sort_order: i32,
}

/// Display label for `code`, falling back to the code itself
pub fn label_for<'a>(codes: &'a [Code], code: &'a str) -> &'a str {
    codes
        .iter()
        .find(|c| c.code == code)
        .map(|c| c.label.as_str())
        .unwrap_or(code)
}

#[derive(Debug, Clone)]
pub struct CodesApi {
    client: ApiClient,
}

impl CodesApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Codes of one group ordered by `sort_order`
    pub async fn list(&self, group: &str) -> Result<Vec<Code>, ClientError> {
        let mut codes: Vec<Code> = self
            .client
            .get(
                &format!("/{}", urlencoding::encode(group)),
                &[],
                "코드 목록을 불러오지 못했습니다.",
            )
            .await?
            .or_empty();
        codes.sort_by_key(|c| c.sort_order);
        Ok(codes)
    }
}
