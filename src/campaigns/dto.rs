use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CampaignQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub status: Option<String>,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub rejection_reason: Option<String>,
    pub tracking_number: Option<String>,
}
