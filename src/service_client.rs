use crate::{
    redemption::{
        FinalStatus,
        RecordId,
        RedemptionRequest,
        SensorReading,
    },
    service::{
        RedemptionService,
        ServiceError,
    },
};
use reqwest::Url;
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;

/// HTTP client for the kiosk's redemption service.
#[derive(Clone, Debug)]
pub struct ServiceClient {
    base_url: String,
    http: reqwest::Client,
}

impl ServiceClient {
    pub fn new(base_url: &Url, request_timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = base_url.as_str().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                ServiceError::Transport(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RedemptionService for ServiceClient {
    async fn create_record(
        &self,
        request: RedemptionRequest,
    ) -> Result<RecordId, ServiceError> {
        let url = format!("{}/add_waste_prize", self.base_url);
        let res = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(transport)?;
        if !status.is_success() {
            let dto: ErrorDto = serde_json::from_slice(&bytes).map_err(|e| {
                ServiceError::Malformed(format!(
                    "create-record failed with {status} and an unreadable body: {e}"
                ))
            })?;
            return Err(ServiceError::Rejected(dto.error));
        }
        let dto: CreatedDto = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Malformed(format!("invalid create-record payload: {e}")))?;
        Ok(dto.id)
    }

    async fn check_status(&self, id: RecordId) -> Result<SensorReading, ServiceError> {
        let url = format!("{}/check_sensor_response/{}", self.base_url, id);
        let res = self.http.get(url).send().await.map_err(transport)?;
        let status = res.status();
        if !status.is_success() {
            tracing::debug!(record_id = %id, %status, "sensor response not available yet");
            return Ok(SensorReading::Unavailable);
        }
        let bytes = res.bytes().await.map_err(transport)?;
        let dto: SensorResponseDto = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Malformed(format!("invalid sensor payload: {e}")))?;
        Ok(SensorReading::from_signal(dto.sensor_response.as_deref()))
    }

    async fn update_status(
        &self,
        id: RecordId,
        status: FinalStatus,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/update_status/{}", self.base_url, id);
        let res = self
            .http
            .put(url)
            .json(&UpdateStatusDto { status })
            .send()
            .await
            .map_err(transport)?;
        if !res.status().is_success() {
            return Err(ServiceError::UnexpectedStatus(res.status().as_u16()));
        }
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Transport(format!("request timed out: {err}"))
    } else {
        ServiceError::Transport(err.to_string())
    }
}

#[derive(Deserialize)]
struct CreatedDto {
    id: RecordId,
}

#[derive(Deserialize)]
struct ErrorDto {
    error: String,
}

#[derive(Deserialize)]
struct SensorResponseDto {
    #[serde(rename = "SensorResponse", default)]
    sensor_response: Option<String>,
}

#[derive(Serialize)]
struct UpdateStatusDto {
    #[serde(rename = "Status")]
    status: FinalStatus,
}
