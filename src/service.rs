use crate::redemption::{
    FinalStatus,
    RecordId,
    RedemptionRequest,
    SensorReading,
};
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ServiceError {
    /// The service answered with a structured `{ "error": ... }` payload.
    #[error("{0}")]
    Rejected(String),
    #[error("service request failed: {0}")]
    Transport(String),
    #[error("malformed service response: {0}")]
    Malformed(String),
    #[error("service responded with HTTP {0}")]
    UnexpectedStatus(u16),
}

impl ServiceError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::Rejected(_))
    }
}

/// The remote redemption service, seen as a black box.
pub trait RedemptionService: Clone + Send + Sync + 'static {
    fn create_record(
        &self,
        request: RedemptionRequest,
    ) -> impl Future<Output = Result<RecordId, ServiceError>> + Send;

    /// `Ok(SensorReading::Unavailable)` covers "nothing yet"; `Err` is a broken channel.
    fn check_status(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<SensorReading, ServiceError>> + Send;

    fn update_status(
        &self,
        id: RecordId,
        status: FinalStatus,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}
