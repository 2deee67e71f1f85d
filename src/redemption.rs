use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// What the user is depositing. Only drives the waiting message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WasteCategory {
    #[serde(rename = "Plastic Bottles")]
    PlasticBottles,
    #[serde(rename = "Paper")]
    Paper,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 2] = [WasteCategory::PlasticBottles, WasteCategory::Paper];

    pub fn label(&self) -> &'static str {
        match self {
            WasteCategory::PlasticBottles => "Plastic Bottles",
            WasteCategory::Paper => "Paper",
        }
    }

    /// Message shown on the loading overlay while the sensor is waiting.
    pub fn waiting_message(&self) -> &'static str {
        match self {
            WasteCategory::PlasticBottles => "Please Insert Bottle...",
            WasteCategory::Paper => "Please Weigh the Paper...",
        }
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Prize {
    #[serde(rename = "Emergency Kit")]
    EmergencyKit,
    #[serde(rename = "Paper Pad")]
    PaperPad,
}

impl Prize {
    pub const ALL: [Prize; 2] = [Prize::EmergencyKit, Prize::PaperPad];

    pub fn label(&self) -> &'static str {
        match self {
            Prize::EmergencyKit => "Emergency Kit",
            Prize::PaperPad => "Paper Pad",
        }
    }
}

impl fmt::Display for Prize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A (category, prize) pair as sent to the create-record endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    #[serde(rename = "Waste")]
    pub waste_category: WasteCategory,
    #[serde(rename = "Prize")]
    pub prize: Prize,
}

impl RedemptionRequest {
    pub fn new(waste_category: WasteCategory, prize: Prize) -> Self {
        Self {
            waste_category,
            prize,
        }
    }
}

/// Identifier of a redemption record owned by the remote service.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The only statuses the kiosk ever writes back to a record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FinalStatus {
    Complete,
    Failed,
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalStatus::Complete => f.write_str("Complete"),
            FinalStatus::Failed => f.write_str("Failed"),
        }
    }
}

/// What a single status query told us about the sensor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SensorReading {
    Verified,
    Cancelled,
    /// The sensor reported something other than a terminal signal.
    Pending(String),
    /// No reading yet: the field was absent or the service answered non-2xx.
    Unavailable,
}

impl SensorReading {
    pub fn from_signal(signal: Option<&str>) -> Self {
        match signal {
            Some("verified") => SensorReading::Verified,
            Some("cancelled") => SensorReading::Cancelled,
            Some(other) if !other.is_empty() => SensorReading::Pending(other.to_string()),
            _ => SensorReading::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn redemption_request__serializes_with_wire_field_names() {
        // given
        let request = RedemptionRequest::new(WasteCategory::PlasticBottles, Prize::PaperPad);

        // when
        let json = serde_json::to_value(request).unwrap();

        // then
        assert_eq!(
            json,
            serde_json::json!({ "Waste": "Plastic Bottles", "Prize": "Paper Pad" })
        );
    }

    #[test]
    fn from_signal__maps_terminal_and_pending_values() {
        assert_eq!(SensorReading::from_signal(Some("verified")), SensorReading::Verified);
        assert_eq!(
            SensorReading::from_signal(Some("cancelled")),
            SensorReading::Cancelled
        );
        assert_eq!(
            SensorReading::from_signal(Some("waiting")),
            SensorReading::Pending("waiting".to_string())
        );
        assert_eq!(SensorReading::from_signal(Some("")), SensorReading::Unavailable);
        assert_eq!(SensorReading::from_signal(None), SensorReading::Unavailable);
    }

    #[test]
    fn waiting_message__depends_only_on_category() {
        assert_eq!(
            WasteCategory::PlasticBottles.waiting_message(),
            "Please Insert Bottle..."
        );
        assert_eq!(WasteCategory::Paper.waiting_message(), "Please Weigh the Paper...");
    }
}
