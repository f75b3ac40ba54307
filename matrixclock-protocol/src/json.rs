//! JSON payload served by `/getTimedate`

use heapless::String;
use serde::Serialize;

/// Capacity of a serialized [`TimePayload`]
pub const TIME_PAYLOAD_CAPACITY: usize = 96;

/// Current local time as polled by the home page widget
///
/// `hour` is in 24-hour form; `is_am` is 1 before noon, 0 after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimePayload {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    #[serde(rename = "isAM")]
    pub is_am: u8,
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl TimePayload {
    /// Serialize to a compact JSON object
    pub fn to_json(&self) -> Result<String<TIME_PAYLOAD_CAPACITY>, serde_json_core::ser::Error> {
        serde_json_core::to_string(self)
    }
}
