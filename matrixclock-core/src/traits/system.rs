//! Whole-device control and diagnostics

/// Why the device restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartReason {
    /// `/restart` was requested
    Requested,
    /// WiFi was down for longer than the downtime limit
    DowntimeExceeded,
    /// Credentials were wiped through `/resetWifi`
    CredentialsCleared,
    /// New credentials were saved by the portal
    CredentialsSaved,
    /// Portal closed without credentials
    PortalTimeout,
    /// Firmware image received
    OtaFinished,
    /// Firmware transfer failed
    OtaFailed,
}

impl RestartReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartReason::Requested => "restart requested",
            RestartReason::DowntimeExceeded => "wifi downtime exceeded",
            RestartReason::CredentialsCleared => "wifi credentials cleared",
            RestartReason::CredentialsSaved => "wifi credentials saved",
            RestartReason::PortalTimeout => "config portal timeout",
            RestartReason::OtaFinished => "update finished",
            RestartReason::OtaFailed => "update failed",
        }
    }
}

/// Static facts about the board for the `/info` page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Platform (HAL / SDK) description
    pub platform: &'static str,
    /// Last reset cause
    pub reset_reason: &'static str,
    /// Free RAM in bytes
    pub free_memory: u32,
    /// Unique board id
    pub chip_id: u64,
    /// Flash size in bytes
    pub flash_size: u32,
    /// Bytes used by the firmware image
    pub image_size: u32,
}

/// Device-level operations
pub trait SystemControl {
    /// Reboot the device
    ///
    /// Hardware implementations do not return; test doubles record the
    /// reason and return.
    fn restart(&mut self, reason: RestartReason);

    /// Board facts for the diagnostics page
    fn diagnostics(&mut self) -> Diagnostics;
}
