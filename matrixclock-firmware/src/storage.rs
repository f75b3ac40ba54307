//! Persistent state on the shared flash
//!
//! The credential store and the OTA receiver both write flash; they take
//! turns through one async mutex. Everything runs on the main task, and
//! the firmware updater expects a `NoopRawMutex`.

use defmt::*;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;

use matrixclock_core::net::{CredentialError, WifiCredentials, CREDENTIALS_BUFFER_SIZE};
use matrixclock_core::traits::CredentialStore;
use matrixclock_hal_rp2040::flash::{FlashError, Rp2040FlashStorage, StorageKey};
use matrixclock_hal_rp2040::FlashStorageTrait;

/// Flash shared between the tasks that persist state
pub type SharedFlash = Mutex<NoopRawMutex, Rp2040FlashStorage<'static>>;

/// WiFi credentials under [`StorageKey::WifiCredentials`]
pub struct FlashCredentialStore {
    flash: &'static SharedFlash,
}

impl FlashCredentialStore {
    pub fn new(flash: &'static SharedFlash) -> Self {
        Self { flash }
    }
}

impl CredentialStore for FlashCredentialStore {
    async fn load(&mut self) -> Result<Option<WifiCredentials>, CredentialError> {
        let mut buffer = [0u8; CREDENTIALS_BUFFER_SIZE];
        let read = self
            .flash
            .lock()
            .await
            .read(StorageKey::WifiCredentials, &mut buffer)
            .await;

        match read {
            Ok(len) => {
                debug!("Read {} bytes of credentials from flash", len);
                WifiCredentials::decode(&buffer[..len]).map(Some)
            }
            Err(FlashError::NotFound) => Ok(None),
            Err(e) => {
                warn!("Credential read failed: {:?}", e);
                Err(CredentialError::Storage)
            }
        }
    }

    async fn store(&mut self, credentials: &WifiCredentials) -> Result<(), CredentialError> {
        let mut buffer = [0u8; CREDENTIALS_BUFFER_SIZE];
        let encoded = credentials.encode(&mut buffer)?;
        self.flash
            .lock()
            .await
            .write(StorageKey::WifiCredentials, encoded)
            .await
            .map_err(|e| {
                warn!("Credential write failed: {:?}", e);
                CredentialError::Storage
            })?;
        info!("Stored credentials for {}", credentials.ssid.as_str());
        Ok(())
    }

    async fn erase(&mut self) -> Result<(), CredentialError> {
        match self
            .flash
            .lock()
            .await
            .remove(StorageKey::WifiCredentials)
            .await
        {
            Ok(()) | Err(FlashError::NotFound) => {
                info!("Credentials erased");
                Ok(())
            }
            Err(e) => {
                warn!("Credential erase failed: {:?}", e);
                Err(CredentialError::Storage)
            }
        }
    }
}
