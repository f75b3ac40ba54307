//! Persistent WiFi credentials

use core::future::Future;

use crate::net::{CredentialError, WifiCredentials};

/// Where the provisioning portal leaves the station credentials
pub trait CredentialStore {
    /// Stored credentials, `None` when never provisioned
    fn load(&mut self) -> impl Future<Output = Result<Option<WifiCredentials>, CredentialError>>;

    /// Persist credentials, replacing any previous ones
    fn store(&mut self, credentials: &WifiCredentials) -> impl Future<Output = Result<(), CredentialError>>;

    /// Forget stored credentials
    fn erase(&mut self) -> impl Future<Output = Result<(), CredentialError>>;
}
