//! Flash storage driver for RP2040
//!
//! The Pico W's 2MB flash, shared with the bootloader:
//!
//! ```text
//! 0x000000 bootloader   0x006000 boot state   0x007000 active image
//! 0x0E7000 update (DFU) 0x1C8000 unused       0x1F0000 key/value
//! ```
//!
//! The partition bounds come from the linker script; only the key/value
//! range is fixed here. It uses sequential-storage for wear levelling and
//! implements the `FlashStorage` trait from `matrixclock-hal`. The whole
//! chip is also exposed as an async `NorFlash` so the firmware updater can
//! address the boot state and update partitions through the same driver.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Error, Flash, ERASE_SIZE, READ_SIZE, WRITE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use embedded_storage_async::nor_flash::{ErrorType, NorFlash, ReadNorFlash};
use sequential_storage::cache::NoCache;
use sequential_storage::map;

// Re-export shared types from matrixclock-hal
pub use matrixclock_hal::flash::{FlashError, StorageKey};

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB flash on the Pico W
pub const CONFIG_PARTITION_SIZE: usize = 64 * 1024;
pub const CONFIG_PARTITION_START: usize = FLASH_SIZE - CONFIG_PARTITION_SIZE;

/// Largest image the active partition holds (`FLASH` in memory.x)
pub const IMAGE_CAPACITY: usize = 896 * 1024;

/// Flash erase size for RP2040
pub const FLASH_ERASE_SIZE: usize = ERASE_SIZE;

/// Flash range for the key/value partition
pub const CONFIG_RANGE: core::ops::Range<u32> =
    (CONFIG_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Largest value stored under a single key
const MAX_ITEM_SIZE: usize = 256;

/// RP2040 flash storage implementation
pub struct Rp2040FlashStorage<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> Rp2040FlashStorage<'d> {
    /// Create a new flash storage instance
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }

    /// Read the 64-bit unique id of the flash chip
    pub fn unique_id(&mut self) -> Result<u64, FlashError> {
        let mut id = [0u8; 8];
        self.flash
            .blocking_unique_id(&mut id)
            .map_err(|_| FlashError::Flash)?;
        Ok(u64::from_be_bytes(id))
    }
}

impl ErrorType for Rp2040FlashStorage<'_> {
    type Error = Error;
}

impl ReadNorFlash for Rp2040FlashStorage<'_> {
    const READ_SIZE: usize = READ_SIZE;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        ReadNorFlash::read(&mut self.flash, offset, bytes).await
    }

    fn capacity(&self) -> usize {
        FLASH_SIZE
    }
}

impl NorFlash for Rp2040FlashStorage<'_> {
    const WRITE_SIZE: usize = WRITE_SIZE;
    const ERASE_SIZE: usize = ERASE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Error> {
        NorFlash::erase(&mut self.flash, from, to).await
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error> {
        NorFlash::write(&mut self.flash, offset, bytes).await
    }
}

impl matrixclock_hal::FlashStorage for Rp2040FlashStorage<'_> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let mut data_buffer = [0u8; MAX_ITEM_SIZE];

        let result = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        )
        .await;

        match result {
            Ok(Some(data)) => {
                let len = data.len();
                if buffer.len() < len {
                    return Err(FlashError::BufferTooSmall);
                }
                buffer[..len].copy_from_slice(data);
                Ok(len)
            }
            Ok(None) => Err(FlashError::NotFound),
            Err(_) => Err(FlashError::Storage),
        }
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let mut data_buffer = [0u8; MAX_ITEM_SIZE];

        map::store_item(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &data,
        )
        .await
        .map_err(|_| FlashError::Storage)
    }

    async fn remove(&mut self, key: StorageKey) -> Result<(), FlashError> {
        let mut data_buffer = [0u8; MAX_ITEM_SIZE];

        map::remove_item(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        )
        .await
        .map_err(|_| FlashError::Storage)
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        let mut data_buffer = [0u8; MAX_ITEM_SIZE];

        matches!(
            map::fetch_item::<StorageKey, &[u8], _>(
                &mut self.flash,
                CONFIG_RANGE,
                &mut NoCache::new(),
                &mut data_buffer,
                &key,
            )
            .await,
            Ok(Some(_))
        )
    }
}
