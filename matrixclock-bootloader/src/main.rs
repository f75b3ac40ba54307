//! Matrixclock bootloader
//!
//! Sits between boot2 and the clock firmware. When the firmware has
//! marked a freshly pushed image in the DFU partition, the image is
//! swapped into the active partition before jumping to it. An image that
//! never confirms itself is swapped back on the following reset.

#![no_std]
#![no_main]

use core::cell::RefCell;

use cortex_m_rt::{entry, exception, ExceptionFrame};
use defmt::*;
use embassy_boot_rp::{BootLoader, BootLoaderConfig};
use embassy_rp::flash::{Blocking, Flash, FLASH_BASE};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use {defmt_rtt as _, panic_probe as _};

const FLASH_SIZE: usize = 2 * 1024 * 1024;

#[entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());

    // No watchdog: the clock firmware never feeds one
    let flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(p.FLASH);
    let flash = Mutex::<NoopRawMutex, _>::new(RefCell::new(flash));

    let config = BootLoaderConfig::from_linkerfile_blocking(&flash, &flash, &flash);
    let active_offset = config.active.offset();
    let bootloader: BootLoader = BootLoader::prepare(config);

    info!("Jumping to firmware at {:#X}", active_offset);
    unsafe { bootloader.load(FLASH_BASE as u32 + active_offset) }
}

#[exception]
unsafe fn HardFault(_frame: &ExceptionFrame) -> ! {
    cortex_m::peripheral::SCB::sys_reset()
}
