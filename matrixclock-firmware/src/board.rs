//! Board services: time, console and whole-device control

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embassy_rp::watchdog::{ResetReason, Watchdog};
use embassy_time::{Instant, Timer};
use embedded_io::{Read, ReadReady};

use matrixclock_core::traits::{Diagnostics, RestartReason, SystemControl, Timebase};
use matrixclock_hal_rp2040::flash::FLASH_SIZE;

/// Platform string on the diagnostics page
pub const PLATFORM: &str = "RP2040 (embassy-rp 0.9, cyw43 0.6)";

const RAM_SIZE: u32 = 264 * 1024;

/// embassy-time plus the UART0 debug console
pub struct BoardTimebase {
    console: BufferedUartRx,
}

impl BoardTimebase {
    pub fn new(console: BufferedUartRx) -> Self {
        Self { console }
    }
}

impl Timebase for BoardTimebase {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn delay_ms(&mut self, ms: u32) {
        if ms == 0 {
            embassy_futures::yield_now().await;
        } else {
            Timer::after_millis(ms as u64).await;
        }
    }

    fn input_pending(&mut self) -> bool {
        match self.console.read_ready() {
            Ok(true) => {
                // Nothing reads the console, so log and drop what arrived
                // or every later wait would end at once
                let mut input = [0u8; 16];
                match self.console.read(&mut input) {
                    Ok(n) => info!("Console input: {=[u8]:a}", &input[..n]),
                    Err(e) => warn!("Console read failed: {:?}", e),
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Console error: {:?}", e);
                false
            }
        }
    }
}

/// Watchdog-driven reset and static board facts
pub struct BoardSystem {
    watchdog: Watchdog,
    chip_id: u64,
}

impl BoardSystem {
    /// `chip_id` is read from the flash before it is shared
    pub fn new(watchdog: Watchdog, chip_id: u64) -> Self {
        Self { watchdog, chip_id }
    }

    fn reset_reason(&self) -> &'static str {
        match self.watchdog.reset_reason() {
            Some(ResetReason::Forced) => "software reset",
            Some(ResetReason::TimedOut) => "watchdog timeout",
            None => "power on",
        }
    }
}

impl SystemControl for BoardSystem {
    fn restart(&mut self, reason: RestartReason) {
        warn!("Restarting: {}", reason.as_str());
        self.watchdog.trigger_reset();
        cortex_m::peripheral::SCB::sys_reset();
    }

    fn diagnostics(&mut self) -> Diagnostics {
        let layout = memory_layout();
        Diagnostics {
            platform: PLATFORM,
            reset_reason: self.reset_reason(),
            free_memory: layout.free_ram,
            chip_id: self.chip_id,
            flash_size: FLASH_SIZE as u32,
            image_size: layout.image_size,
        }
    }
}

struct MemoryLayout {
    free_ram: u32,
    image_size: u32,
}

/// Free RAM between the end of static data and the stack pointer, and the
/// bytes of flash the image occupies
#[allow(unsafe_code)]
fn memory_layout() -> MemoryLayout {
    extern "C" {
        static __sheap: u8;
        static __sidata: u8;
        static __sdata: u8;
        static __edata: u8;
    }

    // SAFETY: only the addresses of the linker symbols are taken
    let (sheap, sidata, sdata, edata) = unsafe {
        (
            core::ptr::addr_of!(__sheap) as u32,
            core::ptr::addr_of!(__sidata) as u32,
            core::ptr::addr_of!(__sdata) as u32,
            core::ptr::addr_of!(__edata) as u32,
        )
    };

    const FLASH_BASE: u32 = 0x1000_0000;
    const RAM_BASE: u32 = 0x2000_0000;

    let sp = cortex_m::register::msp::read();
    let ram_top = RAM_BASE + RAM_SIZE;
    MemoryLayout {
        free_ram: sp.min(ram_top).saturating_sub(sheap),
        image_size: (sidata - FLASH_BASE) + (edata - sdata),
    }
}
