//! Matrixclock - WiFi LED Matrix Clock Firmware
//!
//! Main firmware binary for the RP2040 Pico W. Boot brings up the display,
//! the tilt sensor and the radio, joins the stored network (or runs the
//! provisioning portal) and then hands everything to the control loop in
//! `matrixclock-core`.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{PIO0, UART0};
use embassy_rp::pio::InterruptHandler as PioInterruptHandler;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_rp::watchdog::Watchdog;
use embassy_sync::mutex::Mutex;
use embassy_time::Instant;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use matrixclock_core::config::VERSION;
use matrixclock_core::control::{ClockContext, Devices, IterationReport};
use matrixclock_core::net::LinkTransition;
use matrixclock_core::sensor::OrientationSensor;
use matrixclock_core::traits::{CredentialStore, RestartReason, SystemControl};
use matrixclock_display::{MatrixPanel, Orientation, Renderer};
use matrixclock_drivers::button::Button;
use matrixclock_drivers::imu::Mpu6050;
use matrixclock_drivers::max7219::Max7219;
use matrixclock_hal::i2c::I2cConfig;
use matrixclock_hal::spi::SpiConfig;
use matrixclock_hal_rp2040::bus::{BlockingI2c, BlockingSpi};
use matrixclock_hal_rp2040::flash::Rp2040FlashStorage;
use matrixclock_hal_rp2040::gpio::{GpioInput, GpioOutput};

use crate::board::{BoardSystem, BoardTimebase};
use crate::config::load_config;
use crate::ntp::UdpNtp;
use crate::ota::{confirm_boot, OtaListener};
use crate::storage::{FlashCredentialStore, SharedFlash};
use crate::web::HttpServer;
use crate::wifi::RadioPins;

mod board;
mod config;
mod ntp;
mod ota;
mod storage;
mod web;
mod wifi;

/// Embedded configuration (compiled into firmware)
/// Edit clock.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../clock.toml");

/// Gyro samples averaged at boot while the clock hangs still
const GYRO_CALIBRATION_SAMPLES: u16 = 200;

bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

static CONSOLE_TX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CONSOLE_RX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static FLASH: StaticCell<SharedFlash> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Matrixclock firmware v{} starting...", VERSION);

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config(EMBEDDED_CONFIG);

    // Debug console on UART0; pending input cuts loop sleeps short
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let uart = uart.into_buffered(
        Irqs,
        CONSOLE_TX_BUF.init([0; 64]),
        CONSOLE_RX_BUF.init([0; 64]),
    );
    let (_console_tx, console_rx) = uart.split();
    let timebase = BoardTimebase::new(console_rx);

    let mut flash = Rp2040FlashStorage::new(p.FLASH, p.DMA_CH1);
    let chip_id = flash.unique_id().unwrap_or_else(|e| {
        warn!("Could not read flash unique id: {:?}", e);
        0
    });
    let flash: &'static SharedFlash = FLASH.init(Mutex::new(flash));
    let mut system = BoardSystem::new(Watchdog::new(p.WATCHDOG), chip_id);
    info!("Chip id {:016X}", chip_id);

    // MAX7219 chain on SPI0
    let spi = BlockingSpi::new(p.SPI0, p.PIN_18, p.PIN_19, SpiConfig::MAX7219);
    let cs = GpioOutput::new(Output::new(p.PIN_17, Level::High));
    let mut panel = Max7219::new(spi, cs);
    if let Err(e) = panel.init(config.intensity) {
        error!("Display init failed: {:?}", e);
    }
    let mut renderer = Renderer::new(panel);
    info!("Display initialized");

    // MPU6050 on I2C0
    let i2c = BlockingI2c::new(p.I2C0, p.PIN_5, p.PIN_4, I2cConfig::FAST);
    let mut imu = Mpu6050::new(i2c);
    let imu_ready = config.imu_enabled && init_imu(&mut imu);
    let sensor = OrientationSensor::new(imu, imu_ready);

    let button = Button::new(GpioInput::new(Input::new(p.PIN_15, Pull::Up)));

    show(&mut renderer, "WiFi");
    let seed = chip_id ^ Instant::now().as_ticks();
    let mut link = wifi::init(
        spawner,
        RadioPins {
            pwr: p.PIN_23,
            cs: p.PIN_25,
            pio: p.PIO0,
            clk: p.PIN_29,
            dio: p.PIN_24,
            dma: p.DMA_CH0,
        },
        config.hostname.as_str(),
        seed,
    )
    .await;
    confirm_boot(flash).await;

    let mut credentials = FlashCredentialStore::new(flash);
    let stored = match credentials.load().await {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Stored credentials unreadable: {:?}", e);
            None
        }
    };

    let joined = match &stored {
        Some(stored) => match link.join(stored).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not join {}: {:?}", stored.ssid.as_str(), e);
                false
            }
        },
        None => {
            info!("No stored credentials");
            false
        }
    };

    if !joined {
        show(&mut renderer, "WM CFG");
        let reason = match wifi::portal::run(
            spawner,
            &mut link,
            config.hostname.as_str(),
            config.portal_timeout_s,
        )
        .await
        {
            Some(new) => {
                if let Err(e) = credentials.store(&new).await {
                    error!("Failed to store credentials: {:?}", e);
                }
                RestartReason::CredentialsSaved
            }
            None => RestartReason::PortalTimeout,
        };
        system.restart(reason);
        return;
    }

    let stack = link.stack();
    let mut devices = Devices {
        timebase,
        renderer,
        sensor,
        button,
        link,
        ntp: UdpNtp::new(stack),
        web: HttpServer::new(stack),
        ota: OtaListener::new(stack, flash),
        credentials,
        system,
    };

    let mut ctx = ClockContext::new(config);
    match devices.start(&ctx).await {
        Ok(orientation) => info!("Ready, mounted {:?}", orientation),
        Err(e) => error!("Display start failed: {:?}", e),
    }

    let mut logger = ReportLogger::default();
    let reason = devices.run(&mut ctx, |report| logger.log(report)).await;
    error!("Control loop ended: {}", reason.as_str());
}

/// Bring the IMU up and zero its gyro; false disables orientation sensing
fn init_imu<I: matrixclock_hal::I2cBus>(imu: &mut Mpu6050<I>) -> bool {
    if let Err(e) = imu.init() {
        warn!("MPU6050 not available: {:?}", e);
        return false;
    }
    match imu.calibrate_gyro(GYRO_CALIBRATION_SAMPLES) {
        Ok(offsets) => {
            debug!("Gyro offsets {} {} {}", offsets[0], offsets[1], offsets[2]);
            true
        }
        Err(e) => {
            warn!("Gyro calibration failed: {:?}", e);
            false
        }
    }
}

fn show<P: MatrixPanel>(renderer: &mut Renderer<P>, text: &str) {
    if let Err(e) = renderer.show_message(text) {
        warn!("Display error: {:?}", e);
    }
}

/// Turns loop reports into log lines
#[derive(Default)]
struct ReportLogger {
    orientation: Option<Orientation>,
}

impl ReportLogger {
    fn log(&mut self, report: &IterationReport) {
        match report.link {
            Some(LinkTransition::Lost { at_s }) => warn!("WiFi lost at {}s", at_s),
            Some(LinkTransition::Restored { outage_s }) => {
                info!("WiFi restored after {}s", outage_s)
            }
            None => {}
        }

        match report.sync {
            Some(Ok(epoch)) => info!("NTP sync: local epoch {}", epoch),
            Some(Err(e)) => warn!("NTP sync failed: {:?}", e),
            None => {}
        }

        if let Some(orientation) = report.orientation {
            if self.orientation != Some(orientation) {
                info!("Orientation {:?}", orientation);
                self.orientation = Some(orientation);
            }
        }

        if report.web_served {
            debug!("HTTP request served");
        }
        if report.scrolled {
            info!("Button pressed");
        }
        if let Some(now) = report.redrawn {
            trace!("{:02}:{:02}:{:02}", now.hour, now.minute, now.second);
        }

        if let Some(e) = report.display_error {
            warn!("Display error: {:?}", e);
        }
        if let Some(e) = report.sensor_error {
            warn!("Sensor error: {:?}", e);
        }
        if let Some(e) = report.credential_error {
            warn!("Credential error: {:?}", e);
        }
        if let Some(Err(e)) = report.ota {
            error!("OTA failed: {:?}", e);
        }
        if let Some(reason) = report.restart {
            warn!("Restart requested: {}", reason.as_str());
        }

        trace!("pass: {}ms active, {}ms slept", report.active_ms, report.slept_ms);
    }
}
