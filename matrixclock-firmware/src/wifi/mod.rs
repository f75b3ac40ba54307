//! CYW43 radio, IP stack and station link
//!
//! The radio comes up once at boot with a DHCP client configuration. If
//! joining fails the same stack is switched to the static access point
//! addressing used by the provisioning portal.

pub mod dhcp;
pub mod dns;
pub mod portal;

use cyw43::{JoinOptions, ScanOptions};
use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::*;
use embassy_executor::Spawner;
use embassy_net::{Config, DhcpConfig, Stack, StackResources};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0};
use embassy_rp::pio::Pio;
use embassy_rp::Peri;
use embassy_time::{with_timeout, Duration, Timer};
use heapless::String;
use static_cell::StaticCell;

use matrixclock_core::net::WifiCredentials;
use matrixclock_core::traits::{LinkInfo, NetworkLink};

use crate::Irqs;

/// Sockets the stack can hold at once: DNS client, NTP, HTTP, OTA and the
/// portal's DHCP and DNS servers
const SOCKET_COUNT: usize = 7;

/// Attempts made with stored credentials before falling back to the portal
const JOIN_ATTEMPTS: u32 = 3;

/// Per-attempt join timeout
const JOIN_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for a DHCP lease after associating
const DHCP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors joining the configured network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinError {
    /// Association failed on every attempt
    Association,
    /// Associated, but no DHCP lease arrived
    NoAddress,
}

/// Pins and peripherals wired to the CYW43439 on the Pico W
pub struct RadioPins {
    pub pwr: Peri<'static, PIN_23>,
    pub cs: Peri<'static, PIN_25>,
    pub pio: Peri<'static, PIO0>,
    pub clk: Peri<'static, PIN_29>,
    pub dio: Peri<'static, PIN_24>,
    pub dma: Peri<'static, DMA_CH0>,
}

/// Power up the radio, start its runner and the IP stack
pub async fn init(spawner: Spawner, pins: RadioPins, hostname: &str, seed: u64) -> StationLink {
    let fw = cyw43_firmware::CYW43_43439A0;
    let clm = cyw43_firmware::CYW43_43439A0_CLM;

    let pwr = Output::new(pins.pwr, Level::Low);
    let cs = Output::new(pins.cs, Level::High);
    let mut pio = Pio::new(pins.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        pins.dio,
        pins.clk,
        pins.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.spawn(unwrap!(wifi_task(runner)));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = hostname.try_into().ok();
    if dhcp.hostname.is_none() {
        warn!("Hostname {} not usable for DHCP", hostname);
    }

    static RESOURCES: StaticCell<StackResources<SOCKET_COUNT>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(dhcp),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(unwrap!(net_task(runner)));

    info!("Radio initialized");
    StationLink {
        control,
        stack,
        ssid: String::new(),
        rssi: 0,
    }
}

/// The station side of the radio
pub struct StationLink {
    control: cyw43::Control<'static>,
    stack: Stack<'static>,
    ssid: String<32>,
    rssi: i16,
}

impl StationLink {
    pub fn stack(&self) -> Stack<'static> {
        self.stack
    }

    pub fn control(&mut self) -> &mut cyw43::Control<'static> {
        &mut self.control
    }

    /// Join `credentials`' network and wait for an address
    pub async fn join(&mut self, credentials: &WifiCredentials) -> Result<(), JoinError> {
        self.ssid = credentials.ssid.clone();
        self.rssi = self.scan_rssi(&credentials.ssid).await.unwrap_or(0);

        let options = || {
            if credentials.is_open() {
                JoinOptions::new_open()
            } else {
                JoinOptions::new(credentials.password.as_bytes())
            }
        };

        let mut joined = false;
        for attempt in 1..=JOIN_ATTEMPTS {
            info!("Joining {} (attempt {})", credentials.ssid.as_str(), attempt);
            let join = self.control.join(credentials.ssid.as_str(), options());
            match with_timeout(JOIN_TIMEOUT, join).await {
                Ok(Ok(())) => {
                    joined = true;
                    break;
                }
                Ok(Err(e)) => info!("Join failed: {}", e.status),
                Err(_) => info!("Join timed out"),
            }
            Timer::after_secs(1).await;
        }
        if !joined {
            return Err(JoinError::Association);
        }

        info!("WiFi connected, waiting for DHCP...");
        if with_timeout(DHCP_TIMEOUT, self.stack.wait_config_up()).await.is_err() {
            warn!("No DHCP lease");
            return Err(JoinError::NoAddress);
        }

        if let Some(config) = self.stack.config_v4() {
            info!("IP address: {}", config.address);
        }
        Ok(())
    }

    /// Signal strength of `ssid` from a scan, if it is in range
    async fn scan_rssi(&mut self, ssid: &str) -> Option<i16> {
        let mut best = None;
        let mut scanner = self.control.scan(ScanOptions::default()).await;
        while let Some(bss) = scanner.next().await {
            let len = (bss.ssid_len as usize).min(bss.ssid.len());
            if &bss.ssid[..len] == ssid.as_bytes() {
                best = Some(best.map_or(bss.rssi, |rssi: i16| rssi.max(bss.rssi)));
            }
        }
        if best.is_none() {
            warn!("{} not found in scan", ssid);
        }
        best
    }
}

impl NetworkLink for StationLink {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }

    fn info(&self) -> LinkInfo {
        let ip = self
            .stack
            .config_v4()
            .map(|config| config.address.address().octets())
            .unwrap_or_default();
        LinkInfo {
            ssid: self.ssid.clone(),
            rssi: self.rssi,
            ip,
        }
    }

    async fn disconnect(&mut self) {
        info!("Leaving {}", self.ssid.as_str());
        self.control.leave().await;
    }
}

#[embassy_executor::task]
async fn wifi_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}
