//! Firmware push receiver on TCP 8266
//!
//! Same listening scheme as the web server: a connected pusher is served
//! to completion inside one loop pass. The image is collected into
//! erase-sized pages and written to the bootloader's DFU partition with
//! embassy-boot's `FirmwareUpdater`. Once every byte has arrived the
//! update is marked, and the bootloader swaps it in on the next reset.

use defmt::*;
use embassy_boot_rp::{AlignedBuffer, FirmwareUpdater, FirmwareUpdaterConfig, State as BootState};
use embassy_futures::poll_once;
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::Stack;
use embassy_rp::flash::WRITE_SIZE;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read as _, Write as _};
use static_cell::StaticCell;

use matrixclock_core::ota::{OtaError, OtaEvent, OtaReceiver, OTA_HEADER_LEN, OTA_PORT};
use matrixclock_core::traits::OtaPort;
use matrixclock_display::renderer::progress_percent;
use matrixclock_hal_rp2040::flash::{FLASH_ERASE_SIZE, IMAGE_CAPACITY};

use crate::storage::SharedFlash;

const RX_BUFFER_SIZE: usize = 4096;
const TX_BUFFER_SIZE: usize = 64;

/// Unwritten tail of the last page
const ERASED: u8 = 0xFF;

/// A stalled pusher aborts the transfer after this long
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Keep an image the bootloader just swapped in
///
/// Until this runs the bootloader rolls back to the previous image on
/// the next reset, and the updater refuses new images.
pub async fn confirm_boot(flash: &'static SharedFlash) {
    let config = FirmwareUpdaterConfig::from_linkerfile(flash, flash);
    let mut aligned = AlignedBuffer([0; WRITE_SIZE]);
    let mut updater = FirmwareUpdater::new(config, &mut aligned.0);

    match updater.get_state().await {
        Ok(BootState::Swap) => match updater.mark_booted().await {
            Ok(()) => info!("Updated firmware confirmed"),
            Err(e) => error!("Could not confirm updated firmware: {:?}", e),
        },
        Ok(_) => {}
        Err(e) => warn!("Boot state unreadable: {:?}", e),
    }
}

/// Update listener
pub struct OtaListener {
    socket: TcpSocket<'static>,
    flash: &'static SharedFlash,
    page: &'static mut [u8; FLASH_ERASE_SIZE],
}

impl OtaListener {
    pub fn new(stack: Stack<'static>, flash: &'static SharedFlash) -> Self {
        static RX_BUFFER: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
        static TX_BUFFER: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();
        static PAGE: StaticCell<[u8; FLASH_ERASE_SIZE]> = StaticCell::new();

        let mut socket = TcpSocket::new(
            stack,
            RX_BUFFER.init([0; RX_BUFFER_SIZE]),
            TX_BUFFER.init([0; TX_BUFFER_SIZE]),
        );
        socket.set_timeout(Some(RECEIVE_TIMEOUT));

        let mut listener = Self {
            socket,
            flash,
            page: PAGE.init([0; FLASH_ERASE_SIZE]),
        };
        listener.listen();
        info!("OTA listening on port {}", OTA_PORT);
        listener
    }

    fn listen(&mut self) {
        if let core::task::Poll::Ready(Err(e)) = poll_once(self.socket.accept(OTA_PORT)) {
            warn!("OTA listen failed: {:?}", e);
        }
    }

    fn recycle(&mut self) {
        self.socket.abort();
        self.listen();
    }

    async fn receive<F>(&mut self, on_event: &mut F) -> Result<(), OtaError>
    where
        F: FnMut(OtaEvent),
    {
        let mut header = [0u8; OTA_HEADER_LEN];
        match with_timeout(RECEIVE_TIMEOUT, self.socket.read_exact(&mut header)).await {
            Ok(Ok(())) => {}
            _ => return Err(OtaError::Connect),
        }

        let (mut receiver, started) = OtaReceiver::begin(header, IMAGE_CAPACITY as u32)?;
        info!("OTA start: {} bytes", receiver.total());
        on_event(started);

        let config = FirmwareUpdaterConfig::from_linkerfile(self.flash, self.flash);
        let mut aligned = AlignedBuffer([0; WRITE_SIZE]);
        let mut updater = FirmwareUpdater::new(config, &mut aligned.0);

        let mut filled = 0;
        let mut page_offset = 0;
        let mut last_percent = 0;
        while !receiver.is_complete() {
            let want = (receiver.remaining() as usize).min(FLASH_ERASE_SIZE - filled);
            let read = with_timeout(
                RECEIVE_TIMEOUT,
                self.socket.read(&mut self.page[filled..filled + want]),
            )
            .await;
            let n = match read {
                Ok(Ok(n)) if n > 0 => n,
                _ => return Err(OtaError::Receive),
            };
            filled += n;
            let event = receiver.accept(n)?;

            if filled == FLASH_ERASE_SIZE || receiver.is_complete() {
                self.page[filled..].fill(ERASED);
                updater
                    .write_firmware(page_offset, &self.page[..])
                    .await
                    .map_err(|e| {
                        warn!("OTA write failed at {}: {:?}", page_offset, e);
                        OtaError::Flash
                    })?;
                page_offset += FLASH_ERASE_SIZE;
                filled = 0;
            }

            let percent = progress_percent(receiver.offset(), receiver.total());
            if percent != last_percent {
                debug!("OTA progress: {}%", percent);
                last_percent = percent;
            }
            on_event(event);
        }

        let finished = receiver.finish()?;
        updater.mark_updated().await.map_err(|e| {
            warn!("OTA mark failed: {:?}", e);
            OtaError::End
        })?;

        let _ = self.socket.write_all(b"OK").await;
        info!("OTA end");
        on_event(finished);
        Ok(())
    }
}

impl OtaPort for OtaListener {
    async fn service<F>(&mut self, mut on_event: F) -> Option<Result<(), OtaError>>
    where
        F: FnMut(OtaEvent),
    {
        match self.socket.state() {
            State::Established | State::CloseWait => {}
            State::Listen | State::SynReceived => return None,
            State::Closed => {
                self.listen();
                return None;
            }
            _ => {
                self.recycle();
                return None;
            }
        }

        let result = self.receive(&mut on_event).await;
        if let Err(e) = result {
            error!("OTA error: {:?}", e);
            on_event(OtaEvent::Failed(e));
        }
        self.socket.close();
        let _ = with_timeout(Duration::from_secs(1), self.socket.flush()).await;
        self.recycle();
        Some(result)
    }
}
