//! Over-the-air update bookkeeping
//!
//! The pusher connects to [`OTA_PORT`], sends the image length as a
//! little-endian `u32` and then streams the image. [`OtaReceiver`] tracks
//! that stream independent of the socket and flash underneath; the
//! firmware writes each chunk to the bootloader's update partition and
//! forwards the resulting [`OtaEvent`]s to the display through [`show_event`].

use matrixclock_display::{DisplayError, MatrixPanel, Renderer};

/// TCP port the update listener binds
pub const OTA_PORT: u16 = 8266;

/// Length of the image size header
pub const OTA_HEADER_LEN: usize = 4;

/// Errors that abort an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtaError {
    /// Announced size is zero or larger than the update partition
    Begin,
    /// Pusher could not be accepted
    Connect,
    /// Connection dropped or timed out mid-transfer
    Receive,
    /// Update partition write failed
    Flash,
    /// More or fewer bytes arrived than announced
    End,
}

/// Progress notifications during a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtaEvent {
    Started { total: u32 },
    Progress { done: u32, total: u32 },
    Finished,
    Failed(OtaError),
}

/// Byte accounting for one incoming image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaReceiver {
    total: u32,
    received: u32,
}

impl OtaReceiver {
    /// Validate the size header against the image capacity
    pub fn begin(header: [u8; OTA_HEADER_LEN], capacity: u32) -> Result<(Self, OtaEvent), OtaError> {
        let total = u32::from_le_bytes(header);
        if total == 0 || total > capacity {
            return Err(OtaError::Begin);
        }
        Ok((Self { total, received: 0 }, OtaEvent::Started { total }))
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Image offset of the next chunk
    pub fn offset(&self) -> u32 {
        self.received
    }

    pub fn remaining(&self) -> u32 {
        self.total - self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }

    /// Account for a chunk that was written at [`Self::offset`]
    pub fn accept(&mut self, len: usize) -> Result<OtaEvent, OtaError> {
        let len = u32::try_from(len).map_err(|_| OtaError::End)?;
        if len > self.remaining() {
            return Err(OtaError::End);
        }
        self.received += len;
        Ok(OtaEvent::Progress {
            done: self.received,
            total: self.total,
        })
    }

    /// Close the transfer
    pub fn finish(&self) -> Result<OtaEvent, OtaError> {
        if self.is_complete() {
            Ok(OtaEvent::Finished)
        } else {
            Err(OtaError::End)
        }
    }
}

/// Mirror an update event on the matrix
pub fn show_event<P: MatrixPanel>(renderer: &mut Renderer<P>, event: &OtaEvent) -> Result<(), DisplayError> {
    match *event {
        OtaEvent::Started { .. } => renderer.show_message("OTA"),
        OtaEvent::Progress { done, total } => renderer.show_progress(done, total),
        OtaEvent::Finished => renderer.show_message("DONE!"),
        OtaEvent::Failed(_) => renderer.show_message("OTA ER"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrixclock_display::TileRows;

    struct NullPanel;

    impl MatrixPanel for NullPanel {
        fn write(&mut self, _rows: &TileRows) -> Result<(), DisplayError> {
            Ok(())
        }

        fn set_intensity(&mut self, _level: u8) -> Result<(), DisplayError> {
            Ok(())
        }
    }

    #[test]
    fn test_begin_validates_size() {
        assert_eq!(OtaReceiver::begin([0; 4], 1024), Err(OtaError::Begin));
        assert_eq!(
            OtaReceiver::begin(2048u32.to_le_bytes(), 1024),
            Err(OtaError::Begin)
        );
        let (rx, event) = OtaReceiver::begin(1000u32.to_le_bytes(), 1024).unwrap();
        assert_eq!(event, OtaEvent::Started { total: 1000 });
        assert_eq!(rx.total(), 1000);
        assert_eq!(rx.offset(), 0);
    }

    #[test]
    fn test_progress_and_finish() {
        let (mut rx, _) = OtaReceiver::begin(1000u32.to_le_bytes(), 4096).unwrap();
        assert_eq!(
            rx.accept(600),
            Ok(OtaEvent::Progress { done: 600, total: 1000 })
        );
        assert_eq!(rx.finish(), Err(OtaError::End));
        assert_eq!(rx.offset(), 600);
        assert_eq!(
            rx.accept(400),
            Ok(OtaEvent::Progress { done: 1000, total: 1000 })
        );
        assert_eq!(rx.finish(), Ok(OtaEvent::Finished));
    }

    #[test]
    fn test_overrun_rejected() {
        let (mut rx, _) = OtaReceiver::begin(10u32.to_le_bytes(), 4096).unwrap();
        assert_eq!(rx.accept(11), Err(OtaError::End));
        assert_eq!(rx.offset(), 0);
    }

    #[test]
    fn test_events_on_display() {
        let mut renderer = Renderer::new(NullPanel);

        show_event(&mut renderer, &OtaEvent::Started { total: 10 }).unwrap();
        let ota_pixels = renderer.frame().lit_count();
        assert!(ota_pixels > 0);

        show_event(&mut renderer, &OtaEvent::Progress { done: 500, total: 1000 }).unwrap();
        // "P" plus the narrow colon
        assert_eq!(renderer.frame().column(7), 0b0001_0100);

        show_event(&mut renderer, &OtaEvent::Failed(OtaError::Receive)).unwrap();
        assert_ne!(renderer.frame().lit_count(), ota_pixels);
    }
}
