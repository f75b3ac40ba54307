//! NTP over embassy-net UDP

use defmt::*;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Instant};

use matrixclock_core::traits::NtpTransport;
use matrixclock_protocol::ntp::{NTP_LOCAL_PORT, NTP_PORT};
use matrixclock_protocol::{NtpError, NtpPacket, NTP_PACKET_SIZE};

/// One UDP exchange per sync; the socket lives only for the query
pub struct UdpNtp {
    stack: Stack<'static>,
}

impl UdpNtp {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl NtpTransport for UdpNtp {
    async fn exchange(
        &mut self,
        server: &str,
        request: &NtpPacket,
        timeout_ms: u32,
    ) -> Result<NtpPacket, NtpError> {
        let addrs = self
            .stack
            .dns_query(server, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS lookup of {} failed: {:?}", server, e);
                NtpError::DnsFailed
            })?;
        let addr = *addrs.first().ok_or(NtpError::DnsFailed)?;

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 128];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 128];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(NTP_LOCAL_PORT).map_err(|e| {
            warn!("NTP bind failed: {:?}", e);
            NtpError::Socket
        })?;

        info!("Sending NTP packet to {} ({})", server, addr);
        socket
            .send_to(request, (addr, NTP_PORT))
            .await
            .map_err(|e| {
                warn!("NTP send failed: {:?}", e);
                NtpError::Socket
            })?;

        // Short datagrams are ignored until the deadline
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        let mut datagram = [0u8; 2 * NTP_PACKET_SIZE];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match with_timeout(remaining, socket.recv_from(&mut datagram)).await {
                Ok(Ok((len, _))) if len >= NTP_PACKET_SIZE => {
                    debug!("NTP response received");
                    let mut response: NtpPacket = [0; NTP_PACKET_SIZE];
                    response.copy_from_slice(&datagram[..NTP_PACKET_SIZE]);
                    return Ok(response);
                }
                Ok(Ok((len, _))) => debug!("Ignoring {}-byte datagram", len),
                Ok(Err(e)) => {
                    warn!("NTP receive failed: {:?}", e);
                    return Err(NtpError::Socket);
                }
                Err(_) => {
                    warn!("No NTP response within {} ms", timeout_ms);
                    return Err(NtpError::Timeout);
                }
            }
        }
    }
}
