//! Catch-all DNS task for the provisioning access point

use defmt::*;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;

use matrixclock_protocol::dhcp::Ipv4;
use matrixclock_protocol::dns::{self, DnsError, DNS_PORT};

use super::dhcp::address;

const FRAME_SIZE: usize = 512;

#[embassy_executor::task]
pub async fn dns_server_task(stack: Stack<'static>, ip: Ipv4) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; FRAME_SIZE];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0u8; FRAME_SIZE];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );

    if let Err(e) = socket.bind(DNS_PORT) {
        error!("DNS server failed to bind: {:?}", e);
        core::panic!("Unable to bind DNS port");
    }
    info!("DNS server answering {}", address(ip));

    let mut frame = [0u8; FRAME_SIZE];
    let mut reply = [0u8; FRAME_SIZE];

    loop {
        let (len, remote) = match socket.recv_from(&mut frame).await {
            Ok(received) => received,
            Err(e) => {
                warn!("DNS recv error: {:?}", e);
                continue;
            }
        };

        match dns::answer(&frame[..len], ip, &mut reply) {
            Ok(reply_len) => {
                if let Err(e) = socket.send_to(&reply[..reply_len], remote).await {
                    warn!("DNS send error: {:?}", e);
                }
            }
            Err(DnsError::NotQuery) => {}
            Err(e) => debug!("DNS query dropped: {:?}", e),
        }
    }
}
