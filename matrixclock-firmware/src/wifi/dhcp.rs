//! Lease server task for the provisioning access point

use defmt::*;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{Ipv4Address, Stack};
use embassy_time::Instant;

use matrixclock_protocol::dhcp::{
    DhcpError, DhcpRequest, Ipv4, LeaseTable, ServerConfig, DHCP_CLIENT_PORT, DHCP_SERVER_PORT,
};

const FRAME_SIZE: usize = 768;

pub fn address(ip: Ipv4) -> Ipv4Address {
    Ipv4Address::new(ip[0], ip[1], ip[2], ip[3])
}

#[embassy_executor::task]
pub async fn dhcp_server_task(stack: Stack<'static>, config: ServerConfig) -> ! {
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

    if let Err(e) = socket.bind(DHCP_SERVER_PORT) {
        error!("DHCP server failed to bind: {:?}", e);
        core::panic!("Unable to bind DHCP port");
    }
    info!("DHCP server listening on {}", address(config.server_ip));

    let broadcast = (address(config.broadcast()), DHCP_CLIENT_PORT);
    let mut leases = LeaseTable::new();
    let mut frame = [0u8; FRAME_SIZE];
    let mut reply = [0u8; FRAME_SIZE];

    loop {
        let len = match socket.recv_from(&mut frame).await {
            Ok((len, _)) => len,
            Err(e) => {
                warn!("DHCP recv error: {:?}", e);
                continue;
            }
        };

        let Some(request) = DhcpRequest::parse(&frame[..len]) else {
            continue;
        };
        debug!("DHCP {:?} from {:02X}", request.message_type, request.client_mac);

        let now_s = Instant::now().as_secs();
        match leases.respond(&config, &request, now_s, &mut reply) {
            Ok(reply_len) => {
                if let Err(e) = socket.send_to(&reply[..reply_len], broadcast).await {
                    warn!("DHCP send error: {:?}", e);
                }
            }
            Err(DhcpError::NoReply) => {}
            Err(e) => warn!("DHCP reply failed: {:?}", e),
        }
    }
}
