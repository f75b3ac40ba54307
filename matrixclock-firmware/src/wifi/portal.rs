//! Provisioning portal
//!
//! An open access point named after the hostname, a lease server, a
//! catch-all DNS server and the credential form on port 80. Runs until
//! credentials are submitted or the portal times out.

use defmt::*;
use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::{ConfigV4, Ipv4Cidr, Stack, StaticConfigV4};
use embassy_time::{with_timeout, Duration, Timer};
use heapless::Vec;

use matrixclock_core::net::WifiCredentials;
use matrixclock_core::web::portal::{self, PortalReply};
use matrixclock_protocol::dhcp::ServerConfig;
use matrixclock_protocol::http::MAX_REQUEST_SIZE;

use super::dhcp::{address, dhcp_server_task};
use super::dns::dns_server_task;
use super::StationLink;
use crate::web::{dispatch, read_request, write_response, HTTP_PORT};

/// Channel the access point transmits on
const AP_CHANNEL: u8 = 1;

/// Run the portal; `None` when it timed out
pub async fn run(
    spawner: Spawner,
    link: &mut StationLink,
    hostname: &str,
    timeout_s: u32,
) -> Option<WifiCredentials> {
    let server = ServerConfig::default();
    let stack = link.stack();

    stack.set_config_v4(ConfigV4::Static(StaticConfigV4 {
        address: Ipv4Cidr::new(address(server.server_ip), prefix_len(server.netmask)),
        gateway: Some(address(server.server_ip)),
        dns_servers: Vec::from_slice(&[address(server.server_ip)]).unwrap_or_default(),
    }));

    info!("Starting access point {}", hostname);
    link.control().start_ap_open(hostname, AP_CHANNEL).await;
    spawner.spawn(unwrap!(dhcp_server_task(stack, server)));
    spawner.spawn(unwrap!(dns_server_task(stack, server.server_ip)));

    info!(
        "Portal up at {} for {} seconds",
        address(server.server_ip),
        timeout_s
    );
    let timeout = Duration::from_secs(timeout_s as u64);
    match with_timeout(timeout, serve(stack, hostname)).await {
        Ok(credentials) => Some(credentials),
        Err(_) => {
            warn!("Portal timed out");
            None
        }
    }
}

/// Serve the form until a valid submission arrives
async fn serve(stack: Stack<'static>, hostname: &str) -> WifiCredentials {
    let mut rx_buffer = [0u8; 2048];
    let mut tx_buffer = [0u8; 4096];
    let mut request = [0u8; MAX_REQUEST_SIZE];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(30)));

        if let Err(e) = socket.accept(HTTP_PORT).await {
            warn!("Accept error: {:?}", e);
            Timer::after_millis(500).await;
            continue;
        }

        let Some(len) = read_request(&mut socket, &mut request).await else {
            socket.abort();
            continue;
        };

        let mut saved = None;
        let response = dispatch(&request[..len], |req| match portal::handle(req, hostname) {
            PortalReply::Page(response) => response,
            PortalReply::Saved {
                response,
                credentials,
            } => {
                saved = Some(credentials);
                response
            }
        });
        write_response(&mut socket, &response).await;
        socket.abort();

        if let Some(credentials) = saved {
            info!("Portal received credentials for {}", credentials.ssid.as_str());
            return credentials;
        }
        Timer::after_millis(100).await;
    }
}

fn prefix_len(netmask: [u8; 4]) -> u8 {
    u32::from_be_bytes(netmask).leading_ones() as u8
}
