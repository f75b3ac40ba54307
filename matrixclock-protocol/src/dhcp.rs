//! Lease server messages for the provisioning access point
//!
//! While the clock runs its own access point, phones and laptops joining it
//! need an address before they can reach the credential form. This module
//! parses BOOTREQUESTs, keeps a small lease table and builds OFFER/ACK
//! replies. Sockets live in the firmware.

use heapless::Vec;

/// Server (listen) port
pub const DHCP_SERVER_PORT: u16 = 67;

/// Client port replies are broadcast to
pub const DHCP_CLIENT_PORT: u16 = 68;

/// Lease length handed to portal clients
pub const DHCP_LEASE_SECONDS: u32 = 30;

/// Maximum number of concurrent leases
pub const MAX_LEASES: usize = 8;

/// Smallest buffer a reply is built into
pub const MIN_REPLY_SIZE: usize = 300;

const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const BOOTP_HEADER_LEN: usize = 240;

const OPT_PAD: u8 = 0;
const OPT_SUBNET_MASK: u8 = 1;
const OPT_ROUTER: u8 = 3;
const OPT_DNS: u8 = 6;
const OPT_BROADCAST: u8 = 28;
const OPT_REQUESTED_IP: u8 = 50;
const OPT_LEASE_TIME: u8 = 51;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_SERVER_ID: u8 = 54;
const OPT_RENEWAL: u8 = 58;
const OPT_REBINDING: u8 = 59;
const OPT_END: u8 = 255;

/// IPv4 address octets
pub type Ipv4 = [u8; 4];

/// Hardware (MAC) address
pub type Mac = [u8; 6];

/// Errors building a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DhcpError {
    /// Reply buffer smaller than [`MIN_REPLY_SIZE`]
    BufferTooSmall,
    /// The message type has no reply
    NoReply,
    /// Pool exhausted
    PoolExhausted,
}

/// DHCP message type (option 53)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Release,
    Inform,
    Other(u8),
}

impl MessageType {
    fn from_code(code: u8) -> Self {
        match code {
            1 => MessageType::Discover,
            2 => MessageType::Offer,
            3 => MessageType::Request,
            4 => MessageType::Decline,
            5 => MessageType::Ack,
            7 => MessageType::Release,
            8 => MessageType::Inform,
            other => MessageType::Other(other),
        }
    }

    fn code(self) -> u8 {
        match self {
            MessageType::Discover => 1,
            MessageType::Offer => 2,
            MessageType::Request => 3,
            MessageType::Decline => 4,
            MessageType::Ack => 5,
            MessageType::Release => 7,
            MessageType::Inform => 8,
            MessageType::Other(code) => code,
        }
    }
}

/// The fields of a client request the server acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DhcpRequest {
    pub message_type: MessageType,
    pub transaction_id: u32,
    pub flags: u16,
    pub client_mac: Mac,
    pub client_ip: Option<Ipv4>,
    pub requested_ip: Option<Ipv4>,
    pub server_id: Option<Ipv4>,
}

impl DhcpRequest {
    /// Parse an Ethernet BOOTREQUEST carrying a message type option
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < BOOTP_HEADER_LEN || frame[0] != 1 {
            return None;
        }
        // Ethernet with 6-byte MACs only
        if frame[1] != 1 || frame[2] != 6 {
            return None;
        }
        if frame[236..240] != MAGIC_COOKIE {
            return None;
        }

        let transaction_id = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let flags = u16::from_be_bytes([frame[10], frame[11]]);

        let mut message_type = None;
        let mut requested_ip = None;
        let mut server_id = None;

        let mut idx = BOOTP_HEADER_LEN;
        while idx < frame.len() {
            let opt = frame[idx];
            idx += 1;
            match opt {
                OPT_PAD => continue,
                OPT_END => break,
                _ => {
                    let Some(&len) = frame.get(idx) else { break };
                    let len = len as usize;
                    idx += 1;
                    let Some(data) = frame.get(idx..idx + len) else { break };
                    match (opt, len) {
                        (OPT_REQUESTED_IP, 4) => requested_ip = Some(ipv4(data)),
                        (OPT_MESSAGE_TYPE, 1) => message_type = Some(MessageType::from_code(data[0])),
                        (OPT_SERVER_ID, 4) => server_id = Some(ipv4(data)),
                        _ => {}
                    }
                    idx += len;
                }
            }
        }

        let ciaddr = ipv4(&frame[12..16]);
        let mut client_mac = [0u8; 6];
        client_mac.copy_from_slice(&frame[28..34]);

        Some(Self {
            message_type: message_type?,
            transaction_id,
            flags,
            client_mac,
            client_ip: if ciaddr == [0; 4] { None } else { Some(ciaddr) },
            requested_ip,
            server_id,
        })
    }
}

fn ipv4(b: &[u8]) -> Ipv4 {
    [b[0], b[1], b[2], b[3]]
}

/// Static addressing of the access point network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub server_ip: Ipv4,
    pub netmask: Ipv4,
    pub pool_start: Ipv4,
    pub pool_size: u8,
}

impl ServerConfig {
    /// Directed broadcast address of the network
    pub fn broadcast(&self) -> Ipv4 {
        let ip = u32::from_be_bytes(self.server_ip);
        let mask = u32::from_be_bytes(self.netmask);
        (ip | !mask).to_be_bytes()
    }

    fn in_pool(&self, ip: Ipv4) -> bool {
        let start = u32::from_be_bytes(self.pool_start);
        let value = u32::from_be_bytes(ip);
        self.pool_size > 0 && value >= start && value < start + self.pool_size as u32
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_ip: [192, 168, 4, 1],
            netmask: [255, 255, 255, 0],
            pool_start: [192, 168, 4, 2],
            pool_size: MAX_LEASES as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lease {
    mac: Mac,
    ip: Ipv4,
    expires_at_s: u64,
}

/// Lease bookkeeping; time is supplied by the caller in uptime seconds
#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: Vec<Lease, MAX_LEASES>,
}

impl LeaseTable {
    pub const fn new() -> Self {
        Self { leases: Vec::new() }
    }

    /// Number of live leases
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Drop a client's lease
    pub fn release(&mut self, mac: &Mac) {
        self.leases.retain(|lease| &lease.mac != mac);
    }

    /// Find or allocate an address for `mac`, preferring `requested`
    pub fn assign(
        &mut self,
        config: &ServerConfig,
        mac: Mac,
        requested: Option<Ipv4>,
        now_s: u64,
    ) -> Result<Ipv4, DhcpError> {
        self.leases.retain(|lease| lease.expires_at_s > now_s);
        let expires_at_s = now_s + DHCP_LEASE_SECONDS as u64;

        let desired = requested
            .filter(|ip| config.in_pool(*ip))
            .filter(|ip| self.leases.iter().all(|l| l.mac == mac || l.ip != *ip));

        if let Some(existing) = self.leases.iter_mut().find(|l| l.mac == mac) {
            if let Some(ip) = desired {
                existing.ip = ip;
            }
            existing.expires_at_s = expires_at_s;
            return Ok(existing.ip);
        }

        let start = u32::from_be_bytes(config.pool_start);
        let ip = desired
            .or_else(|| {
                (0..config.pool_size as u32)
                    .map(|offset| start.saturating_add(offset).to_be_bytes())
                    .find(|candidate| self.leases.iter().all(|l| l.ip != *candidate))
            })
            .ok_or(DhcpError::PoolExhausted)?;

        self.leases
            .push(Lease { mac, ip, expires_at_s })
            .map_err(|_| DhcpError::PoolExhausted)?;
        Ok(ip)
    }

    /// Handle a request: returns the reply length written into `out`
    ///
    /// DISCOVER gets an OFFER, REQUEST an ACK. REQUESTs addressed to another
    /// server, DECLINE, RELEASE and anything else produce no reply.
    pub fn respond(
        &mut self,
        config: &ServerConfig,
        request: &DhcpRequest,
        now_s: u64,
        out: &mut [u8],
    ) -> Result<usize, DhcpError> {
        let reply_type = match request.message_type {
            MessageType::Discover => MessageType::Offer,
            MessageType::Request => {
                if request.server_id.is_some_and(|id| id != config.server_ip) {
                    return Err(DhcpError::NoReply);
                }
                MessageType::Ack
            }
            MessageType::Decline | MessageType::Release => {
                self.release(&request.client_mac);
                return Err(DhcpError::NoReply);
            }
            _ => return Err(DhcpError::NoReply),
        };

        let offered = self.assign(
            config,
            request.client_mac,
            request.requested_ip.or(request.client_ip),
            now_s,
        )?;
        build_reply(out, request, offered, config, reply_type)
    }
}

fn append_option(out: &mut [u8], idx: &mut usize, code: u8, payload: &[u8]) -> Result<(), DhcpError> {
    let end = *idx + 2 + payload.len();
    if end > out.len() {
        return Err(DhcpError::BufferTooSmall);
    }
    out[*idx] = code;
    out[*idx + 1] = payload.len() as u8;
    out[*idx + 2..end].copy_from_slice(payload);
    *idx = end;
    Ok(())
}

/// Build a BOOTREPLY offering `offered` to the requesting client
pub fn build_reply(
    out: &mut [u8],
    request: &DhcpRequest,
    offered: Ipv4,
    config: &ServerConfig,
    reply_type: MessageType,
) -> Result<usize, DhcpError> {
    if out.len() < MIN_REPLY_SIZE {
        return Err(DhcpError::BufferTooSmall);
    }

    out.fill(0);
    out[0] = 2; // BOOTREPLY
    out[1] = 1;
    out[2] = 6;
    out[4..8].copy_from_slice(&request.transaction_id.to_be_bytes());
    out[10..12].copy_from_slice(&request.flags.to_be_bytes());
    out[16..20].copy_from_slice(&offered);
    out[20..24].copy_from_slice(&config.server_ip);
    out[28..34].copy_from_slice(&request.client_mac);
    out[236..240].copy_from_slice(&MAGIC_COOKIE);

    let lease = DHCP_LEASE_SECONDS;
    let renewal = lease / 2;
    let rebinding = lease * 7 / 8;

    let mut idx = BOOTP_HEADER_LEN;
    append_option(out, &mut idx, OPT_MESSAGE_TYPE, &[reply_type.code()])?;
    append_option(out, &mut idx, OPT_SERVER_ID, &config.server_ip)?;
    append_option(out, &mut idx, OPT_LEASE_TIME, &lease.to_be_bytes())?;
    append_option(out, &mut idx, OPT_RENEWAL, &renewal.to_be_bytes())?;
    append_option(out, &mut idx, OPT_REBINDING, &rebinding.to_be_bytes())?;
    append_option(out, &mut idx, OPT_SUBNET_MASK, &config.netmask)?;
    append_option(out, &mut idx, OPT_ROUTER, &config.server_ip)?;
    append_option(out, &mut idx, OPT_DNS, &config.server_ip)?;
    append_option(out, &mut idx, OPT_BROADCAST, &config.broadcast())?;
    out[idx] = OPT_END;
    Ok(idx + 1)
}
