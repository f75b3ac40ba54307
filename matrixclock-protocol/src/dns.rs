//! Catch-all DNS answers for the provisioning access point
//!
//! Phones joining the portal network look up their connectivity-check
//! hosts first. Answering every A query with the portal's own address
//! makes them open the credential form on their own. Sockets live in the
//! firmware.

use crate::dhcp::Ipv4;

/// Server (listen) port
pub const DNS_PORT: u16 = 53;

/// TTL of the synthesized answer
pub const ANSWER_TTL_SECONDS: u32 = 60;

const HEADER_LEN: usize = 12;
const ANSWER_LEN: usize = 16;

const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;

/// QR=1, AA=1
const RESPONSE_FLAGS: u8 = 0x84;
const RECURSION_DESIRED: u8 = 0x01;

/// Pointer to the question name at offset 12
const NAME_POINTER: [u8; 2] = [0xC0, 0x0C];

/// Reasons a datagram gets no reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DnsError {
    /// Shorter than its header or question
    Truncated,
    /// A response, a non-standard opcode or no question
    NotQuery,
    /// Compressed or oversized label in the question
    Malformed,
    /// Reply does not fit the output buffer
    BufferTooSmall,
}

/// Build the reply to `query` in `out`, returning its length
///
/// The first question is echoed back. A/IN questions get one answer
/// pointing at `ip`; other types get an empty NOERROR reply. Additional
/// records in the query (EDNS) are dropped.
pub fn answer(query: &[u8], ip: Ipv4, out: &mut [u8]) -> Result<usize, DnsError> {
    if query.len() < HEADER_LEN {
        return Err(DnsError::Truncated);
    }
    let flags = query[2];
    let opcode = (flags >> 3) & 0x0F;
    let questions = u16::from_be_bytes([query[4], query[5]]);
    if flags & 0x80 != 0 || opcode != 0 || questions == 0 {
        return Err(DnsError::NotQuery);
    }

    let name_end = skip_name(query, HEADER_LEN)?;
    let question_end = name_end + 4;
    if question_end > query.len() {
        return Err(DnsError::Truncated);
    }
    let qtype = u16::from_be_bytes([query[name_end], query[name_end + 1]]);
    let qclass = u16::from_be_bytes([query[name_end + 2], query[name_end + 3]]);
    let answered = qtype == TYPE_A && qclass == CLASS_IN;

    let len = question_end + if answered { ANSWER_LEN } else { 0 };
    if out.len() < len {
        return Err(DnsError::BufferTooSmall);
    }

    out[..question_end].copy_from_slice(&query[..question_end]);
    out[2] = RESPONSE_FLAGS | (flags & RECURSION_DESIRED);
    out[3] = 0;
    out[4..6].copy_from_slice(&1u16.to_be_bytes());
    out[6..8].copy_from_slice(&u16::from(answered).to_be_bytes());
    out[8..12].fill(0);

    if answered {
        let record = &mut out[question_end..len];
        record[0..2].copy_from_slice(&NAME_POINTER);
        record[2..4].copy_from_slice(&TYPE_A.to_be_bytes());
        record[4..6].copy_from_slice(&CLASS_IN.to_be_bytes());
        record[6..10].copy_from_slice(&ANSWER_TTL_SECONDS.to_be_bytes());
        record[10..12].copy_from_slice(&4u16.to_be_bytes());
        record[12..16].copy_from_slice(&ip);
    }
    Ok(len)
}

/// Offset just past the name starting at `pos`
fn skip_name(message: &[u8], mut pos: usize) -> Result<usize, DnsError> {
    loop {
        let label = *message.get(pos).ok_or(DnsError::Truncated)?;
        if label == 0 {
            return Ok(pos + 1);
        }
        if label & 0xC0 != 0 {
            return Err(DnsError::Malformed);
        }
        pos += 1 + label as usize;
    }
}
