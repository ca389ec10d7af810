// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode the DHCPv6 Solicit/Reply wire subset.
// Author: Lukas Bower

//! DHCPv6 wire format (RFC 8415 subset). Messages are a four-byte
//! header followed by options; all multi-byte fields are big-endian.
//! Only the rapid-commit Solicit/Reply exchange is in scope.

use core::net::Ipv6Addr;

use crate::error::Error;
use crate::platform::Entropy;

/// UDP port a DHCPv6 client binds.
pub const DHCP6_CLIENT_PORT: u16 = 546;

/// UDP port a DHCPv6 server or agent listens on.
pub const DHCP6_SERVER_PORT: u16 = 547;

/// DUID based on a link-layer address plus time.
pub const DUID_TYPE_LLT: u16 = 1;

/// DUID based on a link-layer address.
pub const DUID_TYPE_LL: u16 = 3;

/// IANA hardware type for Ethernet.
pub const HARDWARE_TYPE_ETHERNET: u16 = 1;

/// IANA hardware type for EUI-64.
pub const HARDWARE_TYPE_EUI64: u16 = 27;

/// Status-Code value for success.
pub const STATUS_SUCCESS: u16 = 0;

const IA_ADDRESS_LEN: usize = 24;
const IA_NA_HEADER_LEN: usize = 12;
const OPTION_HEADER_LEN: usize = 4;

/// DHCPv6 message types in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Client Solicit.
    Solicit = 1,
    /// Server Reply.
    Reply = 7,
}

impl MsgType {
    /// Decode a raw message type byte.
    #[must_use]
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Solicit),
            7 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// DHCPv6 option codes in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OptionCode {
    /// Client Identifier.
    ClientId = 1,
    /// Server Identifier.
    ServerId = 2,
    /// Identity Association for Non-temporary Addresses.
    IaNa = 3,
    /// IA Address.
    IaAddress = 5,
    /// Elapsed Time.
    ElapsedTime = 8,
    /// Status Code.
    StatusCode = 13,
    /// Rapid Commit.
    RapidCommit = 14,
}

/// Three-byte transaction identifier correlating Solicit and Reply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionId(pub [u8; 3]);

impl TransactionId {
    /// Draw a fresh random transaction id.
    #[must_use]
    pub fn generate(entropy: &mut dyn Entropy) -> Self {
        let word = entropy.rand_u32().to_be_bytes();
        Self([word[0], word[1], word[2]])
    }
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw message type byte.
    pub msg_type: u8,
    /// Transaction identifier.
    pub transaction_id: TransactionId,
}

impl Header {
    /// Split a datagram into header and option bytes.
    pub fn parse(payload: &[u8]) -> Result<(Self, &[u8]), Error> {
        if payload.len() < 4 {
            return Err(Error::Parse);
        }

        Ok((
            Self {
                msg_type: payload[0],
                transaction_id: TransactionId([payload[1], payload[2], payload[3]]),
            },
            &payload[4..],
        ))
    }
}

/// Append the message header.
pub fn append_header(buf: &mut Vec<u8>, msg_type: MsgType, transaction_id: TransactionId) {
    buf.push(msg_type as u8);
    buf.extend_from_slice(&transaction_id.0);
}

fn append_option_header(buf: &mut Vec<u8>, code: OptionCode, length: u16) {
    buf.extend_from_slice(&(code as u16).to_be_bytes());
    buf.extend_from_slice(&length.to_be_bytes());
}

/// Append an Elapsed-Time option, in seconds since the first solicit.
pub fn append_elapsed_time(buf: &mut Vec<u8>, seconds: u16) {
    append_option_header(buf, OptionCode::ElapsedTime, 2);
    buf.extend_from_slice(&seconds.to_be_bytes());
}

/// Append a Client Identifier option carrying a DUID-LL with the
/// device EUI-64.
pub fn append_client_id(buf: &mut Vec<u8>, eui64: &[u8; 8]) {
    append_option_header(buf, OptionCode::ClientId, 12);
    buf.extend_from_slice(&DUID_TYPE_LL.to_be_bytes());
    buf.extend_from_slice(&HARDWARE_TYPE_EUI64.to_be_bytes());
    buf.extend_from_slice(eui64);
}

/// Append an IA_NA option (IAID zero, T1 and T2 zero) sized to wrap
/// the `address_count` IA-Address options appended after it.
pub fn append_ia_na(buf: &mut Vec<u8>, address_count: usize) {
    let nested = (OPTION_HEADER_LEN + IA_ADDRESS_LEN) * address_count;
    append_option_header(buf, OptionCode::IaNa, (IA_NA_HEADER_LEN + nested) as u16);
    buf.extend_from_slice(&0u32.to_be_bytes()); // IAID
    buf.extend_from_slice(&0u32.to_be_bytes()); // T1
    buf.extend_from_slice(&0u32.to_be_bytes()); // T2
}

/// Append an IA-Address option.
pub fn append_ia_address(buf: &mut Vec<u8>, address: Ipv6Addr, preferred: u32, valid: u32) {
    append_option_header(buf, OptionCode::IaAddress, IA_ADDRESS_LEN as u16);
    buf.extend_from_slice(&address.octets());
    buf.extend_from_slice(&preferred.to_be_bytes());
    buf.extend_from_slice(&valid.to_be_bytes());
}

/// Append an empty Rapid-Commit option.
pub fn append_rapid_commit(buf: &mut Vec<u8>) {
    append_option_header(buf, OptionCode::RapidCommit, 0);
}

/// Iterator over `(code, payload)` option pairs; stops at the first
/// malformed header.
pub struct OptionIter<'a> {
    bytes: &'a [u8],
}

impl<'a> OptionIter<'a> {
    /// Iterate the options region of a message.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl<'a> Iterator for OptionIter<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.len() < OPTION_HEADER_LEN {
            return None;
        }

        let code = u16::from_be_bytes([self.bytes[0], self.bytes[1]]);
        let length = usize::from(u16::from_be_bytes([self.bytes[2], self.bytes[3]]));

        if self.bytes.len() < OPTION_HEADER_LEN + length {
            self.bytes = &[];
            return None;
        }

        let payload = &self.bytes[OPTION_HEADER_LEN..OPTION_HEADER_LEN + length];
        self.bytes = &self.bytes[OPTION_HEADER_LEN + length..];
        Some((code, payload))
    }
}

/// Payload of the first option with the given code.
#[must_use]
pub fn find_option(options: &[u8], code: OptionCode) -> Option<&[u8]> {
    OptionIter::new(options)
        .find(|(found, _)| *found == code as u16)
        .map(|(_, payload)| payload)
}

/// A decoded DUID: type, hardware type, link-layer bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duid<'a> {
    /// DUID type.
    pub duid_type: u16,
    /// IANA hardware type.
    pub hardware_type: u16,
    /// Link-layer address bytes (plus time for DUID-LLT).
    pub link_layer: &'a [u8],
}

impl<'a> Duid<'a> {
    /// Decode a Client-ID or Server-ID option payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self, Error> {
        if payload.len() < 4 {
            return Err(Error::Parse);
        }

        Ok(Self {
            duid_type: u16::from_be_bytes([payload[0], payload[1]]),
            hardware_type: u16::from_be_bytes([payload[2], payload[3]]),
            link_layer: &payload[4..],
        })
    }
}

/// Decoded IA_NA option header plus its nested option bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IaNa<'a> {
    /// Identity association identifier.
    pub iaid: u32,
    /// Renew time.
    pub t1: u32,
    /// Rebind time.
    pub t2: u32,
    /// Nested options.
    pub options: &'a [u8],
}

impl<'a> IaNa<'a> {
    /// Decode an IA_NA option payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self, Error> {
        if payload.len() < IA_NA_HEADER_LEN {
            return Err(Error::Parse);
        }

        Ok(Self {
            iaid: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
            t1: u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]),
            t2: u32::from_be_bytes([payload[8], payload[9], payload[10], payload[11]]),
            options: &payload[IA_NA_HEADER_LEN..],
        })
    }
}

/// Decoded IA-Address option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IaAddress {
    /// The assigned address.
    pub address: Ipv6Addr,
    /// Preferred lifetime in seconds.
    pub preferred_lifetime: u32,
    /// Valid lifetime in seconds.
    pub valid_lifetime: u32,
}

impl IaAddress {
    /// Decode an IA-Address option payload; the length must be exact.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        if payload.len() != IA_ADDRESS_LEN {
            return Err(Error::Parse);
        }

        let mut octets = [0u8; 16];
        octets.copy_from_slice(&payload[..16]);

        Ok(Self {
            address: Ipv6Addr::from(octets),
            preferred_lifetime: u32::from_be_bytes([
                payload[16],
                payload[17],
                payload[18],
                payload[19],
            ]),
            valid_lifetime: u32::from_be_bytes([
                payload[20],
                payload[21],
                payload[22],
                payload[23],
            ]),
        })
    }
}

/// Decode a Status-Code option payload into its numeric code.
pub fn parse_status_code(payload: &[u8]) -> Result<u16, Error> {
    if payload.len() < 2 {
        return Err(Error::Parse);
    }
    Ok(u16::from_be_bytes([payload[0], payload[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingEntropy(u32);

    impl Entropy for CountingEntropy {
        fn rand_u32(&mut self) -> u32 {
            self.0 = self.0.wrapping_add(1);
            self.0
        }
    }

    #[test]
    fn solicit_encodes_and_reparses() {
        let mut entropy = CountingEntropy(0x01020303);
        let xid = TransactionId::generate(&mut entropy);

        let mut buf = Vec::new();
        append_header(&mut buf, MsgType::Solicit, xid);
        append_elapsed_time(&mut buf, 7);
        append_client_id(&mut buf, &[1, 2, 3, 4, 5, 6, 7, 8]);
        append_ia_na(&mut buf, 1);
        append_ia_address(&mut buf, "fd00::1".parse().unwrap(), 0, 0);
        append_rapid_commit(&mut buf);

        let (header, options) = Header::parse(&buf).unwrap();
        assert_eq!(header.msg_type, MsgType::Solicit as u8);
        assert_eq!(header.transaction_id, xid);

        let client_id = find_option(options, OptionCode::ClientId).unwrap();
        let duid = Duid::parse(client_id).unwrap();
        assert_eq!(duid.duid_type, DUID_TYPE_LL);
        assert_eq!(duid.hardware_type, HARDWARE_TYPE_EUI64);
        assert_eq!(duid.link_layer, &[1, 2, 3, 4, 5, 6, 7, 8]);

        let ia_na = IaNa::parse(find_option(options, OptionCode::IaNa).unwrap()).unwrap();
        assert_eq!(ia_na.iaid, 0);
        assert_eq!(ia_na.t1, 0);
        assert_eq!(ia_na.t2, 0);

        assert!(find_option(options, OptionCode::RapidCommit).is_some());
        assert_eq!(
            parse_status_code(&[0x00, 0x00]).unwrap(),
            STATUS_SUCCESS
        );
    }

    #[test]
    fn ia_na_length_covers_trailing_addresses() {
        let mut buf = Vec::new();
        append_ia_na(&mut buf, 2);
        append_ia_address(&mut buf, "fd00::1".parse().unwrap(), 0, 0);
        append_ia_address(&mut buf, "fd00::2".parse().unwrap(), 0, 0);

        let ia_na = IaNa::parse(find_option(&buf, OptionCode::IaNa).unwrap()).unwrap();
        let mut addresses = 0;
        for (code, payload) in OptionIter::new(ia_na.options) {
            assert_eq!(code, OptionCode::IaAddress as u16);
            IaAddress::parse(payload).unwrap();
            addresses += 1;
        }
        assert_eq!(addresses, 2);
    }

    #[test]
    fn malformed_options_terminate_iteration() {
        // Option claims 16 payload bytes but carries 2.
        let bytes = [0x00, 0x01, 0x00, 0x10, 0xaa, 0xbb];
        assert_eq!(OptionIter::new(&bytes).count(), 0);
        assert!(find_option(&bytes, OptionCode::ClientId).is_none());

        assert_eq!(IaAddress::parse(&[0u8; 10]), Err(Error::Parse));
        assert!(matches!(Header::parse(&[1, 2]), Err(Error::Parse)));
    }
}
