// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Bounds-checked walker over Thread Network Data TLV buffers.
// Author: Lukas Bower

//! TLV header parsing and the nested walker.
//!
//! Every record starts with a two-byte header: the first byte carries the
//! TLV type in its upper seven bits and the stable flag in bit zero, the
//! second byte the value length. Unknown types are skipped using the
//! declared length; a header that runs past the buffer ends iteration
//! with an error and the walker never advances past it.

use core::net::Ipv6Addr;

use crate::types::{CodecError, Ip6Prefix, RoutePreference};

/// Network Data TLV types in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TlvType {
    /// Has Route sub-TLV of a Prefix TLV.
    HasRoute = 0,
    /// Top-level Prefix TLV.
    Prefix = 1,
    /// Border Router sub-TLV of a Prefix TLV.
    BorderRouter = 2,
    /// 6LoWPAN Context sub-TLV of a Prefix TLV.
    Context = 3,
    /// Opaque Commissioning Data TLV.
    CommissioningData = 4,
    /// Top-level Service TLV.
    Service = 5,
    /// Server sub-TLV of a Service TLV.
    Server = 6,
}

impl TlvType {
    /// Map a raw 7-bit type number to a known TLV type.
    #[must_use]
    pub fn from_raw(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::HasRoute,
            1 => Self::Prefix,
            2 => Self::BorderRouter,
            3 => Self::Context,
            4 => Self::CommissioningData,
            5 => Self::Service,
            6 => Self::Server,
            _ => return None,
        })
    }
}

/// Decoded TLV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvHeader {
    /// Raw 7-bit type number.
    pub raw_type: u8,
    /// Stable Network Data flag.
    pub stable: bool,
    /// Declared value length in bytes.
    pub length: u8,
    /// Offset of the first value byte within the parsed buffer.
    pub value_offset: usize,
}

/// Read one TLV header at `offset`, validating the declared length
/// against the buffer bounds.
pub fn read_header(buf: &[u8], offset: usize) -> Result<TlvHeader, CodecError> {
    if offset + 2 > buf.len() {
        return Err(CodecError::Truncated);
    }

    let length = buf[offset + 1];
    let value_offset = offset + 2;

    if value_offset + usize::from(length) > buf.len() {
        return Err(CodecError::LengthExceedsBuffer);
    }

    Ok(TlvHeader {
        raw_type: buf[offset] >> 1,
        stable: buf[offset] & 0x01 != 0,
        length,
        value_offset,
    })
}

/// One TLV within a walked buffer, value borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Raw 7-bit type number.
    pub raw_type: u8,
    /// Stable Network Data flag.
    pub stable: bool,
    /// The value bytes.
    pub value: &'a [u8],
    /// Offset of the TLV header within the walked slice.
    pub offset: usize,
}

impl<'a> Tlv<'a> {
    /// The known type, if any.
    #[must_use]
    pub fn kind(&self) -> Option<TlvType> {
        TlvType::from_raw(self.raw_type)
    }

    /// Offset one past the last value byte within the walked slice.
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.offset + 2 + self.value.len()
    }
}

/// Lazy walker over a TLV sequence. Yields `Err` at most once, for the
/// first malformed header, then terminates.
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

/// Walker over a sub-TLV range; same contract as the top-level walker.
pub type SubTlvIter<'a> = TlvIter<'a>;

impl<'a> TlvIter<'a> {
    /// Walk the TLV sequence in `buf` from its start.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self::from_offset(buf, 0)
    }

    /// Walk the TLV sequence in `buf` starting at `offset`.
    #[must_use]
    pub fn from_offset(buf: &'a [u8], offset: usize) -> Self {
        Self {
            buf,
            offset,
            done: offset >= buf.len(),
        }
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Result<Tlv<'a>, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let header = match read_header(self.buf, self.offset) {
            Ok(header) => header,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        let value_end = header.value_offset + usize::from(header.length);
        let tlv = Tlv {
            raw_type: header.raw_type,
            stable: header.stable,
            value: &self.buf[header.value_offset..value_end],
            offset: self.offset,
        };

        self.offset = value_end;
        if self.offset >= self.buf.len() {
            self.done = true;
        }

        Some(Ok(tlv))
    }
}

/// Decoded view of a Prefix TLV.
#[derive(Debug, Clone, Copy)]
pub struct PrefixTlv<'a> {
    /// Domain the prefix belongs to.
    pub domain_id: u8,
    /// The IPv6 prefix.
    pub prefix: Ip6Prefix,
    /// Stable Network Data flag of the container.
    pub stable: bool,
    sub: &'a [u8],
}

impl<'a> PrefixTlv<'a> {
    /// Decode a Prefix TLV value. Fails on a short value or a prefix
    /// length outside 0..=128; such TLVs are skipped by consumers.
    pub fn parse(tlv: &Tlv<'a>) -> Result<Self, CodecError> {
        let value = tlv.value;

        if value.len() < 2 {
            return Err(CodecError::Truncated);
        }

        let prefix_length = value[1];
        if prefix_length > 128 {
            return Err(CodecError::InvalidPrefixLength(prefix_length));
        }

        let wire_len = (usize::from(prefix_length) + 7) / 8;
        if value.len() < 2 + wire_len {
            return Err(CodecError::Truncated);
        }

        let mut octets = [0u8; 16];
        octets[..wire_len].copy_from_slice(&value[2..2 + wire_len]);

        Ok(Self {
            domain_id: value[0],
            prefix: Ip6Prefix::new(Ipv6Addr::from(octets), prefix_length),
            stable: tlv.stable,
            sub: &value[2 + wire_len..],
        })
    }

    /// Walk the sub-TLVs following the prefix bytes.
    #[must_use]
    pub fn sub_tlvs(&self) -> SubTlvIter<'a> {
        TlvIter::new(self.sub)
    }

    /// The raw sub-TLV region following the prefix bytes.
    #[must_use]
    pub fn sub_bytes(&self) -> &'a [u8] {
        self.sub
    }
}

/// Border Router sub-TLV flag word.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BorderRouterFlags(u16);

impl BorderRouterFlags {
    /// Bit offset of the 2-bit route preference field.
    pub const PREFERENCE_OFFSET: u16 = 14;
    /// Preferred prefix flag.
    pub const PREFERRED: u16 = 1 << 13;
    /// SLAAC flag.
    pub const SLAAC: u16 = 1 << 12;
    /// DHCPv6 agent flag.
    pub const DHCP: u16 = 1 << 11;
    /// Other-configuration (DHCPv6 "configure") flag.
    pub const CONFIGURE: u16 = 1 << 10;
    /// Default route flag.
    pub const DEFAULT_ROUTE: u16 = 1 << 9;
    /// On-mesh flag.
    pub const ON_MESH: u16 = 1 << 8;
    /// ND DNS flag.
    pub const ND_DNS: u16 = 1 << 7;
    /// Thread Domain Prefix flag.
    pub const DP: u16 = 1 << 6;

    /// Wrap a raw flag word.
    #[must_use]
    pub fn from_raw(value: u16) -> Self {
        Self(value)
    }

    /// The raw flag word.
    #[must_use]
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Decoded route preference.
    #[must_use]
    pub fn preference(self) -> RoutePreference {
        RoutePreference::from_2bit((self.0 >> Self::PREFERENCE_OFFSET) as u8)
    }

    /// Whether the given flag bits are all set.
    #[must_use]
    pub fn has(self, bits: u16) -> bool {
        self.0 & bits == bits
    }
}

/// One `{rloc16, flags}` entry of a Border Router sub-TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderRouterEntry {
    /// RLOC16 of the border router.
    pub rloc16: u16,
    /// Flag word.
    pub flags: BorderRouterFlags,
}

impl BorderRouterEntry {
    /// Wire size of one entry.
    pub const SIZE: usize = 4;

    /// Iterate the entries of a Border Router sub-TLV value. Trailing
    /// bytes short of a full entry are ignored.
    pub fn iter(value: &[u8]) -> impl Iterator<Item = BorderRouterEntry> + '_ {
        value.chunks_exact(Self::SIZE).map(|chunk| BorderRouterEntry {
            rloc16: u16::from_be_bytes([chunk[0], chunk[1]]),
            flags: BorderRouterFlags::from_raw(u16::from_be_bytes([chunk[2], chunk[3]])),
        })
    }
}

/// Has Route sub-TLV flag byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HasRouteFlags(u8);

impl HasRouteFlags {
    /// Bit offset of the 2-bit route preference field.
    pub const PREFERENCE_OFFSET: u8 = 6;
    /// NAT64 prefix flag.
    pub const NAT64: u8 = 1 << 5;
    /// Advertising-PIO flag.
    pub const ADV_PIO: u8 = 1 << 4;

    /// Wrap a raw flag byte.
    #[must_use]
    pub fn from_raw(value: u8) -> Self {
        Self(value)
    }

    /// The raw flag byte.
    #[must_use]
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Decoded route preference.
    #[must_use]
    pub fn preference(self) -> RoutePreference {
        RoutePreference::from_2bit(self.0 >> Self::PREFERENCE_OFFSET)
    }

    /// Whether the given flag bits are all set.
    #[must_use]
    pub fn has(self, bits: u8) -> bool {
        self.0 & bits == bits
    }
}

/// One `{rloc16, flags}` entry of a Has Route sub-TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasRouteEntry {
    /// RLOC16 of the router publishing the route.
    pub rloc16: u16,
    /// Flag byte.
    pub flags: HasRouteFlags,
}

impl HasRouteEntry {
    /// Wire size of one entry.
    pub const SIZE: usize = 3;

    /// Iterate the entries of a Has Route sub-TLV value.
    pub fn iter(value: &[u8]) -> impl Iterator<Item = HasRouteEntry> + '_ {
        value.chunks_exact(Self::SIZE).map(|chunk| HasRouteEntry {
            rloc16: u16::from_be_bytes([chunk[0], chunk[1]]),
            flags: HasRouteFlags::from_raw(chunk[2]),
        })
    }
}

/// Decoded view of a 6LoWPAN Context sub-TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextTlv {
    /// The 6LoWPAN Context ID.
    pub context_id: u8,
    /// Whether the context may be used for compression.
    pub compress: bool,
    /// Length in bits of the prefix the context covers.
    pub context_length: u8,
    /// Stable Network Data flag.
    pub stable: bool,
}

impl ContextTlv {
    const COMPRESS: u8 = 1 << 4;
    const CID_MASK: u8 = 0x0f;

    /// Decode a Context sub-TLV value.
    pub fn parse(tlv: &Tlv<'_>) -> Result<Self, CodecError> {
        if tlv.value.len() < 2 {
            return Err(CodecError::Truncated);
        }

        Ok(Self {
            context_id: tlv.value[0] & Self::CID_MASK,
            compress: tlv.value[0] & Self::COMPRESS != 0,
            context_length: tlv.value[1],
            stable: tlv.stable,
        })
    }

    /// Encode the first value byte from id and compress flag.
    #[must_use]
    pub fn encode_id(context_id: u8, compress: bool) -> u8 {
        let mut byte = context_id & Self::CID_MASK;
        if compress {
            byte |= Self::COMPRESS;
        }
        byte
    }
}

/// Decoded view of a Service TLV.
#[derive(Debug, Clone, Copy)]
pub struct ServiceTlv<'a> {
    /// Service identifier assigned within the partition (0..=15).
    pub service_id: u8,
    /// IANA enterprise number; the Thread number when the T bit is set.
    pub enterprise_number: u32,
    /// Opaque service data bytes.
    pub service_data: &'a [u8],
    /// Stable Network Data flag of the container.
    pub stable: bool,
    /// Offset of the TLV header within the walked slice.
    pub offset: usize,
    sub: &'a [u8],
}

impl<'a> ServiceTlv<'a> {
    /// T bit: enterprise number elided, Thread number implied.
    pub const THREAD_ENTERPRISE_FLAG: u8 = 0x80;
    const SERVICE_ID_MASK: u8 = 0x0f;

    /// Decode a Service TLV value.
    pub fn parse(tlv: &Tlv<'a>) -> Result<Self, CodecError> {
        let value = tlv.value;

        if value.is_empty() {
            return Err(CodecError::Truncated);
        }

        let flags = value[0];
        let mut cursor = 1usize;

        let enterprise_number = if flags & Self::THREAD_ENTERPRISE_FLAG != 0 {
            crate::types::THREAD_ENTERPRISE_NUMBER
        } else {
            if value.len() < cursor + 4 {
                return Err(CodecError::Truncated);
            }
            let number = u32::from_be_bytes([
                value[cursor],
                value[cursor + 1],
                value[cursor + 2],
                value[cursor + 3],
            ]);
            cursor += 4;
            number
        };

        if value.len() < cursor + 1 {
            return Err(CodecError::Truncated);
        }
        let data_len = usize::from(value[cursor]);
        cursor += 1;

        if value.len() < cursor + data_len {
            return Err(CodecError::Truncated);
        }

        Ok(Self {
            service_id: flags & Self::SERVICE_ID_MASK,
            enterprise_number,
            service_data: &value[cursor..cursor + data_len],
            stable: tlv.stable,
            offset: tlv.offset,
            sub: &value[cursor + data_len..],
        })
    }

    /// Walk the sub-TLVs following the service data.
    #[must_use]
    pub fn sub_tlvs(&self) -> SubTlvIter<'a> {
        TlvIter::new(self.sub)
    }

    /// The raw sub-TLV region following the service data.
    #[must_use]
    pub fn sub_bytes(&self) -> &'a [u8] {
        self.sub
    }
}

/// Decoded view of a Server sub-TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTlv<'a> {
    /// RLOC16 of the server.
    pub rloc16: u16,
    /// Opaque server data bytes.
    pub server_data: &'a [u8],
    /// Stable Network Data flag.
    pub stable: bool,
}

impl<'a> ServerTlv<'a> {
    /// Decode a Server sub-TLV value. A value shorter than the RLOC16
    /// field fails; consumers skip such entries.
    pub fn parse(tlv: &Tlv<'a>) -> Result<Self, CodecError> {
        if tlv.value.len() < 2 {
            return Err(CodecError::Truncated);
        }

        Ok(Self {
            rloc16: u16::from_be_bytes([tlv.value[0], tlv.value[1]]),
            server_data: &tlv.value[2..],
            stable: tlv.stable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::vec::Vec;

    #[test]
    fn header_decodes_type_and_stable_bit() {
        // Service TLV, stable, length 1.
        let buf = [0x0b, 0x01, 0xaa];
        let header = read_header(&buf, 0).unwrap();
        assert_eq!(header.raw_type, 5);
        assert!(header.stable);
        assert_eq!(header.length, 1);
        assert_eq!(header.value_offset, 2);
    }

    #[test]
    fn header_rejects_truncated_and_overlong() {
        assert_eq!(read_header(&[0x0b], 0), Err(CodecError::Truncated));
        assert_eq!(
            read_header(&[0x0b, 0x04, 0x00], 0),
            Err(CodecError::LengthExceedsBuffer)
        );
    }

    #[test]
    fn walker_skips_unknown_types() {
        // Unknown type 127 followed by a Commissioning Data TLV.
        let buf = [0xff, 0x03, 0x01, 0x02, 0x03, 0x08, 0x01, 0xaa];
        let tlvs: Vec<_> = TlvIter::new(&buf).collect::<Result<_, _>>().unwrap();
        assert_eq!(tlvs.len(), 2);
        assert_eq!(tlvs[0].kind(), None);
        assert_eq!(tlvs[1].kind(), Some(TlvType::CommissioningData));
        assert_eq!(tlvs[1].value, &[0xaa]);
    }

    #[test]
    fn walker_stops_at_malformed_tlv() {
        let buf = [0x08, 0x01, 0xaa, 0x0b, 0x09, 0x00];
        let mut iter = TlvIter::new(&buf);
        assert!(iter.next().unwrap().is_ok());
        assert_eq!(iter.next(), Some(Err(CodecError::LengthExceedsBuffer)));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn prefix_tlv_rejects_bad_prefix_length() {
        // Prefix TLV claiming 129 prefix bits.
        let buf = [0x03, 0x03, 0x00, 0x81, 0xfd];
        let tlv = TlvIter::new(&buf).next().unwrap().unwrap();
        assert!(matches!(
            PrefixTlv::parse(&tlv),
            Err(CodecError::InvalidPrefixLength(129))
        ));
    }

    #[test]
    fn prefix_tlv_exposes_sub_tlvs() {
        // fd00::/8 with one Has Route entry {0xc800, pref high}.
        let buf = [0x03, 0x08, 0x00, 0x08, 0xfd, 0x00, 0x03, 0xc8, 0x00, 0x40];
        let tlv = TlvIter::new(&buf).next().unwrap().unwrap();
        let prefix = PrefixTlv::parse(&tlv).unwrap();
        assert_eq!(prefix.prefix.length(), 8);

        let sub = prefix.sub_tlvs().next().unwrap().unwrap();
        assert_eq!(sub.kind(), Some(TlvType::HasRoute));

        let entry = HasRouteEntry::iter(sub.value).next().unwrap();
        assert_eq!(entry.rloc16, 0xc800);
        assert_eq!(entry.flags.preference(), RoutePreference::High);
    }

    #[test]
    fn service_tlv_with_explicit_enterprise_number() {
        let buf = [
            0x0b, 0x0a, 0x01, 0x00, 0x00, 0x01, 0x02, 0x02, 0xaa, 0xbb, 0x0d, 0x00,
        ];
        let tlv = TlvIter::new(&buf).next().unwrap().unwrap();
        let service = ServiceTlv::parse(&tlv).unwrap();
        assert_eq!(service.service_id, 1);
        assert_eq!(service.enterprise_number, 0x0102);
        assert_eq!(service.service_data, &[0xaa, 0xbb]);
    }

    #[test]
    fn server_tlv_requires_rloc16() {
        let buf = [0x0d, 0x01, 0x00];
        let tlv = TlvIter::new(&buf).next().unwrap().unwrap();
        assert_eq!(ServerTlv::parse(&tlv), Err(CodecError::Truncated));
    }
}
