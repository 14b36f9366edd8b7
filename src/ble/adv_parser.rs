//! Advertisement payload decoding.
//!
//! The payload is a sequence of AD structures `[len][type][len-1 bytes]`.
//! Truncated or malformed input is not an error: decoding stops at the first
//! bad length byte and keeps whatever was already found.

use core::fmt::Write;

use heapless::String;

use crate::config::{MAX_LOCAL_NAME_LENGTH, MAX_MANUFACTURER_DATA_LENGTH};

/// Assigned AD type codes used by the parser.
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const UUID16_SOME: u8 = 0x02;
    pub const UUID16_ALL: u8 = 0x03;
    pub const UUID32_SOME: u8 = 0x04;
    pub const UUID32_ALL: u8 = 0x05;
    pub const UUID128_SOME: u8 = 0x06;
    pub const UUID128_ALL: u8 = 0x07;
    pub const NAME_SHORTENED: u8 = 0x08;
    pub const NAME_COMPLETE: u8 = 0x09;
    pub const SERVICE_DATA16: u8 = 0x16;
    pub const SERVICE_DATA32: u8 = 0x20;
    pub const SERVICE_DATA128: u8 = 0x21;
    pub const MANUFACTURER_DATA: u8 = 0xFF;
}

/// Room for the longest binary field rendered as hex.
pub const HEX_CAPACITY: usize = MAX_MANUFACTURER_DATA_LENGTH * 2;

/// Iterator over the `(type, payload)` AD structures of a buffer.
pub struct AdStructures<'a> {
    data: &'a [u8],
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.data.first()? as usize;
        if len == 0 || len >= self.data.len() {
            self.data = &[];
            return None;
        }
        let ad_type = self.data[1];
        let payload = &self.data[2..1 + len];
        self.data = &self.data[1 + len..];
        Some((ad_type, payload))
    }
}

/// Fields decoded from one advertisement.
///
/// Borrowed from the scan report buffer, so it only lives as long as the
/// scan callback that produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdvertisementRecord<'a> {
    /// Shortened or complete local name (raw bytes, usually UTF-8).
    pub local_name: Option<&'a [u8]>,
    /// Manufacturer-specific data, company identifier included.
    pub manufacturer_data: Option<&'a [u8]>,
    /// First UUID of the first service UUID list, little-endian.
    pub service_uuid: Option<&'a [u8]>,
    /// UUID heading the first service data field, little-endian.
    pub characteristic_uuid: Option<&'a [u8]>,
}

impl<'a> AdvertisementRecord<'a> {
    /// Decode an advertisement payload.  The first occurrence of each field wins.
    pub fn parse(data: &'a [u8]) -> Self {
        let mut record = Self::default();

        for (kind, payload) in AdStructures::new(data) {
            match kind {
                ad_type::NAME_SHORTENED | ad_type::NAME_COMPLETE => {
                    if record.local_name.is_none() && payload.len() <= MAX_LOCAL_NAME_LENGTH {
                        record.local_name = Some(payload);
                    }
                }
                ad_type::MANUFACTURER_DATA => {
                    if record.manufacturer_data.is_none()
                        && payload.len() <= MAX_MANUFACTURER_DATA_LENGTH
                    {
                        record.manufacturer_data = Some(payload);
                    }
                }
                ad_type::UUID16_SOME..=ad_type::UUID128_ALL => {
                    if record.service_uuid.is_none() {
                        record.service_uuid = leading_uuid(payload, uuid_width(kind));
                    }
                }
                ad_type::SERVICE_DATA16 | ad_type::SERVICE_DATA32 | ad_type::SERVICE_DATA128 => {
                    if record.characteristic_uuid.is_none() {
                        record.characteristic_uuid = leading_uuid(payload, uuid_width(kind));
                    }
                }
                _ => {}
            }
        }

        record
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn uuid_width(kind: u8) -> usize {
    match kind {
        ad_type::UUID16_SOME | ad_type::UUID16_ALL | ad_type::SERVICE_DATA16 => 2,
        ad_type::UUID32_SOME | ad_type::UUID32_ALL | ad_type::SERVICE_DATA32 => 4,
        _ => 16,
    }
}

fn leading_uuid(payload: &[u8], width: usize) -> Option<&[u8]> {
    payload.get(..width)
}

/// Render bytes as upper-case hex in on-air order.
pub fn to_hex(bytes: &[u8]) -> Option<String<HEX_CAPACITY>> {
    let mut out = String::new();
    for b in bytes {
        write!(out, "{:02X}", b).ok()?;
    }
    Some(out)
}

/// Render a little-endian UUID as upper-case hex, most significant byte first
/// (`[0x12, 0x18]` becomes `"1812"`).
pub fn uuid_to_hex(uuid_le: &[u8]) -> Option<String<HEX_CAPACITY>> {
    let mut out = String::new();
    for b in uuid_le.iter().rev() {
        write!(out, "{:02X}", b).ok()?;
    }
    Some(out)
}

/// Extract complete/shortened local name from advertisement data, for logs.
pub fn device_name(data: &[u8]) -> String<MAX_LOCAL_NAME_LENGTH> {
    let mut name = String::new();
    match AdvertisementRecord::parse(data).local_name {
        Some(bytes) => {
            for &b in bytes {
                if name.push(b as char).is_err() {
                    break;
                }
            }
        }
        None => {
            let _ = name.push_str("Unknown");
        }
    }
    name
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
