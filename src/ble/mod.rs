//! Bluetooth Low Energy central-role subsystem.
//!
//! This module turns raw scan reports into connection decisions:
//!
//! 1. **Pattern / Advertisement parser** - decode the TLV advertisement
//!    payload and match its fields against glob patterns.
//! 2. **Filter** - an OR of AND/OR groups of typed criteria.
//! 3. **Scanner** - logical scanners that share one physical scan through
//!    the [`ScanCoordinator`](scanner::ScanCoordinator) reference count.
//! 4. **Central** - connection slot pool plus the deferred scan/connect
//!    intents, executed later from the [`WorkQueue`](work_queue::WorkQueue).
//! 5. **Host** - owns the radio handle and routes stack events by role.
//!
//! The radio driver itself is abstracted behind [`RadioStack`].

pub mod adv_parser;
pub mod central;
pub mod filter;
pub mod host;
pub mod pattern;
pub mod registry;
pub mod scanner;
pub mod work_queue;

use core::fmt;

use crate::config::{ConnParams, ScanParams};
use crate::error::StackError;

/// BLE device address type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressType {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
}

/// BLE device address, bytes stored little-endian as on air.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address {
    pub kind: AddressType,
    pub bytes: [u8; 6],
}

impl Address {
    pub const fn new(kind: AddressType, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )?;
        match self.kind {
            AddressType::Public => f.write_str(" (public)"),
            _ => f.write_str(" (random)"),
        }
    }
}

/// Stack-assigned connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Local role on a connection, reported by the stack with every event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionRole {
    Central,
    Peripheral,
}

/// Connection event header delivered by the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionEvent {
    pub handle: ConnHandle,
    pub role: ConnectionRole,
}

/// One received advertisement, valid for the duration of the scan callback.
#[derive(Clone, Copy, Debug)]
pub struct ScanReport<'a> {
    pub address: Address,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
    pub adv_type: u8,
    /// Raw TLV advertisement payload.
    pub data: &'a [u8],
}

/// Outbound operations on the radio / link-layer stack.
///
/// Connection handles returned by [`create_connection`](Self::create_connection)
/// carry one stack reference owned by the caller; it is given back with
/// [`release`](Self::release).
pub trait RadioStack {
    fn start_scan(&mut self, params: &ScanParams) -> Result<(), StackError>;

    fn stop_scan(&mut self) -> Result<(), StackError>;

    fn create_connection(
        &mut self,
        address: &Address,
        params: &ConnParams,
    ) -> Result<ConnHandle, StackError>;

    fn disconnect(&mut self, handle: ConnHandle, reason: u8) -> Result<(), StackError>;

    fn release(&mut self, handle: ConnHandle);
}

/// Receiver for connection events whose local role is peripheral.
///
/// The advertising/GATT server side lives outside this crate; the host
/// forwards those events here untouched.
pub trait PeripheralEvents {
    fn on_connected(&mut self, _handle: ConnHandle, _status: u8) {}

    fn on_disconnected(&mut self, _handle: ConnHandle, _reason: u8) {}

    fn on_security_changed(&mut self, _handle: ConnHandle, _level: u8, _error: Option<u8>) {}
}

/// No peripheral role configured: peripheral events are dropped.
impl PeripheralEvents for () {}
