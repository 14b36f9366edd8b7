//! BLE central-role discovery and connection admission.
//!
//! Decides from raw advertisements which remote devices are interesting,
//! and governs how many outbound connections each central may attempt and
//! hold, while several logical scanners share one physical radio scan.
//!
//! The radio / link-layer stack is reached through [`ble::RadioStack`];
//! everything else is plain `no_std` logic that runs and is tested on the
//! host.
//!
//! Usage: `cargo test`
//!
//! With the `defmt` feature, logging goes through `defmt` and the public
//! types implement `defmt::Format`; otherwise the `log` facade is used.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod ble;
pub mod config;
pub mod error;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════

pub use ble::central::{Central, CentralId, ConnectionSlot, SlotState};
pub use ble::filter::{CriterionKind, Filter, FilterCriterion, FilterGroup, FilterOperator};
pub use ble::host::Host;
pub use ble::scanner::{ScanCoordinator, ScannerId};
pub use ble::{
    Address, AddressType, ConnHandle, ConnectionEvent, ConnectionRole, PeripheralEvents,
    RadioStack, ScanReport,
};
pub use config::{CentralConfig, ConnParams, ScanParams};
pub use error::{Error, FilterError, StackError};
pub use runtime::SharedHost;
