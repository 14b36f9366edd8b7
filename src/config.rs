//! Compile-time capacities and default radio parameters.
//!
//! All registry sizes, filter limits, deferred-work delays and default
//! scan/connection parameters live here so they can be tuned in one place.
//! Runtime-adjustable parameter sets ([`ScanParams`], [`ConnParams`],
//! [`CentralConfig`]) start from these defaults.

use embassy_time::Duration;

// Registries

/// Logical scanners sharing the radio (one per central).
pub const MAX_SCANNERS: usize = 2;

/// Central instances the host can register.
pub const MAX_CENTRALS: usize = MAX_SCANNERS;

/// Simultaneous outbound connections held by a single central.
pub const MAX_CENTRAL_CONNECTIONS: usize = 4;

/// Each central owns one scan work item and one connect work item.
pub const WORK_QUEUE_CAPACITY: usize = MAX_CENTRALS * 2;

// Filters

/// Filter groups per filter (OR-ed together).
pub const MAX_FILTER_GROUPS: usize = 4;

/// Criteria per filter group.
pub const MAX_CRITERIA_PER_GROUP: usize = 4;

/// Pattern length limit (exclusive).
pub const MAX_PATTERN_LENGTH: usize = 64;

/// Longest local name considered for matching (bytes).
pub const MAX_LOCAL_NAME_LENGTH: usize = 32;

/// Longest manufacturer-specific payload considered for matching (bytes).
pub const MAX_MANUFACTURER_DATA_LENGTH: usize = 32;

// Deferred work

/// Delay before a scheduled scan start/stop executes (ms).
pub const SCAN_WORK_DELAY_MS: u64 = 200;

/// Delay before a scheduled connection attempt executes (ms).
pub const CONNECT_WORK_DELAY_MS: u64 = 100;

// Scan parameters (0.625 ms units)

/// 0x60 = 60 ms, the GAP "fast" scan interval.
pub const BLE_SCAN_INTERVAL: u16 = 0x0060;
/// 0x30 = 30 ms.
pub const BLE_SCAN_WINDOW: u16 = 0x0030;

// Connection parameters

/// Initial connection interval range (in 1.25 ms units): 30-50 ms.
pub const BLE_CONN_INTERVAL_MIN: u16 = 0x0018;
pub const BLE_CONN_INTERVAL_MAX: u16 = 0x0028;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// HCI reason code sent with a locally requested disconnect
/// ("Remote User Terminated Connection").
pub const HCI_REMOTE_USER_TERMINATED: u8 = 0x13;

/// Parameters handed to the stack when the shared scan is armed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    /// Active scanning requests scan responses (names often live there).
    pub active: bool,
    /// Ask the controller to drop repeated reports from the same device.
    pub filter_duplicates: bool,
    pub interval: u16,
    pub window: u16,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            filter_duplicates: true,
            interval: BLE_SCAN_INTERVAL,
            window: BLE_SCAN_WINDOW,
        }
    }
}

/// Parameters handed to the stack when creating an outbound connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnParams {
    /// Initiator scan interval/window while the connection is being set up.
    pub scan_interval: u16,
    pub scan_window: u16,
    pub interval_min: u16,
    pub interval_max: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl Default for ConnParams {
    fn default() -> Self {
        Self {
            scan_interval: BLE_SCAN_INTERVAL,
            scan_window: BLE_SCAN_WINDOW,
            interval_min: BLE_CONN_INTERVAL_MIN,
            interval_max: BLE_CONN_INTERVAL_MAX,
            latency: BLE_SLAVE_LATENCY,
            supervision_timeout: BLE_SUP_TIMEOUT,
        }
    }
}

/// Per-central admission policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CentralConfig {
    /// Stop looking for candidates once a connection has landed.
    pub pause_scan_on_connect: bool,
    pub scan_work_delay: Duration,
    pub connect_work_delay: Duration,
    pub conn_params: ConnParams,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            pause_scan_on_connect: true,
            scan_work_delay: Duration::from_millis(SCAN_WORK_DELAY_MS),
            connect_work_delay: Duration::from_millis(CONNECT_WORK_DELAY_MS),
            conn_params: ConnParams::default(),
        }
    }
}
