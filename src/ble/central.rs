//! Central-role connection manager.
//!
//! A [`Central`] holds up to [`MAX_CENTRAL_CONNECTIONS`] outbound links and
//! owns one scanner.  Events coming from the stack (scan matches, connection
//! results, disconnections) only update slots and record intents; the
//! radio-facing follow-up (arm/disarm scan, create connection) is scheduled
//! on the [`WorkQueue`] and executed later by the host.

use core::fmt;

use embassy_time::Instant;

use crate::ble::scanner::{ScanCoordinator, ScannerId};
use crate::ble::work_queue::{WorkKey, WorkQueue};
use crate::ble::{Address, ConnHandle, RadioStack};
use crate::config::{CentralConfig, HCI_REMOTE_USER_TERMINATED, MAX_CENTRAL_CONNECTIONS};
use crate::error::Error;

/// Index of a central in the host's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CentralId(pub(crate) u8);

impl CentralId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CentralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "central {}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotState {
    /// Connection requested, waiting for the stack's result.
    Connecting,
    Connected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionSlot {
    pub address: Address,
    pub handle: ConnHandle,
    pub state: SlotState,
}

/// Target recorded by a scan match, consumed by the connect work item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ConnectIntent {
    target: Address,
    attempted: bool,
}

pub struct Central {
    id: CentralId,
    scanner: ScannerId,
    config: CentralConfig,
    slots: [Option<ConnectionSlot>; MAX_CENTRAL_CONNECTIONS],
    connection_count: usize,
    should_start_scanning: bool,
    connect_intent: Option<ConnectIntent>,
}

impl Central {
    pub(crate) fn new(id: CentralId, scanner: ScannerId, config: CentralConfig) -> Self {
        Self {
            id,
            scanner,
            config,
            slots: [None; MAX_CENTRAL_CONNECTIONS],
            connection_count: 0,
            should_start_scanning: false,
            connect_intent: None,
        }
    }

    pub fn id(&self) -> CentralId {
        self.id
    }

    pub fn scanner(&self) -> ScannerId {
        self.scanner
    }

    pub fn config(&self) -> &CentralConfig {
        &self.config
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionSlot> {
        self.slots.iter().flatten()
    }

    pub fn find_empty_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn is_connected_address(&self, address: &Address) -> bool {
        self.slot_for_address(address).is_some()
    }

    /// Whether one of this central's slots holds `handle`.
    pub fn owns(&self, handle: ConnHandle) -> bool {
        self.slot_for_handle(handle).is_some()
    }

    /// Target of a connect intent that has not been attempted yet.
    pub fn pending_target(&self) -> Option<Address> {
        self.connect_intent
            .filter(|intent| !intent.attempted)
            .map(|intent| intent.target)
    }

    /// Whether the next scan work item will start (true) or stop scanning.
    pub fn scan_intent(&self) -> bool {
        self.should_start_scanning
    }

    fn slot_for_address(&self, address: &Address) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().map(|s| &s.address) == Some(address))
    }

    fn slot_for_handle(&self, handle: ConnHandle) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().map(|s| s.handle) == Some(handle))
    }

    fn free_slot<R: RadioStack>(&mut self, index: usize, radio: &mut R) {
        if let Some(slot) = self.slots[index].take() {
            radio.release(slot.handle);
            self.connection_count -= 1;
            info!(
                "{}: Removed {} from slot {} (total: {}/{})",
                self.id,
                slot.handle,
                index,
                self.connection_count,
                MAX_CENTRAL_CONNECTIONS
            );
        }
    }

    /// Give every held handle back to the stack.
    pub(crate) fn release_all<R: RadioStack>(&mut self, radio: &mut R) {
        for index in 0..MAX_CENTRAL_CONNECTIONS {
            self.free_slot(index, radio);
        }
    }

    /// Request an outbound connection.  Already holding `address` counts as
    /// success and does not reach the stack.
    pub fn connect_to_device<R: RadioStack>(&mut self, radio: &mut R, address: &Address) -> Result<(), Error> {
        if self.is_connected_address(address) {
            debug!("{}: Already connected to {}", self.id, address);
            return Ok(());
        }

        let Some(index) = self.find_empty_slot() else {
            warn!(
                "{}: No available connection slots ({}/{})",
                self.id,
                self.connection_count,
                MAX_CENTRAL_CONNECTIONS
            );
            return Err(Error::NoFreeSlot);
        };

        let handle = match radio.create_connection(address, &self.config.conn_params) {
            Ok(handle) => handle,
            Err(e) => {
                error!("{}: Failed to create connection (err {})", self.id, e.0);
                return Err(e.into());
            }
        };

        self.slots[index] = Some(ConnectionSlot {
            address: *address,
            handle,
            state: SlotState::Connecting,
        });
        self.connection_count += 1;
        info!(
            "{}: Connecting to {} as {} in slot {} (total: {}/{})",
            self.id,
            address,
            handle,
            index,
            self.connection_count,
            MAX_CENTRAL_CONNECTIONS
        );
        Ok(())
    }

    /// Tear down the link to `address`; the slot is freed once the stack
    /// accepted the request.  The stack's own disconnection event no longer
    /// finds the slot, so the scan resume is scheduled here.
    pub fn disconnect_from_device<R: RadioStack, const N: usize>(
        &mut self,
        radio: &mut R,
        address: &Address,
        work: &mut WorkQueue<N>,
        now: Instant,
    ) -> Result<(), Error> {
        let Some(index) = self.slot_for_address(address) else {
            warn!("{}: Device not found in connections", self.id);
            return Err(Error::NotFound);
        };

        let handle = self.slots[index].map(|s| s.handle).ok_or(Error::NotFound)?;
        if let Err(e) = radio.disconnect(handle, HCI_REMOTE_USER_TERMINATED) {
            error!("{}: Failed to disconnect (err {})", self.id, e.0);
            return Err(e.into());
        }

        info!("{}: Disconnecting from {}", self.id, address);
        self.free_slot(index, radio);
        self.schedule_scanning(true, work, now)
    }

    /// Connection result for one of our handles.  `status` is the HCI status,
    /// zero on success.
    pub(crate) fn on_connected<R: RadioStack, const N: usize>(
        &mut self,
        radio: &mut R,
        handle: ConnHandle,
        status: u8,
        work: &mut WorkQueue<N>,
        now: Instant,
    ) -> Result<(), Error> {
        if status != 0 {
            error!("{}: Connection failed (err {})", self.id, status);
            if let Some(index) = self.slot_for_handle(handle) {
                self.free_slot(index, radio);
            }
            return self.schedule_scanning(true, work, now);
        }

        let index = self.slot_for_handle(handle).ok_or(Error::NotFound)?;
        if let Some(slot) = self.slots[index].as_mut() {
            slot.state = SlotState::Connected;
        }
        info!(
            "{}: Connected {} (total connections: {})",
            self.id,
            handle,
            self.connection_count
        );

        // The connect work paused the scanner; either keep it paused or
        // bring it back.
        self.schedule_scanning(!self.config.pause_scan_on_connect, work, now)
    }

    pub(crate) fn on_disconnected<R: RadioStack, const N: usize>(
        &mut self,
        radio: &mut R,
        handle: ConnHandle,
        reason: u8,
        work: &mut WorkQueue<N>,
        now: Instant,
    ) -> Result<(), Error> {
        let Some(index) = self.slot_for_handle(handle) else {
            warn!("{}: No connection found for {}", self.id, handle);
            return Err(Error::NotFound);
        };
        debug!("{}: {} disconnected (reason {})", self.id, handle, reason);
        self.free_slot(index, radio);
        self.schedule_scanning(true, work, now)
    }

    pub(crate) fn on_security_changed(&self, handle: ConnHandle, level: u8, error: Option<u8>) {
        match error {
            Some(err) => error!(
                "{}: Security failed on {} level {} (err {})",
                self.id,
                handle,
                level,
                err
            ),
            None => info!("{}: Security changed on {}: level {}", self.id, handle, level),
        }
    }

    /// A scanner match for `address`.  Returns whether a connect work item
    /// was scheduled.
    pub(crate) fn on_candidate<const N: usize>(
        &mut self,
        address: &Address,
        work: &mut WorkQueue<N>,
        now: Instant,
    ) -> Result<bool, Error> {
        if self.is_connected_address(address) {
            trace!("{}: Candidate {} already held", self.id, address);
            return Ok(false);
        }
        if self.find_empty_slot().is_none() {
            debug!("{}: Ignoring candidate {}, no free slot", self.id, address);
            return Ok(false);
        }
        if self.pending_target() == Some(*address) {
            return Ok(false);
        }

        self.connect_intent = Some(ConnectIntent {
            target: *address,
            attempted: false,
        });
        match work.schedule(WorkKey::connect(self.id), now, self.config.connect_work_delay) {
            Ok(_) => {
                info!("{}: Connection work item scheduled for {}", self.id, address);
                Ok(true)
            }
            Err(e) => {
                error!("{}: Failed to schedule connection work item ({})", self.id, e);
                Err(e)
            }
        }
    }

    /// Record whether scanning should resume or pause, and schedule the
    /// scan work item (replacing any pending one).
    pub(crate) fn schedule_scanning<const N: usize>(
        &mut self,
        start: bool,
        work: &mut WorkQueue<N>,
        now: Instant,
    ) -> Result<(), Error> {
        self.should_start_scanning = start;
        match work.schedule(WorkKey::scan(self.id), now, self.config.scan_work_delay) {
            Ok(_) => {
                info!(
                    "{}: Scheduled scanning {} work item",
                    self.id,
                    if start { "start" } else { "stop" }
                );
                Ok(())
            }
            Err(e) => {
                error!("{}: Failed to schedule scanning work item ({})", self.id, e);
                Err(e)
            }
        }
    }

    /// Deferred scan start/stop.
    pub(crate) fn run_scan_work<R: RadioStack>(
        &mut self,
        radio: &mut R,
        scan: &mut ScanCoordinator,
    ) -> Result<(), Error> {
        if self.should_start_scanning {
            info!("{}: Executing deferred scanning start", self.id);
            scan.start(self.scanner, radio)
        } else {
            info!("{}: Executing deferred scanning stop", self.id);
            scan.stop(self.scanner, radio)
        }
    }

    /// Deferred connection attempt.  Pauses this central's scanner first and
    /// resumes it if the attempt fails.
    pub(crate) fn run_connect_work<R: RadioStack>(
        &mut self,
        radio: &mut R,
        scan: &mut ScanCoordinator,
    ) -> Result<(), Error> {
        let Some(intent) = self.connect_intent.as_mut() else {
            return Ok(());
        };
        if intent.attempted {
            info!("{}: Connection already attempted", self.id);
            return Ok(());
        }
        intent.attempted = true;
        let target = intent.target;

        if self.is_connected_address(&target) {
            info!("{}: {} already connected, scanning continues", self.id, target);
            return Ok(());
        }

        if let Err(e) = scan.stop(self.scanner, radio) {
            error!("{}: Failed to pause scanning ({})", self.id, e);
        }

        info!("{}: Attempting connection to {}", self.id, target);
        if let Err(e) = self.connect_to_device(radio, &target) {
            error!("{}: Failed to connect to device ({})", self.id, e);
            if let Err(scan_err) = scan.start(self.scanner, radio) {
                error!("{}: Failed to restart scanning ({})", self.id, scan_err);
            }
            return Err(e);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
