//! Event routing between the radio stack and the centrals.
//!
//! The [`Host`] is the single owner of the radio handle, the scan
//! coordinator, the central table and the work queue.  Stack callbacks are
//! forwarded to its `on_*` methods; [`Host::run_due`] executes the deferred
//! work they scheduled.  Connection events are routed by the role the stack
//! reports: central-role events go to the central holding the handle,
//! peripheral-role events to the [`PeripheralEvents`] handler fixed at
//! construction.

use embassy_time::Instant;

use crate::ble::adv_parser::{device_name, AdvertisementRecord};
use crate::ble::central::{Central, CentralId};
use crate::ble::filter::Filter;
use crate::ble::registry::Registry;
use crate::ble::scanner::ScanCoordinator;
use crate::ble::work_queue::{WorkKind, WorkQueue};
use crate::ble::{
    Address, ConnHandle, ConnectionEvent, ConnectionRole, PeripheralEvents, RadioStack, ScanReport,
};
use crate::config::{CentralConfig, ScanParams, MAX_CENTRALS, WORK_QUEUE_CAPACITY};
use crate::error::Error;

pub struct Host<R: RadioStack, P: PeripheralEvents = ()> {
    radio: R,
    peripheral: P,
    scan: ScanCoordinator,
    centrals: Registry<Central, MAX_CENTRALS>,
    work: WorkQueue<WORK_QUEUE_CAPACITY>,
}

impl<R: RadioStack> Host<R> {
    /// Host without a peripheral role.
    pub fn new(radio: R) -> Self {
        Self::with_peripheral(radio, ())
    }
}

impl<R: RadioStack, P: PeripheralEvents> Host<R, P> {
    pub fn with_peripheral(radio: R, peripheral: P) -> Self {
        Self {
            radio,
            peripheral,
            scan: ScanCoordinator::new(ScanParams::default()),
            centrals: Registry::new(),
            work: WorkQueue::new(),
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn scan(&self) -> &ScanCoordinator {
        &self.scan
    }

    pub fn set_scan_params(&mut self, params: ScanParams) {
        self.scan.set_params(params);
    }

    // Central lifecycle

    /// Register a central and its scanner.
    pub fn add_central(&mut self, config: CentralConfig) -> Result<CentralId, Error> {
        let Some(index) = self.centrals.vacant() else {
            error!("Central registry is full! Maximum {} centrals allowed.", MAX_CENTRALS);
            return Err(Error::RegistryFull);
        };
        let id = CentralId(index as u8);
        let scanner = self.scan.register(Some(id))?;

        if self.centrals.insert(Central::new(id, scanner, config)).is_err() {
            let _ = self.scan.unregister(scanner, &mut self.radio);
            return Err(Error::RegistryFull);
        }
        info!("Registered {}", id);
        Ok(id)
    }

    /// Remove a central: releases its handles, drops its scanner and any
    /// pending work.  The index becomes available again.
    pub fn remove_central(&mut self, id: CentralId) -> Result<(), Error> {
        let mut central = self.centrals.remove(id.index()).ok_or(Error::NotFound)?;
        central.release_all(&mut self.radio);
        self.work.purge(id);
        self.scan.unregister(central.scanner(), &mut self.radio)?;
        info!("Removed {}", id);
        Ok(())
    }

    pub fn central(&self, id: CentralId) -> Option<&Central> {
        self.centrals.get(id.index())
    }

    pub fn centrals(&self) -> impl Iterator<Item = &Central> {
        self.centrals.iter().map(|(_, c)| c)
    }

    fn central_mut(&mut self, id: CentralId) -> Result<&mut Central, Error> {
        self.centrals.get_mut(id.index()).ok_or(Error::NotFound)
    }

    // Application commands

    pub fn set_filter(&mut self, id: CentralId, filter: &Filter) -> Result<(), Error> {
        let scanner = self.central_mut(id)?.scanner();
        self.scan.set_filter(scanner, filter)
    }

    pub fn start_scanning(&mut self, id: CentralId) -> Result<(), Error> {
        let scanner = self.central_mut(id)?.scanner();
        self.scan.start(scanner, &mut self.radio)
    }

    pub fn stop_scanning(&mut self, id: CentralId) -> Result<(), Error> {
        let scanner = self.central_mut(id)?.scanner();
        self.scan.stop(scanner, &mut self.radio)
    }

    pub fn is_scanning(&self, id: CentralId) -> bool {
        self.central(id)
            .map(|c| self.scan.is_scanning(c.scanner()))
            .unwrap_or(false)
    }

    pub fn connect(&mut self, id: CentralId, address: &Address) -> Result<(), Error> {
        let central = self.centrals.get_mut(id.index()).ok_or(Error::NotFound)?;
        central.connect_to_device(&mut self.radio, address)
    }

    /// Disconnect `address`; the central's scanning resumes after the usual
    /// scan work delay.
    pub fn disconnect(&mut self, id: CentralId, address: &Address, now: Instant) -> Result<(), Error> {
        let central = self.centrals.get_mut(id.index()).ok_or(Error::NotFound)?;
        central.disconnect_from_device(&mut self.radio, address, &mut self.work, now)
    }

    // Stack callbacks

    /// Scan callback: fan the report out to every active scanner.  Returns
    /// how many connection work items were scheduled.
    pub fn on_scan_report(&mut self, report: &ScanReport<'_>, now: Instant) -> usize {
        let record = AdvertisementRecord::parse(report.data);
        let candidates = self.scan.dispatch(&record);

        let mut scheduled = 0;
        for owner in candidates {
            let Some(central) = self.centrals.get_mut(owner.index()) else {
                continue;
            };
            debug!(
                "Filter matched for {}: {} ({}, RSSI {})",
                owner,
                device_name(report.data).as_str(),
                report.address,
                report.rssi
            );
            match central.on_candidate(&report.address, &mut self.work, now) {
                Ok(true) => scheduled += 1,
                Ok(false) => {}
                Err(e) => warn!("{}: candidate dropped ({})", owner, e),
            }
        }
        scheduled
    }

    pub fn on_connected(&mut self, event: ConnectionEvent, status: u8, now: Instant) -> Result<(), Error> {
        match event.role {
            ConnectionRole::Peripheral => {
                self.peripheral.on_connected(event.handle, status);
                Ok(())
            }
            ConnectionRole::Central => {
                let central = owner_of(&mut self.centrals, event.handle)?;
                central.on_connected(&mut self.radio, event.handle, status, &mut self.work, now)
            }
        }
    }

    pub fn on_disconnected(&mut self, event: ConnectionEvent, reason: u8, now: Instant) -> Result<(), Error> {
        match event.role {
            ConnectionRole::Peripheral => {
                self.peripheral.on_disconnected(event.handle, reason);
                Ok(())
            }
            ConnectionRole::Central => {
                let central = owner_of(&mut self.centrals, event.handle)?;
                central.on_disconnected(&mut self.radio, event.handle, reason, &mut self.work, now)
            }
        }
    }

    pub fn on_security_changed(
        &mut self,
        event: ConnectionEvent,
        level: u8,
        error: Option<u8>,
    ) -> Result<(), Error> {
        match event.role {
            ConnectionRole::Peripheral => {
                self.peripheral.on_security_changed(event.handle, level, error);
                Ok(())
            }
            ConnectionRole::Central => {
                let central = owner_of(&mut self.centrals, event.handle)?;
                central.on_security_changed(event.handle, level, error);
                Ok(())
            }
        }
    }

    // Deferred work

    pub fn next_deadline(&self) -> Option<Instant> {
        self.work.next_deadline()
    }

    pub fn pending_work(&self) -> usize {
        self.work.len()
    }

    /// Execute every work item due at `now`.  Returns how many ran.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let mut executed = 0;
        while let Some(key) = self.work.pop_due(now) {
            executed += 1;
            let Some(central) = self.centrals.get_mut(key.central.index()) else {
                continue;
            };
            let result = match key.kind {
                WorkKind::Scan => central.run_scan_work(&mut self.radio, &mut self.scan),
                WorkKind::Connect => central.run_connect_work(&mut self.radio, &mut self.scan),
            };
            if let Err(e) = result {
                warn!("{}: deferred work failed ({})", key.central, e);
            }
        }
        executed
    }
}

fn owner_of(
    centrals: &mut Registry<Central, MAX_CENTRALS>,
    handle: ConnHandle,
) -> Result<&mut Central, Error> {
    match centrals.iter_mut().find(|(_, c)| c.owns(handle)) {
        Some((_, central)) => Ok(central),
        None => {
            warn!("Failed to find Central for {}", handle);
            Err(Error::NotFound)
        }
    }
}
