//! Shared host and the deferred-work task.
//!
//! Stack callbacks and application commands reach the [`Host`] from
//! different contexts, so it lives behind an embassy blocking mutex.
//! [`SharedHost::run_work_queue`] is the only place deferred work executes:
//! it sleeps until the next deadline and is woken early whenever a callback
//! schedules something new.

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};

use crate::ble::central::CentralId;
use crate::ble::host::Host;
use crate::ble::{Address, ConnectionEvent, PeripheralEvents, RadioStack, ScanReport};
use crate::error::Error;

pub struct SharedHost<M: RawMutex, R: RadioStack, P: PeripheralEvents = ()> {
    host: Mutex<M, RefCell<Host<R, P>>>,
    wake: Signal<M, ()>,
}

impl<M: RawMutex, R: RadioStack, P: PeripheralEvents> SharedHost<M, R, P> {
    pub fn new(host: Host<R, P>) -> Self {
        Self {
            host: Mutex::new(RefCell::new(host)),
            wake: Signal::new(),
        }
    }

    /// Run `f` with exclusive access to the host.  Wakes the work task if
    /// `f` moved the next deadline.
    pub fn with<T>(&self, f: impl FnOnce(&mut Host<R, P>) -> T) -> T {
        let (result, rescheduled) = self.host.lock(|cell| {
            let mut host = cell.borrow_mut();
            let before = host.next_deadline();
            let result = f(&mut *host);
            (result, host.next_deadline() != before)
        });
        if rescheduled {
            self.wake.signal(());
        }
        result
    }

    pub fn on_scan_report(&self, report: &ScanReport<'_>) -> usize {
        self.with(|host| host.on_scan_report(report, Instant::now()))
    }

    pub fn on_connected(&self, event: ConnectionEvent, status: u8) -> Result<(), Error> {
        self.with(|host| host.on_connected(event, status, Instant::now()))
    }

    pub fn on_disconnected(&self, event: ConnectionEvent, reason: u8) -> Result<(), Error> {
        self.with(|host| host.on_disconnected(event, reason, Instant::now()))
    }

    pub fn on_security_changed(
        &self,
        event: ConnectionEvent,
        level: u8,
        error: Option<u8>,
    ) -> Result<(), Error> {
        self.with(|host| host.on_security_changed(event, level, error))
    }

    /// Application-requested disconnect; see [`Host::disconnect`].
    pub fn disconnect(&self, id: CentralId, address: &Address) -> Result<(), Error> {
        self.with(|host| host.disconnect(id, address, Instant::now()))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.host.lock(|cell| cell.borrow().next_deadline())
    }

    /// Execute the work due at `now`.
    pub fn run_due(&self, now: Instant) -> usize {
        self.with(|host| host.run_due(now))
    }

    /// Work-queue task.  Spawn once; never returns.
    pub async fn run_work_queue(&self) -> ! {
        loop {
            match self.next_deadline() {
                Some(deadline) => match select(Timer::at(deadline), self.wake.wait()).await {
                    Either::First(()) => {
                        let executed = self.run_due(Instant::now());
                        trace!("Work queue ran {} item(s)", executed);
                    }
                    Either::Second(()) => {}
                },
                None => self.wake.wait().await,
            }
        }
    }
}
