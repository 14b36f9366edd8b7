//! Logical scanners sharing one physical scan.
//!
//! The radio offers a single scan resource.  Every [`Scanner`] keeps its own
//! on/off flag and its own [`Filter`]; the [`ScanCoordinator`] counts the
//! active ones and only touches the radio on the 0 → 1 and 1 → 0 edges.
//! Scanners must never start or stop the radio themselves.

use core::fmt;

use heapless::Vec;

use crate::ble::adv_parser::AdvertisementRecord;
use crate::ble::central::CentralId;
use crate::ble::filter::Filter;
use crate::ble::registry::Registry;
use crate::ble::RadioStack;
use crate::config::{ScanParams, MAX_SCANNERS};
use crate::error::Error;

/// Index of a scanner in the coordinator's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScannerId(pub(crate) u8);

impl ScannerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scanner {}", self.0)
    }
}

/// One logical scanner.
#[derive(Clone, Debug)]
pub struct Scanner {
    is_scanning: bool,
    filter: Filter,
    owner: Option<CentralId>,
}

impl Scanner {
    fn new(owner: Option<CentralId>) -> Self {
        Self {
            is_scanning: false,
            filter: Filter::new(),
            owner,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn owner(&self) -> Option<CentralId> {
        self.owner
    }
}

/// Owner of the shared scan state: scanner table, scan parameters, the
/// active-scanner count and the physical on/off state.
pub struct ScanCoordinator {
    scanners: Registry<Scanner, MAX_SCANNERS>,
    params: ScanParams,
    active: usize,
    radio_scanning: bool,
}

impl Default for ScanCoordinator {
    fn default() -> Self {
        Self::new(ScanParams::default())
    }
}

impl ScanCoordinator {
    pub fn new(params: ScanParams) -> Self {
        Self {
            scanners: Registry::new(),
            params,
            active: 0,
            radio_scanning: false,
        }
    }

    /// Register a scanner.  Matches of an ownerless scanner are ignored.
    pub fn register(&mut self, owner: Option<CentralId>) -> Result<ScannerId, Error> {
        match self.scanners.insert(Scanner::new(owner)) {
            Ok(index) => {
                debug!("Registered scanner {}", index);
                Ok(ScannerId(index as u8))
            }
            Err(_) => {
                error!("Scanner registry full!");
                Err(Error::RegistryFull)
            }
        }
    }

    /// Remove a scanner, stopping it first if it is still active.
    pub fn unregister<R: RadioStack>(&mut self, id: ScannerId, radio: &mut R) -> Result<(), Error> {
        if self.is_scanning(id) {
            self.stop(id, radio)?;
        }
        self.scanners.remove(id.index()).ok_or(Error::NotFound)?;
        debug!("Unregistered scanner {}", id.0);
        Ok(())
    }

    pub fn scanner(&self, id: ScannerId) -> Option<&Scanner> {
        self.scanners.get(id.index())
    }

    /// Copy `filter` into the scanner and activate it.
    pub fn set_filter(&mut self, id: ScannerId, filter: &Filter) -> Result<(), Error> {
        let scanner = self.scanners.get_mut(id.index()).ok_or(Error::NotFound)?;
        scanner.filter = filter.clone();
        scanner.filter.set_active(true);
        info!("Filter added to scanner {}", id.0);
        Ok(())
    }

    /// Parameters used the next time the radio scan is armed.
    pub fn set_params(&mut self, params: ScanParams) {
        self.params = params;
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    pub fn is_scanning(&self, id: ScannerId) -> bool {
        self.scanner(id).map(Scanner::is_scanning).unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Whether the physical radio scan is armed.
    pub fn is_radio_scanning(&self) -> bool {
        self.radio_scanning
    }

    /// Mark the scanner active, arming the radio if it is the first one.
    pub fn start<R: RadioStack>(&mut self, id: ScannerId, radio: &mut R) -> Result<(), Error> {
        let scanner = self.scanners.get_mut(id.index()).ok_or(Error::NotFound)?;
        if scanner.is_scanning {
            return Ok(());
        }

        if self.active == 0 {
            if let Err(e) = radio.start_scan(&self.params) {
                error!("Failed to start scanning (err {})", e.0);
                return Err(e.into());
            }
            self.radio_scanning = true;
            info!("Radio scan armed");
        }

        scanner.is_scanning = true;
        self.active += 1;
        info!("Scanner {} started ({} active)", id.0, self.active);
        Ok(())
    }

    /// Mark the scanner idle, disarming the radio if it was the last one.
    pub fn stop<R: RadioStack>(&mut self, id: ScannerId, radio: &mut R) -> Result<(), Error> {
        let scanner = self.scanners.get_mut(id.index()).ok_or(Error::NotFound)?;
        if !scanner.is_scanning {
            return Ok(());
        }

        if self.active == 1 {
            if let Err(e) = radio.stop_scan() {
                error!("Failed to stop scanning (err {})", e.0);
                return Err(e.into());
            }
            self.radio_scanning = false;
            info!("Radio scan disarmed");
        }

        scanner.is_scanning = false;
        self.active -= 1;
        info!("Scanner {} stopped ({} active)", id.0, self.active);
        Ok(())
    }

    /// Owners of the active scanners whose filter accepts `record`.
    pub fn dispatch(&self, record: &AdvertisementRecord<'_>) -> Vec<CentralId, MAX_SCANNERS> {
        let mut candidates = Vec::new();
        for (_, scanner) in self.scanners.iter() {
            if !scanner.is_scanning || !scanner.filter.matches(record) {
                continue;
            }
            if let Some(owner) = scanner.owner {
                // At most one entry per scanner, so this cannot overflow.
                let _ = candidates.push(owner);
            }
        }
        candidates
    }
}
