//! Integration tests for the bt-central host-testable logic.
//!
//! The radio is a recording mock; time is driven explicitly through the
//! `now` argument of the host methods.

use bt_central::{
    Address, AddressType, CentralConfig, ConnHandle, ConnParams, ConnectionEvent, ConnectionRole,
    CriterionKind, Error, Filter, FilterOperator, Host, PeripheralEvents, RadioStack, ScanParams,
    ScanReport, SlotState, StackError,
};
use embassy_time::Instant;

// ═══════════════════════════════════════════════════════════════════════════
// Mock stack
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct RecordingRadio {
    scanning: bool,
    scan_starts: usize,
    scan_stops: usize,
    last_params: Option<ScanParams>,
    connect_requests: Vec<Address>,
    disconnects: Vec<(ConnHandle, u8)>,
    released: Vec<ConnHandle>,
    next_handle: u16,
    refuse_connect: bool,
}

impl RadioStack for RecordingRadio {
    fn start_scan(&mut self, params: &ScanParams) -> Result<(), StackError> {
        assert!(!self.scanning, "radio scan armed twice");
        self.scanning = true;
        self.scan_starts += 1;
        self.last_params = Some(*params);
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), StackError> {
        assert!(self.scanning, "radio scan disarmed while idle");
        self.scanning = false;
        self.scan_stops += 1;
        Ok(())
    }

    fn create_connection(&mut self, address: &Address, _params: &ConnParams) -> Result<ConnHandle, StackError> {
        self.connect_requests.push(*address);
        if self.refuse_connect {
            return Err(StackError(-16));
        }
        self.next_handle += 1;
        Ok(ConnHandle(self.next_handle))
    }

    fn disconnect(&mut self, handle: ConnHandle, reason: u8) -> Result<(), StackError> {
        self.disconnects.push((handle, reason));
        Ok(())
    }

    fn release(&mut self, handle: ConnHandle) {
        self.released.push(handle);
    }
}

#[derive(Default)]
struct PeripheralLog {
    connected: Vec<(ConnHandle, u8)>,
    disconnected: Vec<(ConnHandle, u8)>,
    security: Vec<(ConnHandle, u8, Option<u8>)>,
}

impl PeripheralEvents for PeripheralLog {
    fn on_connected(&mut self, handle: ConnHandle, status: u8) {
        self.connected.push((handle, status));
    }

    fn on_disconnected(&mut self, handle: ConnHandle, reason: u8) {
        self.disconnected.push((handle, reason));
    }

    fn on_security_changed(&mut self, handle: ConnHandle, level: u8, error: Option<u8>) {
        self.security.push((handle, level, error));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn device(last: u8) -> Address {
    Address::new(AddressType::RandomStatic, [last, 0x22, 0x33, 0x44, 0x55, 0xC6])
}

/// Advertisement payload carrying a complete local name.
fn named(name: &str) -> Vec<u8> {
    let mut adv = vec![0x02, 0x01, 0x06, name.len() as u8 + 1, 0x09];
    adv.extend_from_slice(name.as_bytes());
    adv
}

fn report(address: Address, data: &[u8]) -> ScanReport<'_> {
    ScanReport {
        address,
        rssi: -60,
        adv_type: 0x00,
        data,
    }
}

fn central_event(handle: u16) -> ConnectionEvent {
    ConnectionEvent {
        handle: ConnHandle(handle),
        role: ConnectionRole::Central,
    }
}

fn at(ms: u64) -> Instant {
    Instant::from_millis(10_000 + ms)
}

// ═══════════════════════════════════════════════════════════════════════════
// Scan coordination
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn two_centrals_share_one_radio_scan() {
    let mut host = Host::new(RecordingRadio::default());
    let a = host.add_central(CentralConfig::default()).unwrap();
    let b = host.add_central(CentralConfig::default()).unwrap();

    host.start_scanning(a).unwrap();
    host.start_scanning(b).unwrap();
    assert_eq!(host.radio().scan_starts, 1);
    assert_eq!(host.scan().active_count(), 2);

    host.stop_scanning(a).unwrap();
    assert!(host.radio().scanning);
    assert!(host.is_scanning(b));
    host.stop_scanning(b).unwrap();
    assert_eq!(host.radio().scan_stops, 1);
    assert!(!host.scan().is_radio_scanning());
}

#[test]
fn central_registry_is_bounded() {
    let mut host = Host::new(RecordingRadio::default());
    host.add_central(CentralConfig::default()).unwrap();
    host.add_central(CentralConfig::default()).unwrap();
    assert_eq!(host.add_central(CentralConfig::default()), Err(Error::RegistryFull));
}

#[test]
fn scan_params_apply_on_next_arm() {
    let mut host = Host::new(RecordingRadio::default());
    let a = host.add_central(CentralConfig::default()).unwrap();
    let params = ScanParams {
        active: false,
        filter_duplicates: false,
        interval: 0x00A0,
        window: 0x0050,
    };
    host.set_scan_params(params);
    host.start_scanning(a).unwrap();
    assert_eq!(host.radio().last_params, Some(params));
}

// ═══════════════════════════════════════════════════════════════════════════
// Scan match → connection
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn scan_match_connects_after_delay_and_pauses_scan() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.set_filter(id, &Filter::local_name("Kbd-*").unwrap()).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Kbd-01");
    assert_eq!(host.on_scan_report(&report(device(1), &adv), at(0)), 1);
    // The callback itself never reaches the radio.
    assert!(host.radio().connect_requests.is_empty());
    assert_eq!(host.next_deadline(), Some(at(100)));

    assert_eq!(host.run_due(at(50)), 0);
    assert_eq!(host.run_due(at(100)), 1);
    assert_eq!(host.radio().connect_requests, vec![device(1)]);
    assert!(!host.radio().scanning);
    assert!(!host.is_scanning(id));

    let slot = *host.central(id).unwrap().connections().next().unwrap();
    assert_eq!(slot.address, device(1));
    assert_eq!(slot.state, SlotState::Connecting);

    host.on_connected(central_event(slot.handle.0), 0, at(150)).unwrap();
    assert_eq!(
        host.central(id).unwrap().connections().next().unwrap().state,
        SlotState::Connected
    );
    // Scan pause scheduled; the scanner is already idle so the radio is untouched.
    assert_eq!(host.run_due(at(350)), 1);
    assert_eq!(host.radio().scan_stops, 1);

    host.on_disconnected(central_event(slot.handle.0), 0x08, at(400)).unwrap();
    assert_eq!(host.central(id).unwrap().connection_count(), 0);
    assert_eq!(host.radio().released, vec![slot.handle]);
    assert_eq!(host.run_due(at(600)), 1);
    assert!(host.radio().scanning);
    assert_eq!(host.radio().scan_starts, 2);
}

#[test]
fn non_matching_report_schedules_nothing() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.set_filter(id, &Filter::local_name("Kbd-*").unwrap()).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Mouse");
    assert_eq!(host.on_scan_report(&report(device(1), &adv), at(0)), 0);
    assert_eq!(host.pending_work(), 0);
}

#[test]
fn idle_scanner_ignores_reports() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.set_filter(id, &Filter::local_name("*").unwrap()).unwrap();

    let adv = named("Anything");
    assert_eq!(host.on_scan_report(&report(device(1), &adv), at(0)), 0);
}

#[test]
fn repeated_reports_yield_one_connection() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Sensor");
    host.on_scan_report(&report(device(4), &adv), at(0));
    host.on_scan_report(&report(device(4), &adv), at(30));
    host.on_scan_report(&report(device(4), &adv), at(60));
    assert_eq!(host.pending_work(), 1);

    assert_eq!(host.run_due(at(1_000)), 1);
    assert_eq!(host.radio().connect_requests.len(), 1);

    // Reports that arrive while the link is held are ignored.
    host.start_scanning(id).unwrap();
    assert_eq!(host.on_scan_report(&report(device(4), &adv), at(1_010)), 0);
}

#[test]
fn refused_connection_resumes_scanning() {
    let mut host = Host::new(RecordingRadio {
        refuse_connect: true,
        ..Default::default()
    });
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Sensor");
    host.on_scan_report(&report(device(2), &adv), at(0));
    assert_eq!(host.run_due(at(100)), 1);

    assert_eq!(host.radio().connect_requests.len(), 1);
    assert_eq!(host.central(id).unwrap().connection_count(), 0);
    assert!(host.is_scanning(id));
    assert_eq!(host.radio().scan_starts, 2);
}

#[test]
fn failed_connection_event_frees_slot_and_resumes() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Sensor");
    host.on_scan_report(&report(device(2), &adv), at(0));
    host.run_due(at(100));
    assert!(!host.is_scanning(id));

    // 0x3E: connection failed to be established.
    host.on_connected(central_event(1), 0x3E, at(120)).unwrap();
    assert_eq!(host.central(id).unwrap().connection_count(), 0);
    assert_eq!(host.radio().released, vec![ConnHandle(1)]);

    assert_eq!(host.run_due(at(320)), 1);
    assert!(host.is_scanning(id));
}

#[test]
fn both_centrals_connect_to_shared_match() {
    let mut host = Host::new(RecordingRadio::default());
    let a = host.add_central(CentralConfig::default()).unwrap();
    let b = host.add_central(CentralConfig::default()).unwrap();
    host.start_scanning(a).unwrap();
    host.start_scanning(b).unwrap();

    let adv = named("Shared");
    assert_eq!(host.on_scan_report(&report(device(9), &adv), at(0)), 2);
    assert_eq!(host.run_due(at(100)), 2);

    assert_eq!(host.radio().connect_requests.len(), 2);
    assert_eq!(host.central(a).unwrap().connection_count(), 1);
    assert_eq!(host.central(b).unwrap().connection_count(), 1);
    // Both scanners paused: radio disarmed exactly once.
    assert_eq!(host.radio().scan_stops, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Filters through the host
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn or_of_groups_selects_candidates() {
    let mut filter = Filter::new();
    filter.add_group().unwrap();
    filter.add_criterion(CriterionKind::LocalName, "Kbd-*").unwrap();
    filter.add_criterion(CriterionKind::ManufacturerData, "4C00*").unwrap();
    filter.add_group().unwrap();
    filter.set_group_operator(FilterOperator::Or).unwrap();
    filter.add_criterion(CriterionKind::ServiceUuid, "1812").unwrap();
    filter.add_criterion(CriterionKind::ServiceUuid, "180F").unwrap();

    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.set_filter(id, &filter).unwrap();
    host.start_scanning(id).unwrap();

    // Name and manufacturer data: first group.
    let mut both = named("Kbd-01");
    both.extend_from_slice(&[0x04, 0xFF, 0x4C, 0x00, 0x01]);
    assert_eq!(host.on_scan_report(&report(device(1), &both), at(0)), 1);

    // Name alone fails the AND group and carries no service UUID.
    let name_only = named("Kbd-02");
    assert_eq!(host.on_scan_report(&report(device(2), &name_only), at(0)), 0);

    // HID service UUID (0x1812): second group.
    let hid = [0x03, 0x03, 0x12, 0x18];
    assert_eq!(host.on_scan_report(&report(device(3), &hid), at(0)), 1);
    assert_eq!(host.central(id).unwrap().pending_target(), Some(device(3)));
}

#[test]
fn empty_filter_accepts_every_report() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.set_filter(id, &Filter::new()).unwrap();
    host.start_scanning(id).unwrap();

    assert_eq!(host.on_scan_report(&report(device(1), &[]), at(0)), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Application commands and role routing
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn explicit_connect_and_disconnect() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();

    host.connect(id, &device(5)).unwrap();
    host.connect(id, &device(5)).unwrap();
    assert_eq!(host.radio().connect_requests.len(), 1);

    host.disconnect(id, &device(5), at(0)).unwrap();
    assert_eq!(host.radio().disconnects, vec![(ConnHandle(1), 0x13)]);
    assert_eq!(host.central(id).unwrap().connection_count(), 0);
    assert_eq!(host.disconnect(id, &device(5), at(0)), Err(Error::NotFound));

    // The stack's own disconnection event arrives after the slot is gone.
    assert_eq!(
        host.on_disconnected(central_event(1), 0x16, at(10)),
        Err(Error::NotFound)
    );
    // Only the resume scheduled by the disconnect itself.
    assert_eq!(host.pending_work(), 1);
    assert_eq!(host.next_deadline(), Some(at(200)));
}

#[test]
fn app_disconnect_resumes_paused_scan() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Sensor");
    host.on_scan_report(&report(device(6), &adv), at(0));
    host.run_due(at(100));
    host.on_connected(central_event(1), 0, at(120)).unwrap();
    host.run_due(at(320));
    assert!(!host.is_scanning(id));

    host.disconnect(id, &device(6), at(400)).unwrap();
    assert_eq!(
        host.on_disconnected(central_event(1), 0x16, at(410)),
        Err(Error::NotFound)
    );
    assert_eq!(host.run_due(at(600)), 1);
    assert!(host.is_scanning(id));
    assert!(host.radio().scanning);
}

#[test]
fn keep_scanning_policy_resumes_after_automatic_connection() {
    let config = CentralConfig {
        pause_scan_on_connect: false,
        ..Default::default()
    };
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(config).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Sensor");
    host.on_scan_report(&report(device(7), &adv), at(0));
    assert_eq!(host.run_due(at(100)), 1);
    // Paused only for the duration of the connect attempt.
    assert!(!host.is_scanning(id));

    host.on_connected(central_event(1), 0, at(150)).unwrap();
    host.run_due(at(10_150));
    assert_eq!(host.central(id).unwrap().connection_count(), 1);
    assert!(host.is_scanning(id));
    assert!(host.radio().scanning);
    assert_eq!(host.radio().scan_starts, 2);
    assert_eq!(host.pending_work(), 0);
}

#[test]
fn connect_work_for_device_already_held_keeps_scanning() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.start_scanning(id).unwrap();

    let adv = named("Sensor");
    assert_eq!(host.on_scan_report(&report(device(8), &adv), at(0)), 1);
    // The application connects before the work item fires.
    host.connect(id, &device(8)).unwrap();

    assert_eq!(host.run_due(at(100)), 1);
    assert_eq!(host.radio().connect_requests, vec![device(8)]);
    assert!(host.is_scanning(id));
    assert_eq!(host.radio().scan_stops, 0);
}

#[test]
fn slot_table_full_rejects_new_device() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    for i in 0..4 {
        host.connect(id, &device(i)).unwrap();
    }
    assert_eq!(host.connect(id, &device(0x40)), Err(Error::NoFreeSlot));
    assert_eq!(host.radio().connect_requests.len(), 4);
}

#[test]
fn double_disconnect_event_schedules_one_resume() {
    let mut host = Host::new(RecordingRadio::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.connect(id, &device(1)).unwrap();
    host.on_connected(central_event(1), 0, at(0)).unwrap();
    host.run_due(at(1_000));

    host.on_disconnected(central_event(1), 0x08, at(1_000)).unwrap();
    assert_eq!(
        host.on_disconnected(central_event(1), 0x08, at(1_010)),
        Err(Error::NotFound)
    );
    assert_eq!(host.pending_work(), 1);
    assert_eq!(host.next_deadline(), Some(at(1_200)));
}

#[test]
fn peripheral_events_bypass_centrals() {
    let mut host = Host::with_peripheral(RecordingRadio::default(), PeripheralLog::default());
    let id = host.add_central(CentralConfig::default()).unwrap();
    host.connect(id, &device(1)).unwrap();

    let peripheral = ConnectionEvent {
        handle: ConnHandle(1),
        role: ConnectionRole::Peripheral,
    };
    host.on_connected(peripheral, 0, at(0)).unwrap();
    host.on_security_changed(peripheral, 2, None).unwrap();
    host.on_disconnected(peripheral, 0x13, at(10)).unwrap();

    assert_eq!(host.peripheral().connected, vec![(ConnHandle(1), 0)]);
    assert_eq!(host.peripheral().security, vec![(ConnHandle(1), 2, None)]);
    assert_eq!(host.peripheral().disconnected, vec![(ConnHandle(1), 0x13)]);

    // The central's slot with the same handle value is untouched.
    let slot = host.central(id).unwrap().connections().next().copied().unwrap();
    assert_eq!(slot.state, SlotState::Connecting);
    assert_eq!(host.pending_work(), 0);
}

#[test]
fn central_event_for_unknown_handle_is_not_found() {
    let mut host = Host::new(RecordingRadio::default());
    host.add_central(CentralConfig::default()).unwrap();

    assert_eq!(host.on_connected(central_event(42), 0, at(0)), Err(Error::NotFound));
    assert_eq!(
        host.on_security_changed(central_event(42), 2, Some(5)),
        Err(Error::NotFound)
    );
}

#[test]
fn removed_central_releases_everything() {
    let mut host = Host::new(RecordingRadio::default());
    let a = host.add_central(CentralConfig::default()).unwrap();
    host.add_central(CentralConfig::default()).unwrap();

    host.connect(a, &device(1)).unwrap();
    host.start_scanning(a).unwrap();
    let adv = named("Pending");
    host.on_scan_report(&report(device(2), &adv), at(0));
    assert_eq!(host.pending_work(), 1);

    host.remove_central(a).unwrap();
    assert_eq!(host.radio().released, vec![ConnHandle(1)]);
    assert_eq!(host.pending_work(), 0);
    assert!(!host.radio().scanning);
    assert!(host.central(a).is_none());
    assert_eq!(host.remove_central(a), Err(Error::NotFound));

    assert_eq!(host.add_central(CentralConfig::default()), Ok(a));
}
