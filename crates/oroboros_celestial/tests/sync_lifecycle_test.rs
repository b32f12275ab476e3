//! # Master / Slave Sync Integration Test
//!
//! Drives a slave against a master through encoded messages, the way a
//! client would over the network.

use std::sync::Arc;

use oroboros_celestial::{
    CelestialBaseInformation, CelestialDatabase, CelestialMasterDatabase, CelestialRegion,
    CelestialRequest, CelestialResponse, CelestialSlaveDatabase, GenerationTables, MasterConfig,
    SlaveConfig, UniverseSeed,
};

fn master() -> CelestialMasterDatabase {
    CelestialMasterDatabase::open(
        Arc::new(GenerationTables::default()),
        UniverseSeed::new(42),
        MasterConfig::default(),
    )
    .unwrap()
}

/// One network round trip: requests out, responses back, both as bytes.
fn round_trip(master: &CelestialMasterDatabase, slave: &CelestialSlaveDatabase) -> usize {
    let requests = slave.pull_requests();
    if requests.is_empty() {
        return 0;
    }
    let wire = CelestialRequest::encode_batch(&requests).unwrap();
    let received = CelestialRequest::decode_batch(&wire).unwrap();

    let responses = master.respond_to_requests(&received).unwrap();
    let wire = CelestialResponse::encode_batch(&responses).unwrap();
    slave.push_responses(CelestialResponse::decode_batch(&wire).unwrap());
    requests.len()
}

#[test]
fn test_slave_converges_on_master() {
    let master = master();
    let handshake = master.base_information().encode().unwrap();
    let slave = CelestialSlaveDatabase::new(
        CelestialBaseInformation::decode(&handshake).unwrap(),
        &SlaveConfig::default(),
    );

    let region = CelestialRegion::around(10, -10, 90);
    assert!(slave.scan_systems(region, None).unwrap().is_empty());
    assert!(!slave.scan_region_fully_loaded(region));

    slave.signal_region(region);
    let sent = round_trip(&master, &slave);
    assert!(sent > 0);
    assert!(slave.scan_region_fully_loaded(region));

    let expected = master.scan_systems(region, None).unwrap();
    assert_eq!(slave.scan_systems(region, None).unwrap(), expected);
    assert_eq!(
        slave.scan_constellation_lines(region).unwrap(),
        master.scan_constellation_lines(region).unwrap()
    );

    // System centers are known; planet trees are not until asked for.
    let system = expected[0];
    assert_eq!(slave.parameters(&system).unwrap(), master.parameters(&system).unwrap());
    assert_eq!(slave.children(&system).unwrap(), None);

    slave.signal_system(system.location());
    assert_eq!(round_trip(&master, &slave), 1, "only the planet tree is missing");
    assert_eq!(slave.children(&system).unwrap(), master.children(&system).unwrap());

    for planet in master.children(&system).unwrap().unwrap() {
        assert_eq!(slave.parameters(&planet).unwrap(), master.parameters(&planet).unwrap());
        assert_eq!(slave.child_orbits(&planet).unwrap(), master.child_orbits(&planet).unwrap());
    }

    // Everything is cached: nothing more to ask for.
    slave.signal_region(region);
    slave.signal_system(system.location());
    assert_eq!(round_trip(&master, &slave), 0);
}

#[test]
fn test_each_key_is_requested_exactly_once() {
    let master = master();
    let slave = CelestialSlaveDatabase::new(master.base_information(), &SlaveConfig::default());
    let region = CelestialRegion::new(0, 0, 128, 64);

    slave.signal_region(region);
    slave.signal_region(region);
    let requests = slave.pull_requests();
    assert_eq!(requests.len(), 2);

    // Lost in transit: still pending, so not re-sent before the timeout.
    slave.signal_region(region);
    assert!(slave.pull_requests().is_empty());
    assert_eq!(slave.pending_requests(), 2);

    slave.push_responses(master.respond_to_requests(&requests).unwrap());
    assert_eq!(slave.pending_requests(), 0);
    assert_eq!(slave.cached_chunks(), 2);
}

#[test]
fn test_invalidation_triggers_refetch() {
    let master = master();
    let slave = CelestialSlaveDatabase::new(master.base_information(), &SlaveConfig::default());
    let region = CelestialRegion::new(0, 0, 64, 64);

    slave.signal_region(region);
    round_trip(&master, &slave);
    let system = slave.scan_systems(region, None).unwrap()[0];

    slave.invalidate_cache_for(&system);
    assert_eq!(slave.parameters(&system).unwrap(), None);

    slave.signal_region(region);
    assert_eq!(round_trip(&master, &slave), 1);
    assert!(slave.parameters(&system).unwrap().is_some());
}
