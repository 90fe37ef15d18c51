//! Scenario and invariant tests for the mPARF manager.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::observer::{NoopObserver, Notification, RecordingObserver};
use crate::peer::RateTable;
use crate::station::SubState;

const STA: StationId = StationId::new([0x00, 0x0f, 0xac, 0x00, 0x00, 0x01]);
const OTHER: StationId = StationId::new([0x00, 0x0f, 0xac, 0x00, 0x00, 0x02]);

type TestManager = MparfManager<RateTable, RecordingObserver>;

/// Four supported rates, power range 0..=3.
fn manager(config: MparfConfig) -> TestManager {
    manager_with(config, RateTable::new(WifiMode::dsss()).unwrap(), 0, 3)
}

fn manager_with(config: MparfConfig, peers: RateTable, min: u8, max: u8) -> TestManager {
    let mut mgr = MparfManager::with_observer(config, peers, RecordingObserver::default());
    mgr.setup(min, max).unwrap();
    mgr.create_station(STA);
    mgr
}

fn ok(mgr: &mut TestManager, n: usize) {
    for _ in 0..n {
        mgr.report_data_ok(STA, LinkQuality::default());
    }
}

fn fail(mgr: &mut TestManager, n: usize) {
    for _ in 0..n {
        mgr.report_data_failed(STA);
    }
}

fn state(mgr: &TestManager) -> &StationState {
    mgr.station(&STA).expect("station exists")
}

#[test]
fn test_lazy_initialization() {
    let mut mgr = manager(MparfConfig::default());
    assert!(!state(&mgr).is_initialized());
    assert!(mgr.observer().events().is_empty());

    let params = mgr.data_tx_parameters(STA, 20, 7, false);
    let st = state(&mgr);
    assert!(st.is_initialized());
    assert_eq!(st.supported_rate_count(), 4);
    assert_eq!(st.rate_index(), 3);
    assert_eq!(st.power_level(), 3);
    assert_eq!(params.mode.name(), "DsssRate11Mbps");
    assert_eq!(params.power_level, 3);
    assert_eq!(
        mgr.observer().events(),
        &[
            Notification::Rate { rate: 3, station: STA },
            Notification::Power { power: 3, station: STA },
        ]
    );

    // A second query does not re-initialize.
    mgr.data_tx_parameters(STA, 20, 7, false);
    assert_eq!(mgr.observer().events().len(), 2);
}

#[test]
fn test_outcome_event_initializes_too() {
    let mut mgr = manager(MparfConfig::default());
    fail(&mut mgr, 1);
    assert!(state(&mgr).is_initialized());
    assert_eq!(mgr.observer().events().len(), 2);
}

#[test]
fn test_rate_promotion_and_revert() {
    let mut mgr = manager(MparfConfig::default());

    // Walk down to rate 1: power is already maximal, so every second failure
    // costs one rate step.
    fail(&mut mgr, 4);
    assert_eq!(state(&mgr).rate_index(), 1);
    assert_eq!(state(&mgr).attempt_count(), 0);
    mgr.observer_mut().drain();

    ok(&mut mgr, 9);
    assert_eq!(state(&mgr).rate_index(), 1);
    assert_eq!(state(&mgr).success_count(), 9);
    assert!(mgr.observer().events().is_empty());

    ok(&mut mgr, 1);
    let st = state(&mgr);
    assert_eq!(st.rate_index(), 2);
    assert_eq!(st.attempt_count(), 0);
    assert_eq!(st.success_count(), 0);
    assert!(st.using_recovery_rate());
    assert!(!st.using_recovery_power());
    assert_eq!(mgr.observer_mut().drain(), vec![Notification::Rate { rate: 2, station: STA }]);

    // The first failure after the promotion reverts it.
    fail(&mut mgr, 1);
    let st = state(&mgr);
    assert_eq!(st.retry_count(), 1);
    assert_eq!(st.rate_index(), 1);
    assert!(!st.using_recovery_rate());
    assert_eq!(st.attempt_count(), 0);
    assert_eq!(st.sub_state(), SubState::Normal);
    assert_eq!(mgr.observer_mut().drain(), vec![Notification::Rate { rate: 1, station: STA }]);
}

#[test]
fn test_promotion_confirmed_by_success() {
    let mut mgr = manager(MparfConfig::default());
    fail(&mut mgr, 2);
    ok(&mut mgr, 10);
    assert_eq!(state(&mgr).sub_state(), SubState::RecoveringRate);

    ok(&mut mgr, 1);
    let st = state(&mgr);
    assert_eq!(st.rate_index(), 3);
    assert_eq!(st.sub_state(), SubState::Normal);
    assert_eq!(st.success_count(), 1);
}

#[test]
fn test_power_demotion_at_rate_ceiling() {
    let mut mgr = manager(MparfConfig::default());
    mgr.data_tx_parameters(STA, 20, 7, false);
    mgr.observer_mut().drain();

    ok(&mut mgr, 10);
    let st = state(&mgr);
    assert_eq!(st.rate_index(), 3);
    assert_eq!(st.power_level(), 2);
    assert!(st.using_recovery_power());
    assert!(!st.using_recovery_rate());
    assert_eq!(st.attempt_count(), 0);
    assert_eq!(st.success_count(), 0);
    assert_eq!(mgr.observer_mut().drain(), vec![Notification::Power { power: 2, station: STA }]);

    // First failure reverts the decrease.
    fail(&mut mgr, 1);
    let st = state(&mgr);
    assert_eq!(st.power_level(), 3);
    assert!(!st.using_recovery_power());
    assert_eq!(st.attempt_count(), 0);
}

#[test]
fn test_normal_alternation() {
    let mut mgr = manager(MparfConfig::default());
    mgr.data_tx_parameters(STA, 20, 7, false);
    mgr.observer_mut().drain();

    fail(&mut mgr, 1);
    assert_eq!(state(&mgr).rate_index(), 3);
    assert_eq!(state(&mgr).attempt_count(), 1);
    assert!(mgr.observer().events().is_empty());

    fail(&mut mgr, 1);
    let st = state(&mgr);
    assert_eq!(st.retry_count(), 2);
    assert_eq!(st.rate_index(), 2);
    assert_eq!(st.power_level(), 3);
    assert_eq!(st.attempt_count(), 0);
    assert_eq!(mgr.observer_mut().drain(), vec![Notification::Rate { rate: 2, station: STA }]);
}

#[test]
fn test_attempt_threshold_promotes() {
    let mut mgr = manager(MparfConfig::default());
    // Rate 2, counters clean.
    fail(&mut mgr, 2);
    // Alternate single failures and successes: the success counter never
    // reaches 10, the attempt counter reaches 15.
    for _ in 0..7 {
        ok(&mut mgr, 1);
        fail(&mut mgr, 1);
    }
    assert_eq!(state(&mgr).attempt_count(), 14);
    assert_eq!(state(&mgr).rate_index(), 2);

    ok(&mut mgr, 1);
    let st = state(&mgr);
    assert_eq!(st.rate_index(), 3);
    assert!(st.using_recovery_rate());
    assert_eq!(st.attempt_count(), 0);
}

#[test]
fn test_success_clears_failure_state() {
    let mut mgr = manager(MparfConfig::default());
    fail(&mut mgr, 3);
    assert_eq!(state(&mgr).fail_count(), 3);

    ok(&mut mgr, 1);
    let st = state(&mgr);
    assert_eq!(st.fail_count(), 0);
    assert_eq!(st.retry_count(), 0);
    assert!(!st.using_recovery_rate());
    assert!(!st.using_recovery_power());
}

#[test]
fn test_zero_success_threshold() {
    let mut mgr = manager(MparfConfig::default().with_success_threshold(0));
    fail(&mut mgr, 4);
    assert_eq!(state(&mgr).rate_index(), 1);

    ok(&mut mgr, 1);
    assert_eq!(state(&mgr).rate_index(), 2);
    ok(&mut mgr, 1);
    assert_eq!(state(&mgr).rate_index(), 3);
    ok(&mut mgr, 1);
    assert_eq!(state(&mgr).power_level(), 2);
    ok(&mut mgr, 3);
    assert_eq!(state(&mgr).power_level(), 0);
    assert!(state(&mgr).using_recovery_power());
}

#[test]
fn test_zero_attempt_threshold() {
    let mut mgr = manager(MparfConfig::default().with_attempt_threshold(0));
    ok(&mut mgr, 1);
    assert_eq!(state(&mgr).power_level(), 2);
    assert_eq!(state(&mgr).sub_state(), SubState::RecoveringPower);
    ok(&mut mgr, 1);
    assert_eq!(state(&mgr).power_level(), 1);
}

#[test]
fn test_single_rate_station() {
    let peers = RateTable::new(vec![WifiMode::new("DsssRate1Mbps", 1_000_000)]).unwrap();
    let mut mgr = manager_with(MparfConfig::default(), peers, 0, 3);

    ok(&mut mgr, 10);
    let st = state(&mgr);
    assert_eq!(st.rate_index(), 0);
    assert_eq!(st.power_level(), 2);
    assert_eq!(mgr.observer().rate_changes(), 1, "only the initial assignment");

    // Power back at max after the revert, then rate cannot drop below 0.
    fail(&mut mgr, 6);
    let st = state(&mgr);
    assert_eq!(st.rate_index(), 0);
    assert_eq!(st.power_level(), 3);
}

#[test]
fn test_fixed_power_range() {
    let mut mgr = manager_with(MparfConfig::default(), RateTable::new(WifiMode::dsss()).unwrap(), 5, 5);

    ok(&mut mgr, 10);
    let st = state(&mgr);
    assert_eq!(st.power_level(), 5);
    assert!(st.using_recovery_power());
    assert_eq!(mgr.observer().power_changes(), 1);

    // Nothing to revert, but recovery is over after one failure.
    fail(&mut mgr, 1);
    assert_eq!(state(&mgr).power_level(), 5);
    assert_eq!(state(&mgr).sub_state(), SubState::Normal);

    fail(&mut mgr, 1);
    assert_eq!(state(&mgr).rate_index(), 2);
    assert_eq!(state(&mgr).power_level(), 5);
}

#[test]
fn test_stations_are_independent() {
    let mut mgr = manager(MparfConfig::default());
    mgr.create_station(OTHER);

    fail(&mut mgr, 2);
    mgr.report_data_ok(OTHER, LinkQuality::default());

    assert_eq!(state(&mgr).rate_index(), 2);
    let other = mgr.station(&OTHER).unwrap();
    assert_eq!(other.rate_index(), 3);
    assert_eq!(other.success_count(), 1);
    assert!(mgr
        .observer()
        .events()
        .iter()
        .any(|e| *e == Notification::Rate { rate: 3, station: OTHER }));
}

#[test]
fn test_unknown_station_created_on_contact() {
    let mut mgr = manager(MparfConfig::default());
    let stranger = StationId::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
    mgr.report_data_failed(stranger);
    assert!(mgr.station(&stranger).unwrap().is_initialized());
    assert_eq!(mgr.registry().len(), 2);

    assert!(mgr.remove_station(&stranger).is_some());
    assert!(mgr.station(&stranger).is_none());
}

#[test]
fn test_noop_hooks_leave_state_alone() {
    let mut mgr = manager(MparfConfig::default());
    fail(&mut mgr, 1);
    let before = state(&mgr).clone();
    let events = mgr.observer().events().len();

    mgr.report_rts_failed(STA);
    mgr.report_rts_ok(STA, LinkQuality::default());
    mgr.report_rx_ok(STA, LinkQuality { snr: 30.0, ..Default::default() });
    mgr.report_final_rts_failed(STA);
    mgr.report_final_data_failed(STA);

    assert_eq!(state(&mgr), &before);
    assert_eq!(mgr.observer().events().len(), events);
}

#[test]
fn test_data_parameters_clamp_width() {
    let mut mgr = manager(MparfConfig::default());
    let p = mgr.data_tx_parameters(STA, 40, 4, true);
    assert_eq!(p.channel_width, 20);
    assert_eq!(p.retry_limit, 4);
    assert!(p.aggregation);

    let p = mgr.data_tx_parameters(STA, 22, 4, false);
    assert_eq!(p.channel_width, 22);
}

#[test]
fn test_rts_parameters_not_adapted() {
    let peers = RateTable::new(WifiMode::ofdm_20mhz())
        .unwrap()
        .with_non_erp_modes(WifiMode::dsss())
        .unwrap();
    let mut mgr = manager_with(MparfConfig::default(), peers, 0, 17);

    let p = mgr.rts_tx_parameters(STA, false, 10, 7, false, 20);
    assert_eq!(p.mode.name(), "OfdmRate6Mbps");
    assert_eq!(p.power_level, 10);
    assert_eq!(p.retry_limit, 7);
    // RTS queries read nothing adaptive and leave the record untouched.
    assert!(!state(&mgr).is_initialized());

    fail(&mut mgr, 2);
    let p = mgr.rts_tx_parameters(STA, true, 10, 7, false, 80);
    assert_eq!(p.mode.name(), "DsssRate1Mbps");
    assert_eq!(p.power_level, 10);
    assert_eq!(p.channel_width, 20);
}

#[test]
fn test_low_latency() {
    let mgr = manager(MparfConfig::default());
    assert!(mgr.is_low_latency());
}

#[test]
fn test_rate_set_shrinks_after_association() {
    let peers = RateTable::new(WifiMode::ofdm_20mhz()).unwrap();
    let mut mgr = manager_with(MparfConfig::default(), peers, 0, 3);
    assert_eq!(mgr.data_tx_parameters(STA, 20, 7, false).mode.name(), "OfdmRate54Mbps");
    assert_eq!(state(&mgr).rate_index(), 7);

    // Reassociation with a DSSS-only peer; the record keeps its snapshot.
    mgr.peers_mut().set_peer(STA, WifiMode::dsss()).unwrap();
    assert_eq!(mgr.data_tx_parameters(STA, 20, 7, false).mode.name(), "DsssRate11Mbps");

    ok(&mut mgr, 5);
    fail(&mut mgr, 10);
    assert_eq!(state(&mgr).rate_index(), 2);
    assert_eq!(mgr.data_tx_parameters(STA, 20, 7, false).mode.name(), "DsssRate5_5Mbps");
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "traffic reported before setup()")]
fn test_traffic_before_setup_panics_in_debug() {
    let peers = RateTable::new(WifiMode::dsss()).unwrap();
    let mut mgr = MparfManager::with_observer(MparfConfig::default(), peers, NoopObserver);
    mgr.report_data_failed(STA);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "traffic reported before setup()")]
fn test_data_query_before_setup_panics_in_debug() {
    let peers = RateTable::new(WifiMode::dsss()).unwrap();
    let mut mgr = MparfManager::new(MparfConfig::default(), peers);
    mgr.data_tx_parameters(STA, 20, 7, false);
}

#[test]
fn test_setup_errors() {
    let mut mgr = MparfManager::with_observer(
        MparfConfig::default(),
        RateTable::new(WifiMode::dsss()).unwrap(),
        NoopObserver,
    );
    assert!(matches!(
        mgr.setup(10, 2),
        Err(Error::InvalidPowerRange { min: 10, max: 2 })
    ));
    mgr.setup(0, 3).unwrap();
    // Re-running setup is fine until a station carries adapted state.
    mgr.setup(1, 4).unwrap();
    assert_eq!(mgr.power_range().max(), 4);

    mgr.report_data_ok(STA, LinkQuality::default());
    assert!(matches!(mgr.setup(0, 3), Err(Error::SetupAfterTraffic)));
    assert_eq!(mgr.station(&STA).unwrap().power_level(), 4);
}

#[test]
fn test_as_trait_object() {
    let mut alg: Box<dyn RateControlAlgorithm> = Box::new(MparfManager::with_observer(
        MparfConfig::default(),
        RateTable::new(WifiMode::dsss()).unwrap(),
        NoopObserver,
    ));
    alg.setup(0, 3).unwrap();
    alg.create_station(STA);
    alg.report_data_failed(STA);
    alg.report_data_failed(STA);
    let p = alg.data_tx_parameters(STA, 20, 7, false);
    assert_eq!(p.mode.name(), "DsssRate5_5Mbps");
}

/// Drive random outcome sequences and check the state invariants after
/// every event.
#[test]
fn test_random_sequences_keep_invariants() {
    let configs = [
        (MparfConfig::default(), 0, 3),
        (MparfConfig::aggressive(), 0, 17),
        (MparfConfig::default().with_success_threshold(0), 2, 2),
        (MparfConfig::default().with_attempt_threshold(0).with_power_step(5), 1, 20),
        (MparfConfig::default().with_success_threshold(1).with_power_step(3), 0, 7),
    ];
    let rate_sets = [WifiMode::dsss(), WifiMode::ofdm_20mhz(), vec![WifiMode::new("Only", 1)]];

    let mut rng = StdRng::seed_from_u64(0x6d70_6172_66);
    for (config, min, max) in configs {
        for modes in &rate_sets {
            let mut mgr = manager_with(config, RateTable::new(modes.clone()).unwrap(), min, max);
            let p_success = rng.gen_range(0.2..0.95);

            for _ in 0..2_000 {
                let before = state(&mgr).clone();
                mgr.observer_mut().drain();

                if rng.gen_bool(p_success) {
                    mgr.report_data_ok(STA, LinkQuality::default());
                    let st = state(&mgr);
                    assert_eq!(st.fail_count(), 0);
                    assert_eq!(st.retry_count(), 0);
                    if st.using_recovery_rate() || st.using_recovery_power() {
                        assert_eq!(st.attempt_count(), 0);
                        assert_eq!(st.success_count(), 0);
                    }
                } else {
                    mgr.report_data_failed(STA);
                    let st = state(&mgr);
                    assert_eq!(st.success_count(), 0);
                    assert!(!st.using_recovery_rate());
                    assert!(!st.using_recovery_power());

                    if before.is_initialized() && before.sub_state() == SubState::Normal {
                        let changes = mgr.observer().events().len();
                        assert!(changes <= 1);
                        if st.retry_count() % 2 == 1 {
                            assert_eq!(changes, 0);
                        }
                    }
                }

                let st = state(&mgr);
                assert!(st.rate_index() < st.supported_rate_count());
                assert!(st.power_level() >= min && st.power_level() <= max);
                assert!(!(st.using_recovery_rate() && st.using_recovery_power()));
            }
        }
    }
}
