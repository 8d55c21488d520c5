//! End-to-end runs of the built-in crossing with fast ticks.

use std::thread;
use std::time::{Duration, Instant};

use ferry_sim::{
    AdmissionDirection, DockConfig, DockLifecycle, DockSide, Grid, Interval, Simulation,
    SimulationConfig, TripState,
};

fn fast_config() -> SimulationConfig {
    SimulationConfig {
        max_vehicles: 6,
        spawn_interval: Duration::from_millis(20),
        left_spawn_probability: 0.5,
        vehicle_speed: Interval::exactly(1.0),
        ferry_capacity: Interval::new(1, 3),
        ferry_loading_time: Interval::new(Duration::from_millis(50), Duration::from_millis(100)),
        ferry_speed: 200.0,
        docks: [
            DockConfig {
                entering_capacity: 3,
                exiting_capacity: 3,
                initial_ferries: 1,
            },
            DockConfig {
                entering_capacity: 3,
                exiting_capacity: 3,
                initial_ferries: 0,
            },
        ],
        tick: Duration::from_millis(2),
        vehicle_step: Duration::from_millis(5),
    }
}

/// Polls `done` until it holds or `timeout` passes, checking `invariant` on every poll.
fn wait_for(
    sim: &Simulation,
    timeout: Duration,
    mut invariant: impl FnMut(&Simulation),
    done: impl Fn(&Simulation) -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        invariant(sim);
        if done(sim) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn check_invariants(sim: &Simulation) {
    for side in DockSide::ALL {
        let dock = sim.dock(side);
        for direction in [AdmissionDirection::Entering, AdmissionDirection::Exiting] {
            assert!(dock.occupancy(direction) <= dock.capacity(direction));
        }
    }
    for ferry in sim.ferries() {
        assert!(ferry.cargo.len() <= ferry.capacity);
        if ferry.trip == TripState::Traveling {
            assert!(!ferry.cargo.is_empty(), "{:?} left empty", ferry.id);
        }
    }
    assert!(sim.vehicle_count() <= sim.config().max_vehicles);
}

/// Checks that every vehicle off the ferries stands alone on its own cell.
///
/// Only meaningful while nothing moves; live snapshots are taken one vehicle
/// at a time.
fn check_settled_cells(sim: &Simulation) {
    let mut on_road = sim
        .vehicles()
        .into_iter()
        .filter(|vehicle| vehicle.on_ferry.is_none())
        .map(|vehicle| (vehicle.cell, vehicle.id))
        .collect::<Vec<_>>();
    on_road.sort_by_key(|(cell, _)| (cell.y, cell.x));
    for pair in on_road.windows(2) {
        assert_ne!(pair[0].0, pair[1].0, "two vehicles share a cell");
    }
    let mut occupied = sim.grid().occupied();
    occupied.sort_by_key(|(cell, _)| (cell.y, cell.x));
    assert_eq!(on_road, occupied);
}

#[test]
fn vehicles_cross_and_despawn() {
    // A high cap keeps both banks supplied, so the ferry never waits forever.
    let mut config = fast_config();
    config.max_vehicles = 30;
    let mut sim = Simulation::setup(Grid::demo(), config).unwrap();
    sim.start().unwrap();

    let delivered = wait_for(&sim, Duration::from_secs(30), check_invariants, |sim| {
        sim.stats().despawned >= 3
    });
    assert!(delivered, "stats after timeout: {:?}", sim.stats());
    let stats = sim.stats();
    assert!(stats.crossings >= 1);
    assert!(stats.spawned >= stats.despawned);
    sim.stop();
}

#[test]
fn a_full_ferry_leaves_the_rest_queued() {
    let mut config = fast_config();
    config.max_vehicles = 5;
    config.spawn_interval = Duration::from_secs(3600);
    config.left_spawn_probability = 1.0;
    config.ferry_capacity = Interval::exactly(3);
    config.ferry_loading_time = Interval::exactly(Duration::from_secs(3));
    config.docks[0].entering_capacity = 5;
    let mut sim = Simulation::setup(Grid::demo(), config).unwrap();
    sim.start().unwrap();

    let spawned = wait_for(&sim, Duration::from_secs(10), check_invariants, |sim| {
        sim.spawn_vehicle(DockSide::Left);
        sim.vehicle_count() == 5
    });
    assert!(spawned);

    let delivered = wait_for(&sim, Duration::from_secs(20), check_invariants, |sim| {
        sim.stats().despawned == 3
    });
    assert!(delivered, "stats after timeout: {:?}", sim.stats());

    let settled = wait_for(&sim, Duration::from_secs(5), check_invariants, |sim| {
        let waiting = sim
            .vehicles()
            .iter()
            .filter(|vehicle| vehicle.lifecycle == DockLifecycle::AwaitingOnDock)
            .count();
        waiting == 2
            && sim
                .dock(DockSide::Left)
                .occupancy(AdmissionDirection::Entering)
                == 2
    });
    assert!(settled);
    check_settled_cells(&sim);
    assert_eq!(sim.vehicle_count(), 2);
    assert_eq!(sim.stats().crossings, 1);
    sim.stop();
}

#[test]
fn berth_is_granted_in_arrival_order() {
    let mut config = fast_config();
    config.left_spawn_probability = 1.0;
    config.docks[0].initial_ferries = 2;
    let mut sim = Simulation::setup(Grid::demo(), config).unwrap();

    let dock = sim.dock(DockSide::Left);
    let first = dock.berth_occupant().unwrap();
    let second = dock.queued_ferries()[0];
    assert_eq!(dock.ferry_queue_position(second), Some(0));

    sim.start().unwrap();
    let mut occupants = vec![first];
    let start = Instant::now();
    while occupants.len() < 2 && start.elapsed() < Duration::from_secs(20) {
        check_invariants(&sim);
        let occupant = sim.dock(DockSide::Left).berth_occupant();
        if let Some(id) = occupant.filter(|id| occupants.last() != Some(id)) {
            occupants.push(id);
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert!(occupants.len() >= 2, "berth never changed hands");
    assert_eq!(occupants[..2], [first, second]);
    sim.stop();
}

#[test]
fn arriving_ferry_queues_until_the_berth_is_free() {
    let mut config = fast_config();
    config.spawn_interval = Duration::from_secs(3600);
    config.left_spawn_probability = 1.0;
    config.ferry_capacity = Interval::exactly(1);
    config.ferry_loading_time = Interval::exactly(Duration::from_millis(300));
    config.docks[1].initial_ferries = 1;
    let mut sim = Simulation::setup(Grid::demo(), config).unwrap();
    let left = sim.dock(DockSide::Left).berth_occupant().unwrap();
    let right = sim.dock(DockSide::Right).berth_occupant().unwrap();

    // The only vehicle spawns on the left, so the right ferry keeps loading
    // and holds its berth while the left one crosses over.
    sim.start().unwrap();
    let queued = wait_for(&sim, Duration::from_secs(20), check_invariants, |sim| {
        assert_eq!(sim.dock(DockSide::Right).berth_occupant(), Some(right));
        sim.ferries()
            .iter()
            .any(|ferry| ferry.id == left && ferry.trip == TripState::Queueing)
    });
    assert!(queued, "stats after timeout: {:?}", sim.stats());
    let dock = sim.dock(DockSide::Right);
    assert_eq!(dock.queued_ferries(), vec![left]);
    assert_eq!(dock.ferry_queue_position(left), Some(0));
    let snapshot = sim.ferries().into_iter().find(|ferry| ferry.id == left).unwrap();
    assert_eq!(snapshot.queue_position, Some(0));
    assert_eq!(snapshot.dock, DockSide::Right);
    assert_eq!(snapshot.cargo.len(), 1);

    // A passenger for the right ferry lets it depart and free the berth.
    let spawned = wait_for(&sim, Duration::from_secs(5), check_invariants, |sim| {
        sim.spawn_vehicle(DockSide::Right).is_some()
    });
    assert!(spawned);
    let handed_over = wait_for(&sim, Duration::from_secs(20), check_invariants, |sim| {
        let occupant = sim.dock(DockSide::Right).berth_occupant();
        if occupant == Some(left) {
            return true;
        }
        let ferries = sim.ferries();
        let waiting = ferries.iter().find(|ferry| ferry.id == left).unwrap();
        assert!(occupant.is_none() || occupant == Some(right));
        if occupant == Some(right) {
            assert_eq!(waiting.trip, TripState::Queueing);
        }
        false
    });
    assert!(handed_over, "stats after timeout: {:?}", sim.stats());
    assert!(sim.dock(DockSide::Right).queued_ferries().is_empty());
    sim.stop();
}

#[test]
fn stop_is_prompt_with_a_tiny_loading_budget() {
    let mut config = fast_config();
    config.max_vehicles = 1;
    config.spawn_interval = Duration::from_secs(3600);
    config.ferry_loading_time = Interval::exactly(Duration::from_millis(1));
    config.docks[1].initial_ferries = 1;
    let mut sim = Simulation::setup(Grid::demo(), config).unwrap();
    sim.start().unwrap();
    thread::sleep(Duration::from_millis(200));

    // Every empty restart waits at least one tick per ferry.
    assert!(sim.stats().loading_restarts < 1000, "{:?}", sim.stats());

    let (done, stopped) = crossbeam_channel::bounded(1);
    let start = Instant::now();
    thread::spawn(move || {
        sim.stop();
        done.send(()).unwrap();
    });
    assert!(stopped.recv_timeout(Duration::from_secs(5)).is_ok());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn stop_is_prompt_and_restartable() {
    let mut sim = Simulation::setup(Grid::demo(), fast_config()).unwrap();
    sim.start().unwrap();
    thread::sleep(Duration::from_millis(300));
    assert!(sim.stats().spawned > 0);

    let start = Instant::now();
    sim.stop();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(!sim.is_running());
    assert_eq!(sim.vehicle_count(), 0);
    assert!(sim.ferries().is_empty());
    assert!(sim.grid().occupied().is_empty());
    for side in DockSide::ALL {
        let dock = sim.dock(side);
        assert_eq!(dock.occupancy(AdmissionDirection::Entering), 0);
        assert_eq!(dock.occupancy(AdmissionDirection::Exiting), 0);
        assert_eq!(dock.lane_vehicle(), None);
    }

    sim.start().unwrap();
    assert!(sim.is_running());
    assert_eq!(sim.ferries().len(), 1);
    sim.stop();
}
