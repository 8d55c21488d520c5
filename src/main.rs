use std::thread;
use std::time::Duration;

use ferry_sim::{Grid, Simulation, SimulationConfig};

fn main() {
    let config = SimulationConfig {
        max_vehicles: 8,
        spawn_interval: Duration::from_millis(500),
        ..Default::default()
    };
    let mut sim = match Simulation::setup(Grid::demo(), config) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("Invalid simulation: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = sim.start() {
        eprintln!("Failed to start: {err}");
        std::process::exit(1);
    }

    println!("Simulating...");
    for _ in 0..30 {
        thread::sleep(Duration::from_secs(1));
        let stats = sim.stats();
        let ferries = sim
            .ferries()
            .iter()
            .map(|ferry| format!("{:?} {}/{}", ferry.trip, ferry.cargo.len(), ferry.capacity))
            .collect::<Vec<_>>();
        println!(
            "{} vehicles live, {} spawned, {} despawned, {} crossings | ferries: {}",
            sim.vehicle_count(),
            stats.spawned,
            stats.despawned,
            stats.crossings,
            ferries.join(", ")
        );
    }
    sim.stop();
}
