// Conformal lattice sliding around a three-lane loop.
//
// usage: lattice_shift [config.toml]
//
// Builds the loop of the configured route, constructs a lattice ahead of the
// first road, keeps an ego point 50m into the window and shifts the window
// along with it. Set RUST_LOG=debug to follow the window maintenance.
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use road_lattice::utils::{colors, LatticePlot, PointStyle, RoadMap};
use road_lattice::{Lattice, LatticeConfig, LatticeResult, LoopRouter, NetworkPoint};

const ROAD_LENGTH: f64 = 30.0;
const LANES: u8 = 3;
const EGO_OFFSET: f64 = 50.0;
const STEPS: usize = 20;
const STEP_MOVEMENT: f64 = 7.5;

fn main() -> LatticeResult<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => LatticeConfig::load(Path::new(&path))?,
        None => LatticeConfig::default(),
    };

    let map = RoadMap::ring(&config.route.roads, ROAD_LENGTH, LANES)?;
    let first_road = config.route.roads[0];
    let router = Arc::new(LoopRouter::new(map.clone(), config.route.clone())?);

    let Some(start) = map.point(first_road, -2, 0.0) else {
        warn!("road {} has no lane -2", first_road);
        return Ok(());
    };
    let mut lattice = Lattice::with_settings(start, &config.lattice, router)?;
    info!(
        "lattice: {} nodes, range {:.1}m, resolution {:.1}m",
        lattice.len(),
        lattice.range(),
        lattice.resolution()
    );

    let mut carry = 0.0;
    for step in 0..STEPS {
        let shifted = lattice.shift(STEP_MOVEMENT + carry)?;
        carry += STEP_MOVEMENT - shifted;

        let entry = lattice.entry().point().clone();
        let ego = lattice.front(&entry, EGO_OFFSET)?;
        match ego {
            Some(ego) => info!(
                "step {:2}: shifted {:.1}m, entry on road {}, ego on road {} lane {}, {} nodes",
                step,
                shifted,
                entry.road_id(),
                ego.point().road_id(),
                ego.point().lane_id(),
                lattice.len()
            ),
            None => warn!("step {:2}: no node {:.1}m ahead of the entry", step, EGO_OFFSET),
        }
    }

    let mut plot = LatticePlot::new("Conformal lattice");
    plot.add_road_map(&map).add_lattice(&lattice);
    let entry = lattice.entry().point().clone();
    if let Some(ego) = lattice.front(&entry, EGO_OFFSET)? {
        plot.add_points(
            &[ego.point().location()],
            &PointStyle::new(colors::EGO).with_caption("Ego").with_size(2.0),
        );
    }

    let img_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("img");
    std::fs::create_dir_all(&img_dir)?;
    let path = img_dir.join("lattice_shift.png").display().to_string();
    match plot.save_png(&path, 1000, 1000) {
        Ok(()) => info!("plot saved to {}", path),
        Err(e) => warn!("{}", e),
    }
    Ok(())
}
