#![allow(dead_code)]
use std::collections::BTreeMap;
use transport_sweep::prelude::*;

/// Minimal upwind kernel: the cell value is `attenuation * mean(inflow) + source`
/// and every outgoing face node carries the cell value.
#[derive(Clone, Debug)]
pub struct StepKernel {
    pub source: f64,
    pub attenuation: f64,
    /// Global ids of executed cells, in execution order.
    pub visits: Vec<u64>,
}

impl StepKernel {
    pub fn new(source: f64, attenuation: f64) -> Self {
        Self {
            source,
            attenuation,
            visits: Vec::new(),
        }
    }
}

/// `mean(inflow)` of set-local angle `a` and group `g`.
pub fn mean_inflow(c: &CellSweep<'_>, a: usize, g: usize) -> f64 {
    let mut sum = 0.0;
    let mut count = 0;
    for (f, face) in c.cell().faces.iter().enumerate() {
        if c.orientation(f).is_incoming() {
            for k in 0..face.num_nodes() {
                sum += c.incoming_psi(f, k, a, g);
                count += 1;
            }
        }
    }
    if count > 0 { sum / count as f64 } else { 0.0 }
}

/// Write `value` to every node of the cell and every outgoing face node.
pub fn write_cell(c: &mut CellSweep<'_>, a: usize, g: usize, value: f64) {
    let nodes = c.cell().num_nodes();
    let faces: Vec<usize> = c.cell().faces.iter().map(Face::num_nodes).collect();
    for n in 0..nodes {
        c.set_psi(n, a, g, value);
    }
    for (f, &nn) in faces.iter().enumerate() {
        if c.orientation(f).is_outgoing() {
            for k in 0..nn {
                c.set_outgoing_psi(f, k, a, g, value);
            }
        }
    }
}

impl SweepKernel for StepKernel {
    fn sweep_cell(&mut self, c: &mut CellSweep<'_>) -> Result<(), SweepError> {
        for a in 0..c.num_angles() {
            for g in 0..c.num_groups() {
                let v = self.attenuation * mean_inflow(c, a, g) + self.source;
                write_cell(c, a, g, v);
            }
        }
        self.visits.push(c.cell().global_id);
        Ok(())
    }
}

/// Single direction quadrature.
pub fn one_direction(x: f64, y: f64, z: f64) -> AngularQuadrature {
    AngularQuadrature::from_directions(vec![Vec3::new(x, y, z)], vec![1.0]).unwrap()
}

/// Angular flux keyed by `(global cell, node, angle, group)`.
pub fn psi_by_global(grid: &LocalGrid, psi: &PsiStore) -> BTreeMap<(u64, usize, usize, usize), f64> {
    let mut out = BTreeMap::new();
    for cell in grid.cells() {
        for node in 0..cell.num_nodes() {
            for n in 0..psi.num_angles() {
                for g in 0..psi.num_groups() {
                    out.insert(
                        (cell.global_id, node, n, g),
                        psi.get(n, cell.local_id, node, g),
                    );
                }
            }
        }
    }
    out
}

/// Run `f(comm)` on one thread per rank of a fresh `LocalComm` world.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&LocalComm) -> T + Sync,
{
    let world = LocalComm::world(size);
    let f = &f;
    let out = std::thread::scope(|s| {
        let handles: Vec<_> = world.iter().map(|c| s.spawn(move || f(c))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    });
    assert_eq!(world[0].in_flight(), 0, "undelivered messages left in the mailbox");
    out
}

/// Owner of cell `gid` in an `nx`-wide quad grid split into 2x2 quadrants.
pub fn quadrant_owner(nx: usize, ny: usize) -> impl Fn(u64) -> usize + Copy {
    move |gid: u64| {
        let (i, j) = (gid as usize % nx, gid as usize / nx);
        usize::from(i >= nx / 2) + 2 * usize::from(j >= ny / 2)
    }
}
