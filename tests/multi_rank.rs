mod util;

use std::collections::BTreeMap;
use transport_sweep::mesh::structured::quad_grid_2d;
use transport_sweep::prelude::*;
use util::*;

type Flux = BTreeMap<(u64, usize, usize, usize), f64>;

const NX: usize = 4;
const NY: usize = 4;
const GROUPS: usize = 2;

fn config(max_active: usize) -> SweepConfig {
    SweepConfig {
        num_group_subsets: 2,
        max_active_angle_sets: max_active,
        ..SweepConfig::default()
    }
}

fn sweep_rank<C: Communicator>(comm: &C, owner: impl Fn(u64) -> usize, config: SweepConfig) -> Flux {
    let grid = quad_grid_2d(NX, NY, 1.0, 1.0, comm.rank(), owner).unwrap();
    let q = AngularQuadrature::s2_octants();
    let ctx = SweepContext::new(&grid, &q, comm, GROUPS, config).unwrap();
    let mut sched = SweepScheduler::from_quadrature(ctx).unwrap();
    let mut bnd = BoundarySet::new(GROUPS);
    bnd.setup(&grid, &q).unwrap();
    let mut psi = PsiStore::new(&grid, q.num_angles(), GROUPS);
    let mut kernel = StepKernel::new(1.0, 0.5);
    sched.execute_sweep(&mut bnd, &mut psi, &mut kernel).unwrap();
    assert!(sched.angle_sets().iter().all(AngleSet::is_finished));
    psi_by_global(&grid, &psi)
}

fn serial() -> Flux {
    sweep_rank(&NoComm, |_| 0, config(0))
}

fn merged(parts: Vec<Flux>) -> Flux {
    parts.into_iter().flatten().collect()
}

#[test]
fn serial_sweep_covers_every_unknown() {
    let psi = serial();
    assert_eq!(psi.len(), NX * NY * 4 * 8 * GROUPS);
    // corner cell facing the inflow boundaries sees only vacuum
    assert_eq!(psi[&(0, 0, 0, 0)], 1.0);
    assert!(psi.values().all(|&v| v >= 1.0 && v < 2.0));
}

#[test]
fn four_ranks_match_one_rank() {
    let reference = serial();
    let parts = run_ranks(4, |comm| sweep_rank(comm, quadrant_owner(NX, NY), config(0)));
    assert_eq!(merged(parts), reference);
}

#[test]
fn throttled_four_ranks_match_one_rank() {
    let reference = serial();
    let parts = run_ranks(4, |comm| sweep_rank(comm, quadrant_owner(NX, NY), config(2)));
    assert_eq!(merged(parts), reference);
}

#[test]
fn striped_partition_matches_one_rank() {
    let reference = serial();
    let stripes = |gid: u64| (gid as usize / NX) % 3;
    let parts = run_ranks(3, |comm| sweep_rank(comm, stripes, config(1)));
    assert_eq!(merged(parts), reference);
}

#[test]
fn repeated_sweeps_are_identical() {
    let grid = quad_grid_2d(NX, NY, 1.0, 1.0, 0, |_| 0).unwrap();
    let q = AngularQuadrature::s2_octants();
    let ctx = SweepContext::new(&grid, &q, &NoComm, GROUPS, config(0)).unwrap();
    let mut sched = SweepScheduler::from_quadrature(ctx).unwrap();
    let mut bnd = BoundarySet::new(GROUPS);
    bnd.setup(&grid, &q).unwrap();
    let mut psi = PsiStore::new(&grid, q.num_angles(), GROUPS);

    let mut kernel = StepKernel::new(1.0, 0.5);
    let first_stats = sched.execute_sweep(&mut bnd, &mut psi, &mut kernel).unwrap();
    let first = psi.values().to_vec();
    let first_visits = std::mem::take(&mut kernel.visits);

    let second_stats = sched.execute_sweep(&mut bnd, &mut psi, &mut kernel).unwrap();
    assert_eq!(psi.values(), &first[..]);
    assert_eq!(kernel.visits, first_visits);
    assert_eq!(first_stats, second_stats);
    // 8 directions in 8 octants, 2 group subsets
    assert_eq!(sched.angle_sets().len(), 16);
    assert_eq!(first_stats.tasks_executed, 16 * NX * NY);
}

#[test]
fn angle_sets_partition_angle_group_pairs() {
    let grid = quad_grid_2d(NX, NY, 1.0, 1.0, 0, |_| 0).unwrap();
    let q = AngularQuadrature::s2_octants();
    for aggregation in [AngleAggregation::Single, AngleAggregation::Octant] {
        for (per_set, subsets) in [(0, 1), (1, 2), (3, 3)] {
            let cfg = SweepConfig {
                angle_aggregation: aggregation,
                max_angles_per_set: per_set,
                num_group_subsets: subsets,
                ..SweepConfig::default()
            };
            let ctx = SweepContext::new(&grid, &q, &NoComm, 3, cfg).unwrap();
            let sched = SweepScheduler::from_quadrature(ctx).unwrap();
            let mut seen = vec![0usize; q.num_angles() * 3];
            for (i, set) in sched.angle_sets().iter().enumerate() {
                assert_eq!(set.id(), i);
                for &n in set.angles() {
                    for g in set.groups() {
                        seen[n * 3 + g] += 1;
                    }
                }
            }
            assert!(seen.iter().all(|&c| c == 1), "{aggregation:?} {per_set} {subsets}: {seen:?}");
        }
    }
}

#[test]
fn ordering_report_lists_stages() {
    let grid = quad_grid_2d(2, 2, 1.0, 1.0, 0, |_| 0).unwrap();
    let q = AngularQuadrature::s2_octants();
    let ctx = SweepContext::new(&grid, &q, &NoComm, 1, SweepConfig::default()).unwrap();
    let sched = SweepScheduler::from_quadrature(ctx).unwrap();
    let report = sched.ordering_report();
    let text = report.to_string();
    assert!(text.contains("rank 0"));
    assert!(text.contains("stage 0"));
    // +x+y: the corner cell first, the opposite corner last
    assert_eq!(report.stages(0).unwrap(), &[vec![0u64], vec![1, 2], vec![3]]);
}
