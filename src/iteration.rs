//! Source iteration around the sweep.
//!
//! Each iteration runs one sweep, forms the scalar flux from the angular flux
//! and hands it back to the kernel to rebuild its scattering source. The
//! iteration stops when the largest relative change of the scalar flux over
//! all ranks falls below the tolerance. Running out of iterations is a
//! result, not an error.

use crate::algs::collective::all_reduce_max;
use crate::algs::communicator::Communicator;
use crate::sweep::boundary::BoundarySet;
use crate::sweep::fluds::PsiStore;
use crate::sweep::kernel::SweepKernel;
use crate::sweep::scheduler::SweepScheduler;
use crate::sweep_error::SweepError;

/// Kernels that take part in source iteration.
pub trait SourceUpdate {
    /// Rebuild the source from the new scalar flux, laid out `[node][group]`.
    fn update_source(&mut self, scalar_flux: &[f64]) -> Result<(), SweepError>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IterationOutcome {
    pub converged: bool,
    pub iterations: usize,
    /// Max relative scalar-flux change of the last iteration.
    pub change: f64,
}

/// Max over entries of `|new - old| / |new|` (absolute change where `new` is zero).
pub fn relative_change(new: &[f64], old: &[f64]) -> f64 {
    new.iter()
        .zip(old)
        .map(|(&n, &o)| {
            let d = (n - o).abs();
            if n != 0.0 { d / n.abs() } else { d }
        })
        .fold(0.0, f64::max)
}

/// Iterate sweeps until the scalar flux converges or the iteration limit is
/// reached. Tolerance and limit come from the scheduler's
/// [`SweepConfig::iteration`](crate::config::SweepConfig::iteration).
pub fn source_iterate<C, K>(
    scheduler: &mut SweepScheduler<'_, C>,
    boundaries: &mut BoundarySet,
    psi: &mut PsiStore,
    kernel: &mut K,
    weights: &[f64],
) -> Result<IterationOutcome, SweepError>
where
    C: Communicator,
    K: SweepKernel + SourceUpdate,
{
    let (comm, log, tag, config) = {
        let ctx = scheduler.context();
        (ctx.comm, ctx.log, ctx.tags().reduce, ctx.config.iteration.clone())
    };
    let mut old = vec![0.0; psi.num_nodes() * psi.num_groups()];
    let mut outcome = IterationOutcome {
        converged: false,
        iterations: 0,
        change: f64::INFINITY,
    };

    while outcome.iterations < config.max_iterations {
        scheduler.execute_sweep(boundaries, psi, kernel)?;
        let phi = psi.scalar_flux(weights)?;
        let change = all_reduce_max(comm, tag, relative_change(&phi, &old))?;
        kernel.update_source(&phi)?;
        outcome.iterations += 1;
        outcome.change = change;
        log.info(format_args!("iteration {}: change {:.3e}", outcome.iterations, change));
        old = phi;
        if change < config.tolerance {
            outcome.converged = true;
            break;
        }
    }
    if !outcome.converged {
        log.warn(format_args!(
            "source iteration did not converge in {} iteration(s); last change {:.3e}",
            outcome.iterations, outcome.change
        ));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_change_handles_zeros() {
        assert_eq!(relative_change(&[2.0, 0.0], &[1.0, 0.0]), 0.5);
        assert_eq!(relative_change(&[0.0], &[0.25]), 0.25);
        assert_eq!(relative_change(&[], &[]), 0.0);
    }
}
