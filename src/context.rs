//! Explicit sweep context: the collaborators every component needs, passed
//! down instead of reached through globals.

use crate::algs::communicator::{CommTag, Communicator, SweepCommTags};
use crate::config::SweepConfig;
use crate::mesh::grid::LocalGrid;
use crate::quadrature::AngularQuadrature;
use crate::sweep_error::SweepError;
use log::Level;
use std::fmt;

/// Default `log` target of the crate.
pub const LOG_TARGET: &str = "transport_sweep";

/// Rank-tagged logging handle.
///
/// Records go through the `log` facade under a configurable target, prefixed
/// with the rank. The library never installs a logger.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SweepLog {
    target: &'static str,
    rank: usize,
}

impl SweepLog {
    pub fn new(target: &'static str, rank: usize) -> Self {
        Self { target, rank }
    }

    #[inline]
    pub fn target(&self) -> &'static str {
        self.target
    }

    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        log::log_enabled!(target: self.target, level)
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(target: self.target, level, "[rank {}] {}", self.rank, args);
    }

    #[inline]
    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Trace, args);
    }

    #[inline]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    #[inline]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    #[inline]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }
}

/// Grid, quadrature, communicator, configuration and logger of one rank.
pub struct SweepContext<'a, C: Communicator> {
    pub grid: &'a LocalGrid,
    pub quadrature: &'a AngularQuadrature,
    pub comm: &'a C,
    pub num_groups: usize,
    pub config: SweepConfig,
    pub log: SweepLog,
}

impl<'a, C: Communicator> SweepContext<'a, C> {
    /// Validate `config` and bind the collaborators.
    pub fn new(
        grid: &'a LocalGrid,
        quadrature: &'a AngularQuadrature,
        comm: &'a C,
        num_groups: usize,
        config: SweepConfig,
    ) -> Result<Self, SweepError> {
        config.validate()?;
        if num_groups == 0 {
            return Err(SweepError::InvalidConfig("num_groups must be at least 1".into()));
        }
        if grid.rank() != comm.rank() {
            return Err(SweepError::InvalidConfig(format!(
                "grid belongs to rank {} but the communicator is rank {}",
                grid.rank(),
                comm.rank()
            )));
        }
        Ok(Self {
            grid,
            quadrature,
            comm,
            num_groups,
            config,
            log: SweepLog::new(LOG_TARGET, comm.rank()),
        })
    }

    /// Replace the logger (e.g. to route records to another target).
    pub fn with_log(mut self, log: SweepLog) -> Self {
        self.log = log;
        self
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Message tags derived from `config.tag_base`.
    #[inline]
    pub fn tags(&self) -> SweepCommTags {
        SweepCommTags::from_base(CommTag::new(self.config.tag_base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::mesh::structured::slab_1d;

    #[test]
    fn rank_mismatch_rejected() {
        let grid = slab_1d(2, 1.0, 1, |_| 1).unwrap();
        let q = AngularQuadrature::s2_octants();
        let err = SweepContext::new(&grid, &q, &NoComm, 1, SweepConfig::default());
        assert!(matches!(err, Err(SweepError::InvalidConfig(_))));
    }

    #[test]
    fn tags_follow_config() {
        let grid = slab_1d(2, 1.0, 0, |_| 0).unwrap();
        let q = AngularQuadrature::s2_octants();
        let cfg = SweepConfig {
            tag_base: 0x100,
            ..Default::default()
        };
        let ctx = SweepContext::new(&grid, &q, &NoComm, 2, cfg).unwrap();
        assert_eq!(ctx.tags().angle_sets.as_u16(), 0x103);
        assert_eq!(ctx.log.target(), LOG_TARGET);
    }
}
