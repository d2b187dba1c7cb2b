//! Boundary flux providers.
//!
//! A boundary is a closed sum type, [`BoundaryKind`], wrapped with its id
//! and group count in [`SweepBoundary`]. A [`BoundarySet`] maps boundary ids
//! to providers; faces whose boundary id is absent from the set see vacuum.
//!
//! Incoming values for one face node and one direction are returned for all
//! groups at once (`num_groups` values). Per-node tables store
//! `num_angles * num_groups` values, angle-major.
//!
//! # Lifecycle
//! 1. build the set and [`BoundarySet::setup`] it once per grid/quadrature,
//! 2. the scheduler calls [`BoundarySet::begin_sweep`] at every sweep start,
//! 3. angle sets read with [`BoundarySet::psi_incoming`] and write reflected
//!    flux with [`BoundarySet::psi_outgoing_mut`].

pub mod anisotropic;
pub mod arbitrary;
pub mod isotropic;
pub mod reflecting;

pub use anisotropic::AnisotropicBoundary;
pub use arbitrary::{ArbitraryBoundary, BoundaryFunction, BoundaryQuery};
pub use isotropic::IsotropicBoundary;
pub use reflecting::ReflectingBoundary;

use crate::mesh::grid::LocalGrid;
use crate::mesh::vector::Vec3;
use crate::quadrature::AngularQuadrature;
use crate::sweep_error::SweepError;
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::ops::Range;

/// Per-(cell, face, node) boundary values with O(1) lookup.
///
/// Keyed by cell local index and face index; every node holds `num_values`
/// values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceNodeTable {
    num_values: usize,
    data: HashMap<(usize, usize), Vec<Vec<f64>>>,
}

impl FaceNodeTable {
    pub fn new(num_values: usize) -> Self {
        Self {
            num_values,
            data: HashMap::new(),
        }
    }

    #[inline]
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Insert the values of every node of `(cell, face)`.
    pub fn insert(&mut self, cell: usize, face: usize, nodes: Vec<Vec<f64>>) -> Result<(), SweepError> {
        if let Some(bad) = nodes.iter().find(|v| v.len() != self.num_values) {
            return Err(SweepError::IndexOutOfRange {
                what: "boundary node values",
                index: bad.len(),
                len: self.num_values,
            });
        }
        self.data.insert((cell, face), nodes);
        Ok(())
    }

    #[inline]
    pub fn get(&self, cell: usize, face: usize, node: usize) -> Option<&[f64]> {
        self.data.get(&(cell, face)).and_then(|n| n.get(node)).map(Vec::as_slice)
    }

    #[inline]
    pub fn get_mut(&mut self, cell: usize, face: usize, node: usize) -> Option<&mut [f64]> {
        self.data
            .get_mut(&(cell, face))
            .and_then(|n| n.get_mut(node))
            .map(Vec::as_mut_slice)
    }

    /// Number of faces stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn fill(&mut self, value: f64) {
        for nodes in self.data.values_mut() {
            for v in nodes {
                v.fill(value);
            }
        }
    }
}

/// Slice of the `angle`-th block of `num_groups` values in `values`.
pub(crate) fn angle_block(
    values: &[f64],
    angle: usize,
    num_groups: usize,
) -> Result<&[f64], SweepError> {
    values
        .get(angle * num_groups..(angle + 1) * num_groups)
        .ok_or(SweepError::IndexOutOfRange {
            what: "boundary angle",
            index: angle,
            len: values.len() / num_groups.max(1),
        })
}

/// Mutable variant of [`angle_block`].
pub(crate) fn angle_block_mut(
    values: &mut [f64],
    angle: usize,
    num_groups: usize,
) -> Result<&mut [f64], SweepError> {
    let len = values.len() / num_groups.max(1);
    values
        .get_mut(angle * num_groups..(angle + 1) * num_groups)
        .ok_or(SweepError::IndexOutOfRange {
            what: "boundary angle",
            index: angle,
            len,
        })
}

/// The boundary condition types.
#[derive(Debug)]
pub enum BoundaryKind {
    Vacuum,
    IncidentIsotropic(IsotropicBoundary),
    IncidentAnisotropicHeterogeneous(AnisotropicBoundary),
    Reflecting(ReflectingBoundary),
    Arbitrary(ArbitraryBoundary),
}

impl BoundaryKind {
    pub fn name(&self) -> &'static str {
        match self {
            BoundaryKind::Vacuum => "vacuum",
            BoundaryKind::IncidentIsotropic(_) => "incident isotropic",
            BoundaryKind::IncidentAnisotropicHeterogeneous(_) => "incident anisotropic heterogeneous",
            BoundaryKind::Reflecting(_) => "reflecting",
            BoundaryKind::Arbitrary(_) => "arbitrary",
        }
    }
}

/// One boundary provider.
#[derive(Debug)]
pub struct SweepBoundary {
    boundary_id: u64,
    num_groups: usize,
    evaluation_time: f64,
    zeros: Vec<f64>,
    kind: BoundaryKind,
}

impl SweepBoundary {
    fn with_kind(boundary_id: u64, num_groups: usize, kind: BoundaryKind) -> Self {
        Self {
            boundary_id,
            num_groups,
            evaluation_time: 0.0,
            zeros: vec![0.0; num_groups],
            kind,
        }
    }

    pub fn vacuum(boundary_id: u64, num_groups: usize) -> Self {
        Self::with_kind(boundary_id, num_groups, BoundaryKind::Vacuum)
    }

    /// Same incoming value for every angle and face; one value per group.
    pub fn isotropic(boundary_id: u64, group_values: Vec<f64>) -> Self {
        let g = group_values.len();
        Self::with_kind(
            boundary_id,
            g,
            BoundaryKind::IncidentIsotropic(IsotropicBoundary::new(group_values)),
        )
    }

    /// Precomputed incoming values per face node.
    pub fn anisotropic(boundary_id: u64, num_groups: usize, table: FaceNodeTable) -> Self {
        Self::with_kind(
            boundary_id,
            num_groups,
            BoundaryKind::IncidentAnisotropicHeterogeneous(AnisotropicBoundary::new(table)),
        )
    }

    /// Specular reflection about the plane with outward `normal`.
    pub fn reflecting(boundary_id: u64, num_groups: usize, normal: Vec3) -> Self {
        Self::with_kind(
            boundary_id,
            num_groups,
            BoundaryKind::Reflecting(ReflectingBoundary::new(normal)),
        )
    }

    /// Incoming values computed by `function` during setup.
    pub fn arbitrary<F>(boundary_id: u64, num_groups: usize, function: F) -> Self
    where
        F: BoundaryFunction + 'static,
    {
        Self::with_kind(
            boundary_id,
            num_groups,
            BoundaryKind::Arbitrary(ArbitraryBoundary::new(Box::new(function))),
        )
    }

    #[inline]
    pub fn boundary_id(&self) -> u64 {
        self.boundary_id
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    #[inline]
    pub fn evaluation_time(&self) -> f64 {
        self.evaluation_time
    }

    /// Time handed to an arbitrary boundary function; takes effect at the next `setup`.
    pub fn set_evaluation_time(&mut self, time: f64) {
        self.evaluation_time = time;
    }

    #[inline]
    pub fn kind(&self) -> &BoundaryKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut BoundaryKind {
        &mut self.kind
    }

    /// True when the provider keeps outgoing flux (reflecting).
    #[inline]
    pub fn stores_outgoing(&self) -> bool {
        matches!(self.kind, BoundaryKind::Reflecting(_))
    }

    /// Prepare the provider for `grid` and `quadrature`.
    pub fn setup(&mut self, grid: &LocalGrid, quadrature: &AngularQuadrature) -> Result<(), SweepError> {
        let (id, g, t) = (self.boundary_id, self.num_groups, self.evaluation_time);
        match &mut self.kind {
            BoundaryKind::Vacuum | BoundaryKind::IncidentIsotropic(_) => Ok(()),
            BoundaryKind::IncidentAnisotropicHeterogeneous(b) => b.setup(id, g, quadrature),
            BoundaryKind::Reflecting(b) => b.setup(id, g, grid, quadrature),
            BoundaryKind::Arbitrary(b) => b.setup(id, g, t, grid, quadrature),
        }
    }

    /// Incoming flux for all groups at `(cell, face, node)` in quadrature
    /// direction `angle`.
    pub fn psi_incoming(
        &self,
        cell: usize,
        face: usize,
        node: usize,
        angle: usize,
    ) -> Result<&[f64], SweepError> {
        let (id, g) = (self.boundary_id, self.num_groups);
        match &self.kind {
            BoundaryKind::Vacuum => Ok(&self.zeros),
            BoundaryKind::IncidentIsotropic(b) => Ok(b.values()),
            BoundaryKind::IncidentAnisotropicHeterogeneous(b) => {
                b.psi_incoming(id, g, cell, face, node, angle)
            }
            BoundaryKind::Reflecting(b) => b.psi_incoming(id, g, cell, face, node, angle),
            BoundaryKind::Arbitrary(b) => b.psi_incoming(id, g, cell, face, node, angle),
        }
    }

    /// Storage for outgoing flux at `(cell, face, node)` in direction `angle`.
    pub fn psi_outgoing_mut(
        &mut self,
        cell: usize,
        face: usize,
        node: usize,
        angle: usize,
    ) -> Result<&mut [f64], SweepError> {
        let (id, g) = (self.boundary_id, self.num_groups);
        match &mut self.kind {
            BoundaryKind::Reflecting(b) => b.psi_outgoing_mut(id, g, cell, face, node, angle),
            other => Err(SweepError::NoOutgoingStorage {
                boundary_id: id,
                kind: other.name(),
            }),
        }
    }
}

/// Boundary providers keyed by boundary id.
#[derive(Debug)]
pub struct BoundarySet {
    num_groups: usize,
    zeros: Vec<f64>,
    boundaries: BTreeMap<u64, SweepBoundary>,
}

impl BoundarySet {
    pub fn new(num_groups: usize) -> Self {
        Self {
            num_groups,
            zeros: vec![0.0; num_groups],
            boundaries: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Add or replace the provider for its boundary id.
    pub fn insert(&mut self, boundary: SweepBoundary) -> Result<(), SweepError> {
        if boundary.num_groups != self.num_groups {
            return Err(SweepError::InvalidConfig(format!(
                "boundary {} has {} groups, the set has {}",
                boundary.boundary_id, boundary.num_groups, self.num_groups
            )));
        }
        self.boundaries.insert(boundary.boundary_id, boundary);
        Ok(())
    }

    /// Builder-style [`BoundarySet::insert`].
    pub fn with(mut self, boundary: SweepBoundary) -> Result<Self, SweepError> {
        self.insert(boundary)?;
        Ok(self)
    }

    #[inline]
    pub fn get(&self, boundary_id: u64) -> Option<&SweepBoundary> {
        self.boundaries.get(&boundary_id)
    }

    #[inline]
    pub fn get_mut(&mut self, boundary_id: u64) -> Option<&mut SweepBoundary> {
        self.boundaries.get_mut(&boundary_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SweepBoundary> {
        self.boundaries.values()
    }

    /// Set up every provider, then mark anti-parallel reflecting pairs as
    /// opposing.
    pub fn setup(&mut self, grid: &LocalGrid, quadrature: &AngularQuadrature) -> Result<(), SweepError> {
        for b in self.boundaries.values_mut() {
            b.setup(grid, quadrature)?;
        }
        let normals: Vec<(u64, Vec3)> = self
            .boundaries
            .values()
            .filter_map(|b| match &b.kind {
                BoundaryKind::Reflecting(r) => Some((b.boundary_id, r.normal())),
                _ => None,
            })
            .collect();
        for &(id, n) in &normals {
            let opposing = normals
                .iter()
                .any(|&(other, m)| other != id && n.dot(m) < -1.0 + 1.0e-8);
            if let Some(BoundaryKind::Reflecting(r)) = self.boundaries.get_mut(&id).map(|b| &mut b.kind) {
                r.set_opposing(opposing);
            }
        }
        Ok(())
    }

    pub fn set_evaluation_time(&mut self, time: f64) {
        for b in self.boundaries.values_mut() {
            b.set_evaluation_time(time);
        }
    }

    /// Reset per-sweep state: reflecting readiness flags and lagged values.
    pub fn begin_sweep(&mut self) {
        for b in self.boundaries.values_mut() {
            if let BoundaryKind::Reflecting(r) = &mut b.kind {
                r.begin_sweep();
            }
        }
    }

    /// Incoming flux on boundary `boundary_id`; vacuum when no provider is registered.
    pub fn psi_incoming(
        &self,
        boundary_id: u64,
        cell: usize,
        face: usize,
        node: usize,
        angle: usize,
    ) -> Result<&[f64], SweepError> {
        match self.boundaries.get(&boundary_id) {
            Some(b) => b.psi_incoming(cell, face, node, angle),
            None => Ok(&self.zeros),
        }
    }

    /// True when the provider for `boundary_id` keeps outgoing flux.
    pub fn stores_outgoing(&self, boundary_id: u64) -> bool {
        self.boundaries.get(&boundary_id).is_some_and(SweepBoundary::stores_outgoing)
    }

    pub fn psi_outgoing_mut(
        &mut self,
        boundary_id: u64,
        cell: usize,
        face: usize,
        node: usize,
        angle: usize,
    ) -> Result<&mut [f64], SweepError> {
        match self.boundaries.get_mut(&boundary_id) {
            Some(b) => b.psi_outgoing_mut(cell, face, node, angle),
            None => Err(SweepError::NoOutgoingStorage {
                boundary_id,
                kind: "vacuum",
            }),
        }
    }

    /// True when every reflecting boundary has the data `angles` x `groups` read.
    pub fn incoming_ready(&self, angles: &[usize], groups: &Range<usize>) -> bool {
        self.boundaries.values().all(|b| match &b.kind {
            BoundaryKind::Reflecting(r) => r.is_ready(angles, groups, self.num_groups),
            _ => true,
        })
    }

    /// Mirror directions `angles` read through non-opposing reflecting
    /// boundaries, sorted and deduplicated. Identical on every rank that
    /// registered the same boundaries.
    pub fn mirror_sources(&self, angles: &[usize]) -> Vec<usize> {
        let mut sources: Vec<usize> = self
            .boundaries
            .values()
            .filter_map(|b| match &b.kind {
                BoundaryKind::Reflecting(r) => Some(r),
                _ => None,
            })
            .flat_map(|r| r.mirror_sources(angles))
            .collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }

    /// Record that `angles` x `groups` finished on this rank.
    pub fn mark_finished(&mut self, angles: &[usize], groups: &Range<usize>) {
        let g = self.num_groups;
        for b in self.boundaries.values_mut() {
            if let BoundaryKind::Reflecting(r) = &mut b.kind {
                r.mark_finished(angles, groups, g);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::structured::{XMAX, XMIN, slab_1d};

    #[test]
    fn missing_id_is_vacuum() {
        let set = BoundarySet::new(3);
        assert_eq!(set.psi_incoming(99, 0, 0, 0, 5).unwrap(), &[0.0; 3]);
        assert!(!set.stores_outgoing(99));
    }

    #[test]
    fn group_count_must_match() {
        let mut set = BoundarySet::new(2);
        assert!(set.insert(SweepBoundary::isotropic(0, vec![1.0])).is_err());
        assert!(set.insert(SweepBoundary::isotropic(0, vec![1.0, 2.0])).is_ok());
    }

    #[test]
    fn opposing_reflectors_detected() {
        let grid = slab_1d(2, 2.0, 0, |_| 0).unwrap();
        let q = AngularQuadrature::s2_octants();
        let mut set = BoundarySet::new(1)
            .with(SweepBoundary::reflecting(XMIN, 1, Vec3::new(-1.0, 0.0, 0.0)))
            .unwrap()
            .with(SweepBoundary::reflecting(XMAX, 1, Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        set.setup(&grid, &q).unwrap();
        for id in [XMIN, XMAX] {
            match set.get(id).map(|b| b.kind()) {
                Some(BoundaryKind::Reflecting(r)) => assert!(r.is_opposing()),
                other => panic!("unexpected {other:?}"),
            }
        }
        // opposing boundaries never block
        assert!(set.incoming_ready(&[0, 1, 2, 3], &(0..1)));
    }

    #[test]
    fn outgoing_only_on_reflecting() {
        let mut b = SweepBoundary::vacuum(1, 1);
        assert!(matches!(
            b.psi_outgoing_mut(0, 0, 0, 0),
            Err(SweepError::NoOutgoingStorage { boundary_id: 1, .. })
        ));
    }
}
