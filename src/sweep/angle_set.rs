//! Angle set: the dynamic state of sweeping a group of directions over a
//! group range on one rank.
//!
//! An angle set shares its static [`Spds`] with the other group subsets of
//! the same direction group and owns everything that changes during a sweep:
//! dependency counters, completion flags, local face flux, inbound cross-rank
//! data and outstanding messages. The scheduler drives it with
//! [`AngleSet::advance`] until it reports [`AngleSetStatus::Finished`].
//!
//! Cross-rank messages use the angle set's own tag, so messages from one
//! upstream rank arrive in posting order. Each message holds the flux of
//! every face that upstream rank resolved during one execute pass.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{decode_flux, encode_flux};
use crate::context::SweepContext;
use crate::mesh::vector::Vec3;
use crate::quadrature::AngularQuadrature;
use crate::sweep::boundary::BoundarySet;
use crate::sweep::fluds::{Fluds, PsiStore};
use crate::sweep::kernel::{CellSweep, SweepKernel};
use crate::sweep::spds::{Downwind, FaceCrossing, Spds, Upwind};
use crate::sweep::status::{AngleSetStatus, PollSummary, next_status};
use crate::sweep_error::SweepError;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

/// Cumulative activity of one angle set over its lifetime.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AngleSetCounters {
    pub tasks_executed: usize,
    pub messages_sent: usize,
    pub messages_received: usize,
}

/// Inbound flux from one upstream rank.
struct Inbound<R> {
    /// Indexed like `Spds::incoming_remote()[rank]`.
    faces: Vec<Option<Vec<f64>>>,
    remaining: usize,
    recv: Option<R>,
}

pub struct AngleSet<C: Communicator> {
    id: usize,
    tag: CommTag,
    spds: Arc<Spds>,
    angles: Vec<usize>,
    omegas: Vec<Vec3>,
    groups: Range<usize>,
    status: AngleSetStatus,
    dependencies: Vec<usize>,
    completed: Vec<bool>,
    num_completed: usize,
    num_ready: usize,
    fluds: Fluds,
    inbound: BTreeMap<usize, Inbound<C::RecvHandle>>,
    pending_sends: Vec<C::SendHandle>,
    counters: AngleSetCounters,
}

impl<C: Communicator> AngleSet<C> {
    /// New angle set over `angles` x `groups`, in the reset state.
    pub fn new(
        id: usize,
        tag: CommTag,
        spds: Arc<Spds>,
        angles: Vec<usize>,
        quadrature: &AngularQuadrature,
        groups: Range<usize>,
    ) -> Self {
        let omegas = angles.iter().map(|&n| quadrature.omega(n)).collect();
        let fluds = Fluds::new(spds.num_slot_nodes(), angles.len(), groups.len());
        let mut set = Self {
            id,
            tag,
            spds,
            angles,
            omegas,
            groups,
            status: AngleSetStatus::NotFinished,
            dependencies: Vec::new(),
            completed: Vec::new(),
            num_completed: 0,
            num_ready: 0,
            fluds,
            inbound: BTreeMap::new(),
            pending_sends: Vec::new(),
            counters: AngleSetCounters::default(),
        };
        set.reset();
        set
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn tag(&self) -> CommTag {
        self.tag
    }

    #[inline]
    pub fn status(&self) -> AngleSetStatus {
        self.status
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.status == AngleSetStatus::Finished
    }

    /// Quadrature indices of the directions in this set.
    #[inline]
    pub fn angles(&self) -> &[usize] {
        &self.angles
    }

    #[inline]
    pub fn groups(&self) -> Range<usize> {
        self.groups.clone()
    }

    #[inline]
    pub fn spds(&self) -> &Arc<Spds> {
        &self.spds
    }

    #[inline]
    pub fn counters(&self) -> AngleSetCounters {
        self.counters
    }

    /// Remaining dependencies of task `id` in the current sweep.
    #[inline]
    pub fn remaining_dependencies(&self, id: usize) -> usize {
        self.dependencies[id]
    }

    #[inline]
    pub fn is_task_completed(&self, id: usize) -> bool {
        self.completed[id]
    }

    /// Restore the state of a sweep that has not started.
    pub fn reset(&mut self) {
        let graph = self.spds.task_graph();
        self.dependencies = graph.tasks().iter().map(|t| t.num_dependencies).collect();
        self.completed = vec![false; graph.num_tasks()];
        self.num_completed = 0;
        self.num_ready = self.dependencies.iter().filter(|&&d| d == 0).count();
        self.fluds.clear();
        self.inbound = self
            .spds
            .incoming_remote()
            .iter()
            .map(|(&peer, faces)| {
                (
                    peer,
                    Inbound {
                        faces: vec![None; faces.len()],
                        remaining: faces.len(),
                        recv: None,
                    },
                )
            })
            .collect();
        self.pending_sends.clear();
        self.status = AngleSetStatus::NotFinished;
    }

    /// Poll messages, then step the status machine as far as it goes without
    /// waiting.
    ///
    /// `admitted` is the scheduler's throttle decision: a set that is not
    /// admitted keeps receiving but does not execute.
    pub fn advance<K: SweepKernel + ?Sized>(
        &mut self,
        ctx: &SweepContext<'_, C>,
        boundaries: &mut BoundarySet,
        psi: &mut PsiStore,
        kernel: &mut K,
        admitted: bool,
    ) -> Result<AngleSetStatus, SweepError> {
        if self.is_finished() {
            return Ok(self.status);
        }
        self.poll_receives(ctx)?;
        loop {
            let summary = self.summary(boundaries, admitted);
            let next = next_status(self.status, &summary);
            let changed = next != self.status;
            if changed {
                ctx.log.trace(format_args!(
                    "angle set {}: {} -> {}",
                    self.id, self.status, next
                ));
            }
            self.status = next;
            match next {
                AngleSetStatus::Execute => self.execute(ctx, boundaries, psi, kernel)?,
                AngleSetStatus::Finished => {
                    if changed {
                        boundaries.mark_finished(&self.angles, &self.groups);
                    }
                    break;
                }
                AngleSetStatus::ReadyToExecute
                | AngleSetStatus::MessagesPending
                | AngleSetStatus::MessagesSent
                    if changed => {}
                _ => break,
            }
        }
        Ok(self.status)
    }

    fn summary(&mut self, boundaries: &BoundarySet, admitted: bool) -> PollSummary {
        self.pending_sends.retain_mut(|h| !h.test());
        PollSummary {
            all_tasks_done: self.num_completed == self.completed.len(),
            ready_tasks: self.num_ready > 0,
            boundaries_ready: boundaries.incoming_ready(&self.angles, &self.groups),
            admitted,
            sends_outstanding: !self.pending_sends.is_empty(),
            receives_outstanding: self.inbound.values().any(|i| i.remaining > 0),
        }
    }

    /// Drain every completed receive and resolve the dependencies it carries.
    fn poll_receives(&mut self, ctx: &SweepContext<'_, C>) -> Result<(), SweepError> {
        let me = ctx.rank();
        let tag = self.tag.as_u16();
        let stride = self.angles.len() * self.groups.len();
        let AngleSet {
            spds,
            inbound,
            dependencies,
            num_ready,
            counters,
            id,
            ..
        } = self;

        for (&peer, state) in inbound.iter_mut() {
            let faces = spds.incoming_remote().get(&peer).map(Vec::as_slice).unwrap_or(&[]);
            while state.remaining > 0 {
                let handle = state.recv.get_or_insert_with(|| ctx.comm.irecv(peer, tag));
                if !handle.test() {
                    break;
                }
                let Some(handle) = state.recv.take() else {
                    break;
                };
                let violation = |reason: String| SweepError::ProtocolViolation {
                    rank: me,
                    peer,
                    tag,
                    reason,
                };
                let bytes = handle
                    .wait()
                    .ok_or_else(|| violation("receive completed without a matching send".into()))?;
                let records = decode_flux(&bytes).map_err(|e| violation(e.to_string()))?;
                counters.messages_received += 1;
                ctx.log.trace(format_args!(
                    "angle set {id}: {} face(s) from rank {peer}",
                    records.len()
                ));

                for (crossing, values) in records {
                    let index = faces
                        .binary_search_by_key(&crossing, |rf| rf.crossing)
                        .map_err(|_| violation(format!("unexpected crossing {crossing:?}")))?;
                    let expected = faces[index].canonical.len() * stride;
                    if values.len() != expected {
                        return Err(violation(format!(
                            "crossing {crossing:?} carries {} values, expected {expected}",
                            values.len()
                        )));
                    }
                    let slot = &mut state.faces[index];
                    if slot.is_some() {
                        return Err(violation(format!("duplicate crossing {crossing:?}")));
                    }
                    *slot = Some(values);
                    state.remaining -= 1;
                    let cell = faces[index].cell;
                    dependencies[cell] -= 1;
                    if dependencies[cell] == 0 {
                        *num_ready += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Run every ready task once, in topological order, then post one
    /// message per downstream rank.
    fn execute<K: SweepKernel + ?Sized>(
        &mut self,
        ctx: &SweepContext<'_, C>,
        boundaries: &mut BoundarySet,
        psi: &mut PsiStore,
        kernel: &mut K,
    ) -> Result<(), SweepError> {
        let spds = Arc::clone(&self.spds);
        let grid = ctx.grid;
        let (na, ng) = (self.angles.len(), self.groups.len());
        let stride = na * ng;
        let mut outbound: BTreeMap<usize, Vec<(FaceCrossing, Vec<f64>)>> = BTreeMap::new();
        let mut incoming: Vec<Vec<f64>> = Vec::new();
        let mut outgoing: Vec<Vec<f64>> = Vec::new();
        let group_slice = |values: &[f64]| -> Result<Vec<f64>, SweepError> {
            values
                .get(self.groups.clone())
                .map(<[f64]>::to_vec)
                .ok_or(SweepError::IndexOutOfRange {
                    what: "boundary group",
                    index: self.groups.end,
                    len: values.len(),
                })
        };

        for t in spds.task_graph().topological_order() {
            if self.completed[t] || self.dependencies[t] != 0 {
                continue;
            }
            let cell = grid.cell(t);
            let plans = spds.face_plans(t);
            let nf = cell.faces.len();
            incoming.resize_with(nf, Vec::new);
            outgoing.resize_with(nf, Vec::new);

            // gather
            for (f, face) in cell.faces.iter().enumerate() {
                let len = face.num_nodes() * stride;
                let buf = &mut incoming[f];
                buf.clear();
                buf.resize(len, 0.0);
                outgoing[f].clear();
                outgoing[f].resize(len, 0.0);
                match &plans[f].upwind {
                    None => {}
                    Some(Upwind::Local(up)) => {
                        let src = self.fluds.face(up.slot, face.num_nodes());
                        for (k, &m) in up.node_map.iter().enumerate() {
                            buf[k * stride..(k + 1) * stride]
                                .copy_from_slice(&src[m * stride..(m + 1) * stride]);
                        }
                    }
                    Some(Upwind::Remote { rank, index }) => {
                        let rf = &spds.incoming_remote()[rank][*index];
                        let values = self
                            .inbound
                            .get(rank)
                            .and_then(|i| i.faces[*index].as_deref())
                            .ok_or_else(|| {
                                SweepError::InvariantViolation(format!(
                                    "angle set {}: task {t} ran before crossing {:?} arrived",
                                    self.id, rf.crossing
                                ))
                            })?;
                        for (k, &node) in rf.canonical.iter().enumerate() {
                            buf[node * stride..(node + 1) * stride]
                                .copy_from_slice(&values[k * stride..(k + 1) * stride]);
                        }
                    }
                    Some(Upwind::Boundary(bid)) => {
                        for k in 0..face.num_nodes() {
                            for (a, &n) in self.angles.iter().enumerate() {
                                let vals = group_slice(boundaries.psi_incoming(*bid, t, f, k, n)?)?;
                                let at = (k * na + a) * ng;
                                buf[at..at + ng].copy_from_slice(&vals);
                            }
                        }
                    }
                }
            }

            let mut view = CellSweep {
                cell,
                spds: &spds,
                angles: &self.angles,
                omegas: &self.omegas,
                groups: self.groups.clone(),
                incoming: &incoming[..nf],
                outgoing: &mut outgoing[..nf],
                psi: &mut *psi,
            };
            kernel.sweep_cell(&mut view)?;

            // scatter
            for (f, face) in cell.faces.iter().enumerate() {
                let out = &outgoing[f];
                match &plans[f].downwind {
                    None => {}
                    Some(Downwind::Local { slot }) => {
                        self.fluds.face_mut(*slot, face.num_nodes()).copy_from_slice(out);
                    }
                    Some(Downwind::Remote { rank, index }) => {
                        let rf = &spds.outgoing_remote()[rank][*index];
                        let mut packed = Vec::with_capacity(out.len());
                        for &node in &rf.canonical {
                            packed.extend_from_slice(&out[node * stride..(node + 1) * stride]);
                        }
                        outbound.entry(*rank).or_default().push((rf.crossing, packed));
                    }
                    Some(Downwind::Boundary(bid)) => {
                        if !boundaries.stores_outgoing(*bid) {
                            continue;
                        }
                        for k in 0..face.num_nodes() {
                            for (a, &n) in self.angles.iter().enumerate() {
                                let dst = boundaries.psi_outgoing_mut(*bid, t, f, k, n)?;
                                let len = dst.len();
                                let at = (k * na + a) * ng;
                                dst.get_mut(self.groups.clone())
                                    .ok_or(SweepError::IndexOutOfRange {
                                        what: "boundary group",
                                        index: self.groups.end,
                                        len,
                                    })?
                                    .copy_from_slice(&out[at..at + ng]);
                            }
                        }
                    }
                }
            }

            self.completed[t] = true;
            self.num_completed += 1;
            self.num_ready -= 1;
            for &s in &spds.task_graph().task(t).successors {
                self.dependencies[s] -= 1;
                if self.dependencies[s] == 0 {
                    self.num_ready += 1;
                }
            }
            self.counters.tasks_executed += 1;
        }

        for (peer, records) in outbound {
            let bytes = encode_flux(records.iter().map(|(c, v)| (*c, v.as_slice())))?;
            ctx.log.trace(format_args!(
                "angle set {}: {} face(s) to rank {peer}",
                self.id,
                records.len()
            ));
            self.pending_sends.push(ctx.comm.isend(peer, self.tag.as_u16(), &bytes));
            self.counters.messages_sent += 1;
        }
        Ok(())
    }
}
