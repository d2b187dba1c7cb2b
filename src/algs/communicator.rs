//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees). All
//! handles are non-blocking: [`Wait::test`] polls for completion and never
//! blocks, [`Wait::wait`] blocks until completion. The sweep loop only ever
//! uses `test`; `wait` is reserved for setup-time collectives.
//!
//! Messages between the same `(source, destination, tag)` triple are
//! delivered in posting order.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Typed message tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(pub u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `n` steps after this one, if it fits in `u16`.
    #[inline]
    pub fn offset(self, n: usize) -> Option<CommTag> {
        u16::try_from(n).ok().and_then(|n| self.0.checked_add(n)).map(CommTag)
    }
}

/// Tags used by one scheduler, derived from a single base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SweepCommTags {
    /// Pairwise location-dependency exchange.
    pub location_deps: CommTag,
    /// All-gather of rank-level dependencies.
    pub global_deps: CommTag,
    /// Scalar reductions of the outer iteration.
    pub reduce: CommTag,
    /// Angle set `k` uses `angle_sets.offset(k)`.
    pub angle_sets: CommTag,
}

impl SweepCommTags {
    pub fn from_base(base: CommTag) -> Self {
        let at = |n: u16| CommTag(base.0.wrapping_add(n));
        Self {
            location_deps: at(0),
            global_deps: at(1),
            reduce: at(2),
            angle_sets: at(3),
        }
    }
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Post a send; the payload is copied before returning.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive for the next message from `peer` with `tag`, of any length.
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;
}

/// Anything that can be polled or waited on.
pub trait Wait {
    /// Non-blocking completion check.
    fn test(&mut self) -> bool;
    /// Wait for completion and return the received data (if any).
    ///
    /// Sends return `None`. A receive that completes without data has no
    /// matching send.
    fn wait(self) -> Option<Vec<u8>>;
}

/// Compile-time no-op comm for single-rank runs and serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn test(&mut self) -> bool {
        true
    }
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16) {}
}

// --- LocalComm: intra-process / one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug, Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
}

/// In-process communicator; every rank of a world shares one mailbox.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    /// Create the communicators of a `size`-rank world, indexed by rank.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// Messages posted but not yet received, over the whole world.
    pub fn in_flight(&self) -> usize {
        self.mailbox.slots.iter().map(|e| e.value().len()).sum()
    }
}

/// Receive handle of [`LocalComm`].
pub struct LocalRecv {
    key: Key,
    mailbox: Arc<Mailbox>,
    data: Option<Bytes>,
}

impl Wait for LocalRecv {
    fn test(&mut self) -> bool {
        if self.data.is_none() {
            if let Some(mut queue) = self.mailbox.slots.get_mut(&self.key) {
                self.data = queue.pop_front();
            }
        }
        self.data.is_some()
    }

    fn wait(mut self) -> Option<Vec<u8>> {
        while !self.test() {
            std::thread::yield_now();
        }
        self.data.take().map(|b| b.to_vec())
    }
}

impl Communicator for LocalComm {
    // sends are buffered in the mailbox and complete immediately
    type SendHandle = ();
    type RecvHandle = LocalRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        self.mailbox
            .slots
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> LocalRecv {
        LocalRecv {
            key: (peer, self.rank, tag),
            mailbox: Arc::clone(&self.mailbox),
            data: None,
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source};
    use mpi::request::StaticScope;
    use mpi::topology::Communicator as _;
    use mpi::topology::SimpleCommunicator;

    pub struct MpiComm {
        universe: Universe,
        rank: usize,
        size: usize,
    }

    // SAFETY: MPI is initialised with the default (single) threading level and
    // all handles are driven from the thread that owns the communicator.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        /// Initialise MPI; `None` if it was already initialised.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                universe,
                rank,
                size,
            })
        }

        pub fn world(&self) -> SimpleCommunicator {
            self.universe.world()
        }
    }

    /// Immediate send; the payload is kept alive until the request completes.
    pub struct MpiSend {
        poll: Box<dyn FnMut() -> bool>,
        done: bool,
    }

    impl Wait for MpiSend {
        fn test(&mut self) -> bool {
            if !self.done {
                self.done = (self.poll)();
            }
            self.done
        }
        fn wait(mut self) -> Option<Vec<u8>> {
            while !self.test() {
                std::thread::yield_now();
            }
            None
        }
    }

    /// Probe-based receive of a message of any length.
    pub struct MpiRecv {
        world: SimpleCommunicator,
        peer: i32,
        tag: i32,
        data: Option<Vec<u8>>,
    }

    impl Wait for MpiRecv {
        fn test(&mut self) -> bool {
            if self.data.is_none() {
                let src = self.world.process_at_rank(self.peer);
                if let Some((msg, _status)) = src.immediate_matched_probe_with_tag(self.tag) {
                    let (data, _status) = msg.matched_receive_vec::<u8>();
                    self.data = Some(data);
                }
            }
            self.data.is_some()
        }
        fn wait(mut self) -> Option<Vec<u8>> {
            while !self.test() {
                std::thread::yield_now();
            }
            self.data.take()
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSend {
            let payload: &'static [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let raw = payload as *const [u8] as *mut [u8];
            let world = self.world();
            let mut request = Some(world.process_at_rank(peer as i32).immediate_send_with_tag(
                StaticScope,
                payload,
                i32::from(tag),
            ));
            let poll = move || match request.take() {
                Some(req) => match req.test() {
                    Ok(_) => {
                        // SAFETY: `raw` came from `Box::leak` above and the
                        // request that borrowed it has completed.
                        unsafe { drop(Box::from_raw(raw)) };
                        true
                    }
                    Err(req) => {
                        request = Some(req);
                        false
                    }
                },
                None => true,
            };
            MpiSend {
                poll: Box::new(poll),
                done: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecv {
            MpiRecv {
                world: self.world(),
                peer: peer as i32,
                tag: i32::from(tag),
                data: None,
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let world = LocalComm::world(2);
        let (c0, c1) = (&world[0], &world[1]);

        let mut recv = c1.irecv(0, 7);
        assert!(!recv.test(), "nothing posted yet");

        c0.isend(1, 7, &[1, 2, 3, 4]);
        assert!(recv.test());
        assert_eq!(recv.wait(), Some(vec![1, 2, 3, 4]));
        assert_eq!(c0.in_flight(), 0);
    }

    #[test]
    fn local_fifo_per_tag() {
        let world = LocalComm::world(2);
        for i in 0..5u8 {
            world[0].isend(1, 3, &[i]);
        }
        world[0].isend(1, 4, &[99]);
        let got: Vec<u8> = (0..5)
            .map(|_| world[1].irecv(0, 3).wait().unwrap()[0])
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
        assert_eq!(world[1].irecv(0, 4).wait(), Some(vec![99]));
    }

    #[test]
    fn worlds_do_not_share_mailboxes() {
        let a = LocalComm::world(2);
        let b = LocalComm::world(2);
        a[0].isend(1, 1, &[5]);
        assert!(!b[1].irecv(0, 1).test());
        assert!(a[1].irecv(0, 1).test());
    }

    #[test]
    fn tag_offsets() {
        let tags = SweepCommTags::from_base(CommTag::new(0x5300));
        assert_eq!(tags.angle_sets.as_u16(), 0x5303);
        assert_eq!(tags.angle_sets.offset(2), Some(CommTag(0x5305)));
        assert_eq!(CommTag(u16::MAX).offset(1), None);
    }

    #[test]
    fn nocomm_receive_has_no_payload() {
        let comm = NoComm;
        let mut h = comm.irecv(0, 1);
        assert!(h.test());
        assert_eq!(h.wait(), None);
    }
}
