//! Small blocking collectives built on point-to-point messages.
//!
//! Used only at setup time and between outer iterations, never inside the
//! sweep loop. Every rank must call the same collective with the same tag in
//! the same order. Receives are posted before sends, and all handles are
//! drained even after an error so no request is left dangling.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{decode_f64s, decode_u64s, encode_f64s, encode_u64s};
use crate::sweep_error::SweepError;

fn exchange<C: Communicator>(comm: &C, tag: CommTag, payload: &[u8]) -> Result<Vec<Vec<u8>>, SweepError> {
    let (me, size) = (comm.rank(), comm.size());
    let recvs: Vec<(usize, C::RecvHandle)> = (0..size)
        .filter(|&p| p != me)
        .map(|p| (p, comm.irecv(p, tag.as_u16())))
        .collect();
    let sends: Vec<C::SendHandle> = (0..size)
        .filter(|&p| p != me)
        .map(|p| comm.isend(p, tag.as_u16(), payload))
        .collect();

    let mut out = vec![Vec::new(); size];
    out[me] = payload.to_vec();
    let mut first_err = None;
    for (peer, h) in recvs {
        match h.wait() {
            Some(data) => out[peer] = data,
            None => {
                first_err.get_or_insert(SweepError::ProtocolViolation {
                    rank: me,
                    peer,
                    tag: tag.as_u16(),
                    reason: "collective receive completed without a matching send".into(),
                });
            }
        }
    }
    for s in sends {
        let _ = s.wait();
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

/// Gather every rank's `u64` list; entry `r` holds rank `r`'s contribution.
pub fn all_gather_u64s<C: Communicator>(
    comm: &C,
    tag: CommTag,
    local: &[u64],
) -> Result<Vec<Vec<u64>>, SweepError> {
    exchange(comm, tag, &encode_u64s(local)?)?
        .iter()
        .map(|bytes| decode_u64s(bytes))
        .collect()
}

/// Maximum of `local` over all ranks.
pub fn all_reduce_max<C: Communicator>(comm: &C, tag: CommTag, local: f64) -> Result<f64, SweepError> {
    let mut max = local;
    for bytes in exchange(comm, tag, &encode_f64s(&[local])?)? {
        for v in decode_f64s(&bytes)? {
            max = max.max(v);
        }
    }
    Ok(max)
}
