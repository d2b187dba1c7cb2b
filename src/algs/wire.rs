//! Fixed, versioned, little-endian wire types for sweep messages.
//!
//! Every message starts with a [`WireHdr`] naming its kind. Records are
//! `bytemuck` Pod structs holding pre-LE integers; `f64` values travel as their
//! LE bit patterns. Decoding reads unaligned, so received buffers need no
//! particular alignment.

use crate::sweep::FaceCrossing;
use crate::sweep_error::SweepError;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Crossing lists exchanged between neighbouring ranks.
pub const KIND_LOCATION_DEPS: u16 = 1;
/// Plain list of `u64` values (rank lists, ids).
pub const KIND_U64_LIST: u16 = 2;
/// Angular flux on cross-rank faces.
pub const KIND_ANGULAR_FLUX: u16 = 3;
/// Plain list of `f64` values (reductions).
pub const KIND_F64_LIST: u16 = 4;

// ===== Common records ======================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,  // = WIRE_VERSION.to_le()
    pub kind_le: u16,     // one of the KIND_* constants
    pub reserved_le: u32, // future use; keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}

/// `n` as a wire count; counts above `u32::MAX` cannot be encoded.
fn count_u32(n: usize, what: &str) -> Result<u32, SweepError> {
    u32::try_from(n).map_err(|_| SweepError::Wire(format!("{what} count {n} does not fit in u32")))
}

impl WireCount {
    pub fn new(n: usize) -> Result<Self, SweepError> {
        Ok(Self {
            n_le: count_u32(n, "record")?.to_le(),
        })
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A face crossing `(upwind cell, downwind cell)` in global ids.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCrossing {
    pub upwind_le: u64,
    pub downwind_le: u64,
}

impl WireCrossing {
    pub fn of(c: FaceCrossing) -> Self {
        Self {
            upwind_le: c.upwind.to_le(),
            downwind_le: c.downwind.to_le(),
        }
    }
    pub fn get(&self) -> FaceCrossing {
        FaceCrossing {
            upwind: u64::from_le(self.upwind_le),
            downwind: u64::from_le(self.downwind_le),
        }
    }
}

/// Header of one face's angular flux; `n_values` f64 follow.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireFluxRecord {
    pub upwind_le: u64,
    pub downwind_le: u64,
    pub n_values_le: u32,
    pub _pad: u32, // pad to 8-byte multiple (explicit)
}

impl WireFluxRecord {
    pub const SIZE: usize = 24;

    pub fn new(c: FaceCrossing, n_values: usize) -> Result<Self, SweepError> {
        Ok(Self {
            upwind_le: c.upwind.to_le(),
            downwind_le: c.downwind.to_le(),
            n_values_le: count_u32(n_values, "flux value")?.to_le(),
            _pad: 0,
        })
    }
    pub fn crossing(&self) -> FaceCrossing {
        FaceCrossing {
            upwind: u64::from_le(self.upwind_le),
            downwind: u64::from_le(self.downwind_le),
        }
    }
    pub fn n_values(&self) -> usize {
        u32::from_le(self.n_values_le) as usize
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireCrossing>(), 16);
const_assert_eq!(size_of::<WireFluxRecord>(), WireFluxRecord::SIZE);

// ===== Writer / reader ======================================================

struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    fn new(kind: u16) -> Self {
        let mut w = Self { buf: Vec::new() };
        w.push(&WireHdr::new(kind));
        w
    }
    fn push<T: Pod>(&mut self, v: &T) {
        self.buf.extend_from_slice(bytemuck::bytes_of(v));
    }
    fn push_f64s(&mut self, vals: &[f64]) {
        self.buf.reserve(vals.len() * 8);
        for v in vals {
            self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
        }
    }
    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn open(bytes: &'a [u8], kind: u16) -> Result<Self, SweepError> {
        let mut r = Self { bytes, pos: 0 };
        let hdr: WireHdr = r.read()?;
        if hdr.version() != WIRE_VERSION {
            return Err(SweepError::Wire(format!(
                "unsupported wire version {} (expected {WIRE_VERSION})",
                hdr.version()
            )));
        }
        if hdr.kind() != kind {
            return Err(SweepError::Wire(format!(
                "message kind {} where {kind} was expected",
                hdr.kind()
            )));
        }
        Ok(r)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SweepError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.bytes.len());
        match end {
            Some(end) => {
                let s = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(s)
            }
            None => Err(SweepError::Wire(format!(
                "truncated message: need {n} bytes at offset {}, have {}",
                self.pos,
                self.bytes.len()
            ))),
        }
    }

    /// Capacity for `n` records of `size` bytes, bounded by what is left.
    fn capacity(&self, n: usize, size: usize) -> usize {
        n.min((self.bytes.len() - self.pos) / size)
    }

    fn read<T: Pod>(&mut self) -> Result<T, SweepError> {
        let raw = self.take(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(raw))
    }

    fn read_f64s(&mut self, n: usize) -> Result<Vec<f64>, SweepError> {
        let raw = self.take(n.checked_mul(8).ok_or_else(|| {
            SweepError::Wire(format!("value count {n} overflows"))
        })?)?;
        Ok(raw
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_bits(u64::from_le_bytes(b))
            })
            .collect())
    }

    fn finish(self) -> Result<(), SweepError> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(SweepError::Wire(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )))
        }
    }
}

// ===== Message codecs =======================================================

/// Encode the crossings a rank sends to and receives from one neighbour.
pub fn encode_crossing_lists(
    outgoing: &[FaceCrossing],
    incoming: &[FaceCrossing],
) -> Result<Vec<u8>, SweepError> {
    let mut w = WireWriter::new(KIND_LOCATION_DEPS);
    for list in [outgoing, incoming] {
        w.push(&WireCount::new(list.len())?);
        for &c in list {
            w.push(&WireCrossing::of(c));
        }
    }
    Ok(w.finish())
}

/// Decode `(outgoing, incoming)` as written by [`encode_crossing_lists`].
pub fn decode_crossing_lists(
    bytes: &[u8],
) -> Result<(Vec<FaceCrossing>, Vec<FaceCrossing>), SweepError> {
    let mut r = WireReader::open(bytes, KIND_LOCATION_DEPS)?;
    let mut lists = [Vec::new(), Vec::new()];
    for list in lists.iter_mut() {
        let n = r.read::<WireCount>()?.get();
        list.reserve(r.capacity(n, size_of::<WireCrossing>()));
        for _ in 0..n {
            list.push(r.read::<WireCrossing>()?.get());
        }
    }
    r.finish()?;
    let [outgoing, incoming] = lists;
    Ok((outgoing, incoming))
}

pub fn encode_u64s(vals: &[u64]) -> Result<Vec<u8>, SweepError> {
    let mut w = WireWriter::new(KIND_U64_LIST);
    w.push(&WireCount::new(vals.len())?);
    for v in vals {
        w.buf.extend_from_slice(&v.to_le_bytes());
    }
    Ok(w.finish())
}

pub fn decode_u64s(bytes: &[u8]) -> Result<Vec<u64>, SweepError> {
    let mut r = WireReader::open(bytes, KIND_U64_LIST)?;
    let n = r.read::<WireCount>()?.get();
    let mut out = Vec::with_capacity(r.capacity(n, 8));
    for _ in 0..n {
        let mut b = [0u8; 8];
        b.copy_from_slice(r.take(8)?);
        out.push(u64::from_le_bytes(b));
    }
    r.finish()?;
    Ok(out)
}

pub fn encode_f64s(vals: &[f64]) -> Result<Vec<u8>, SweepError> {
    let mut w = WireWriter::new(KIND_F64_LIST);
    w.push(&WireCount::new(vals.len())?);
    w.push_f64s(vals);
    Ok(w.finish())
}

pub fn decode_f64s(bytes: &[u8]) -> Result<Vec<f64>, SweepError> {
    let mut r = WireReader::open(bytes, KIND_F64_LIST)?;
    let n = r.read::<WireCount>()?.get();
    let vals = r.read_f64s(n)?;
    r.finish()?;
    Ok(vals)
}

/// Encode angular flux for a batch of cross-rank faces.
pub fn encode_flux<'a, I>(records: I) -> Result<Vec<u8>, SweepError>
where
    I: ExactSizeIterator<Item = (FaceCrossing, &'a [f64])>,
{
    let mut w = WireWriter::new(KIND_ANGULAR_FLUX);
    w.push(&WireCount::new(records.len())?);
    for (crossing, vals) in records {
        w.push(&WireFluxRecord::new(crossing, vals.len())?);
        w.push_f64s(vals);
    }
    Ok(w.finish())
}

/// Decode the records written by [`encode_flux`].
pub fn decode_flux(bytes: &[u8]) -> Result<Vec<(FaceCrossing, Vec<f64>)>, SweepError> {
    let mut r = WireReader::open(bytes, KIND_ANGULAR_FLUX)?;
    let n = r.read::<WireCount>()?.get();
    let mut out = Vec::with_capacity(r.capacity(n, WireFluxRecord::SIZE));
    for _ in 0..n {
        let rec: WireFluxRecord = r.read()?;
        let vals = r.read_f64s(rec.n_values())?;
        out.push((rec.crossing(), vals));
    }
    r.finish()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fc(u: u64, d: u64) -> FaceCrossing {
        FaceCrossing {
            upwind: u,
            downwind: d,
        }
    }

    #[test]
    fn flux_message_roundtrip_unaligned() {
        let a = [1.5, -2.0, 0.25];
        let b = [7.0];
        let bytes = encode_flux([(fc(3, 4), &a[..]), (fc(9, 2), &b[..])].into_iter()).unwrap();
        // shift by one byte to prove decoding does not rely on alignment
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(&bytes);
        let recs = decode_flux(&shifted[1..]).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].0, fc(3, 4));
        assert_eq!(recs[0].1, a.to_vec());
        assert_eq!(recs[1].1, b.to_vec());
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let bytes = encode_u64s(&[1, 2]).unwrap();
        assert!(matches!(decode_f64s(&bytes), Err(SweepError::Wire(_))));
    }

    #[test]
    fn truncated_and_trailing_bytes_are_rejected() {
        let bytes = encode_crossing_lists(&[fc(1, 2)], &[]).unwrap();
        assert!(decode_crossing_lists(&bytes[..bytes.len() - 1]).is_err());
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(decode_crossing_lists(&longer).is_err());
        let (out, inc) = decode_crossing_lists(&bytes).unwrap();
        assert_eq!(out, vec![fc(1, 2)]);
        assert!(inc.is_empty());
    }

    #[test]
    fn version_guard() {
        let mut bytes = encode_f64s(&[1.0]).unwrap();
        bytes[0] = 0xFF;
        let err = decode_f64s(&bytes).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    /// Header plus a count claiming `u32::MAX` records, with no records.
    fn oversized(kind: u16) -> Vec<u8> {
        let mut bytes = bytemuck::bytes_of(&WireHdr::new(kind)).to_vec();
        bytes.extend_from_slice(bytemuck::bytes_of(&WireCount {
            n_le: u32::MAX.to_le(),
        }));
        bytes
    }

    #[test]
    fn huge_count_on_short_message_is_an_error() {
        assert!(matches!(decode_u64s(&oversized(KIND_U64_LIST)), Err(SweepError::Wire(_))));
        assert!(matches!(decode_flux(&oversized(KIND_ANGULAR_FLUX)), Err(SweepError::Wire(_))));
        assert!(matches!(
            decode_crossing_lists(&oversized(KIND_LOCATION_DEPS)),
            Err(SweepError::Wire(_))
        ));
        assert!(matches!(decode_f64s(&oversized(KIND_F64_LIST)), Err(SweepError::Wire(_))));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn counts_beyond_u32_are_not_truncated() {
        assert_eq!(WireCount::new(u32::MAX as usize).unwrap().get(), u32::MAX as usize);
        let too_many = u32::MAX as usize + 1;
        assert!(matches!(WireCount::new(too_many), Err(SweepError::Wire(_))));
        assert!(matches!(
            WireFluxRecord::new(fc(1, 2), too_many),
            Err(SweepError::Wire(_))
        ));
    }
}
