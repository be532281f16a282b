//! Conversion of raw interleaved 8-bit I/Q bytes into normalized complex samples.
//!
//! Every datagram is a flat run of unsigned bytes `[Q0 I0 Q1 I1 ...]`. Each byte is
//! centered on 128 and scaled by 1/127 through a 256 entry lookup table, so the hot
//! loop is two table reads per sample.

use std::sync::LazyLock;

use crate::complex::ComplexSample;

/// `DECODE_TABLE[b] = (b - 128) / 127`
static DECODE_TABLE: LazyLock<[f32; 256]> = LazyLock::new(|| {
    let mut table = [0f32; 256];
    for (i, v) in table.iter_mut().enumerate() {
        *v = (i as f32 - 128.0) / 127.0;
    }
    table
});

/// The shared byte to float table, built on first use
pub fn decode_table() -> &'static [f32; 256] {
    &DECODE_TABLE
}

#[inline]
pub fn decode_byte(byte: u8) -> f32 {
    DECODE_TABLE[byte as usize]
}

/// Decode `raw` into `out` pairwise. The first byte of each pair is the imaginary
/// part, the second the real part. `out` must hold exactly `raw.len() / 2` samples.
fn decode_pairs(raw: &[u8], out: &mut [ComplexSample]) {
    debug_assert_eq!(out.len(), raw.len() / 2);
    let table = decode_table();
    for (sample, pair) in out.iter_mut().zip(raw.chunks_exact(2)) {
        sample.im = table[pair[0] as usize];
        sample.re = table[pair[1] as usize];
    }
}

/// Decode a whole datagram into a fresh vector of `raw.len() / 2` samples.
/// A trailing unpaired byte is ignored.
pub fn decode(raw: &[u8]) -> Vec<ComplexSample> {
    let mut out = vec![ComplexSample::default(); raw.len() / 2];
    decode_pairs(raw, &mut out);
    out
}

/// Reusable destination for decoded samples.
///
/// The storage is only replaced when a datagram decodes to a different number of
/// samples than the previous one, and the replacement is sized exactly.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Option<Box<[ComplexSample]>>,
    reallocations: u64,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `raw` in place and return the freshly written samples
    pub fn decode(&mut self, raw: &[u8]) -> &[ComplexSample] {
        let count = raw.len() / 2;
        if self.samples.as_ref().map_or(true, |b| b.len() != count) {
            self.reallocations += 1;
            self.samples = Some(vec![ComplexSample::default(); count].into_boxed_slice());
        }
        let buf = self
            .samples
            .get_or_insert_with(|| vec![ComplexSample::default(); count].into_boxed_slice());
        decode_pairs(raw, buf);
        buf
    }

    /// Samples from the last decode, empty before the first one
    pub fn samples(&self) -> &[ComplexSample] {
        self.samples.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples().is_empty()
    }

    /// How many times the backing storage has been (re)allocated
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }
}
