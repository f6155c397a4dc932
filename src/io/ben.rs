//! BEN: run-length, bit-packed streams of district assignments.
//!
//! A stream is the 17-byte header `STANDARD BEN FILE` followed by one frame per
//! assignment. A frame is the run-length encoding of the ordered labels, packed
//! MSB-first as `(value, length)` pairs:
//!
//! ```text
//! [value_bits: u8][length_bits: u8][n_bytes: u32 BE][n_bytes of packed pairs]
//! ```
//!
//! Trailing pad bits are zero; a zero-length pair marks padding and is skipped.

use std::io::{ErrorKind, Read, Write};

use anyhow::{Context, Result, bail, ensure};

pub const BEN_HEADER: &[u8; 17] = b"STANDARD BEN FILE";

/// Bits needed to represent `x` (at least 1).
#[inline]
fn bit_width(x: u32) -> u32 { (32 - x.leading_zeros()).max(1) }

/// Run-length encode a label sequence.
fn runs(labels: &[u32]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &label in labels {
        match runs.last_mut() {
            Some((value, len)) if *value == label => *len += 1,
            _ => runs.push((label, 1)),
        }
    }
    runs
}

/// MSB-first bit packer.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    filled: u32,
}

impl BitWriter {
    fn push(&mut self, value: u32, bits: u32) {
        debug_assert!(bits <= 32 && (bits == 32 || value >> bits == 0), "value does not fit in {bits} bits");
        self.acc = (self.acc << bits) | value as u64;
        self.filled += bits;
        while self.filled >= 8 {
            self.filled -= 8;
            self.bytes.push((self.acc >> self.filled) as u8);
        }
        self.acc &= (1u64 << self.filled) - 1;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push((self.acc << (8 - self.filled)) as u8);
        }
        self.bytes
    }
}

/// MSB-first bit reader over a byte slice.
struct BitReader<'a> {
    bytes: &'a [u8],
    bit: usize,
}

impl BitReader<'_> {
    fn remaining(&self) -> usize { self.bytes.len() * 8 - self.bit }

    fn take(&mut self, bits: u32) -> u32 {
        let mut value = 0u32;
        for _ in 0..bits {
            let byte = self.bytes[self.bit / 8];
            let b = (byte >> (7 - self.bit % 8)) & 1;
            value = (value << 1) | b as u32;
            self.bit += 1;
        }
        value
    }
}

/// Encode one assignment as a frame.
pub fn encode_frame(labels: &[u32]) -> Vec<u8> {
    let runs = runs(labels);
    let value_bits = bit_width(runs.iter().map(|&(v, _)| v).max().unwrap_or(0));
    let length_bits = bit_width(runs.iter().map(|&(_, l)| l).max().unwrap_or(0));

    let mut packed = BitWriter::default();
    for &(value, len) in &runs {
        packed.push(value, value_bits);
        packed.push(len, length_bits);
    }
    let payload = packed.finish();

    let mut frame = Vec::with_capacity(6 + payload.len());
    frame.push(value_bits as u8);
    frame.push(length_bits as u8);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// Decode the packed pairs of one frame.
fn decode_pairs(payload: &[u8], value_bits: u32, length_bits: u32) -> Result<Vec<u32>> {
    ensure!((1..=32).contains(&value_bits) && (1..=32).contains(&length_bits),
        "[io::ben] invalid bit widths ({value_bits}, {length_bits})");

    let mut reader = BitReader { bytes: payload, bit: 0 };
    let mut labels = Vec::new();
    while reader.remaining() >= (value_bits + length_bits) as usize {
        let value = reader.take(value_bits);
        let len = reader.take(length_bits);
        if len == 0 { continue } // padding
        labels.extend(std::iter::repeat_n(value, len as usize));
    }
    Ok(labels)
}

/// Streaming BEN writer.
pub struct BenEncoder<W: Write> {
    writer: W,
    frames: usize,
}

impl<W: Write> BenEncoder<W> {
    /// Start a stream by writing the header.
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(BEN_HEADER)
            .context("[io::ben] Failed to write header")?;
        Ok(Self { writer, frames: 0 })
    }

    /// Append one assignment.
    pub fn write(&mut self, labels: &[u32]) -> Result<()> {
        self.write_encoded(&encode_frame(labels))
    }

    /// Append a frame already produced by [`encode_frame`].
    pub fn write_encoded(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.write_all(frame)
            .with_context(|| format!("[io::ben] Failed to write frame {}", self.frames))?;
        self.frames += 1;
        Ok(())
    }

    /// Number of frames written.
    #[inline] pub fn frames(&self) -> usize { self.frames }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().context("[io::ben] Failed to flush stream")?;
        Ok(self.writer)
    }
}

/// Streaming BEN reader; yields one label vector per frame.
pub struct BenDecoder<R: Read> {
    reader: R,
    frames: usize,
    done: bool,
}

impl<R: Read> BenDecoder<R> {
    /// Open a stream, checking the header.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 17];
        reader.read_exact(&mut header)
            .context("[io::ben] Failed to read header")?;
        ensure!(&header == BEN_HEADER, "[io::ben] Invalid header: expected 'STANDARD BEN FILE'");
        Ok(Self { reader, frames: 0, done: false })
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u32>>> {
        let mut widths = [0u8; 2];
        match self.reader.read_exact(&mut widths[..1]) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => bail!("[io::ben] Failed to read frame {}: {err}", self.frames),
        }
        self.reader.read_exact(&mut widths[1..])
            .with_context(|| format!("[io::ben] Truncated frame {}", self.frames))?;

        let mut b4 = [0u8; 4];
        self.reader.read_exact(&mut b4)
            .with_context(|| format!("[io::ben] Truncated frame {}", self.frames))?;
        let n_bytes = u32::from_be_bytes(b4) as usize;

        let mut payload = vec![0u8; n_bytes];
        self.reader.read_exact(&mut payload)
            .with_context(|| format!("[io::ben] Truncated payload in frame {}", self.frames))?;

        let labels = decode_pairs(&payload, widths[0] as u32, widths[1] as u32)
            .with_context(|| format!("[io::ben] Malformed frame {}", self.frames))?;
        self.frames += 1;
        Ok(Some(labels))
    }
}

impl<R: Read> Iterator for BenDecoder<R> {
    type Item = Result<Vec<u32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done { return None }
        match self.read_frame() {
            Ok(Some(labels)) => Some(Ok(labels)),
            Ok(None) => { self.done = true; None }
            Err(err) => { self.done = true; Some(Err(err)) }
        }
    }
}
