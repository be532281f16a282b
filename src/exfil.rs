//! Ready-made sinks for getting samples out of the acquisition thread.
//!
//! The acquisition loop lends its buffer for the duration of a callback only. These
//! sinks copy what they need during the call so nothing downstream can stall the
//! receive loop for longer than a memcpy.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use byte_slice_cast::AsByteSlice;
use chrono::{DateTime, Datelike, Timelike, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{error, warn};

use crate::{
    capture::{SampleSink, StreamContext},
    complex::ComplexSample,
};

/// An owned copy of one decoded datagram
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    pub ctx: StreamContext,
    pub samples: Vec<ComplexSample>,
}

/// Copies every block into a bounded channel. When the consumer falls behind the
/// block is dropped and counted instead of blocking acquisition.
pub struct ChannelSink {
    sender: Sender<SampleBlock>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    /// Build a sink with room for `capacity` blocks and the receiving end for it
    pub fn new(capacity: usize) -> (Self, Receiver<SampleBlock>) {
        let (sender, receiver) = bounded(capacity);
        (
            Self {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver,
        )
    }

    /// Shared count of blocks dropped because the channel was full
    pub fn dropped(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }
}

impl SampleSink for ChannelSink {
    fn samples_available(&mut self, ctx: &StreamContext, samples: &[ComplexSample]) {
        let block = SampleBlock {
            ctx: *ctx,
            samples: samples.to_vec(),
        };
        match self.sender.try_send(block) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Nobody is listening anymore, we don't care
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Appends samples as native-endian interleaved `f32` (`re, im, re, im, ...`)
pub struct FileSink<W: Write + Send> {
    writer: W,
    scratch: Vec<f32>,
    failed: bool,
}

/// Capture file name for a run started at `time`
pub fn capture_filename(time: &DateTime<Utc>) -> String {
    format!(
        "iq-{}-{:02}-{:02}-{:02}:{:02}:{:02}.cf32",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

impl FileSink<BufWriter<File>> {
    /// Create a new timestamped capture file in `dir`
    pub fn create_in(dir: &Path) -> io::Result<(Self, PathBuf)> {
        let path = dir.join(capture_filename(&Utc::now()));
        let file = File::create(&path)?;
        Ok((Self::new(BufWriter::new(file)), path))
    }
}

impl<W: Write + Send> FileSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            scratch: Vec::new(),
            failed: false,
        }
    }

    fn write_block(&mut self, samples: &[ComplexSample]) -> io::Result<()> {
        self.scratch.clear();
        self.scratch.extend(samples.iter().flat_map(|s| [s.re, s.im]));
        self.writer.write_all(self.scratch.as_byte_slice())
    }
}

impl<W: Write + Send> SampleSink for FileSink<W> {
    fn samples_available(&mut self, _ctx: &StreamContext, samples: &[ComplexSample]) {
        // One failure is enough, a full disk won't fix itself between datagrams
        if self.failed {
            return;
        }
        if let Err(e) = self.write_block(samples) {
            error!("Capture write failed, no further samples will be written - {}", e);
            self.failed = true;
        }
    }
}

impl<W: Write + Send> Drop for FileSink<W> {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush capture - {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::SocketAddr;

    fn ctx(sequence: u64) -> StreamContext {
        StreamContext {
            peer: SocketAddr::from(([127, 0, 0, 1], 5555)),
            sequence,
        }
    }

    #[test]
    fn test_channel_sink_copies() {
        let (mut sink, rx) = ChannelSink::new(4);
        let samples = [ComplexSample::new(1.0, -1.0), ComplexSample::new(0.5, 0.25)];
        sink.samples_available(&ctx(7), &samples);
        let block = rx.try_recv().unwrap();
        assert_eq!(block.ctx.sequence, 7);
        assert_eq!(block.samples, samples.to_vec());
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (mut sink, rx) = ChannelSink::new(2);
        let dropped = sink.dropped();
        for i in 0..5 {
            sink.samples_available(&ctx(i), &[ComplexSample::default()]);
        }
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
        assert_eq!(rx.try_recv().unwrap().ctx.sequence, 0);
        assert_eq!(rx.try_recv().unwrap().ctx.sequence, 1);
        assert!(rx.try_recv().is_err());
        drop(rx);
        // Disconnected is not counted as a drop
        sink.samples_available(&ctx(5), &[]);
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_file_sink_interleaves() {
        let mut sink = FileSink::new(Vec::new());
        sink.samples_available(&ctx(0), &[ComplexSample::new(1.0, -1.0)]);
        sink.samples_available(&ctx(1), &[ComplexSample::new(0.5, 0.25)]);
        let bytes = std::mem::take(&mut sink.writer);
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(floats, vec![1.0, -1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_capture_filename() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(capture_filename(&time), "iq-2024-03-09-07:05:01.cf32");
    }
}
