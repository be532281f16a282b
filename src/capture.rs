//! This module contains all the capture logic

// The acquisition thread does one thing: pull a datagram off the socket, decode
// it into the reusable sample buffer and hand that buffer to the sink, all
// synchronously. A slow sink stalls reception, there is no queue in between.

use std::{
    net::{SocketAddr, UdpSocket},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, error, info, trace, warn};

use crate::{
    complex::ComplexSample, decode::SampleBuffer, monitoring::Stats, transport::is_timeout,
};

/// Where a block of samples came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamContext {
    pub peer: SocketAddr,
    /// Arrival index of the datagram within the current run, starting at 0
    pub sequence: u64,
}

/// Consumer of decoded samples.
///
/// Called on the acquisition thread once per datagram. The slice is the loop's
/// own buffer and is overwritten by the next datagram, copy it to keep it.
pub trait SampleSink: Send {
    fn samples_available(&mut self, ctx: &StreamContext, samples: &[ComplexSample]);
}

impl<F> SampleSink for F
where
    F: FnMut(&StreamContext, &[ComplexSample]) + Send,
{
    fn samples_available(&mut self, ctx: &StreamContext, samples: &[ComplexSample]) {
        self(ctx, samples)
    }
}

/// State owned by the acquisition thread. Handed back on join so the sink and
/// buffer survive a restart.
pub struct Acquisition {
    pub(crate) sink: Box<dyn SampleSink>,
    pub(crate) buffer: SampleBuffer,
    recv_buf: Vec<u8>,
    stats: Arc<Stats>,
    /// Only the first odd or truncated datagram is worth a warning, the rest are counted
    warned_odd: bool,
    warned_truncated: bool,
}

impl Acquisition {
    pub fn new(sink: Box<dyn SampleSink>, max_datagram_size: usize, stats: Arc<Stats>) -> Self {
        Self {
            sink,
            buffer: SampleBuffer::new(),
            recv_buf: vec![0u8; max_datagram_size],
            stats,
            warned_odd: false,
            warned_truncated: false,
        }
    }

    pub(crate) fn resize_recv_buf(&mut self, max_datagram_size: usize) {
        self.recv_buf.resize(max_datagram_size, 0);
    }

    /// Receive, decode and deliver until `cancel` is raised. The flag is checked
    /// between datagrams, so stopping can take up to one receive timeout.
    pub fn run(&mut self, socket: &UdpSocket, cancel: &AtomicBool) {
        info!("Acquisition loop started");
        let mut sequence = 0u64;
        self.warned_odd = false;
        self.warned_truncated = false;
        while !cancel.load(Ordering::Acquire) {
            let (len, peer) = match socket.recv_from(&mut self.recv_buf) {
                Ok(v) => v,
                Err(e) if is_timeout(&e) => {
                    // Keep truckin, the stream may just be idle
                    debug!("No datagram within timeout");
                    self.stats.record_timeout();
                    continue;
                }
                Err(e) => {
                    warn!("Datagram receive failed - {}", e);
                    self.stats.record_recv_error();
                    continue;
                }
            };
            self.stats.record_datagram(len);
            self.check_length(len);
            trace!(len, sequence, "Datagram received");
            let ctx = StreamContext { peer, sequence };
            sequence += 1;
            self.deliver(&ctx, len);
        }
        info!("Acquisition loop stopped");
    }

    fn check_length(&mut self, len: usize) {
        if len % 2 != 0 {
            if self.warned_odd {
                debug!(len, "Odd-length datagram, dropping trailing byte");
            } else {
                warn!(len, "Odd-length datagram, dropping trailing byte");
                self.warned_odd = true;
            }
        }
        // A datagram that exactly fills the buffer may have been cut by the OS
        if len > 0 && len == self.recv_buf.len() {
            self.stats.record_truncated();
            if self.warned_truncated {
                debug!(len, "Datagram filled the receive buffer");
            } else {
                warn!(len, "Datagram filled the receive buffer, it may be truncated");
                self.warned_truncated = true;
            }
        }
    }

    /// Decode the first `len` bytes of the receive buffer and pass them to the sink.
    /// A panic in either step costs this datagram only.
    fn deliver(&mut self, ctx: &StreamContext, len: usize) {
        let Self {
            sink,
            buffer,
            recv_buf,
            ..
        } = &mut *self;
        let raw = &recv_buf[..len];
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let samples = buffer.decode(raw);
            sink.samples_available(ctx, samples);
        }));
        if outcome.is_err() {
            error!(sequence = ctx.sequence, "Sample sink panicked, datagram dropped");
            self.stats.record_consumer_panic();
        }
    }
}
