//! Start/stop control of the acquisition thread and the device surface the host sees

use std::{
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{error, info, warn};

use crate::{
    capture::{Acquisition, SampleSink},
    device::{ReceiverConfig, TunerType, DEVICE_NAME, SUPPORTED_GAINS},
    error::{Error, Result},
    monitoring::Stats,
    transport::{self, TransportConfig},
};

/// Everything that only exists while streaming
struct Worker {
    handle: JoinHandle<Acquisition>,
    cancel: Arc<AtomicBool>,
    socket: Arc<UdpSocket>,
}

/// A network I/Q receiver.
///
/// Construction does not touch the network. [`Receiver::start`] connects the
/// transport and spawns the acquisition thread, [`Receiver::stop`] (or dropping
/// the receiver) cancels and joins it and releases the socket.
pub struct Receiver {
    transport: TransportConfig,
    settings: ReceiverConfig,
    stats: Arc<Stats>,
    /// Present while idle, lent to the worker while streaming
    idle: Option<Acquisition>,
    worker: Option<Worker>,
}

impl Receiver {
    pub fn new<S>(transport: TransportConfig, sink: S) -> Self
    where
        S: SampleSink + 'static,
    {
        let stats = Arc::new(Stats::new());
        let acquisition =
            Acquisition::new(Box::new(sink), transport.max_datagram_size, stats.clone());
        Self {
            transport,
            settings: ReceiverConfig::default(),
            stats,
            idle: Some(acquisition),
            worker: None,
        }
    }

    /// Connect the transport and start streaming samples to the sink
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let mut acquisition = self.idle.take().ok_or(Error::SinkUnavailable)?;
        let socket = match transport::open(&self.transport) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                self.idle = Some(acquisition);
                return Err(Error::Transport(e));
            }
        };
        acquisition.resize_recv_buf(self.transport.max_datagram_size);

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_socket = socket.clone();
        let thread_cancel = cancel.clone();
        // On a failed spawn the closure, and the sink with it, is dropped
        let handle = thread::Builder::new()
            .name("iq-acquisition".to_owned())
            .spawn(move || {
                if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
                    warn!("Could not raise acquisition thread priority - {:?}", e);
                }
                acquisition.run(&thread_socket, &thread_cancel);
                acquisition
            })
            .map_err(Error::Spawn)?;
        info!(remote = %self.transport.remote, "Streaming started");
        self.worker = Some(Worker {
            handle,
            cancel,
            socket,
        });
        Ok(())
    }

    /// Cancel the acquisition thread, wait for it and release the socket.
    /// Returns immediately when not streaming. Once this returns the sink will not
    /// be called again.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.cancel.store(true, Ordering::Release);
        let joined = worker.handle.join();
        drop(worker.socket);
        match joined {
            Ok(acquisition) => {
                self.idle = Some(acquisition);
                info!("Streaming stopped");
                Ok(())
            }
            Err(_) => {
                error!("Acquisition thread panicked, sample sink lost");
                Err(Error::WorkerPanicked)
            }
        }
    }

    /// Same as [`Receiver::stop`], for hosts that expect an explicit teardown call
    pub fn dispose(&mut self) -> Result<()> {
        self.stop()
    }

    pub fn is_streaming(&self) -> bool {
        self.worker.is_some()
    }

    /// Local address of the connected socket while streaming
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.worker
            .as_ref()
            .and_then(|w| w.socket.local_addr().ok())
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Transport settings take effect on the next `start`
    pub fn transport_mut(&mut self) -> &mut TransportConfig {
        &mut self.transport
    }

    pub fn settings(&self) -> &ReceiverConfig {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ReceiverConfig {
        &mut self.settings
    }

    pub fn name(&self) -> &'static str {
        DEVICE_NAME
    }

    pub fn index(&self) -> u32 {
        0
    }

    pub fn supported_gains(&self) -> &'static [i32] {
        &SUPPORTED_GAINS
    }

    pub fn tuner_type(&self) -> TunerType {
        TunerType::R820T
    }

    pub fn supports_offset_tuning(&self) -> bool {
        false
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Failed to stop receiver on drop - {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{capture::StreamContext, complex::ComplexSample};
    use std::{
        sync::atomic::AtomicUsize,
        time::{Duration, Instant},
    };

    const TIMEOUT: Duration = Duration::from_millis(50);

    /// A bound socket playing the remote device, plus a config pointing at it
    fn device() -> (UdpSocket, TransportConfig) {
        let device = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = TransportConfig {
            remote: device.local_addr().unwrap(),
            bind: "127.0.0.1:0".parse().unwrap(),
            recv_timeout: TIMEOUT,
            send_timeout: TIMEOUT,
            max_datagram_size: 4096,
        };
        (device, config)
    }

    fn counting_receiver(config: TransportConfig) -> (Receiver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink_calls = calls.clone();
        let sink = move |_: &StreamContext, _: &[ComplexSample]| {
            sink_calls.fetch_add(1, Ordering::SeqCst);
        };
        (Receiver::new(config, sink), calls)
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            if Instant::now() > deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    #[test]
    fn test_new_is_idle() {
        let (_device, config) = device();
        let (rx, calls) = counting_receiver(config);
        assert!(!rx.is_streaming());
        assert!(rx.local_addr().is_none());
        assert_eq!(rx.name(), DEVICE_NAME);
        assert_eq!(rx.index(), 0);
        assert_eq!(rx.tuner_type(), TunerType::R820T);
        assert_eq!(rx.supported_gains().len(), 29);
        assert!(!rx.supports_offset_tuning());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stream_then_stop() {
        let (device, config) = device();
        let (mut rx, calls) = counting_receiver(config);
        rx.start().unwrap();
        assert!(rx.is_streaming());
        let local = rx.local_addr().unwrap();
        for _ in 0..4 {
            device.send_to(&[0x80u8; 16], local).unwrap();
        }
        assert!(wait_for(|| calls.load(Ordering::SeqCst) == 4));
        rx.stop().unwrap();
        assert!(!rx.is_streaming());

        // Nothing is delivered after stop even if the device keeps talking
        for _ in 0..4 {
            let _ = device.send_to(&[0x80u8; 16], local);
        }
        thread::sleep(TIMEOUT * 2);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(rx.stats().snapshot().datagrams, 4);
    }

    #[test]
    fn test_stop_with_datagrams_pending() {
        let (device, config) = device();
        let calls = Arc::new(AtomicUsize::new(0));
        let sink_calls = calls.clone();
        let sink = move |_: &StreamContext, _: &[ComplexSample]| {
            sink_calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
        };
        let mut rx = Receiver::new(config, sink);
        rx.start().unwrap();
        let local = rx.local_addr().unwrap();
        for _ in 0..10 {
            device.send_to(&[0x80u8; 16], local).unwrap();
        }
        assert!(wait_for(|| calls.load(Ordering::SeqCst) >= 1));
        rx.stop().unwrap();
        let at_stop = calls.load(Ordering::SeqCst);
        assert!(at_stop < 10);
        thread::sleep(Duration::from_millis(300));
        assert_eq!(calls.load(Ordering::SeqCst), at_stop);
        assert!(rx.stats().snapshot().datagrams < 10);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let (_device, config) = device();
        let (mut rx, calls) = counting_receiver(config);
        rx.stop().unwrap();
        rx.start().unwrap();
        rx.stop().unwrap();
        rx.stop().unwrap();
        rx.dispose().unwrap();
        assert!(!rx.is_streaming());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_double_start_rejected() {
        let (_device, config) = device();
        let (mut rx, _calls) = counting_receiver(config);
        rx.start().unwrap();
        let local = rx.local_addr();
        assert!(matches!(rx.start(), Err(Error::AlreadyRunning)));
        assert!(rx.is_streaming());
        assert_eq!(rx.local_addr(), local);
        rx.stop().unwrap();
    }

    #[test]
    fn test_timeout_keeps_streaming() {
        let (_device, config) = device();
        let (mut rx, calls) = counting_receiver(config);
        rx.start().unwrap();
        let stats = rx.stats();
        assert!(wait_for(|| stats.snapshot().timeouts >= 2));
        assert!(rx.is_streaming());
        rx.stop().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restart_reuses_sink() {
        let (device, config) = device();
        let (mut rx, calls) = counting_receiver(config);
        for round in 1..=2 {
            rx.start().unwrap();
            let local = rx.local_addr().unwrap();
            device.send_to(&[0u8; 16], local).unwrap();
            assert!(wait_for(|| calls.load(Ordering::SeqCst) == round));
            rx.stop().unwrap();
        }
    }

    #[test]
    fn test_transport_failure_leaves_idle() {
        let (_device, mut config) = device();
        config.recv_timeout = Duration::ZERO;
        let (mut rx, _calls) = counting_receiver(config);
        assert!(matches!(rx.start(), Err(Error::Transport(_))));
        assert!(!rx.is_streaming());
        // The sink is still there, a fixed config starts fine
        rx.transport_mut().recv_timeout = TIMEOUT;
        rx.start().unwrap();
        rx.stop().unwrap();
    }

    #[test]
    fn test_drop_stops_worker() {
        let (device, config) = device();
        let (mut rx, calls) = counting_receiver(config);
        rx.start().unwrap();
        let local = rx.local_addr().unwrap();
        drop(rx);
        let _ = device.send_to(&[0u8; 16], local);
        thread::sleep(TIMEOUT * 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_settings_pass_through() {
        let (_device, config) = device();
        let (mut rx, _calls) = counting_receiver(config);
        rx.settings_mut().frequency = 433_920_000;
        rx.settings_mut().gain = 40;
        rx.settings_mut().offset_tuning = true;
        assert_eq!(rx.settings().frequency, 433_920_000);
        assert_eq!(rx.settings().gain_tenths_db(), None);
        assert!(rx.settings().offset_tuning);
        assert!(!rx.supports_offset_tuning());
    }
}
