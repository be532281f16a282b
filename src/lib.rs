//! Network I/Q acquisition.
//!
//! Datagrams of interleaved unsigned 8-bit I/Q bytes arrive over UDP, get decoded
//! into normalized `f32` complex samples and are handed to a [`SampleSink`] on a
//! dedicated thread, one call per datagram, in arrival order.

pub mod capture;
pub mod complex;
pub mod decode;
pub mod device;
pub mod error;
pub mod exfil;
pub mod monitoring;
pub mod receiver;
pub mod transport;

pub use capture::{SampleSink, StreamContext};
pub use complex::{Complex, ComplexSample};
pub use decode::{decode, decode_table, SampleBuffer};
pub use device::{ReceiverConfig, SamplingMode, TunerType};
pub use error::{Error, Result};
pub use monitoring::{Stats, StatsSnapshot};
pub use receiver::Receiver;
pub use transport::TransportConfig;
