//! Descriptive metadata and pass-through tuning settings the host reads and writes.
//! None of this touches hardware, the stream arrives already tuned.

pub const DEVICE_NAME: &str = "Test Ethernet dummy receiver";
pub const DEFAULT_FREQUENCY: u32 = 105_500_000;
pub const DEFAULT_SAMPLE_RATE: u32 = 2_048_000;

/// Tuner gains in tenths of a dB, ascending
pub const SUPPORTED_GAINS: [i32; 29] = [
    0, 9, 14, 27, 37, 77, 87, 125, 144, 157, 166, 197, 207, 229, 254, 280, 297, 328, 338, 364, 372,
    386, 402, 421, 434, 439, 445, 480, 496,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplingMode {
    #[default]
    Quadrature,
    DirectSamplingI,
    DirectSamplingQ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerType {
    Unknown,
    E4000,
    FC0012,
    FC0013,
    FC2580,
    R820T,
    R828D,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Samples per second
    pub sample_rate: u32,
    /// Center frequency in Hz
    pub frequency: u32,
    /// Frequency correction in ppm
    pub frequency_correction: i32,
    /// Index into [`SUPPORTED_GAINS`], not range checked
    pub gain: usize,
    pub tuner_agc: bool,
    pub rtl_agc: bool,
    pub sampling_mode: SamplingMode,
    /// Accepted but has no effect, offset tuning is unsupported
    pub offset_tuning: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frequency: DEFAULT_FREQUENCY,
            frequency_correction: 0,
            gain: 0,
            tuner_agc: true,
            rtl_agc: false,
            sampling_mode: SamplingMode::default(),
            offset_tuning: false,
        }
    }
}

impl ReceiverConfig {
    /// The gain the current index points at, if it points anywhere
    pub fn gain_tenths_db(&self) -> Option<i32> {
        SUPPORTED_GAINS.get(self.gain).copied()
    }
}
