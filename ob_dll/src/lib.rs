//! # ob_dll
//!
//! A delay-locked loop (DLL) that tracks a USB audio device's sample clock
//! against the host's monotonic clock, so a downstream resampler can stay
//! phase-aligned without the device ever exposing its true clock.
//!
//! The engine owns exactly one [`DllOverwitch`] per active stream and calls
//! [`DllOverwitch::update`] once per completed device→host transfer, always
//! while already holding its own status lock — this type performs no
//! internal synchronization, the same way the engine's transfer buffers are
//! single-owner rather than self-locking.

/// Loop-filter bandwidth, in Hz, controlling how aggressively the estimate
/// tracks jitter in transfer arrival times versus smoothing it out. 2 Hz is
/// the customary starting point for audio clock DLLs: fast enough to follow
/// genuine drift over seconds, slow enough to reject per-transfer jitter.
const BANDWIDTH_HZ: f64 = 2.0;

/// Tracks the device's sample clock via a second-order delay-locked loop
/// (the classic two-pole/two-zero filter used to synchronize audio clocks
/// from a stream of arrival timestamps).
pub struct DllOverwitch {
    nominal_sample_rate: f64,
    initialized: bool,
    b: f64,
    c: f64,
    nominal_period: f64,
    t0: f64,
    t1: f64,
    t2: f64,
    period: f64,
    last_frames: u32,
}

impl DllOverwitch {
    /// Creates an estimator for a device whose nominal sample rate is
    /// `nominal_sample_rate` Hz. The loop starts uninitialized; call
    /// [`init`](Self::init) before the first [`update`](Self::update), and
    /// again on every re-arm (the engine re-seeds the DLL each time it
    /// transitions `BOOT -> WAIT`).
    pub fn new(nominal_sample_rate: f64) -> Self {
        let omega = 2.0 * std::f64::consts::PI * BANDWIDTH_HZ;
        Self {
            nominal_sample_rate,
            initialized: false,
            b: omega * std::f64::consts::SQRT_2,
            c: omega * omega,
            nominal_period: 0.0,
            t0: 0.0,
            t1: 0.0,
            t2: 0.0,
            period: 0.0,
            last_frames: 0,
        }
    }

    /// (Re)seeds the loop at `host_time` assuming a transfer of
    /// `frames_per_transfer` frames arrives on average every
    /// `frames_per_transfer / nominal_sample_rate` seconds.
    pub fn init(&mut self, frames_per_transfer: u32, host_time: f64) {
        let period = frames_per_transfer as f64 / self.nominal_sample_rate;
        self.nominal_period = period;
        self.period = period;
        self.t0 = host_time;
        self.t1 = host_time + period;
        self.t2 = host_time + 2.0 * period;
        self.last_frames = frames_per_transfer;
        self.initialized = true;
    }

    /// Feeds one (frame count, arrival time) observation into the loop.
    /// Must be called once per completed device→host transfer, in arrival
    /// order. No-op (beyond bookkeeping) until [`init`](Self::init) has run
    /// at least once.
    pub fn update(&mut self, frames_per_transfer: u32, host_time: f64) {
        if !self.initialized {
            self.init(frames_per_transfer, host_time);
            return;
        }

        let error = host_time - self.t1;
        self.t0 = self.t1;
        self.t1 = self.t2;
        self.t2 += self.b * error + self.period;
        self.period += self.c * error;
        self.last_frames = frames_per_transfer;
    }

    /// The loop's current estimate of the device's true sample rate, in Hz,
    /// as measured against the host clock.
    pub fn estimated_rate(&self) -> f64 {
        if self.period <= 0.0 {
            return self.nominal_sample_rate;
        }
        self.last_frames as f64 / self.period
    }

    /// Ratio of the device's estimated rate to its nominal rate; `1.0` means
    /// the device is running exactly at its advertised rate. Feeds a
    /// downstream asynchronous resampler's conversion ratio.
    pub fn ratio(&self) -> f64 {
        self.estimated_rate() / self.nominal_sample_rate
    }

    /// Whether [`init`](Self::init) has run at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
