//! # ob_resample
//!
//! The engine's emergency asynchronous-rate sample-rate converter, used only
//! when the p2o (host→device) ring underflows and the device still needs a
//! full transfer's worth of frames *now*. This wraps [`rubato`] behind a
//! single "N frames in, M frames out" call, mirroring `libsamplerate`'s
//! `src_simple` with `SRC_SINC_FASTEST`: any crate offering one-shot
//! asynchronous-rate conversion would satisfy the same contract.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Interpolation quality tuned for the fallback path: cheap, not pristine.
/// Mirrors `SRC_SINC_FASTEST` rather than the higher-order `SRC_SINC_BEST_QUALITY`
/// libsamplerate preset, since this path runs rarely and must not add latency.
fn fastest_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 64,
        f_cutoff: 0.9,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::Blackman,
    }
}

/// Error produced when the underlying converter cannot be built or run for
/// the requested frame counts.
#[derive(Debug)]
pub struct ResampleError(String);

impl std::fmt::Display for ResampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resample failed: {}", self.0)
    }
}

impl std::error::Error for ResampleError {}

/// Converts `available_frames` frames of interleaved `channels`-channel
/// audio in `input` up to `target_frames` frames, at ratio
/// `target_frames / available_frames`. Returns exactly `target_frames`
/// frames of interleaved output, zero-padding or truncating by at most a
/// few frames if the underlying converter's block size doesn't land
/// exactly on the target (callers should treat any such mismatch as worth
/// a log line, per the underflow-fallback contract).
pub fn resample_interleaved(
    input: &[f32],
    channels: usize,
    available_frames: usize,
    target_frames: usize,
) -> Result<Vec<f32>, ResampleError> {
    if available_frames == 0 || target_frames == 0 {
        return Err(ResampleError("zero-length conversion requested".into()));
    }
    if input.len() < available_frames * channels {
        return Err(ResampleError("input shorter than available_frames * channels".into()));
    }

    let ratio = target_frames as f64 / available_frames as f64;

    let mut deinterleaved = vec![Vec::with_capacity(available_frames); channels];
    for frame in 0..available_frames {
        for ch in 0..channels {
            deinterleaved[ch].push(input[frame * channels + ch]);
        }
    }

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, fastest_params(), available_frames, channels)
        .map_err(|e| ResampleError(e.to_string()))?;

    let output = resampler
        .process(&deinterleaved, None)
        .map_err(|e| ResampleError(e.to_string()))?;

    let produced_frames = output.first().map(|c| c.len()).unwrap_or(0);

    let mut interleaved = vec![0.0f32; target_frames * channels];
    let copy_frames = produced_frames.min(target_frames);
    for frame in 0..copy_frames {
        for ch in 0..channels {
            interleaved[frame * channels + ch] = output[ch][frame];
        }
    }

    Ok(interleaved)
}
