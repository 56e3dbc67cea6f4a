//! Generators for synthetic classification and reflectance bands.
//!
//! Bands are `Vec<f32>` in row-major order, matching how decoded rasters
//! are held in memory.

/// Fmask value for overlap / unclassified pixels.
pub const FMASK_OVERLAP: f32 = 0.0;
/// Fmask value for clear pixels.
pub const FMASK_CLEAR: f32 = 1.0;
/// Fmask value for cloud pixels.
pub const FMASK_CLOUD: f32 = 2.0;

/// Creates an fmask band with the given number of overlap, clear and cloud pixels.
///
/// Pixels are laid out in that order.
///
/// # Example
///
/// ```
/// use test_utils::fmask_band;
///
/// let band = fmask_band(10, 81, 9);
/// assert_eq!(band.len(), 100);
/// assert_eq!(band[0], 0.0);
/// assert_eq!(band[10], 1.0);
/// assert_eq!(band[99], 2.0);
/// ```
pub fn fmask_band(overlap: usize, clear: usize, cloud: usize) -> Vec<f32> {
    let mut band = Vec::with_capacity(overlap + clear + cloud);
    band.extend(std::iter::repeat(FMASK_OVERLAP).take(overlap));
    band.extend(std::iter::repeat(FMASK_CLEAR).take(clear));
    band.extend(std::iter::repeat(FMASK_CLOUD).take(cloud));
    band
}

/// Creates a band where every pixel holds `value`.
pub fn constant_band(len: usize, value: f32) -> Vec<f32> {
    vec![value; len]
}

/// Creates a reflectance-like band with predictable values.
///
/// Each pixel value is `base + index`, which makes per-pixel assertions
/// easy after masking.
pub fn ramp_band(len: usize, base: f32) -> Vec<f32> {
    (0..len).map(|i| base + i as f32).collect()
}
