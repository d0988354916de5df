//! Pure calculation functions for dimensions and encode attempts.
//!
//! All functions here are pure and testable without any I/O or images.

/// Per-attempt shrink factor applied to both quality and scale.
pub const STEP_FACTOR: f64 = 0.95;

/// Fit dimensions within a longer-edge limit, preserving aspect ratio.
///
/// Never upscales: images already within the limit are returned unchanged.
///
/// ```
/// # use batchpress::imaging::fit_within;
/// assert_eq!(fit_within((4000, 3000), 1680), (1680, 1260));
/// assert_eq!(fit_within((800, 600), 1680), (800, 600));
/// ```
pub fn fit_within(original: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = original;
    let longer = w.max(h);
    if longer <= max_edge || longer == 0 {
        return original;
    }
    let ratio = max_edge as f64 / longer as f64;
    if w >= h {
        (max_edge, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        (((w as f64 * ratio).round() as u32).max(1), max_edge)
    }
}

/// Scale dimensions by a factor, never below 1×1.
pub fn scale_dimensions(dims: (u32, u32), scale: f64) -> (u32, u32) {
    let (w, h) = dims;
    (
        ((w as f64 * scale).round() as u32).max(1),
        ((h as f64 * scale).round() as u32).max(1),
    )
}

/// One encode attempt: quality (ignored by lossless encoders) and scale
/// relative to the fitted dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attempt {
    pub quality: u32,
    pub scale: f64,
}

/// Plan the sequence of encode attempts.
///
/// The first attempt uses the initial quality at full scale. Each following
/// attempt multiplies the scale by [`STEP_FACTOR`], and for lossy formats the
/// quality as well.
pub fn plan_attempts(initial_quality: u32, lossy: bool, max_iterations: u32) -> Vec<Attempt> {
    (0..max_iterations.max(1))
        .map(|i| {
            let factor = STEP_FACTOR.powi(i as i32);
            let quality = if lossy {
                ((initial_quality as f64 * factor).round() as u32).clamp(1, 100)
            } else {
                initial_quality
            };
            Attempt {
                quality,
                scale: factor,
            }
        })
        .collect()
}

/// Progress percentage after `completed` of `total` attempts.
///
/// Stays below 100 so only the final "done" report reaches it.
pub fn attempt_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed * 100) / (total + 1)).min(99) as u8
}

/// True when a width is strictly greater than the threshold.
pub fn is_oversized(width: u32, threshold: u32) -> bool {
    width > threshold
}
