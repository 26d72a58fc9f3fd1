//! Average-degree statistic over the graph's running totals.

/// Precision used when the caller does not pick one.
pub const DEFAULT_DECIMALS: u32 = 3;

/// Beyond this an `f64` cannot represent the rounded digits anyway.
pub const MAX_DECIMALS: u32 = 15;

/// Distinct node and edge totals captured at one serialization point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
}

impl GraphStats {
    /// `2E / N` rounded half-up to `decimals` places; `0` for an empty graph.
    pub fn average_degree(&self, decimals: u32) -> f64 {
        if self.nodes == 0 {
            return 0.0;
        }
        round_half_up(2 * self.edges as u128, self.nodes as u128, decimals)
    }
}

/// Round `numerator / denominator` to `decimals` places, halves away from zero.
///
/// Done in integer arithmetic so that exact halves (e.g. `0.0005`) are never
/// perturbed by binary floating point before rounding. `decimals` is clamped
/// to [`MAX_DECIMALS`].
pub fn round_half_up(numerator: u128, denominator: u128, decimals: u32) -> f64 {
    debug_assert!(denominator > 0);
    let scale = 10u128.pow(decimals.min(MAX_DECIMALS));
    // floor(x * scale + 1/2) for non-negative x
    let scaled = (2 * numerator * scale + denominator) / (2 * denominator);
    scaled as f64 / scale as f64
}
