//! Reward shaping for maze episodes.
//!
//! Every move earns either the safe-step reward or, if a camera saw the
//! agent land, the capture penalty. An escape additionally pays a bonus on
//! the trailing transitions of the walked route, growing towards the exit.

use crate::config::RewardConfig;

/// Reward for one move.
pub const fn step_reward(captured: bool, config: &RewardConfig) -> f64 {
    if captured {
        config.capture
    } else {
        config.safe_step
    }
}

/// Escape bonuses for a route of `route_len` cells.
///
/// Transition `i` goes from cell `i` to cell `i + 1`. Transitions whose
/// start lies in the last `escape_window` cells are rewarded with
/// `escape_base + escape_increment * k`, where `k = i + escape_window -
/// route_len`. Returns `(transition index, bonus)` pairs in route order.
pub fn escape_bonuses(route_len: usize, config: &RewardConfig) -> Vec<(usize, f64)> {
    let first = route_len.saturating_sub(config.escape_window);
    let last = route_len.saturating_sub(1);
    (first..last)
        .map(|i| {
            let k = i
                .saturating_add(config.escape_window)
                .saturating_sub(route_len);
            let k = u32::try_from(k).unwrap_or(u32::MAX);
            let bonus = config
                .escape_increment
                .mul_add(f64::from(k), config.escape_base);
            (i, bonus)
        })
        .collect()
}
