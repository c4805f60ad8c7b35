//! RainTree target selection.
//!
//! At level `L` of a tree with `max` levels, only the first `n * (2/3)^(max - L)` peers of the
//! view take part. The node sends to the peers at 1/3 and 2/3 of that shrunken list and then
//! demotes itself to level `L - 1`. All arithmetic is done on integers so that the floors are
//! exact.

use super::peers_view::SortedPeersView;
use crate::address::Address;

pub const FIRST_MSG_TARGET_PERCENTAGE: (u128, u128) = (1, 3);
pub const SECOND_MSG_TARGET_PERCENTAGE: (u128, u128) = (2, 3);
pub const SHRINKAGE_PERCENTAGE: (u128, u128) = (2, 3);
pub const MAX_LEVELS_LOG_BASE: usize = 3;

/// `ceil(log3(size))`, with `0` for a view of at most one peer.
pub fn max_num_levels(size: usize) -> u32 {
    let mut levels = 0;
    let mut reach: usize = 1;
    while reach < size {
        reach = reach.saturating_mul(MAX_LEVELS_LOG_BASE);
        levels += 1;
    }
    levels
}

/// `floor(size * (2/3)^(max_levels - level))`.
pub fn effective_size(size: usize, max_levels: u32, level: u32) -> usize {
    let (num, den) = SHRINKAGE_PERCENTAGE;
    // The product is floored once at the end, so the numerator and denominator are kept apart
    let mut n = size as u128;
    let mut d: u128 = 1;
    for _ in level..max_levels {
        match (n.checked_mul(num), d.checked_mul(den)) {
            (Some(next_n), Some(next_d)) => {
                n = next_n;
                d = next_d;
            }
            // Deeper than any view of `usize` peers can be
            _ => return 0,
        }
    }
    (n / d) as usize
}

/// A peer chosen to receive a frame at some level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub service_url: String,
    pub level: u32,
    /// `(numerator, denominator)` of the position in the shrunken list.
    pub percentage: (u128, u128),
    pub index: usize,
    pub effective_size: usize,
    pub is_self: bool,
    /// `None` for a self target.
    pub address: Option<Address>,
}

fn target_at_percentage(
    view: &SortedPeersView,
    level: u32,
    percentage: (u128, u128),
    effective_size: usize,
) -> Option<Target> {
    let index = (effective_size as u128 * percentage.0 / percentage.1) as usize;
    let peer = view.peers().get(index)?;
    let is_self = index == 0 && !view.is_client_only();
    Some(Target {
        service_url: peer.service_url.clone(),
        level,
        percentage,
        index,
        effective_size,
        is_self,
        address: if is_self { None } else { Some(peer.address) },
    })
}

/// The two targets at `level`; empty at the terminal level 0.
pub fn targets_at_level(view: &SortedPeersView, level: u32) -> Vec<Target> {
    if level == 0 {
        return vec![];
    }
    let effective_size = effective_size(view.len(), view.max_num_levels(), level);
    vec![FIRST_MSG_TARGET_PERCENTAGE, SECOND_MSG_TARGET_PERCENTAGE]
        .into_iter()
        .filter_map(|percentage| target_at_percentage(view, level, percentage, effective_size))
        .collect()
}
