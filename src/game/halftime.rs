//! Half-time side recomputation
//!
//! Resolves which side a team should currently be playing from the rounds
//! played so far, independent of the engine's transient team assignment.

use serde::{Deserialize, Serialize};

use crate::game::constants::rules;
use crate::game::state::{MatchError, Side};

/// Engine round caps used for half-time math
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundLimits {
    /// Regulation round cap
    pub max_rounds: u32,
    /// Overtime round cap (one full overtime)
    pub overtime_max_rounds: u32,
}

impl Default for RoundLimits {
    fn default() -> Self {
        Self {
            max_rounds: rules::DEFAULT_MAX_ROUNDS,
            overtime_max_rounds: rules::DEFAULT_OVERTIME_MAX_ROUNDS,
        }
    }
}

/// Whether `current_round` (1-based) is past the side switch.
///
/// Regulation: past half of `max_rounds`. Overtime: the position inside the
/// current overtime block is compared against a third of the overtime cap.
/// The overtime split is a fixed policy and must not be "corrected" to a half.
pub fn is_half_time(current_round: u32, limits: RoundLimits) -> Result<bool, MatchError> {
    let max = limits.max_rounds;
    if current_round <= max {
        return Ok(current_round > max / 2);
    }

    let overtime = limits.overtime_max_rounds;
    if overtime == 0 {
        return Err(MatchError::InvalidOvertimeLimit(overtime));
    }
    let position = ((current_round - max - 1) % overtime) + 1;
    Ok(position > overtime / 3)
}

/// Side a team with `starting_side` plays after `rounds_played` rounds
pub fn resolve_effective_side(
    starting_side: Side,
    rounds_played: u32,
    limits: RoundLimits,
) -> Result<Side, MatchError> {
    let current_round = rounds_played.saturating_add(1);
    if is_half_time(current_round, limits)? {
        Ok(starting_side.opposite())
    } else {
        Ok(starting_side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: RoundLimits = RoundLimits {
        max_rounds: 24,
        overtime_max_rounds: 6,
    };

    #[test]
    fn test_first_half() {
        assert!(!is_half_time(1, LIMITS).unwrap());
        assert!(!is_half_time(12, LIMITS).unwrap());
    }

    #[test]
    fn test_second_half() {
        assert!(is_half_time(13, LIMITS).unwrap());
        assert!(is_half_time(24, LIMITS).unwrap());
    }

    #[test]
    fn test_overtime_cycle() {
        // Positions 1..=6 inside the overtime block; switch once past 6 / 3 = 2
        let expected = [false, false, true, true, true, true];
        for (offset, want) in expected.iter().enumerate() {
            let round = 25 + offset as u32;
            assert_eq!(is_half_time(round, LIMITS).unwrap(), *want, "round {}", round);
        }
    }

    #[test]
    fn test_overtime_cycle_boundary() {
        // Round 30 is the 6th (last) overtime round; round 31 opens the next block
        assert!(is_half_time(30, LIMITS).unwrap());
        assert!(!is_half_time(31, LIMITS).unwrap());
        assert!(!is_half_time(32, LIMITS).unwrap());
        assert!(is_half_time(33, LIMITS).unwrap());
        assert!(is_half_time(36, LIMITS).unwrap());
        assert!(!is_half_time(37, LIMITS).unwrap());
    }

    #[test]
    fn test_zero_overtime_is_error() {
        let limits = RoundLimits {
            max_rounds: 24,
            overtime_max_rounds: 0,
        };
        assert!(!is_half_time(5, limits).unwrap());
        assert_eq!(
            is_half_time(25, limits),
            Err(MatchError::InvalidOvertimeLimit(0))
        );
    }

    #[test]
    fn test_resolve_effective_side() {
        // 12 rounds played -> playing round 13 -> switched
        assert_eq!(
            resolve_effective_side(Side::Attack, 12, LIMITS).unwrap(),
            Side::Defense
        );
        assert_eq!(
            resolve_effective_side(Side::Attack, 11, LIMITS).unwrap(),
            Side::Attack
        );
        // 29 rounds played -> playing round 30
        assert_eq!(
            resolve_effective_side(Side::Defense, 29, LIMITS).unwrap(),
            Side::Attack
        );
        // 30 rounds played -> round 31, start of a new overtime block
        assert_eq!(
            resolve_effective_side(Side::Defense, 30, LIMITS).unwrap(),
            Side::Defense
        );
    }

    #[test]
    fn test_default_limits() {
        assert_eq!(RoundLimits::default(), LIMITS);
    }
}
