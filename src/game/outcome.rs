//! Knife round result
//!
//! Decides the knife round winner from each side's survivors.

use rand::Rng;
use serde::Serialize;

use crate::game::state::Side;
use crate::host::adapter::EnginePlayer;

/// Survivor totals for one side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideTally {
    pub alive: u32,
    pub health: u32,
}

impl SideTally {
    pub fn new(alive: u32, health: u32) -> Self {
        Self { alive, health }
    }

    /// Count one player; a player is alive iff health > 0
    pub fn record(&mut self, health: i32) {
        if health > 0 {
            self.alive += 1;
            self.health += health as u32;
        }
    }
}

/// Which comparison settled the round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tiebreak {
    AliveCount,
    Health,
    CoinFlip,
}

/// Knife round result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnifeOutcome {
    pub winner: Side,
    pub decided_by: Tiebreak,
    pub attack: SideTally,
    pub defense: SideTally,
}

/// Tally connected players per engine side (bots and humans both count)
pub fn tally_sides(players: &[EnginePlayer]) -> (SideTally, SideTally) {
    let mut attack = SideTally::default();
    let mut defense = SideTally::default();

    for player in players.iter().filter(|p| p.is_connected) {
        match player.side {
            Some(Side::Attack) => attack.record(player.health),
            Some(Side::Defense) => defense.record(player.health),
            None => {}
        }
    }

    (attack, defense)
}

/// Winner by alive count, then total health, then a fair coin flip
pub fn evaluate_winner<R: Rng + ?Sized>(
    attack: SideTally,
    defense: SideTally,
    rng: &mut R,
) -> KnifeOutcome {
    let (winner, decided_by) = if attack.alive != defense.alive {
        let winner = if attack.alive > defense.alive {
            Side::Attack
        } else {
            Side::Defense
        };
        (winner, Tiebreak::AliveCount)
    } else if attack.health != defense.health {
        let winner = if attack.health > defense.health {
            Side::Attack
        } else {
            Side::Defense
        };
        (winner, Tiebreak::Health)
    } else {
        let winner = if rng.gen_bool(0.5) {
            Side::Attack
        } else {
            Side::Defense
        };
        (winner, Tiebreak::CoinFlip)
    };

    KnifeOutcome {
        winner,
        decided_by,
        attack,
        defense,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn engine_player(id: u64, side: Option<Side>, health: i32, connected: bool) -> EnginePlayer {
        EnginePlayer {
            id,
            name: format!("p{}", id),
            side,
            is_bot: id >= 100,
            is_connected: connected,
            health,
        }
    }

    #[test]
    fn test_alive_count_wins() {
        let outcome = evaluate_winner(SideTally::new(3, 150), SideTally::new(2, 200), &mut rng());
        assert_eq!(outcome.winner, Side::Attack);
        assert_eq!(outcome.decided_by, Tiebreak::AliveCount);
    }

    #[test]
    fn test_health_breaks_alive_tie() {
        let outcome = evaluate_winner(SideTally::new(2, 100), SideTally::new(2, 140), &mut rng());
        assert_eq!(outcome.winner, Side::Defense);
        assert_eq!(outcome.decided_by, Tiebreak::Health);
    }

    #[test]
    fn test_full_tie_picks_both_sides() {
        let mut rng = rng();
        let mut seen_attack = false;
        let mut seen_defense = false;

        for _ in 0..200 {
            let outcome = evaluate_winner(SideTally::new(1, 50), SideTally::new(1, 50), &mut rng);
            assert_eq!(outcome.decided_by, Tiebreak::CoinFlip);
            match outcome.winner {
                Side::Attack => seen_attack = true,
                Side::Defense => seen_defense = true,
            }
        }

        assert!(seen_attack && seen_defense);
    }

    #[test]
    fn test_deterministic_for_fixed_inputs() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = evaluate_winner(SideTally::new(0, 0), SideTally::new(1, 1), &mut rng);
            assert_eq!(outcome.winner, Side::Defense);
        }
    }

    #[test]
    fn test_tally_sides() {
        let players = vec![
            engine_player(1, Some(Side::Attack), 100, true),
            engine_player(2, Some(Side::Attack), 0, true),
            engine_player(100, Some(Side::Attack), 35, true),
            engine_player(3, Some(Side::Defense), 80, true),
            engine_player(4, Some(Side::Defense), 90, false),
            engine_player(5, None, 100, true),
        ];

        let (attack, defense) = tally_sides(&players);
        assert_eq!(attack, SideTally::new(2, 135));
        assert_eq!(defense, SideTally::new(1, 80));
    }

    #[test]
    fn test_negative_health_is_dead() {
        let mut tally = SideTally::default();
        tally.record(-20);
        tally.record(0);
        assert_eq!(tally, SideTally::default());
    }
}
