// Builds a bracket from the Championship back to the First Round. Every team
// known to win a game in some round gets a loser drawn from the teams it could
// have met there, weighted by how likely each of them was to reach that game.

use fnv::FnvHashSet;
use rand::Rng;

use crate::bracket::Bracket;
use crate::error::{SimError, SimResult};
use crate::game_result::{GameInformation, GameResult, Winner};
use crate::ingest::{RcTeam, TeamKey, TournamentInfo};
use crate::outcome::sample_index;
use crate::topology::{semifinal_of, topology_for, Round};

/// Where backward generation starts.
#[derive(Debug, Clone)]
pub enum Start {
    /// Draw the champion from the whole field by championship odds.
    Sampled,
    /// Fixed champion; the runner-up is drawn.
    Champion(TeamKey),
    /// Fixed Championship game, kept as given.
    Final(GameResult),
}

pub fn generate_backward<R: Rng + ?Sized>(field: &TournamentInfo, start: &Start, rng: &mut R) -> SimResult<Bracket> {
    if let Some(team) = field.teams().iter().find(|t| t.model.odds().is_none()) {
        return Err(SimError::MissingSelectionOdds { team: team.name.clone() });
    }

    let mut placed: FnvHashSet<TeamKey> = FnvHashSet::default();
    let final_game = match start {
        Start::Final(game) => registered_final(field, game)?,
        Start::Champion(key) => {
            let champion = RcTeam::clone(field.require(*key)?);
            placed.insert(champion.key());
            pick_game(field, Round::Championship, &champion, &mut placed, rng)?
        }
        Start::Sampled => {
            let weights: Vec<f64> = field
                .teams()
                .iter()
                .map(|t| t.model.odds_for(Round::Championship).unwrap_or_default())
                .collect();
            let champion = RcTeam::clone(&field.teams()[sample_index(&weights, rng)]);
            placed.insert(champion.key());
            pick_game(field, Round::Championship, &champion, &mut placed, rng)?
        }
    };
    placed.insert(final_game.team1.key());
    placed.insert(final_game.team2.key());

    // rounds[i] ends up holding Round::ALL[i]
    let mut rounds: Vec<Vec<GameResult>> = vec![Vec::new(); Round::ALL.len()];
    rounds[Round::Championship.index()].push(final_game);

    for round in Round::ALL[..5].iter().rev() {
        let winners: Vec<RcTeam> = rounds[round.index() + 1]
            .iter()
            .flat_map(|g| [RcTeam::clone(&g.team1), RcTeam::clone(&g.team2)])
            .collect();
        let mut games: Vec<GameResult> = Vec::with_capacity(winners.len());
        for winner in &winners {
            games.push(pick_game(field, *round, winner, &mut placed, rng)?);
        }
        games.sort_by_key(|g| (g.conference(), g.game_number()));
        rounds[round.index()] = games;
    }

    Bracket::from_rounds(rounds)
}

// The game `winner` wins in `round`, against a loser not yet in the bracket.
fn pick_game<R: Rng + ?Sized>(
    field: &TournamentInfo,
    round: Round,
    winner: &RcTeam,
    placed: &mut FnvHashSet<TeamKey>,
    rng: &mut R,
) -> SimResult<GameResult> {
    let topology = topology_for(round);
    let candidates: Vec<&RcTeam> = field
        .teams()
        .iter()
        .filter(|t| !placed.contains(&t.key()) && topology.is_potential_opponent(winner, t))
        .collect();
    if candidates.is_empty() {
        return Err(SimError::NoEligibleOpponent {
            round,
            team: winner.name.clone(),
        });
    }

    // In the First Round the opponent is fixed; later the loser must have
    // survived the round before.
    let loser = match round.previous() {
        None => candidates[0],
        Some(prev) => {
            let weights: Vec<f64> = candidates
                .iter()
                .map(|t| t.model.odds_for(prev).unwrap_or_default())
                .collect();
            candidates[sample_index(&weights, rng)]
        }
    };
    placed.insert(loser.key());

    let info = GameInformation {
        round,
        game_number: topology.game_number(winner),
        conference: if round.is_regional() { Some(winner.conference) } else { None },
    };
    Ok(GameResult::new(RcTeam::clone(winner), RcTeam::clone(loser), Winner::Team1, info))
}

// A caller-supplied final, rebuilt on this field's teams.
fn registered_final(field: &TournamentInfo, game: &GameResult) -> SimResult<GameResult> {
    if game.round() != Round::Championship {
        return Err(SimError::InvalidBracket(format!(
            "backward generation needs a Championship game, got a {} game",
            game.round()
        )));
    }
    let team1 = field.require(game.team1.key())?;
    let team2 = field.require(game.team2.key())?;
    if semifinal_of(team1.conference) == semifinal_of(team2.conference) {
        return Err(SimError::InvalidBracket(format!(
            "{} and {} cannot meet in the Championship",
            team1.key(),
            team2.key()
        )));
    }
    let info = GameInformation {
        round: Round::Championship,
        game_number: 1,
        conference: None,
    };
    Ok(GameResult::new(RcTeam::clone(team1), RcTeam::clone(team2), game.winner, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Conference, ModelKind, Team};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn odds_field() -> TournamentInfo {
        TournamentInfo::default_field(ModelKind::SelectionOdds)
    }

    // Forward replay that picks whichever team the bracket recorded as winner.
    fn replay(field: &TournamentInfo, bracket: &Bracket) -> Bracket {
        let winners: FnvHashSet<(Round, TeamKey)> = bracket
            .all_games()
            .map(|g| (g.round(), g.winner_team().key()))
            .collect();
        Bracket::simulate_with(field, |team1: &Team, _team2: &Team, round| {
            Ok(if winners.contains(&(round, team1.key())) { Winner::Team1 } else { Winner::Team2 })
        })
        .unwrap()
    }

    #[test]
    fn test_backward_replays_forward() {
        let field = odds_field();
        let mut rng = ChaCha8Rng::seed_from_u64(2021);
        for _ in 0..20 {
            let bracket = generate_backward(&field, &Start::Sampled, &mut rng).unwrap();
            assert_eq!(bracket.all_games().count(), 63);
            assert!(replay(&field, &bracket).same_results(&bracket));
        }
    }

    #[test]
    fn test_winner_is_always_slot_one() {
        let field = odds_field();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let bracket = generate_backward(&field, &Start::Sampled, &mut rng).unwrap();
        assert!(bracket.all_games().all(|g| g.winner == Winner::Team1));
    }

    #[test]
    fn test_fixed_champion() {
        let field = odds_field();
        let key = TeamKey { conference: Conference::Midwest, seed: 12 };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let bracket = generate_backward(&field, &Start::Champion(key), &mut rng).unwrap();
        assert_eq!(bracket.champion().key(), key);
        let runner_up = bracket.runner_up();
        assert!(matches!(runner_up.conference, Conference::East | Conference::West));
    }

    #[test]
    fn test_fixed_final_is_kept() {
        let field = odds_field();
        let east = field.require(TeamKey { conference: Conference::East, seed: 3 }).unwrap();
        let south = field.require(TeamKey { conference: Conference::South, seed: 7 }).unwrap();
        let info = GameInformation {
            round: Round::Championship,
            game_number: 1,
            conference: None,
        };
        let final_game = GameResult::new(RcTeam::clone(east), RcTeam::clone(south), Winner::Team2, info);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let bracket = generate_backward(&field, &Start::Final(final_game.clone()), &mut rng).unwrap();
        assert!(bracket.championship().same_result(&final_game));
        assert_eq!(bracket.champion().name, "Oral Roberts");
        assert!(replay(&field, &bracket).same_results(&bracket));
    }

    #[test]
    fn test_final_from_same_semifinal_is_rejected() {
        let field = odds_field();
        let east = field.require(TeamKey { conference: Conference::East, seed: 1 }).unwrap();
        let west = field.require(TeamKey { conference: Conference::West, seed: 1 }).unwrap();
        let info = GameInformation {
            round: Round::Championship,
            game_number: 1,
            conference: None,
        };
        let bad = GameResult::new(RcTeam::clone(east), RcTeam::clone(west), Winner::Team1, info);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            generate_backward(&field, &Start::Final(bad), &mut rng),
            Err(SimError::InvalidBracket(_))
        ));
    }

    #[test]
    fn test_rating_field_is_rejected() {
        let field = TournamentInfo::default_field(ModelKind::Rating);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            generate_backward(&field, &Start::Sampled, &mut rng),
            Err(SimError::MissingSelectionOdds { .. })
        ));
    }

    #[test]
    fn test_zero_odds_never_reach_the_final() {
        // Only West 14 can survive the Final Four among West/East teams.
        let teams: Vec<Team> = odds_field()
            .teams()
            .iter()
            .map(|t| {
                let mut team = Team::clone(t);
                if matches!(t.conference, Conference::East | Conference::West) {
                    let p = if t.key() == (TeamKey { conference: Conference::West, seed: 14 }) { 0.5 } else { 0.0 };
                    team.model = crate::ingest::TeamModel::SelectionOdds { odds: [p; 6] };
                }
                team
            })
            .collect();
        let field = TournamentInfo::new(teams).unwrap();
        let key = TeamKey { conference: Conference::South, seed: 1 };
        let mut rng = ChaCha8Rng::seed_from_u64(77);
        for _ in 0..10 {
            let bracket = generate_backward(&field, &Start::Champion(key), &mut rng).unwrap();
            assert_eq!(bracket.runner_up().name, "Suffolk");
        }
    }

    proptest! {
        #[test]
        fn prop_backward_output_is_a_valid_bracket(seed in any::<u64>()) {
            let field = odds_field();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let bracket = generate_backward(&field, &Start::Sampled, &mut rng).unwrap();
            prop_assert!(replay(&field, &bracket).same_results(&bracket));
            prop_assert_eq!(bracket.placements().len(), 64);
        }
    }
}
