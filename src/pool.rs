//Scores candidate brackets against a realized outcome and picks the best entry of a pool.
//Every round is worth the same total (32 games-worth at the base unit), so a First Round pick is worth 1 and the
//champion is worth 32. Rounds are scored from the Championship down, which lets a candidate be dropped as soon as
//it can no longer catch the current best.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bracket::Bracket;
use crate::error::{SimError, SimResult};
use crate::topology::Round;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_points_unit")]
    pub points_unit: u32,
}

fn default_points_unit() -> u32 {
    1
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            points_unit: default_points_unit(),
        }
    }
}

impl ScoringConfig {
    /// The unit has to be positive and small enough that a perfect bracket
    /// still fits in a `u32`.
    pub fn validate(&self) -> SimResult<()> {
        let games = Round::ALL.len() as u32 * 32;
        match games.checked_mul(self.points_unit) {
            Some(_) if self.points_unit > 0 => Ok(()),
            _ => Err(SimError::InvalidPointsUnit(self.points_unit)),
        }
    }

    /// Points for one correct pick in `round`.
    pub fn game_value(&self, round: Round) -> u32 {
        self.points_unit << round.index()
    }

    pub fn round_value(&self) -> u32 {
        32 * self.points_unit
    }

    pub fn max_score(&self) -> u32 {
        Round::ALL.len() as u32 * self.round_value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketScore {
    /// Points from the rounds actually scored.
    pub score: u32,
    pub beats_current_best: bool,
    /// 6 for a full pass, fewer when scoring stopped early.
    pub rounds_scored: usize,
}

/// Number of games in `round` where both brackets have the same winner.
pub fn correct_games(actual: &Bracket, candidate: &Bracket, round: Round) -> usize {
    let actual_games = actual.sorted_round(round);
    let candidate_games = candidate.sorted_round(round);
    actual_games
        .iter()
        .flatten()
        .zip(candidate_games.iter().flatten())
        .filter(|(a, c)| a.winner_team().key() == c.winner_team().key())
        .count()
}

/// Score `candidate` against `actual`, giving up once even a perfect finish
/// could not beat `current_best`.
pub fn score_bracket(actual: &Bracket, candidate: &Bracket, current_best: u32, config: &ScoringConfig) -> BracketScore {
    let mut score = 0;
    let mut max_possible = config.max_score();
    for (scored, round) in Round::ALL.iter().rev().enumerate() {
        let round_score = correct_games(actual, candidate, *round) as u32 * config.game_value(*round);
        score += round_score;
        max_possible -= config.round_value() - round_score;
        if max_possible <= current_best {
            return BracketScore {
                score,
                beats_current_best: false,
                rounds_scored: scored + 1,
            };
        }
    }
    BracketScore {
        score,
        beats_current_best: score > current_best,
        rounds_scored: Round::ALL.len(),
    }
}

/// Full score, no early exit.
pub fn full_score(actual: &Bracket, candidate: &Bracket, config: &ScoringConfig) -> u32 {
    Round::ALL
        .iter()
        .map(|round| correct_games(actual, candidate, *round) as u32 * config.game_value(*round))
        .sum()
}

/// Full scores of every pool entry, in pool order.
pub fn score_pool(actual: &Bracket, pool: &[Bracket], config: &ScoringConfig) -> SimResult<Vec<u32>> {
    config.validate()?;
    Ok(pool.par_iter().map(|candidate| full_score(actual, candidate, config)).collect())
}

#[derive(Debug, Clone, Copy)]
pub struct BestBracket<'a> {
    pub index: usize,
    pub score: u32,
    pub bracket: &'a Bracket,
}

/// First entry with the strictly highest score. When nothing scores above
/// zero the first entry is returned with score 0.
pub fn get_best_bracket<'a>(actual: &Bracket, pool: &'a [Bracket], config: &ScoringConfig) -> SimResult<BestBracket<'a>> {
    config.validate()?;
    let first = pool.first().ok_or(SimError::EmptyPool)?;
    let mut best = BestBracket {
        index: 0,
        score: 0,
        bracket: first,
    };
    for (index, candidate) in pool.iter().enumerate() {
        let result = score_bracket(actual, candidate, best.score, config);
        if result.beats_current_best {
            best = BestBracket {
                index,
                score: result.score,
                bracket: candidate,
            };
        }
    }
    Ok(best)
}

/// A realized bracket and the pool entry that did best against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolOutcome {
    pub actual_result: Bracket,
    pub best_bracket: Bracket,
    pub best_score: u32,
    pub best_index: usize,
    pub created: DateTime<Utc>,
}

impl PoolOutcome {
    pub fn select(actual: Bracket, pool: &[Bracket], config: &ScoringConfig) -> SimResult<PoolOutcome> {
        let best = get_best_bracket(&actual, pool, config)?;
        Ok(PoolOutcome {
            best_bracket: best.bracket.clone(),
            best_score: best.score,
            best_index: best.index,
            actual_result: actual,
            created: Utc::now(),
        })
    }
}
