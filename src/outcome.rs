// Per-game outcome models. Every team in a field carries either a rating or a
// set of per-round selection odds; a game between two teams is decided with
// whichever model both of them use.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::game_result::Winner;
use crate::ingest::{Team, TeamModel};
use crate::topology::Round;

pub const DEFAULT_RATING_SCALE: f64 = 400.0;

/// How a rating difference turns into a win probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum RatingCurve {
    /// Fair coin regardless of rating. Ratings are carried but ignored.
    Uniform,
    /// Elo logistic: 1 / (1 + 10^(-(r1 - r2) / scale)).
    Logistic { scale: f64 },
}

impl Default for RatingCurve {
    fn default() -> Self {
        RatingCurve::Logistic {
            scale: DEFAULT_RATING_SCALE,
        }
    }
}

impl RatingCurve {
    pub fn validate(&self) -> SimResult<()> {
        match *self {
            RatingCurve::Logistic { scale } if !(scale.is_finite() && scale > 0.0) => {
                Err(SimError::InvalidRatingScale(scale))
            }
            _ => Ok(()),
        }
    }

    pub fn probability(&self, rating1: f64, rating2: f64) -> f64 {
        match *self {
            RatingCurve::Uniform => 0.5,
            RatingCurve::Logistic { scale } => 1.0 / (1.0 + 10f64.powf(-(rating1 - rating2) / scale)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeModel {
    pub rating_curve: RatingCurve,
}

impl OutcomeModel {
    pub fn new(rating_curve: RatingCurve) -> OutcomeModel {
        OutcomeModel { rating_curve }
    }

    /// Probability that `team1` beats `team2` in `round`.
    pub fn win_probability(&self, team1: &Team, team2: &Team, round: Round) -> SimResult<f64> {
        match (&team1.model, &team2.model) {
            (TeamModel::Rating { rating: r1 }, TeamModel::Rating { rating: r2 }) => {
                self.rating_curve.validate()?;
                Ok(self.rating_curve.probability(*r1, *r2))
            }
            (TeamModel::SelectionOdds { odds: o1 }, TeamModel::SelectionOdds { odds: o2 }) => {
                let (p1, p2) = (o1[round.index()], o2[round.index()]);
                let total = p1 + p2;
                if total <= 0.0 {
                    return Err(SimError::DegenerateOdds {
                        round,
                        team1: team1.name.clone(),
                        team2: team2.name.clone(),
                    });
                }
                Ok(p1 / total)
            }
            _ => Err(SimError::ModelMismatch {
                team1: team1.name.clone(),
                team2: team2.name.clone(),
            }),
        }
    }

    pub fn decide<R: Rng + ?Sized>(&self, team1: &Team, team2: &Team, round: Round, rng: &mut R) -> SimResult<Winner> {
        let p = self.win_probability(team1, team2, round)?;
        let draw: f64 = rng.gen();
        Ok(if draw < p { Winner::Team1 } else { Winner::Team2 })
    }
}

/// Draw an index with probability proportional to its weight. Walks the
/// running sum and takes the first entry whose cumulative weight reaches the
/// draw; falls back to the last weighted index on rounding and to 0 when
/// nothing has weight.
pub fn sample_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    if weights.is_empty() || total <= 0.0 {
        return 0;
    }
    let draw = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (idx, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative >= draw && *w > 0.0 {
            return idx;
        }
    }
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
}
