// Error types shared by the simulation core.
// Everything here is "fail loudly": the core never pads, drops or guesses.

use thiserror::Error;

use crate::ingest::{Conference, TeamKey};
use crate::topology::Round;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    #[error("expected {expected} teams, found {found}")]
    TeamCount { expected: usize, found: usize },

    #[error("{conference} has {found} teams, expected 16")]
    ConferenceSize { conference: Conference, found: usize },

    #[error("seed {seed} appears more than once in {conference}")]
    DuplicateSeed { conference: Conference, seed: u8 },

    #[error("seed {seed} for {team} is outside 1-16")]
    SeedOutOfRange { team: String, seed: u8 },

    #[error("invalid selection odds for {team}: {reason}")]
    InvalidOdds { team: String, reason: String },

    #[error("invalid rating for {team}: {rating}")]
    InvalidRating { team: String, rating: f64 },

    #[error("unrecognized {kind} variant '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("rating scale must be a positive finite number, got {0}")]
    InvalidRatingScale(f64),

    #[error("{team} uses a different model than the rest of the field")]
    MixedModels { team: String },

    #[error("points unit {0} is out of range")]
    InvalidPointsUnit(u32),

    #[error("{round} has no winner from {conference}")]
    MissingConferenceWinner { round: Round, conference: Conference },

    #[error("malformed {round} results: {reason}")]
    MalformedRound { round: Round, reason: String },

    #[error("cannot decide {team1} vs {team2}: the teams use different models")]
    ModelMismatch { team1: String, team2: String },

    #[error("{team} has no selection odds")]
    MissingSelectionOdds { team: String },

    #[error("no eligible {round} opponent left for {team}")]
    NoEligibleOpponent { round: Round, team: String },

    #[error("{round} odds for {team1} and {team2} are both zero")]
    DegenerateOdds { round: Round, team1: String, team2: String },

    #[error("candidate pool is empty")]
    EmptyPool,

    #[error("unknown team {0}")]
    UnknownTeam(String),

    #[error("team {0} is not registered in this field")]
    UnregisteredTeam(TeamKey),

    #[error("bracket invariant violated: {0}")]
    InvalidBracket(String),
}

pub type SimResult<T> = Result<T, SimError>;
