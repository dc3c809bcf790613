// One decided game of the tournament. A game only knows its two teams, which
// slot won and where it sits in the draw; the Bracket owns the ordering.

use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::ingest::{Conference, RcTeam, Team};
use crate::topology::Round;

/// Which slot won. Serialized as the integer 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Winner {
    Team1,
    Team2,
}

impl TryFrom<u8> for Winner {
    type Error = SimError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Winner::Team1),
            2 => Ok(Winner::Team2),
            _ => Err(SimError::UnknownVariant {
                kind: "winner",
                value: value.to_string(),
            }),
        }
    }
}

impl From<Winner> for u8 {
    fn from(winner: Winner) -> u8 {
        match winner {
            Winner::Team1 => 1,
            Winner::Team2 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInformation {
    pub round: Round,
    /// 1-based, unique within round and conference.
    pub game_number: u8,
    /// None for the Final Four and Championship.
    pub conference: Option<Conference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    pub team1: RcTeam,
    pub team2: RcTeam,
    pub winner: Winner,
    pub info: GameInformation,
}

impl GameResult {
    pub fn new(team1: RcTeam, team2: RcTeam, winner: Winner, info: GameInformation) -> GameResult {
        GameResult {
            team1,
            team2,
            winner,
            info,
        }
    }

    pub fn round(&self) -> Round {
        self.info.round
    }

    pub fn game_number(&self) -> u8 {
        self.info.game_number
    }

    pub fn conference(&self) -> Option<Conference> {
        self.info.conference
    }

    pub fn winner_team(&self) -> &RcTeam {
        match self.winner {
            Winner::Team1 => &self.team1,
            Winner::Team2 => &self.team2,
        }
    }

    pub fn loser_team(&self) -> &RcTeam {
        match self.winner {
            Winner::Team1 => &self.team2,
            Winner::Team2 => &self.team1,
        }
    }

    pub fn involves(&self, team: &Team) -> bool {
        self.team1.key() == team.key() || self.team2.key() == team.key()
    }

    /// Same slot in the draw, same pair of teams (in either slot) and the same
    /// winner. Teams compare by identity within a field.
    pub fn same_result(&self, other: &GameResult) -> bool {
        self.info == other.info
            && self.winner_team().key() == other.winner_team().key()
            && self.loser_team().key() == other.loser_team().key()
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} beat {}", self.winner_team(), self.loser_team())
    }
}
