// Structure of the 64-team draw: which round comes after which, who pairs with
// whom going forward, and which seeds a team could possibly meet in a round.
//
// Forward pairing, per conference:
// R1: seed-sorted position i vs position 15 - i            (1v16, 2v15, ... 8v9)
// R2-R4: game i of the previous round vs game n - 1 - i    (halves the games)
// F4: East vs West (game 1), South vs Midwest (game 2)
// Champ: game 1 winner vs game 2 winner

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::ingest::{Conference, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    FirstRound,
    SecondRound,
    SweetSixteen,
    EliteEight,
    FinalFour,
    Championship,
}

impl Round {
    pub const ALL: [Round; 6] = [
        Round::FirstRound,
        Round::SecondRound,
        Round::SweetSixteen,
        Round::EliteEight,
        Round::FinalFour,
        Round::Championship,
    ];

    pub fn index(self) -> usize {
        match self {
            Round::FirstRound => 0,
            Round::SecondRound => 1,
            Round::SweetSixteen => 2,
            Round::EliteEight => 3,
            Round::FinalFour => 4,
            Round::Championship => 5,
        }
    }

    pub fn from_index(idx: usize) -> SimResult<Round> {
        Round::ALL.get(idx).copied().ok_or_else(|| SimError::UnknownVariant {
            kind: "round",
            value: idx.to_string(),
        })
    }

    /// Teams still alive when the round tips off.
    pub fn remaining_teams(self) -> usize {
        64 >> self.index()
    }

    pub fn game_count(self) -> usize {
        self.remaining_teams() / 2
    }

    /// Games per conference for the regional rounds (8, 4, 2, 1).
    pub fn games_per_conference(self) -> Option<usize> {
        if self.is_regional() {
            Some(self.game_count() / 4)
        } else {
            None
        }
    }

    pub fn is_regional(self) -> bool {
        self.index() < Round::FinalFour.index()
    }

    pub fn next(self) -> Option<Round> {
        Round::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<Round> {
        self.index().checked_sub(1).map(|i| Round::ALL[i])
    }

    pub fn name(self) -> &'static str {
        match self {
            Round::FirstRound => "First Round",
            Round::SecondRound => "Second Round",
            Round::SweetSixteen => "Sweet Sixteen",
            Round::EliteEight => "Elite Eight",
            Round::FinalFour => "Final Four",
            Round::Championship => "Championship",
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Round {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "firstround" | "r64" => Ok(Round::FirstRound),
            "secondround" | "r32" => Ok(Round::SecondRound),
            "sweetsixteen" | "sweet16" => Ok(Round::SweetSixteen),
            "eliteeight" | "elite8" => Ok(Round::EliteEight),
            "finalfour" | "final4" => Ok(Round::FinalFour),
            "championship" | "final" => Ok(Round::Championship),
            _ => Err(SimError::UnknownVariant {
                kind: "round",
                value: s.to_string(),
            }),
        }
    }
}

// Seeds each seed could face in a regional round, assuming it got there.
// Indexed by seed - 1.
const FIRST_ROUND_OPPONENTS: [&[u8]; 16] = [
    &[16], &[15], &[14], &[13], &[12], &[11], &[10], &[9],
    &[8], &[7], &[6], &[5], &[4], &[3], &[2], &[1],
];

const SECOND_ROUND_OPPONENTS: [&[u8]; 16] = [
    &[8, 9], &[7, 10], &[6, 11], &[5, 12],
    &[4, 13], &[3, 14], &[2, 15], &[1, 16],
    &[1, 16], &[2, 15], &[3, 14], &[4, 13],
    &[5, 12], &[6, 11], &[7, 10], &[8, 9],
];

const SWEET_SIXTEEN_OPPONENTS: [&[u8]; 16] = [
    &[4, 5, 12, 13], &[3, 6, 11, 14], &[2, 7, 10, 15], &[1, 8, 9, 16],
    &[1, 8, 9, 16], &[2, 7, 10, 15], &[3, 6, 11, 14], &[4, 5, 12, 13],
    &[4, 5, 12, 13], &[3, 6, 11, 14], &[2, 7, 10, 15], &[1, 8, 9, 16],
    &[1, 8, 9, 16], &[2, 7, 10, 15], &[3, 6, 11, 14], &[4, 5, 12, 13],
];

const TOP_HALF: &[u8] = &[1, 4, 5, 8, 9, 12, 13, 16];
const BOTTOM_HALF: &[u8] = &[2, 3, 6, 7, 10, 11, 14, 15];

const ELITE_EIGHT_OPPONENTS: [&[u8]; 16] = [
    BOTTOM_HALF, TOP_HALF, TOP_HALF, BOTTOM_HALF,
    BOTTOM_HALF, TOP_HALF, TOP_HALF, BOTTOM_HALF,
    BOTTOM_HALF, TOP_HALF, TOP_HALF, BOTTOM_HALF,
    BOTTOM_HALF, TOP_HALF, TOP_HALF, BOTTOM_HALF,
];

/// Final Four pairings, in game-number order.
pub const FINAL_FOUR_PAIRS: [(Conference, Conference); 2] = [
    (Conference::East, Conference::West),
    (Conference::South, Conference::Midwest),
];

/// Which Final Four game (0 or 1) a conference's champion plays in.
pub fn semifinal_of(conference: Conference) -> usize {
    match conference {
        Conference::East | Conference::West => 0,
        Conference::South | Conference::Midwest => 1,
    }
}

pub fn final_four_partner(conference: Conference) -> Conference {
    match conference {
        Conference::East => Conference::West,
        Conference::West => Conference::East,
        Conference::South => Conference::Midwest,
        Conference::Midwest => Conference::South,
    }
}

/// Round-1 pairs as indices into a seed-sorted conference list.
pub fn first_round_pairs() -> impl Iterator<Item = (usize, usize)> {
    (0..8).map(|i| (i, 15 - i))
}

/// Rounds 2-4: pair previous game i with game n - 1 - i.
pub fn regional_pairs(previous_games: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..previous_games / 2).map(move |i| (i, previous_games - 1 - i))
}

/// Stateless view of one round's bracket rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    round: Round,
}

pub fn topology_for(round: Round) -> Topology {
    Topology { round }
}

impl Topology {
    pub fn round(&self) -> Round {
        self.round
    }

    /// Seeds a team of `seed` could meet in this round. Only meaningful for
    /// the regional rounds; the national rounds are matched by conference.
    pub fn opponent_seeds(&self, seed: u8) -> Option<&'static [u8]> {
        if !(1..=16).contains(&seed) {
            return None;
        }
        let idx = (seed - 1) as usize;
        match self.round {
            Round::FirstRound => Some(FIRST_ROUND_OPPONENTS[idx]),
            Round::SecondRound => Some(SECOND_ROUND_OPPONENTS[idx]),
            Round::SweetSixteen => Some(SWEET_SIXTEEN_OPPONENTS[idx]),
            Round::EliteEight => Some(ELITE_EIGHT_OPPONENTS[idx]),
            Round::FinalFour | Round::Championship => None,
        }
    }

    /// Could `team` and `other` meet in this round under standard progression?
    pub fn is_potential_opponent(&self, team: &Team, other: &Team) -> bool {
        match self.round {
            Round::FinalFour => other.conference == final_four_partner(team.conference),
            Round::Championship => semifinal_of(other.conference) != semifinal_of(team.conference),
            _ => {
                team.conference == other.conference
                    && self
                        .opponent_seeds(team.seed)
                        .is_some_and(|seeds| seeds.contains(&other.seed))
            }
        }
    }

    /// 1-based game number of the game `team` plays in this round, following
    /// the forward pairing.
    pub fn game_number(&self, team: &Team) -> u8 {
        match self.round {
            Round::FinalFour => semifinal_of(team.conference) as u8 + 1,
            Round::Championship => 1,
            _ => {
                let mut slot = team.seed.min(17 - team.seed);
                let mut games = 8u8;
                for _ in 0..self.round.index() {
                    slot = slot.min(games + 1 - slot);
                    games /= 2;
                }
                slot
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::TeamModel;
    use std::collections::BTreeSet;

    fn team(conference: Conference, seed: u8) -> Team {
        Team::new(format!("{} {}", conference, seed), conference, seed, TeamModel::Rating { rating: 0.0 })
    }

    // Seeds that can end up in each game of a regional round, built by
    // running the forward pairing rule over seed groups.
    fn seed_groups(round: Round) -> Vec<Vec<u8>> {
        let mut groups: Vec<Vec<u8>> = first_round_pairs()
            .map(|(a, b)| vec![a as u8 + 1, b as u8 + 1])
            .collect();
        for _ in 0..round.index() {
            let n = groups.len();
            groups = regional_pairs(n)
                .map(|(a, b)| groups[a].iter().chain(groups[b].iter()).copied().collect())
                .collect();
        }
        groups
    }

    #[test]
    fn test_round_indices_and_sizes() {
        let remaining: Vec<usize> = Round::ALL.iter().map(|r| r.remaining_teams()).collect();
        assert_eq!(remaining, vec![64, 32, 16, 8, 4, 2]);
        let games: usize = Round::ALL.iter().map(|r| r.game_count()).sum();
        assert_eq!(games, 63);
        for (i, round) in Round::ALL.iter().enumerate() {
            assert_eq!(round.index(), i);
            assert_eq!(Round::from_index(i).unwrap(), *round);
        }
        assert_eq!(Round::FirstRound.previous(), None);
        assert_eq!(Round::Championship.next(), None);
        assert_eq!(Round::EliteEight.next(), Some(Round::FinalFour));
    }

    #[test]
    fn test_unknown_round_is_rejected() {
        assert!(matches!(
            Round::from_index(6),
            Err(SimError::UnknownVariant { kind: "round", .. })
        ));
        assert!("Round of 12".parse::<Round>().is_err());
        assert_eq!("Sweet Sixteen".parse::<Round>().unwrap(), Round::SweetSixteen);
        assert_eq!("elite_eight".parse::<Round>().unwrap(), Round::EliteEight);
    }

    #[test]
    fn test_first_round_pairs_are_classic() {
        let pairs: Vec<(u8, u8)> = first_round_pairs().map(|(a, b)| (a as u8 + 1, b as u8 + 1)).collect();
        assert_eq!(pairs, vec![(1, 16), (2, 15), (3, 14), (4, 13), (5, 12), (6, 11), (7, 10), (8, 9)]);
    }

    #[test]
    fn test_opponent_tables_match_forward_pairing() {
        for round in &Round::ALL[..4] {
            // groups[a] meets groups[b] for every forward pair (a, b)
            let (groups, pairs): (Vec<Vec<u8>>, Vec<(usize, usize)>) = match round.previous() {
                None => ((1..=16u8).map(|s| vec![s]).collect(), first_round_pairs().collect()),
                Some(prev) => {
                    let groups = seed_groups(prev);
                    let pairs = regional_pairs(groups.len()).collect();
                    (groups, pairs)
                }
            };
            for seed in 1..=16u8 {
                let mut expected = BTreeSet::new();
                for &(a, b) in &pairs {
                    if groups[a].contains(&seed) {
                        expected.extend(groups[b].iter().copied());
                    } else if groups[b].contains(&seed) {
                        expected.extend(groups[a].iter().copied());
                    }
                }
                let table: BTreeSet<u8> = topology_for(*round).opponent_seeds(seed).unwrap().iter().copied().collect();
                assert_eq!(table, expected, "{} seed {}", round, seed);
            }
        }
    }

    #[test]
    fn test_sweet_sixteen_seed_one() {
        let seeds = topology_for(Round::SweetSixteen).opponent_seeds(1).unwrap();
        assert_eq!(seeds, &[4, 5, 12, 13]);
        assert_eq!(topology_for(Round::FinalFour).opponent_seeds(1), None);
        assert_eq!(topology_for(Round::FirstRound).opponent_seeds(17), None);
    }

    #[test]
    fn test_game_numbers_follow_pairing() {
        for round in &Round::ALL[..4] {
            let groups = seed_groups(*round);
            for (game_idx, group) in groups.iter().enumerate() {
                for &seed in group {
                    let t = team(Conference::South, seed);
                    assert_eq!(topology_for(*round).game_number(&t) as usize, game_idx + 1, "{} seed {}", round, seed);
                }
            }
        }
        let west = team(Conference::West, 3);
        let midwest = team(Conference::Midwest, 3);
        assert_eq!(topology_for(Round::FinalFour).game_number(&west), 1);
        assert_eq!(topology_for(Round::FinalFour).game_number(&midwest), 2);
        assert_eq!(topology_for(Round::Championship).game_number(&midwest), 1);
    }

    #[test]
    fn test_national_round_opponents() {
        let east = team(Conference::East, 1);
        let west = team(Conference::West, 9);
        let south = team(Conference::South, 2);
        let ff = topology_for(Round::FinalFour);
        assert!(ff.is_potential_opponent(&east, &west));
        assert!(!ff.is_potential_opponent(&east, &south));
        let champ = topology_for(Round::Championship);
        assert!(champ.is_potential_opponent(&east, &south));
        assert!(!champ.is_potential_opponent(&east, &west));
        let e8 = topology_for(Round::EliteEight);
        assert!(!e8.is_potential_opponent(&east, &team(Conference::East, 4)));
        assert!(e8.is_potential_opponent(&east, &team(Conference::East, 2)));
        assert!(!e8.is_potential_opponent(&east, &team(Conference::West, 2)));
    }
}
