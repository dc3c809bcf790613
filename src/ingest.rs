// Team registry: the 64 teams of a field, their conference/seed and the model
// each one uses to decide games. Fields come from the built-in default, from a
// CSV file, or from whatever the caller hands over.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use fnv::{FnvHashMap, FnvHashSet};
use thiserror::Error;

use crate::error::{SimError, SimResult};
use crate::topology::Round;

/// Atomically reference-counted Team, shared by every game it appears in.
/// Arc rather than Rc so brackets can be built on rayon worker threads.
pub type RcTeam = Arc<Team>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Conference {
    East,
    West,
    South,
    Midwest,
}

impl Conference {
    pub const ALL: [Conference; 4] = [
        Conference::East,
        Conference::West,
        Conference::South,
        Conference::Midwest,
    ];

    pub fn index(self) -> usize {
        match self {
            Conference::East => 0,
            Conference::West => 1,
            Conference::South => 2,
            Conference::Midwest => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Conference::East => "East",
            Conference::West => "West",
            Conference::South => "South",
            Conference::Midwest => "Midwest",
        }
    }
}

impl fmt::Display for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Conference {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "east" => Ok(Conference::East),
            "west" => Ok(Conference::West),
            "south" => Ok(Conference::South),
            "midwest" => Ok(Conference::Midwest),
            _ => Err(SimError::UnknownVariant {
                kind: "conference",
                value: s.to_string(),
            }),
        }
    }
}

/// How a team decides its games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TeamModel {
    /// Scalar strength rating (Elo-like scale).
    Rating { rating: f64 },
    /// Probability of getting through each round, First Round .. Championship.
    SelectionOdds { odds: [f64; 6] },
}

impl TeamModel {
    pub fn rating(&self) -> Option<f64> {
        match self {
            TeamModel::Rating { rating } => Some(*rating),
            TeamModel::SelectionOdds { .. } => None,
        }
    }

    pub fn odds(&self) -> Option<&[f64; 6]> {
        match self {
            TeamModel::Rating { .. } => None,
            TeamModel::SelectionOdds { odds } => Some(odds),
        }
    }

    pub fn odds_for(&self, round: Round) -> Option<f64> {
        self.odds().map(|odds| odds[round.index()])
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            TeamModel::Rating { .. } => ModelKind::Rating,
            TeamModel::SelectionOdds { .. } => ModelKind::SelectionOdds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Rating,
    SelectionOdds,
}

/// Identity of a team within one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamKey {
    pub conference: Conference,
    pub seed: u8,
}

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.conference, self.seed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub conference: Conference,
    pub seed: u8,
    pub model: TeamModel,
}

impl Team {
    pub fn new(name: impl Into<String>, conference: Conference, seed: u8, model: TeamModel) -> Team {
        Team {
            name: name.into(),
            conference,
            seed,
            model,
        }
    }

    pub fn key(&self) -> TeamKey {
        TeamKey {
            conference: self.conference,
            seed: self.seed,
        }
    }

    fn validate(&self) -> SimResult<()> {
        if !(1..=16).contains(&self.seed) {
            return Err(SimError::SeedOutOfRange {
                team: self.name.clone(),
                seed: self.seed,
            });
        }
        match &self.model {
            TeamModel::Rating { rating } if !rating.is_finite() => Err(SimError::InvalidRating {
                team: self.name.clone(),
                rating: *rating,
            }),
            TeamModel::SelectionOdds { odds } => {
                match odds.iter().position(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
                    Some(idx) => Err(SimError::InvalidOdds {
                        team: self.name.clone(),
                        reason: format!("{} entry {} is not a probability", Round::ALL[idx], odds[idx]),
                    }),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.seed, self.name)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read team file: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {reason}")]
    Row { row: usize, reason: String },
    #[error(transparent)]
    Field(#[from] SimError),
}

// One CSV row. Rating rows fill `rating`; selection-odds rows fill all six
// round columns.
#[derive(Debug, Deserialize)]
struct TeamRecord {
    name: String,
    conference: String,
    seed: String,
    rating: Option<f64>,
    first_round: Option<f64>,
    second_round: Option<f64>,
    sweet_sixteen: Option<f64>,
    elite_eight: Option<f64>,
    final_four: Option<f64>,
    championship: Option<f64>,
}

impl TeamRecord {
    fn into_team(self, row: usize) -> Result<Team, LoadError> {
        let conference: Conference = self.conference.parse()?;
        let seed = parse_seed(&self.seed).ok_or_else(|| LoadError::Row {
            row,
            reason: format!("bad seed '{}'", self.seed),
        })?;
        let odds = [
            self.first_round,
            self.second_round,
            self.sweet_sixteen,
            self.elite_eight,
            self.final_four,
            self.championship,
        ];
        let model = match (self.rating, odds.iter().all(Option::is_some)) {
            (Some(rating), _) => TeamModel::Rating { rating },
            (None, true) => TeamModel::SelectionOdds {
                odds: odds.map(|p| p.unwrap_or_default()),
            },
            (None, false) => {
                return Err(LoadError::Row {
                    row,
                    reason: format!("{} needs a rating or all six round odds", self.name),
                })
            }
        };
        Ok(Team::new(self.name, conference, seed, model))
    }
}

// Play-in seeds show up as "11a"/"16b"; the suffix is dropped.
fn parse_seed(raw: &str) -> Option<u8> {
    raw.trim().trim_end_matches(['a', 'b']).parse().ok()
}

/// A validated field of 64 teams.
#[derive(Debug, Clone)]
pub struct TournamentInfo {
    teams: Vec<RcTeam>,
    // Teams per conference (East, West, South, Midwest), sorted by seed.
    regions: Vec<Vec<RcTeam>>,
    team_lookup: FnvHashMap<TeamKey, RcTeam>,
}

impl TournamentInfo {
    /// Validate and register a field: 64 teams, 16 per conference, seeds
    /// 1-16 used once each per conference, sane model parameters, one model
    /// for every team.
    pub fn new(teams: Vec<Team>) -> SimResult<TournamentInfo> {
        if teams.len() != 64 {
            return Err(SimError::TeamCount {
                expected: 64,
                found: teams.len(),
            });
        }

        let mut seen: FnvHashSet<TeamKey> = FnvHashSet::default();
        for team in &teams {
            team.validate()?;
            if !seen.insert(team.key()) {
                return Err(SimError::DuplicateSeed {
                    conference: team.conference,
                    seed: team.seed,
                });
            }
        }
        for conference in Conference::ALL {
            let found = teams.iter().filter(|t| t.conference == conference).count();
            if found != 16 {
                return Err(SimError::ConferenceSize { conference, found });
            }
        }
        let kind = teams[0].model.kind();
        if let Some(team) = teams.iter().find(|t| t.model.kind() != kind) {
            return Err(SimError::MixedModels { team: team.name.clone() });
        }

        Ok(TournamentInfo::register(teams))
    }

    // Shares and indexes an already valid field.
    fn register(teams: Vec<Team>) -> TournamentInfo {
        let teams: Vec<RcTeam> = teams.into_iter().map(Arc::new).collect();
        let team_lookup: FnvHashMap<TeamKey, RcTeam> = teams.iter().map(|t| (t.key(), Arc::clone(t))).collect();
        let regions: Vec<Vec<RcTeam>> = Conference::ALL
            .iter()
            .map(|conference| {
                let mut region: Vec<RcTeam> = teams
                    .iter()
                    .filter(|t| t.conference == *conference)
                    .map(Arc::clone)
                    .collect();
                region.sort_by_key(|t| t.seed);
                region
            })
            .collect();
        TournamentInfo {
            teams,
            regions,
            team_lookup,
        }
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<TournamentInfo, LoadError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let mut teams = Vec::with_capacity(64);
        for (idx, result) in rdr.deserialize::<TeamRecord>().enumerate() {
            // +2: header line and 1-based rows
            teams.push(result?.into_team(idx + 2)?);
        }
        Ok(TournamentInfo::new(teams)?)
    }

    /// The built-in 64-team field using the requested model.
    pub fn default_field(kind: ModelKind) -> TournamentInfo {
        let teams = DEFAULT_FIELD
            .iter()
            .map(|&(name, conference, seed, rating, odds)| {
                let model = match kind {
                    ModelKind::Rating => TeamModel::Rating { rating },
                    ModelKind::SelectionOdds => TeamModel::SelectionOdds { odds },
                };
                Team::new(name, conference, seed, model)
            })
            .collect();
        TournamentInfo::register(teams)
    }

    pub fn teams(&self) -> &[RcTeam] {
        &self.teams
    }

    pub fn get_team(&self, key: TeamKey) -> Option<&RcTeam> {
        self.team_lookup.get(&key)
    }

    pub fn require(&self, key: TeamKey) -> SimResult<&RcTeam> {
        self.get_team(key).ok_or(SimError::UnregisteredTeam(key))
    }

    pub fn conference(&self, conference: Conference) -> &[RcTeam] {
        &self.regions[conference.index()]
    }

    /// Case-insensitive lookup by name; exact matches win over substring ones.
    pub fn find_team(&self, name: &str) -> SimResult<&RcTeam> {
        let needle = name.trim().to_lowercase();
        self.teams
            .iter()
            .find(|t| t.name.to_lowercase() == needle)
            .or_else(|| self.teams.iter().find(|t| t.name.to_lowercase().contains(&needle)))
            .ok_or_else(|| SimError::UnknownTeam(name.to_string()))
    }

    pub fn model_kind(&self) -> Option<ModelKind> {
        let first = self.teams.first()?.model.kind();
        self.teams.iter().all(|t| t.model.kind() == first).then_some(first)
    }
}

type FieldEntry = (&'static str, Conference, u8, f64, [f64; 6]);

const DEFAULT_FIELD: [FieldEntry; 64] = [
    ("Abilene Christian", Conference::East, 1, 2000.0, [0.9, 0.8, 0.7, 0.6, 0.5, 0.4]),
    ("Alabama", Conference::East, 2, 1900.0, [0.85, 0.75, 0.65, 0.55, 0.45, 0.35]),
    ("Appalachian State", Conference::East, 3, 1800.0, [0.8, 0.7, 0.6, 0.5, 0.4, 0.3]),
    ("Arkansas", Conference::East, 4, 1700.0, [0.75, 0.65, 0.55, 0.45, 0.35, 0.25]),
    ("BYU", Conference::East, 5, 1600.0, [0.7, 0.6, 0.5, 0.4, 0.3, 0.2]),
    ("Baylor", Conference::East, 6, 1500.0, [0.65, 0.55, 0.45, 0.35, 0.25, 0.15]),
    ("Clemson", Conference::East, 7, 1400.0, [0.6, 0.5, 0.4, 0.3, 0.2, 0.1]),
    ("Babson", Conference::East, 8, 1300.0, [0.55, 0.45, 0.35, 0.25, 0.15, 0.05]),
    ("Cleveland State", Conference::East, 9, 1200.0, [0.5, 0.4, 0.3, 0.2, 0.1, 0.05]),
    ("Colorado", Conference::East, 10, 1100.0, [0.45, 0.35, 0.25, 0.15, 0.1, 0.05]),
    ("Creighton", Conference::East, 11, 1000.0, [0.4, 0.3, 0.2, 0.1, 0.05, 0.01]),
    ("Drake", Conference::East, 12, 900.0, [0.35, 0.25, 0.15, 0.1, 0.05, 0.01]),
    ("Drexel", Conference::East, 13, 800.0, [0.3, 0.2, 0.1, 0.05, 0.01, 0.01]),
    ("Eastern Washington", Conference::East, 14, 700.0, [0.25, 0.15, 0.1, 0.05, 0.01, 0.01]),
    ("Florida State", Conference::East, 15, 600.0, [0.2, 0.1, 0.05, 0.01, 0.01, 0.01]),
    ("Georgia Tech", Conference::East, 16, 500.0, [0.15, 0.1, 0.05, 0.01, 0.01, 0.01]),
    ("Gonzaga", Conference::West, 1, 2000.0, [0.9, 0.8, 0.7, 0.6, 0.5, 0.4]),
    ("Grand Canyon", Conference::West, 2, 1900.0, [0.85, 0.75, 0.65, 0.55, 0.45, 0.35]),
    ("Hartford", Conference::West, 3, 1800.0, [0.8, 0.7, 0.6, 0.5, 0.4, 0.3]),
    ("Houston", Conference::West, 4, 1700.0, [0.75, 0.65, 0.55, 0.45, 0.35, 0.25]),
    ("Illinois", Conference::West, 5, 1600.0, [0.7, 0.6, 0.5, 0.4, 0.3, 0.2]),
    ("Iona", Conference::West, 6, 1500.0, [0.65, 0.55, 0.45, 0.35, 0.25, 0.15]),
    ("Iowa", Conference::West, 7, 1400.0, [0.6, 0.5, 0.4, 0.3, 0.2, 0.1]),
    ("Kansas", Conference::West, 8, 1300.0, [0.55, 0.45, 0.35, 0.25, 0.15, 0.05]),
    ("LSU", Conference::West, 9, 1200.0, [0.5, 0.4, 0.3, 0.2, 0.1, 0.05]),
    ("Liberty", Conference::West, 10, 1100.0, [0.45, 0.35, 0.25, 0.15, 0.1, 0.05]),
    ("Loyola Chicago", Conference::West, 11, 1000.0, [0.4, 0.3, 0.2, 0.1, 0.05, 0.01]),
    ("MIT", Conference::West, 12, 1000.0, [0.4, 0.3, 0.2, 0.1, 0.05, 0.01]),
    ("Maryland", Conference::West, 13, 800.0, [0.3, 0.2, 0.1, 0.05, 0.01, 0.01]),
    ("Suffolk", Conference::West, 14, 1000.0, [0.4, 0.3, 0.2, 0.1, 0.05, 0.01]),
    ("Michigan", Conference::West, 15, 600.0, [0.2, 0.1, 0.05, 0.01, 0.01, 0.01]),
    ("Morehead State", Conference::West, 16, 500.0, [0.15, 0.1, 0.05, 0.01, 0.01, 0.01]),
    ("Mount St. Mary's", Conference::South, 1, 2000.0, [0.9, 0.8, 0.7, 0.6, 0.5, 0.4]),
    ("Norfolk State", Conference::South, 2, 1900.0, [0.85, 0.75, 0.65, 0.55, 0.45, 0.35]),
    ("North Carolina", Conference::South, 3, 1800.0, [0.8, 0.7, 0.6, 0.5, 0.4, 0.3]),
    ("Ohio State", Conference::South, 4, 1700.0, [0.75, 0.65, 0.55, 0.45, 0.35, 0.25]),
    ("Oklahoma", Conference::South, 5, 1600.0, [0.7, 0.6, 0.5, 0.4, 0.3, 0.2]),
    ("Oklahoma State", Conference::South, 6, 1500.0, [0.65, 0.55, 0.45, 0.35, 0.25, 0.15]),
    ("Oral Roberts", Conference::South, 7, 1400.0, [0.6, 0.5, 0.4, 0.3, 0.2, 0.1]),
    ("Oregon", Conference::South, 8, 1300.0, [0.55, 0.45, 0.35, 0.25, 0.15, 0.05]),
    ("Purdue", Conference::South, 9, 1200.0, [0.5, 0.4, 0.3, 0.2, 0.1, 0.05]),
    ("Rutgers", Conference::South, 10, 1100.0, [0.45, 0.35, 0.25, 0.15, 0.1, 0.05]),
    ("San Diego State", Conference::South, 11, 1000.0, [0.4, 0.3, 0.2, 0.1, 0.05, 0.01]),
    ("St. Bonaventure", Conference::South, 12, 900.0, [0.35, 0.25, 0.15, 0.1, 0.05, 0.01]),
    ("Syracuse", Conference::South, 13, 800.0, [0.3, 0.2, 0.1, 0.05, 0.01, 0.01]),
    ("Tennessee", Conference::South, 14, 700.0, [0.25, 0.15, 0.1, 0.05, 0.01, 0.01]),
    ("Texas", Conference::South, 15, 600.0, [0.2, 0.1, 0.05, 0.01, 0.01, 0.01]),
    ("Texas Tech", Conference::South, 16, 500.0, [0.15, 0.1, 0.05, 0.01, 0.01, 0.01]),
    ("UCSB", Conference::Midwest, 1, 2000.0, [0.9, 0.8, 0.7, 0.6, 0.5, 0.4]),
    ("UConn", Conference::Midwest, 2, 1900.0, [0.85, 0.75, 0.65, 0.55, 0.45, 0.35]),
    ("USC", Conference::Midwest, 3, 1800.0, [0.8, 0.7, 0.6, 0.5, 0.4, 0.3]),
    ("VCU", Conference::Midwest, 4, 1700.0, [0.75, 0.65, 0.55, 0.45, 0.35, 0.25]),
    ("Virginia", Conference::Midwest, 5, 1600.0, [0.7, 0.6, 0.5, 0.4, 0.3, 0.2]),
    ("Winthrop", Conference::Midwest, 6, 1500.0, [0.65, 0.55, 0.45, 0.35, 0.25, 0.15]),
    ("Wisconsin", Conference::Midwest, 7, 1400.0, [0.6, 0.5, 0.4, 0.3, 0.2, 0.1]),
    ("Brown", Conference::Midwest, 8, 1300.0, [0.55, 0.45, 0.35, 0.25, 0.15, 0.05]),
    ("Cornell", Conference::Midwest, 9, 1200.0, [0.5, 0.4, 0.3, 0.2, 0.1, 0.05]),
    ("Harvard", Conference::Midwest, 10, 1100.0, [0.45, 0.35, 0.25, 0.15, 0.1, 0.05]),
    ("Princeton", Conference::Midwest, 11, 1000.0, [0.4, 0.3, 0.2, 0.1, 0.05, 0.01]),
    ("Penn", Conference::Midwest, 12, 900.0, [0.35, 0.25, 0.15, 0.1, 0.05, 0.01]),
    ("Yale", Conference::Midwest, 13, 800.0, [0.3, 0.2, 0.1, 0.05, 0.01, 0.01]),
    ("Boston College", Conference::Midwest, 14, 700.0, [0.25, 0.15, 0.1, 0.05, 0.01, 0.01]),
    ("Boston University", Conference::Midwest, 15, 600.0, [0.2, 0.1, 0.05, 0.01, 0.01, 0.01]),
    ("Northeastern", Conference::Midwest, 16, 500.0, [0.15, 0.1, 0.05, 0.01, 0.01, 0.01]),
];
