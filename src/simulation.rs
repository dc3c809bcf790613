//Runs simulation requests: many independent forward or backward brackets, optionally scored as pools.
//Each simulation gets its own ChaCha8 seed drawn from a master rng up front, so a seeded run gives the same brackets
//no matter how rayon splits the work. Requests are processed in batches and progress is reported after each one.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backward::{generate_backward, Start};
use crate::bracket::Bracket;
use crate::config::Config;
use crate::error::{SimError, SimResult};
use crate::ingest::{Conference, Team, TeamKey, TeamModel, TournamentInfo};
use crate::outcome::OutcomeModel;
use crate::pool::{PoolOutcome, ScoringConfig};
use crate::topology::Round;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationRequest {
    /// Forward simulations of the field.
    Outcomes { requested: usize, teams: Vec<Team> },
    /// Backward-generated brackets, champion sampled by championship odds.
    OpponentBrackets { requested: usize, teams: Vec<Team> },
    /// Per run: one forward outcome from `odds_teams`, a pool of backward
    /// brackets from `selection_teams`, and the best pool entry.
    BracketGenerator {
        requested: usize,
        pool_size: usize,
        odds_teams: Vec<Team>,
        selection_teams: Vec<Team>,
    },
}

impl SimulationRequest {
    pub fn requested(&self) -> usize {
        match self {
            SimulationRequest::Outcomes { requested, .. }
            | SimulationRequest::OpponentBrackets { requested, .. }
            | SimulationRequest::BracketGenerator { requested, .. } => *requested,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SimulationRequest::Outcomes { .. } => "outcomes",
            SimulationRequest::OpponentBrackets { .. } => "opponent brackets",
            SimulationRequest::BracketGenerator { .. } => "bracket generator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProgress {
    pub requested: usize,
    pub completed: usize,
}

impl RequestProgress {
    pub fn new(requested: usize) -> RequestProgress {
        RequestProgress { requested, completed: 0 }
    }

    pub fn record(&mut self, finished: usize) {
        self.completed += finished;
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.requested
    }

    pub fn remaining(&self) -> usize {
        self.requested.saturating_sub(self.completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "results", rename_all = "snake_case")]
pub enum SimulationOutput {
    Outcomes(Vec<Bracket>),
    OpponentBrackets(Vec<Bracket>),
    PoolOutcomes(Vec<PoolOutcome>),
}

impl SimulationOutput {
    pub fn len(&self) -> usize {
        match self {
            SimulationOutput::Outcomes(b) | SimulationOutput::OpponentBrackets(b) => b.len(),
            SimulationOutput::PoolOutcomes(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Simulator {
    pub model: OutcomeModel,
    pub scoring: ScoringConfig,
    pub batch_size: usize,
    pub seed: Option<u64>,
}

impl Simulator {
    pub fn new(model: OutcomeModel, scoring: ScoringConfig, batch_size: usize, seed: Option<u64>) -> Simulator {
        Simulator {
            model,
            scoring,
            batch_size: batch_size.max(1),
            seed,
        }
    }

    pub fn from_config(config: &Config) -> SimResult<Simulator> {
        Ok(Simulator::new(
            config.outcome_model()?,
            config.scoring,
            config.simulation.batch_size,
            config.simulation.seed,
        ))
    }

    fn master_rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Run a whole request. `on_batch` sees the progress after every batch.
    pub fn run<F>(&self, request: &SimulationRequest, mut on_batch: F) -> SimResult<SimulationOutput>
    where
        F: FnMut(&RequestProgress),
    {
        let requested = request.requested();
        log::info!("running {} {} simulations in batches of {}", requested, request.name(), self.batch_size);

        let mut master = self.master_rng();
        let seeds: Vec<u64> = (0..requested).map(|_| master.gen()).collect();
        let mut progress = RequestProgress::new(requested);

        let output = match request {
            SimulationRequest::Outcomes { teams, .. } => {
                let field = TournamentInfo::new(teams.clone())?;
                let brackets = self.run_batches(&seeds, &mut progress, &mut on_batch, |rng| {
                    Bracket::simulate(&field, &self.model, rng)
                })?;
                SimulationOutput::Outcomes(brackets)
            }
            SimulationRequest::OpponentBrackets { teams, .. } => {
                let field = TournamentInfo::new(teams.clone())?;
                let brackets = self.run_batches(&seeds, &mut progress, &mut on_batch, |rng| {
                    generate_backward(&field, &Start::Sampled, rng)
                })?;
                SimulationOutput::OpponentBrackets(brackets)
            }
            SimulationRequest::BracketGenerator {
                pool_size,
                odds_teams,
                selection_teams,
                ..
            } => {
                if *pool_size == 0 {
                    return Err(SimError::EmptyPool);
                }
                let odds_field = TournamentInfo::new(odds_teams.clone())?;
                let selection_field = TournamentInfo::new(selection_teams.clone())?;
                let outcomes = self.run_batches(&seeds, &mut progress, &mut on_batch, |rng| {
                    let actual = Bracket::simulate(&odds_field, &self.model, &mut *rng)?;
                    let pool = (0..*pool_size)
                        .map(|_| generate_backward(&selection_field, &Start::Sampled, &mut *rng))
                        .collect::<SimResult<Vec<Bracket>>>()?;
                    PoolOutcome::select(actual, &pool, &self.scoring)
                })?;
                SimulationOutput::PoolOutcomes(outcomes)
            }
        };

        log::info!("finished {} of {} {} simulations", progress.completed, progress.requested, request.name());
        Ok(output)
    }

    fn run_batches<T, F, P>(
        &self,
        seeds: &[u64],
        progress: &mut RequestProgress,
        on_batch: &mut P,
        simulate_one: F,
    ) -> SimResult<Vec<T>>
    where
        T: Send,
        F: Fn(&mut ChaCha8Rng) -> SimResult<T> + Sync,
        P: FnMut(&RequestProgress),
    {
        let mut results: Vec<T> = Vec::with_capacity(seeds.len());
        for batch in seeds.chunks(self.batch_size) {
            let per_core = (batch.len() / num_cpus::get()).max(1);
            let finished: Vec<T> = batch
                .par_iter()
                .with_min_len(per_core)
                .map(|seed| simulate_one(&mut ChaCha8Rng::seed_from_u64(*seed)))
                .collect::<SimResult<Vec<T>>>()?;
            progress.record(finished.len());
            results.extend(finished);
            log::debug!("batch done: {}/{}", progress.completed, progress.requested);
            on_batch(progress);
        }
        Ok(results)
    }
}

/// One team's row: how many simulations saw it win a game in each round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancementRow {
    pub team: TeamKey,
    pub name: String,
    pub wins: [usize; 6],
}

/// Per-team, per-round win counts across a set of brackets. Rows run East,
/// West, South, Midwest and by seed within each conference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancementTable {
    pub simulations: usize,
    pub rows: Vec<AdvancementRow>,
}

fn row_index(team: TeamKey) -> usize {
    team.conference.index() * 16 + (team.seed as usize).saturating_sub(1)
}

impl AdvancementTable {
    pub fn from_brackets(field: &TournamentInfo, brackets: &[Bracket]) -> SimResult<AdvancementTable> {
        let mut table = AdvancementTable {
            simulations: brackets.len(),
            rows: Conference::ALL
                .iter()
                .flat_map(|conference| field.conference(*conference))
                .map(|team| AdvancementRow {
                    team: team.key(),
                    name: team.name.clone(),
                    wins: [0; 6],
                })
                .collect(),
        };

        for bracket in brackets {
            for game in bracket.all_games() {
                let key = game.winner_team().key();
                let row = table.row_mut(key).ok_or(SimError::UnregisteredTeam(key))?;
                row.wins[game.round().index()] += 1;
            }
        }
        Ok(table)
    }

    pub fn row(&self, team: TeamKey) -> Option<&AdvancementRow> {
        self.rows.get(row_index(team)).filter(|row| row.team == team)
    }

    fn row_mut(&mut self, team: TeamKey) -> Option<&mut AdvancementRow> {
        self.rows.get_mut(row_index(team)).filter(|row| row.team == team)
    }

    /// Share of simulations in which `team` won its `round` game.
    pub fn probability(&self, team: TeamKey, round: Round) -> Option<f64> {
        let row = self.row(team)?;
        if self.simulations == 0 {
            return Some(0.0);
        }
        Some(row.wins[round.index()] as f64 / self.simulations as f64)
    }

    /// The same field with every team switched to selection odds taken from
    /// this table.
    pub fn to_field(&self, field: &TournamentInfo) -> SimResult<TournamentInfo> {
        let teams = field
            .teams()
            .iter()
            .map(|team| {
                let key = team.key();
                let mut odds = [0.0; 6];
                for round in Round::ALL {
                    odds[round.index()] = self.probability(key, round).ok_or(SimError::UnregisteredTeam(key))?;
                }
                Ok(Team::new(team.name.clone(), team.conference, team.seed, TeamModel::SelectionOdds { odds }))
            })
            .collect::<SimResult<Vec<Team>>>()?;
        TournamentInfo::new(teams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_result::Winner;
    use crate::ingest::{Conference, ModelKind};

    fn teams(kind: ModelKind) -> Vec<Team> {
        TournamentInfo::default_field(kind)
            .teams()
            .iter()
            .map(|t| Team::clone(t))
            .collect()
    }

    fn simulator(seed: u64, batch_size: usize) -> Simulator {
        Simulator::new(OutcomeModel::default(), ScoringConfig::default(), batch_size, Some(seed))
    }

    #[test]
    fn test_progress() {
        let mut progress = RequestProgress::new(10);
        assert!(!progress.is_complete());
        progress.record(4);
        assert_eq!(progress.remaining(), 6);
        progress.record(7);
        assert!(progress.is_complete());
        assert_eq!(progress.remaining(), 0);
        assert!(RequestProgress::new(0).is_complete());
    }

    #[test]
    fn test_outcomes_report_each_batch() {
        let request = SimulationRequest::Outcomes {
            requested: 30,
            teams: teams(ModelKind::Rating),
        };
        let mut seen: Vec<RequestProgress> = Vec::new();
        let output = simulator(1, 8).run(&request, |p| seen.push(*p)).unwrap();
        assert_eq!(output.len(), 30);
        let completed: Vec<usize> = seen.iter().map(|p| p.completed).collect();
        assert_eq!(completed, vec![8, 16, 24, 30]);
        assert!(seen.last().unwrap().is_complete());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let request = SimulationRequest::OpponentBrackets {
            requested: 12,
            teams: teams(ModelKind::SelectionOdds),
        };
        // different batch sizes split the work differently
        let a = simulator(42, 5).run(&request, |_| {}).unwrap();
        let b = simulator(42, 12).run(&request, |_| {}).unwrap();
        match (a, b) {
            (SimulationOutput::OpponentBrackets(a), SimulationOutput::OpponentBrackets(b)) => {
                assert_eq!(a.len(), 12);
                assert!(a.iter().zip(&b).all(|(x, y)| x.same_results(y)));
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_bracket_generator() {
        let request = SimulationRequest::BracketGenerator {
            requested: 3,
            pool_size: 6,
            odds_teams: teams(ModelKind::Rating),
            selection_teams: teams(ModelKind::SelectionOdds),
        };
        match simulator(3, 2).run(&request, |_| {}).unwrap() {
            SimulationOutput::PoolOutcomes(outcomes) => {
                assert_eq!(outcomes.len(), 3);
                for outcome in outcomes {
                    assert!(outcome.best_index < 6);
                    assert!(outcome.best_score <= 192);
                }
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_bad_requests_fail() {
        let mut short = teams(ModelKind::Rating);
        short.truncate(60);
        let request = SimulationRequest::Outcomes { requested: 1, teams: short };
        assert!(matches!(
            simulator(1, 1).run(&request, |_| {}),
            Err(SimError::TeamCount { .. })
        ));

        let request = SimulationRequest::OpponentBrackets {
            requested: 2,
            teams: teams(ModelKind::Rating),
        };
        assert!(matches!(
            simulator(1, 1).run(&request, |_| {}),
            Err(SimError::MissingSelectionOdds { .. })
        ));

        let request = SimulationRequest::BracketGenerator {
            requested: 1,
            pool_size: 0,
            odds_teams: teams(ModelKind::Rating),
            selection_teams: teams(ModelKind::SelectionOdds),
        };
        assert!(matches!(simulator(1, 1).run(&request, |_| {}), Err(SimError::EmptyPool)));
    }

    #[test]
    fn test_advancement_table_feeds_backward_generation() {
        let field = TournamentInfo::default_field(ModelKind::Rating);
        let chalk = Bracket::simulate_with(&field, |t1, t2, _| {
            Ok(if t1.seed <= t2.seed { Winner::Team1 } else { Winner::Team2 })
        })
        .unwrap();
        let table = AdvancementTable::from_brackets(&field, &[chalk.clone(), chalk.clone()]).unwrap();
        let east_one = TeamKey { conference: Conference::East, seed: 1 };
        let east_sixteen = TeamKey { conference: Conference::East, seed: 16 };
        assert_eq!(table.probability(east_one, Round::Championship), Some(1.0));
        assert_eq!(table.probability(east_sixteen, Round::FirstRound), Some(0.0));

        // only chalk teams carry any odds, so backward generation rebuilds chalk
        let odds_field = table.to_field(&field).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let rebuilt = generate_backward(&odds_field, &Start::Sampled, &mut rng).unwrap();
        assert!(rebuilt.same_results(&chalk));
    }

    #[test]
    fn test_request_serde_tag() {
        let request = SimulationRequest::Outcomes {
            requested: 5,
            teams: teams(ModelKind::Rating),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "outcomes");
        assert_eq!(json["teams"][0]["model"]["kind"], "rating");
    }
}
