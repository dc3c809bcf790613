//This contains the round advancement engine and the Bracket it produces.
//advance_round turns the results of one round into the games of the next, following the fixed pairing of the draw.
//Bracket holds all 63 games of a tournament and can only be built through a constructor that checks the whole chain
//(every team in a round won exactly one game in the round before it).

use std::convert::TryFrom;
use std::fmt;

use chrono::{DateTime, Utc};
use fnv::FnvHashSet;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::game_result::{GameInformation, GameResult, Winner};
use crate::ingest::{Conference, RcTeam, Team, TeamKey, TournamentInfo};
use crate::outcome::OutcomeModel;
use crate::topology::{first_round_pairs, regional_pairs, Round, FINAL_FOUR_PAIRS};

/// Produce the games of `round` from the results of the round before it.
/// `previous` must be empty for the First Round, which is drawn from `field`.
pub fn advance_round<F>(
    round: Round,
    previous: &[GameResult],
    field: &TournamentInfo,
    decide: &mut F,
) -> SimResult<Vec<GameResult>>
where
    F: FnMut(&Team, &Team, Round) -> SimResult<Winner>,
{
    let mut games: Vec<GameResult> = Vec::with_capacity(round.game_count());

    let prev_round = match round.previous() {
        Some(prev) => prev,
        None => {
            if !previous.is_empty() {
                return Err(SimError::MalformedRound {
                    round,
                    reason: format!("expected no prior results, got {}", previous.len()),
                });
            }
            for conference in Conference::ALL {
                let region = field.conference(conference);
                for (game_idx, (a, b)) in first_round_pairs().enumerate() {
                    let info = GameInformation {
                        round,
                        game_number: game_idx as u8 + 1,
                        conference: Some(conference),
                    };
                    games.push(play(&region[a], &region[b], info, decide)?);
                }
            }
            return Ok(games);
        }
    };

    if let Some(stray) = previous.iter().find(|g| g.round() != prev_round) {
        return Err(SimError::MalformedRound {
            round,
            reason: format!("found a {} game among the {} results", stray.round(), prev_round),
        });
    }

    match round {
        Round::FinalFour => {
            for (game_idx, (c1, c2)) in FINAL_FOUR_PAIRS.iter().enumerate() {
                let g1 = regional_winner(previous, round, *c1)?;
                let g2 = regional_winner(previous, round, *c2)?;
                let info = GameInformation {
                    round,
                    game_number: game_idx as u8 + 1,
                    conference: None,
                };
                games.push(play(g1.winner_team(), g2.winner_team(), info, decide)?);
            }
        }
        Round::Championship => {
            let mut semis: Vec<&GameResult> = previous.iter().collect();
            semis.sort_by_key(|g| g.game_number());
            let numbers: Vec<u8> = semis.iter().map(|g| g.game_number()).collect();
            if numbers != [1, 2] {
                return Err(SimError::MalformedRound {
                    round,
                    reason: format!("expected Final Four games 1 and 2, got {:?}", numbers),
                });
            }
            let info = GameInformation {
                round,
                game_number: 1,
                conference: None,
            };
            games.push(play(semis[0].winner_team(), semis[1].winner_team(), info, decide)?);
        }
        // Second Round through Elite Eight
        _ => {
            let expected = prev_round.games_per_conference().unwrap_or_default();
            for conference in Conference::ALL {
                let group = conference_games(previous, conference);
                check_group(round, conference, group.len(), expected)?;
                for (game_idx, (a, b)) in regional_pairs(group.len()).enumerate() {
                    let info = GameInformation {
                        round,
                        game_number: game_idx as u8 + 1,
                        conference: Some(conference),
                    };
                    games.push(play(group[a].winner_team(), group[b].winner_team(), info, decide)?);
                }
            }
        }
    }
    Ok(games)
}

fn play<F>(team1: &RcTeam, team2: &RcTeam, info: GameInformation, decide: &mut F) -> SimResult<GameResult>
where
    F: FnMut(&Team, &Team, Round) -> SimResult<Winner>,
{
    let winner = decide(team1.as_ref(), team2.as_ref(), info.round)?;
    Ok(GameResult::new(RcTeam::clone(team1), RcTeam::clone(team2), winner, info))
}

fn conference_games(games: &[GameResult], conference: Conference) -> Vec<&GameResult> {
    let mut group: Vec<&GameResult> = games.iter().filter(|g| g.conference() == Some(conference)).collect();
    group.sort_by_key(|g| g.game_number());
    group
}

fn check_group(round: Round, conference: Conference, found: usize, expected: usize) -> SimResult<()> {
    if found == 0 {
        return Err(SimError::MissingConferenceWinner { round, conference });
    }
    if found != expected {
        return Err(SimError::MalformedRound {
            round,
            reason: format!("{} has {} prior games, expected {}", conference, found, expected),
        });
    }
    Ok(())
}

fn regional_winner(previous: &[GameResult], round: Round, conference: Conference) -> SimResult<&GameResult> {
    let group = conference_games(previous, conference);
    check_group(round, conference, group.len(), 1)?;
    Ok(group[0])
}

/// One place in the final standings. `place` is 1 for the champion, 2 for the
/// runner-up, otherwise the number of teams left in the round the team lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub team: TeamKey,
    pub name: String,
    pub place: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BracketRecord")]
pub struct Bracket {
    rounds: Vec<Vec<GameResult>>,
    created: DateTime<Utc>,
}

// Unchecked wire shape; every deserialized bracket goes back through
// Bracket::from_parts.
#[derive(Deserialize)]
struct BracketRecord {
    rounds: Vec<Vec<GameResult>>,
    created: DateTime<Utc>,
}

impl TryFrom<BracketRecord> for Bracket {
    type Error = SimError;

    fn try_from(record: BracketRecord) -> Result<Self, Self::Error> {
        Bracket::from_parts(record.rounds, record.created)
    }
}

impl Bracket {
    /// Run all six rounds, deciding each game with `model`.
    pub fn simulate<R: Rng + ?Sized>(field: &TournamentInfo, model: &OutcomeModel, rng: &mut R) -> SimResult<Bracket> {
        Bracket::simulate_with(field, |team1, team2, round| model.decide(team1, team2, round, &mut *rng))
    }

    /// Run all six rounds with an arbitrary per-game decider.
    pub fn simulate_with<F>(field: &TournamentInfo, mut decide: F) -> SimResult<Bracket>
    where
        F: FnMut(&Team, &Team, Round) -> SimResult<Winner>,
    {
        let mut rounds: Vec<Vec<GameResult>> = Vec::with_capacity(6);
        for round in Round::ALL {
            let previous: &[GameResult] = rounds.last().map(Vec::as_slice).unwrap_or(&[]);
            let games = advance_round(round, previous, field, &mut decide)?;
            rounds.push(games);
        }
        Bracket::from_rounds(rounds)
    }

    pub fn from_rounds(rounds: Vec<Vec<GameResult>>) -> SimResult<Bracket> {
        Bracket::from_parts(rounds, Utc::now())
    }

    /// Validating constructor. Checks round sizes, tags and game numbers,
    /// that round 1 holds 64 distinct teams, and the winner chain.
    pub fn from_parts(rounds: Vec<Vec<GameResult>>, created: DateTime<Utc>) -> SimResult<Bracket> {
        if rounds.len() != Round::ALL.len() {
            return Err(SimError::InvalidBracket(format!("expected 6 rounds, got {}", rounds.len())));
        }
        for (round, games) in Round::ALL.iter().zip(&rounds) {
            check_round_shape(*round, games)?;
        }

        let mut seen: FnvHashSet<TeamKey> = FnvHashSet::default();
        for game in &rounds[0] {
            for team in [&game.team1, &game.team2] {
                if !seen.insert(team.key()) {
                    return Err(SimError::InvalidBracket(format!("{} plays twice in the First Round", team.key())));
                }
            }
        }

        for pair in rounds.windows(2) {
            let mut winners: FnvHashSet<TeamKey> = pair[0].iter().map(|g| g.winner_team().key()).collect();
            for game in &pair[1] {
                for team in [&game.team1, &game.team2] {
                    if !winners.remove(&team.key()) {
                        return Err(SimError::InvalidBracket(format!(
                            "{} plays in the {} without winning exactly once in the {}",
                            team.key(),
                            game.round(),
                            pair[0][0].round()
                        )));
                    }
                }
            }
        }

        Ok(Bracket { rounds, created })
    }

    pub fn round(&self, round: Round) -> &[GameResult] {
        &self.rounds[round.index()]
    }

    pub fn rounds(&self) -> &[Vec<GameResult>] {
        &self.rounds
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn all_games(&self) -> impl Iterator<Item = &GameResult> {
        self.rounds.iter().flatten()
    }

    pub fn championship(&self) -> &GameResult {
        &self.rounds[Round::Championship.index()][0]
    }

    pub fn champion(&self) -> &RcTeam {
        self.championship().winner_team()
    }

    pub fn runner_up(&self) -> &RcTeam {
        self.championship().loser_team()
    }

    /// Games of a round grouped by conference (East, West, South, Midwest) and
    /// ordered by game number. National rounds come back as a single group.
    pub fn sorted_round(&self, round: Round) -> Vec<Vec<&GameResult>> {
        let games = self.round(round);
        if round.is_regional() {
            Conference::ALL.iter().map(|c| conference_games(games, *c)).collect()
        } else {
            let mut group: Vec<&GameResult> = games.iter().collect();
            group.sort_by_key(|g| g.game_number());
            vec![group]
        }
    }

    /// Game-for-game equality of matchups and winners, ignoring timestamps.
    pub fn same_results(&self, other: &Bracket) -> bool {
        Round::ALL.iter().all(|round| {
            let mine = self.sorted_round(*round);
            let theirs = other.sorted_round(*round);
            mine.iter().flatten().zip(theirs.iter().flatten()).all(|(a, b)| a.same_result(b))
        })
    }

    pub fn placements(&self) -> Vec<Placement> {
        let mut placements: Vec<Placement> = Vec::with_capacity(64);
        let champion = self.champion();
        placements.push(Placement {
            team: champion.key(),
            name: champion.name.clone(),
            place: 1,
        });
        for round in Round::ALL.iter().rev() {
            let place = if *round == Round::Championship { 2 } else { round.remaining_teams() };
            for group in self.sorted_round(*round) {
                for game in group {
                    let loser = game.loser_team();
                    placements.push(Placement {
                        team: loser.key(),
                        name: loser.name.clone(),
                        place,
                    });
                }
            }
        }
        placements
    }
}

fn check_round_shape(round: Round, games: &[GameResult]) -> SimResult<()> {
    if games.len() != round.game_count() {
        return Err(SimError::InvalidBracket(format!(
            "{} has {} games, expected {}",
            round,
            games.len(),
            round.game_count()
        )));
    }
    for game in games {
        if game.round() != round {
            return Err(SimError::InvalidBracket(format!("{} game filed under the {}", game.round(), round)));
        }
        if game.team1.key() == game.team2.key() {
            return Err(SimError::InvalidBracket(format!("{} plays itself in the {}", game.team1.key(), round)));
        }
        match (round.is_regional(), game.conference()) {
            (true, Some(conference)) => {
                if game.team1.conference != conference || game.team2.conference != conference {
                    return Err(SimError::InvalidBracket(format!(
                        "{} game {} tagged {} has teams from another conference",
                        round,
                        game.game_number(),
                        conference
                    )));
                }
            }
            (true, None) => {
                return Err(SimError::InvalidBracket(format!("{} game {} has no conference", round, game.game_number())))
            }
            (false, Some(_)) => {
                return Err(SimError::InvalidBracket(format!("{} game {} has a conference tag", round, game.game_number())))
            }
            (false, None) => {}
        }
    }

    let groups: Vec<Vec<&GameResult>> = if round.is_regional() {
        Conference::ALL.iter().map(|c| conference_games(games, *c)).collect()
    } else {
        let mut group: Vec<&GameResult> = games.iter().collect();
        group.sort_by_key(|g| g.game_number());
        vec![group]
    };
    for group in groups {
        let numbered = group.iter().enumerate().all(|(i, g)| g.game_number() as usize == i + 1);
        if !numbered || group.len() != round.games_per_conference().unwrap_or(games.len()) {
            return Err(SimError::InvalidBracket(format!("{} game numbers are not 1..n per group", round)));
        }
    }
    Ok(())
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for round in &Round::ALL[..5] {
            writeln!(f, "{}", round)?;
            for game in self.sorted_round(*round).iter().flatten() {
                let winner = game.winner_team();
                writeln!(f, "{} {}", winner.seed, winner.name)?;
            }
            writeln!(f)?;
        }
        let champion = self.champion();
        writeln!(f, "{}", Round::Championship)?;
        writeln!(f, "{} {} wins!", champion.seed, champion.name)
    }
}
