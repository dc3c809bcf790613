use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use bracket_sim::backward::{generate_backward, Start};
use bracket_sim::config::{generate_sample_config, Config};
use bracket_sim::ingest::ModelKind;
use bracket_sim::pool::{get_best_bracket, score_pool, PoolOutcome};
use bracket_sim::simulation::{AdvancementTable, SimulationOutput, SimulationRequest, Simulator};
use bracket_sim::{Bracket, Team, TournamentInfo};

#[derive(Parser)]
#[command(name = "bracket-sim")]
#[command(about = "Simulate a 64-team tournament, generate brackets and score bracket pools", long_about = None)]
struct Cli {
    /// Config file path (defaults: bracket-sim.yaml, bracket-sim.yml, .bracket-sim.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Team CSV; the built-in field is used when omitted
    #[arg(short, long, global = true)]
    teams: Option<PathBuf>,

    /// Master seed, overrides simulation.seed from the config
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate tournaments forward and report how far each team got
    Simulate {
        /// Number of simulations (defaults to simulation.count)
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Write every bracket as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build brackets backward from a champion
    Generate {
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
        /// Fix the champion by team name instead of sampling it
        #[arg(long)]
        champion: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate outcomes and pick the best entry of a backward-generated pool for each
    Pool {
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Brackets per pool (defaults to pool.pool_size)
        #[arg(long)]
        pool_size: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score a pool of brackets (JSON array) against a realized bracket (JSON)
    Score {
        #[arg(long)]
        actual: PathBuf,
        #[arg(long)]
        pool: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print or write a sample configuration file
    SampleConfig {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref()).context("loading configuration")?;
    if cli.seed.is_some() {
        config.simulation.seed = cli.seed;
    }

    match cli.command {
        Commands::SampleConfig { output } => match output {
            Some(path) => {
                fs::write(&path, generate_sample_config())
                    .with_context(|| format!("writing {}", path.display()))?;
                log::info!("wrote sample config to {}", path.display());
            }
            None => print!("{}", generate_sample_config()),
        },
        Commands::Simulate { count, output } => {
            let field = load_field(cli.teams.as_deref(), ModelKind::Rating)?;
            let count = count.unwrap_or(config.simulation.count);
            let brackets = run_outcomes(&config, &field, count)?;
            let table = AdvancementTable::from_brackets(&field, &brackets)?;
            print_table(&table);
            if let Some(path) = output {
                write_json(&path, &brackets)?;
            }
        }
        Commands::Generate { count, champion, output } => {
            let field = selection_field(&config, cli.teams.as_deref())?;
            let start = match champion {
                Some(name) => Start::Champion(field.find_team(&name)?.key()),
                None => Start::Sampled,
            };
            let mut rng = match config.simulation.seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            let brackets = (0..count)
                .map(|_| generate_backward(&field, &start, &mut rng))
                .collect::<Result<Vec<Bracket>, _>>()?;
            match output {
                Some(path) => write_json(&path, &brackets)?,
                None => {
                    for bracket in &brackets {
                        println!("{}", bracket);
                    }
                }
            }
        }
        Commands::Pool { count, pool_size, output } => {
            let odds_field = load_field(cli.teams.as_deref(), ModelKind::Rating)?;
            let selection = selection_field(&config, cli.teams.as_deref())?;
            let request = SimulationRequest::BracketGenerator {
                requested: count.unwrap_or(config.simulation.count),
                pool_size: pool_size.unwrap_or(config.pool.pool_size),
                odds_teams: owned_teams(&odds_field),
                selection_teams: owned_teams(&selection),
            };
            let outcomes = match run_request(&config, &request)? {
                SimulationOutput::PoolOutcomes(outcomes) => outcomes,
                _ => bail!("bracket generator request returned the wrong output"),
            };
            print_pool_summary(&outcomes);
            if let Some(path) = output {
                write_json(&path, &outcomes)?;
            }
        }
        Commands::Score { actual, pool, output } => {
            let actual: Bracket = read_json(&actual)?;
            let pool: Vec<Bracket> = read_json(&pool)?;
            let best = get_best_bracket(&actual, &pool, &config.scoring)?;
            let scores = score_pool(&actual, &pool, &config.scoring)?;
            println!("Best entry: #{} with {} of {} points", best.index, best.score, config.scoring.max_score());
            println!("Champion pick: {}", best.bracket.champion());
            if let Some(path) = output {
                #[derive(Serialize)]
                struct ScoreReport<'a> {
                    best_index: usize,
                    best_score: u32,
                    scores: &'a [u32],
                }
                let report = ScoreReport {
                    best_index: best.index,
                    best_score: best.score,
                    scores: &scores,
                };
                write_json(&path, &report)?;
            }
        }
    }
    Ok(())
}

fn load_field(path: Option<&Path>, default_kind: ModelKind) -> Result<TournamentInfo> {
    match path {
        Some(path) => {
            let field = TournamentInfo::from_csv(path).with_context(|| format!("loading teams from {}", path.display()))?;
            log::info!("loaded {} teams from {}", field.teams().len(), path.display());
            Ok(field)
        }
        None => Ok(TournamentInfo::default_field(default_kind)),
    }
}

// Backward generation needs selection odds. A rated field gets them estimated
// from forward simulations.
fn selection_field(config: &Config, path: Option<&Path>) -> Result<TournamentInfo> {
    let field = load_field(path, ModelKind::SelectionOdds)?;
    if field.model_kind() == Some(ModelKind::SelectionOdds) {
        return Ok(field);
    }
    log::info!(
        "estimating selection odds from {} forward simulations",
        config.simulation.count
    );
    let brackets = run_outcomes(config, &field, config.simulation.count)?;
    Ok(AdvancementTable::from_brackets(&field, &brackets)?.to_field(&field)?)
}

fn run_outcomes(config: &Config, field: &TournamentInfo, count: usize) -> Result<Vec<Bracket>> {
    let request = SimulationRequest::Outcomes {
        requested: count,
        teams: owned_teams(field),
    };
    match run_request(config, &request)? {
        SimulationOutput::Outcomes(brackets) => Ok(brackets),
        _ => bail!("outcome request returned the wrong output"),
    }
}

fn run_request(config: &Config, request: &SimulationRequest) -> Result<SimulationOutput> {
    let simulator = Simulator::from_config(config)?;
    let bar = ProgressBar::new(request.requested() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .progress_chars("#>-"),
    );
    let output = simulator
        .run(request, |progress| bar.set_position(progress.completed as u64))
        .with_context(|| format!("running {} request", request.name()))?;
    bar.finish_and_clear();
    Ok(output)
}

fn owned_teams(field: &TournamentInfo) -> Vec<Team> {
    field.teams().iter().map(|t| Team::clone(t)).collect()
}

fn print_table(table: &AdvancementTable) {
    println!("{:<24} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}", "Team", "R32", "S16", "E8", "F4", "Final", "Champ");
    let mut rows: Vec<_> = table.rows.iter().collect();
    rows.sort_by(|a, b| b.wins[5].cmp(&a.wins[5]).then(b.wins[4].cmp(&a.wins[4])));
    let n = table.simulations.max(1) as f64;
    for row in rows.iter().take(16) {
        let label = format!("{} ({})", row.name, row.team);
        print!("{:<24}", label);
        for wins in row.wins {
            print!(" {:>5.1}%", 100.0 * wins as f64 / n);
        }
        println!();
    }
}

fn print_pool_summary(outcomes: &[PoolOutcome]) {
    if outcomes.is_empty() {
        println!("No simulations run");
        return;
    }
    let total: u32 = outcomes.iter().map(|o| o.best_score).sum();
    let best = outcomes.iter().map(|o| o.best_score).max().unwrap_or(0);
    let correct_champion = outcomes
        .iter()
        .filter(|o| o.best_bracket.champion().key() == o.actual_result.champion().key())
        .count();
    println!("Simulations: {}", outcomes.len());
    println!("Average best score: {:.2}", total as f64 / outcomes.len() as f64);
    println!("Highest best score: {}", best);
    println!("Best entry picked the champion: {}/{}", correct_champion, outcomes.len());
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
