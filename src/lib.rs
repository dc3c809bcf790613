pub mod backward;
pub mod bracket;
pub mod config;
pub mod error;
pub mod game_result;
pub mod ingest;
pub mod outcome;
pub mod pool;
pub mod simulation;
pub mod topology;

pub use bracket::Bracket;
pub use error::{SimError, SimResult};
pub use ingest::{Conference, RcTeam, Team, TeamKey, TeamModel, TournamentInfo};
pub use topology::Round;
