mod score;
mod short_bursts;

pub use score::{GingleScore, Objective, ScoreFunction};
pub use short_bursts::{BurstStep, BurstSummary, ShortBursts};
