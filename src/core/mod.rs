mod engine;
mod error;
mod roulette;
mod sampler;
mod stats;
mod types;

pub use engine::{run_monte_carlo, run_monte_carlo_summary, run_trial, simulate, simulate_summary};
pub use error::{ModelError, SimResult};
pub use roulette::{RouletteSampler, TOTAL_SLOTS, run_roulette, simulate_roulette, spin};
pub use sampler::{AnnualReturnSampler, RETURN_BUCKETS, ReturnBucket, Sampler, WeightedOutcomeSet};
pub use stats::{
    DEFAULT_PERCENTILE_LEVELS, confidence_interval, median, percentile, percentile_table,
};
pub use types::{
    AggregateResult, ConfidenceInterval, Inputs, PercentileRow, PercentileTable, RouletteColour,
    RouletteOutcome, RouletteTally, SimulationReport, SummaryReport, TrialConfig, TrialResult,
};
