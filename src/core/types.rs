use serde::Serialize;

use super::error::{ModelError, SimResult};

#[derive(Debug, Clone)]
pub struct Inputs {
    pub start_age: u32,
    pub end_age: u32,
    pub starting_pot: f64,
    pub annual_contribution: f64,
    pub target_amount: f64,
    pub n_simulations: u32,
    pub seed: u64,
}

impl Inputs {
    /// Number of simulated years between the start and end age.
    pub fn step_count(&self) -> SimResult<u32> {
        if self.end_age <= self.start_age {
            return Err(ModelError::InvalidConfig(format!(
                "end_age ({}) must be greater than start_age ({})",
                self.end_age, self.start_age
            )));
        }
        Ok(self.end_age - self.start_age)
    }

    pub fn validate(&self) -> SimResult<()> {
        self.step_count()?;
        if self.n_simulations == 0 {
            return Err(ModelError::InvalidConfig(
                "n_simulations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn trial_config(&self) -> SimResult<TrialConfig> {
        Ok(TrialConfig {
            step_count: self.step_count()?,
            starting_pot: self.starting_pot,
            annual_contribution: self.annual_contribution,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialConfig {
    pub step_count: u32,
    pub starting_pot: f64,
    pub annual_contribution: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub terminal_value: f64,
    /// Post-update pot after each year, truncated toward zero.
    pub history: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub terminal_values: Vec<f64>,
    pub histories: Vec<Vec<i64>>,
}

impl AggregateResult {
    pub fn with_capacity(trials: usize) -> Self {
        Self {
            terminal_values: Vec::with_capacity(trials),
            histories: Vec::with_capacity(trials),
        }
    }

    pub fn push(&mut self, trial: TrialResult) {
        self.terminal_values.push(trial.terminal_value);
        self.histories.push(trial.history);
    }

    pub fn trials(&self) -> usize {
        self.terminal_values.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileRow {
    pub year: u32,
    pub age: u32,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileTable {
    pub levels: Vec<f64>,
    pub rows: Vec<PercentileRow>,
}

impl PercentileTable {
    pub fn column_index(&self, level: f64) -> Option<usize> {
        self.levels.iter().position(|l| (l - level).abs() < 1e-9)
    }

    /// Values for one percentile level, in row order.
    pub fn column(&self, level: f64) -> Option<Vec<f64>> {
        let idx = self.column_index(level)?;
        Some(self.rows.iter().map(|row| row.values[idx]).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub const DEFAULT_TAILS: (f64, f64) = (0.025, 0.975);

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouletteColour {
    Red,
    Black,
    Green,
}

impl RouletteColour {
    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Black => "black",
            Self::Green => "green",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouletteTally {
    pub red: u64,
    pub black: u64,
    pub green: u64,
}

impl RouletteTally {
    pub fn record(&mut self, colour: RouletteColour) {
        match colour {
            RouletteColour::Red => self.red += 1,
            RouletteColour::Black => self.black += 1,
            RouletteColour::Green => self.green += 1,
        }
    }

    pub fn count(&self, colour: RouletteColour) -> u64 {
        match colour {
            RouletteColour::Red => self.red,
            RouletteColour::Black => self.black,
            RouletteColour::Green => self.green,
        }
    }

    pub fn spins(&self) -> u64 {
        self.red + self.black + self.green
    }

    pub fn win_rate(&self, colour: RouletteColour) -> f64 {
        let spins = self.spins();
        if spins == 0 {
            return 0.0;
        }
        self.count(colour) as f64 / spins as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouletteOutcome {
    pub choice: RouletteColour,
    pub tally: RouletteTally,
    pub win_rate: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub aggregate: AggregateResult,
    pub confidence: ConfidenceInterval,
    pub median_terminal: f64,
    pub yearly_percentiles: PercentileTable,
}

/// Result of the streaming aggregator: no per-trial histories retained.
#[derive(Debug, Clone)]
pub struct SummaryReport {
    pub terminal_values: Vec<f64>,
    pub confidence: ConfidenceInterval,
    pub median_terminal: f64,
    pub yearly_percentiles: PercentileTable,
}
