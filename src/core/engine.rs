use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

use super::error::{ModelError, SimResult};
use super::sampler::{AnnualReturnSampler, Sampler};
use super::stats::{
    DEFAULT_PERCENTILE_LEVELS, confidence_interval, median, percentile_table, table_from_columns,
};
use super::types::{
    AggregateResult, ConfidenceInterval, Inputs, SimulationReport, SummaryReport, TrialConfig,
    TrialResult,
};

/// Runs one pot through `config.step_count` years.
pub fn run_trial<S, R>(config: &TrialConfig, sampler: &S, rng: &mut R) -> TrialResult
where
    S: Sampler<Output = f64>,
    R: Rng + ?Sized,
{
    let mut pot = config.starting_pot;
    let mut history = Vec::with_capacity(config.step_count as usize);

    for _ in 0..config.step_count {
        let factor = sampler.sample(rng);
        pot = pot * factor + config.annual_contribution;
        history.push(pot.trunc() as i64);
    }

    TrialResult {
        terminal_value: pot,
        history,
    }
}

pub fn run_monte_carlo<S, R>(
    config: &TrialConfig,
    trials: u32,
    sampler: &S,
    rng: &mut R,
) -> SimResult<AggregateResult>
where
    S: Sampler<Output = f64>,
    R: Rng + ?Sized,
{
    check_run_shape(config, trials)?;

    let mut aggregate = AggregateResult::with_capacity(trials as usize);
    for _ in 0..trials {
        aggregate.push(run_trial(config, sampler, rng));
    }

    log::debug!(
        "monte carlo: {} trials x {} years aggregated",
        aggregate.trials(),
        config.step_count
    );
    Ok(aggregate)
}

struct YearlyAccumulator {
    columns: Vec<Vec<f64>>,
    terminal_values: Vec<f64>,
}

impl YearlyAccumulator {
    fn new(year_count: usize, expected_samples: usize) -> Self {
        Self {
            columns: (0..year_count)
                .map(|_| Vec::with_capacity(expected_samples))
                .collect(),
            terminal_values: Vec::with_capacity(expected_samples),
        }
    }

    fn push(&mut self, trial: TrialResult) {
        for (column, value) in self.columns.iter_mut().zip(trial.history) {
            column.push(value as f64);
        }
        self.terminal_values.push(trial.terminal_value);
    }

    fn into_report(self, levels: &[f64], base_offset: u32) -> SimResult<SummaryReport> {
        let (lower_tail, upper_tail) = ConfidenceInterval::DEFAULT_TAILS;
        let confidence = confidence_interval(&self.terminal_values, lower_tail, upper_tail)?;
        let median_terminal = median(&self.terminal_values)?;
        let yearly_percentiles = table_from_columns(self.columns, levels, base_offset)?;
        Ok(SummaryReport {
            terminal_values: self.terminal_values,
            confidence,
            median_terminal,
            yearly_percentiles,
        })
    }
}

/// Same draws as [`run_monte_carlo`], but each year's value goes straight into
/// a per-year column so full per-trial histories are never kept.
pub fn run_monte_carlo_summary<S, R>(
    config: &TrialConfig,
    trials: u32,
    sampler: &S,
    rng: &mut R,
    levels: &[f64],
    base_offset: u32,
) -> SimResult<SummaryReport>
where
    S: Sampler<Output = f64>,
    R: Rng + ?Sized,
{
    check_run_shape(config, trials)?;

    let mut acc = YearlyAccumulator::new(config.step_count as usize, trials as usize);
    for _ in 0..trials {
        acc.push(run_trial(config, sampler, rng));
    }
    acc.into_report(levels, base_offset)
}

/// Full pipeline: seeded aggregate plus confidence interval and yearly bands.
pub fn simulate(inputs: &Inputs) -> SimResult<SimulationReport> {
    inputs.validate()?;
    let config = inputs.trial_config()?;
    let sampler = AnnualReturnSampler::new()?;
    let mut rng = Pcg64Mcg::seed_from_u64(inputs.seed);

    let aggregate = run_monte_carlo(&config, inputs.n_simulations, &sampler, &mut rng)?;
    let (lower_tail, upper_tail) = ConfidenceInterval::DEFAULT_TAILS;
    let confidence = confidence_interval(&aggregate.terminal_values, lower_tail, upper_tail)?;
    let median_terminal = median(&aggregate.terminal_values)?;
    let yearly_percentiles = percentile_table(
        &aggregate.histories,
        &DEFAULT_PERCENTILE_LEVELS,
        inputs.start_age,
    )?;

    log::info!(
        "simulate: {} trials, median terminal pot {:.2}, 95% interval [{:.2}, {:.2}]",
        aggregate.trials(),
        median_terminal,
        confidence.lower,
        confidence.upper
    );
    Ok(SimulationReport {
        aggregate,
        confidence,
        median_terminal,
        yearly_percentiles,
    })
}

/// Streaming counterpart of [`simulate`].
pub fn simulate_summary(inputs: &Inputs, levels: &[f64]) -> SimResult<SummaryReport> {
    inputs.validate()?;
    let config = inputs.trial_config()?;
    let sampler = AnnualReturnSampler::new()?;
    let mut rng = Pcg64Mcg::seed_from_u64(inputs.seed);

    let report = run_monte_carlo_summary(
        &config,
        inputs.n_simulations,
        &sampler,
        &mut rng,
        levels,
        inputs.start_age,
    )?;
    log::info!(
        "simulate: {} trials summarised without histories",
        report.terminal_values.len()
    );
    Ok(report)
}

fn check_run_shape(config: &TrialConfig, trials: u32) -> SimResult<()> {
    if trials == 0 {
        return Err(ModelError::InvalidConfig(
            "trial count must be at least 1".to_string(),
        ));
    }
    if config.step_count == 0 {
        return Err(ModelError::InvalidConfig(
            "step count must be at least 1".to_string(),
        ));
    }
    Ok(())
}
