use super::error::{ModelError, SimResult};
use super::types::{ConfidenceInterval, PercentileRow, PercentileTable};

pub const DEFAULT_PERCENTILE_LEVELS: [f64; 5] = [10.0, 25.0, 50.0, 75.0, 90.0];

/// Linear-interpolated percentile. Sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));
    percentile_of_sorted(values, p)
}

fn percentile_of_sorted(values: &[f64], p: f64) -> f64 {
    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        let (a, b) = (values[lower], values[upper]);
        (a + (b - a) * w).min(b)
    }
}

pub fn median(values: &[f64]) -> SimResult<f64> {
    if values.is_empty() {
        return Err(ModelError::EmptyInput("median of no values"));
    }
    let mut sorted = values.to_vec();
    Ok(percentile(&mut sorted, 50.0))
}

pub fn confidence_interval(
    terminal_values: &[f64],
    lower_tail: f64,
    upper_tail: f64,
) -> SimResult<ConfidenceInterval> {
    if terminal_values.is_empty() {
        return Err(ModelError::EmptyInput("confidence interval of no trials"));
    }
    if !(0.0..=1.0).contains(&lower_tail) || !(0.0..=1.0).contains(&upper_tail) {
        return Err(ModelError::InvalidConfig(format!(
            "tail probabilities must be within [0, 1], got {lower_tail} and {upper_tail}"
        )));
    }
    if lower_tail > upper_tail {
        return Err(ModelError::InvalidConfig(format!(
            "lower tail {lower_tail} is above upper tail {upper_tail}"
        )));
    }

    let mut sorted = terminal_values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(ConfidenceInterval {
        lower: percentile_of_sorted(&sorted, lower_tail * 100.0),
        upper: percentile_of_sorted(&sorted, upper_tail * 100.0),
    })
}

/// One row per step across all histories, labelled `base_offset + step + 1`.
pub fn percentile_table(
    histories: &[Vec<i64>],
    levels: &[f64],
    base_offset: u32,
) -> SimResult<PercentileTable> {
    let Some(first) = histories.first() else {
        return Err(ModelError::EmptyInput("percentile table of no histories"));
    };
    let step_count = first.len();
    if let Some((index, history)) = histories
        .iter()
        .enumerate()
        .find(|(_, h)| h.len() != step_count)
    {
        return Err(ModelError::LengthMismatch {
            index,
            expected: step_count,
            actual: history.len(),
        });
    }

    let mut columns = (0..step_count)
        .map(|_| Vec::with_capacity(histories.len()))
        .collect::<Vec<Vec<f64>>>();
    for history in histories {
        for (step, value) in history.iter().enumerate() {
            columns[step].push(*value as f64);
        }
    }

    table_from_columns(columns, levels, base_offset)
}

/// Builds the table from per-step value columns that have already been
/// gathered (column `s` holds every trial's value at step `s`).
pub(crate) fn table_from_columns(
    columns: Vec<Vec<f64>>,
    levels: &[f64],
    base_offset: u32,
) -> SimResult<PercentileTable> {
    if let Some(bad) = levels.iter().find(|l| !(0.0..=100.0).contains(*l)) {
        return Err(ModelError::InvalidConfig(format!(
            "percentile level {bad} must be within [0, 100]"
        )));
    }

    let mut rows = Vec::with_capacity(columns.len());
    for (step, mut column) in columns.into_iter().enumerate() {
        if column.is_empty() {
            return Err(ModelError::EmptyInput("percentile table step with no trials"));
        }
        column.sort_by(|a, b| a.total_cmp(b));
        let step_label = step as u32 + 1;
        rows.push(PercentileRow {
            year: step_label,
            age: base_offset + step_label,
            values: levels
                .iter()
                .map(|level| percentile_of_sorted(&column, *level))
                .collect(),
        });
    }

    Ok(PercentileTable {
        levels: levels.to_vec(),
        rows,
    })
}
