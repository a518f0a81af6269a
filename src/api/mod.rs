use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Inputs, ModelError, PercentileTable, RouletteColour, RouletteOutcome, SimulationReport,
    simulate, simulate_roulette,
};

const HISTOGRAM_BINS: usize = 40;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliMode {
    Pot,
    Roulette,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CliColour {
    #[serde(alias = "Red", alias = "RED")]
    Red,
    #[serde(alias = "Black", alias = "BLACK")]
    Black,
    #[serde(alias = "Green", alias = "GREEN", alias = "house")]
    Green,
}

impl From<CliColour> for RouletteColour {
    fn from(value: CliColour) -> Self {
        match value {
            CliColour::Red => RouletteColour::Red,
            CliColour::Black => RouletteColour::Black,
            CliColour::Green => RouletteColour::Green,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pot-sim",
    about = "Monte Carlo estimator for investment pot growth and roulette win rates"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliMode::Pot)]
    mode: CliMode,
    #[arg(long, default_value_t = 20)]
    start_age: u32,
    #[arg(long, default_value_t = 65)]
    end_age: u32,
    #[arg(long, default_value_t = 5_000.0)]
    starting_pot: f64,
    #[arg(
        long,
        default_value_t = 6_000.0,
        help = "Amount added to the pot after each year's growth"
    )]
    annual_contribution: f64,
    #[arg(
        long,
        default_value_t = 300_000.0,
        help = "Pot size the percentile bands are compared against"
    )]
    target_amount: f64,
    #[arg(long, default_value_t = 10_000)]
    simulations: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 1_000_000, help = "Roulette mode: number of spins")]
    spins: u64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliColour::Red,
        help = "Roulette mode: colour whose win rate is reported"
    )]
    choice: CliColour,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    start_age: Option<u32>,
    end_age: Option<u32>,
    starting_pot: Option<f64>,
    annual_contribution: Option<f64>,
    target_amount: Option<f64>,
    simulations: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RoulettePayload {
    spins: Option<u64>,
    choice: Option<CliColour>,
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct RouletteRequest {
    spins: u64,
    choice: RouletteColour,
    seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistogramBin {
    lower: f64,
    upper: f64,
    count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetCrossing {
    level: f64,
    year: Option<u32>,
    age: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    simulations: u32,
    start_age: u32,
    end_age: u32,
    target_amount: f64,
    lower_confidence: f64,
    upper_confidence: f64,
    median_terminal_pot: f64,
    histogram: Vec<HistogramBin>,
    yearly_percentiles: PercentileTable,
    target_crossings: Vec<TargetCrossing>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouletteResponse {
    spins: u64,
    #[serde(flatten)]
    outcome: RouletteOutcome,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: &Cli) -> Result<Inputs, String> {
    if cli.end_age <= cli.start_age {
        return Err("--end-age must be > --start-age".to_string());
    }

    if cli.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }

    for (flag, value) in [
        ("--starting-pot", cli.starting_pot),
        ("--annual-contribution", cli.annual_contribution),
        ("--target-amount", cli.target_amount),
    ] {
        if !value.is_finite() {
            return Err(format!("{flag} must be a finite number"));
        }
    }

    Ok(Inputs {
        start_age: cli.start_age,
        end_age: cli.end_age,
        starting_pot: cli.starting_pot,
        annual_contribution: cli.annual_contribution,
        target_amount: cli.target_amount,
        n_simulations: cli.simulations,
        seed: cli.seed,
    })
}

fn build_roulette_request(cli: &Cli) -> Result<RouletteRequest, String> {
    if cli.spins == 0 {
        return Err("--spins must be > 0".to_string());
    }
    Ok(RouletteRequest {
        spins: cli.spins,
        choice: cli.choice.into(),
        seed: cli.seed,
    })
}

/// Parses command-line flags, runs the chosen model once and returns the
/// response as pretty JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;
    let json = match cli.mode {
        CliMode::Pot => {
            let inputs = build_inputs(&cli)?;
            let report = simulate(&inputs).map_err(|e| e.to_string())?;
            serde_json::to_string_pretty(&build_simulate_response(&inputs, &report))
        }
        CliMode::Roulette => {
            let request = build_roulette_request(&cli)?;
            let response = run_roulette_request(request).map_err(|e| e.to_string())?;
            serde_json::to_string_pretty(&response)
        }
    };
    json.map_err(|e| format!("Failed to encode response: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/roulette",
            get(roulette_get_handler).post(roulette_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("pot-sim HTTP API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let joined = tokio::task::spawn_blocking(move || {
        let report = simulate(&inputs)?;
        Ok::<_, ModelError>(build_simulate_response(&inputs, &report))
    })
    .await;

    match joined {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Simulation task failed: {e}"),
        ),
    }
}

async fn roulette_get_handler(Query(payload): Query<RoulettePayload>) -> Response {
    roulette_handler_impl(payload).await
}

async fn roulette_post_handler(Json(payload): Json<RoulettePayload>) -> Response {
    roulette_handler_impl(payload).await
}

async fn roulette_handler_impl(payload: RoulettePayload) -> Response {
    let request = match roulette_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match tokio::task::spawn_blocking(move || run_roulette_request(request)).await {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Roulette task failed: {e}"),
        ),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: SimulatePayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.start_age {
        cli.start_age = v;
    }
    if let Some(v) = payload.end_age {
        cli.end_age = v;
    }
    if let Some(v) = payload.starting_pot {
        cli.starting_pot = v;
    }
    if let Some(v) = payload.annual_contribution {
        cli.annual_contribution = v;
    }
    if let Some(v) = payload.target_amount {
        cli.target_amount = v;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }

    build_inputs(&cli)
}

fn roulette_request_from_payload(payload: RoulettePayload) -> Result<RouletteRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.spins {
        cli.spins = v;
    }
    if let Some(v) = payload.choice {
        cli.choice = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }

    build_roulette_request(&cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        mode: CliMode::Pot,
        start_age: 20,
        end_age: 65,
        starting_pot: 5_000.0,
        annual_contribution: 6_000.0,
        target_amount: 300_000.0,
        simulations: 10_000,
        seed: 42,
        spins: 1_000_000,
        choice: CliColour::Red,
    }
}

fn run_roulette_request(request: RouletteRequest) -> Result<RouletteResponse, ModelError> {
    let outcome = simulate_roulette(request.spins, request.choice, request.seed)?;
    Ok(RouletteResponse {
        spins: request.spins,
        outcome,
    })
}

fn build_simulate_response(inputs: &Inputs, report: &SimulationReport) -> SimulateResponse {
    SimulateResponse {
        simulations: inputs.n_simulations,
        start_age: inputs.start_age,
        end_age: inputs.end_age,
        target_amount: inputs.target_amount,
        lower_confidence: round_to_pennies(report.confidence.lower),
        upper_confidence: round_to_pennies(report.confidence.upper),
        median_terminal_pot: report.median_terminal,
        histogram: histogram(&report.aggregate.terminal_values, HISTOGRAM_BINS),
        target_crossings: target_crossings(&report.yearly_percentiles, inputs.target_amount),
        yearly_percentiles: report.yearly_percentiles.clone(),
    }
}

fn round_to_pennies(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First row in which each percentile column strictly exceeds `target`.
fn target_crossings(table: &PercentileTable, target: f64) -> Vec<TargetCrossing> {
    table
        .levels
        .iter()
        .enumerate()
        .map(|(idx, level)| {
            let row = table.rows.iter().find(|row| row.values[idx] > target);
            TargetCrossing {
                level: *level,
                year: row.map(|r| r.year),
                age: row.map(|r| r.age),
            }
        })
        .collect()
}

/// Equal-width bins between the smallest and largest value.
fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len() as u64,
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0u64; bins];
    for value in values {
        let idx = (((value - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            lower: min + width * idx as f64,
            upper: if idx + 1 == bins {
                max
            } else {
                min + width * (idx + 1) as f64
            },
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DEFAULT_PERCENTILE_LEVELS, PercentileRow};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn clap_defaults_match_api_defaults() {
        let parsed = Cli::try_parse_from(["pot-sim"]).expect("defaults parse");
        let defaults = default_cli_for_api();
        assert_eq!(parsed.mode, defaults.mode);
        assert_eq!(parsed.start_age, defaults.start_age);
        assert_eq!(parsed.end_age, defaults.end_age);
        assert_approx(parsed.starting_pot, defaults.starting_pot);
        assert_approx(parsed.annual_contribution, defaults.annual_contribution);
        assert_approx(parsed.target_amount, defaults.target_amount);
        assert_eq!(parsed.simulations, defaults.simulations);
        assert_eq!(parsed.seed, defaults.seed);
        assert_eq!(parsed.spins, defaults.spins);
        assert_eq!(parsed.choice, defaults.choice);
    }

    #[test]
    fn build_inputs_rejects_end_age_not_after_start_age() {
        let mut cli = sample_cli();
        cli.end_age = cli.start_age;

        let err = build_inputs(&cli).expect_err("must reject empty horizon");
        assert!(err.contains("--end-age"));
    }

    #[test]
    fn build_inputs_rejects_zero_simulations() {
        let mut cli = sample_cli();
        cli.simulations = 0;

        let err = build_inputs(&cli).expect_err("must reject zero simulations");
        assert!(err.contains("--simulations"));
    }

    #[test]
    fn build_inputs_rejects_non_finite_amounts() {
        let mut cli = sample_cli();
        cli.starting_pot = f64::NAN;

        let err = build_inputs(&cli).expect_err("must reject NaN pot");
        assert!(err.contains("--starting-pot"));
    }

    #[test]
    fn inputs_from_json_overlays_web_keys_on_defaults() {
        let inputs = inputs_from_json(
            r#"{"startAge":30,"endAge":40,"startingPot":1000,"simulations":12,"seed":9}"#,
        )
        .expect("valid payload");

        assert_eq!(inputs.start_age, 30);
        assert_eq!(inputs.end_age, 40);
        assert_approx(inputs.starting_pot, 1_000.0);
        assert_approx(inputs.annual_contribution, 6_000.0);
        assert_approx(inputs.target_amount, 300_000.0);
        assert_eq!(inputs.n_simulations, 12);
        assert_eq!(inputs.seed, 9);
    }

    #[test]
    fn inputs_from_json_rejects_garbage() {
        let err = inputs_from_json(r#"{"startAge":"soon"}"#).expect_err("must reject");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn roulette_payload_accepts_house_alias() {
        let payload: RoulettePayload =
            serde_json::from_str(r#"{"spins":10,"choice":"house"}"#).expect("valid payload");
        let request = roulette_request_from_payload(payload).expect("valid request");
        assert_eq!(request.choice, RouletteColour::Green);
        assert_eq!(request.spins, 10);
    }

    #[test]
    fn roulette_payload_rejects_zero_spins() {
        let payload = RoulettePayload {
            spins: Some(0),
            ..RoulettePayload::default()
        };
        let err = roulette_request_from_payload(payload).expect_err("must reject");
        assert!(err.contains("--spins"));
    }

    #[test]
    fn target_crossings_find_first_row_strictly_above_target() {
        let table = PercentileTable {
            levels: vec![10.0, 90.0],
            rows: vec![
                PercentileRow {
                    year: 1,
                    age: 21,
                    values: vec![50.0, 100.0],
                },
                PercentileRow {
                    year: 2,
                    age: 22,
                    values: vec![100.0, 150.0],
                },
                PercentileRow {
                    year: 3,
                    age: 23,
                    values: vec![120.0, 200.0],
                },
            ],
        };

        let crossings = target_crossings(&table, 100.0);
        assert_eq!(
            crossings,
            vec![
                TargetCrossing {
                    level: 10.0,
                    year: Some(3),
                    age: Some(23),
                },
                TargetCrossing {
                    level: 90.0,
                    year: Some(2),
                    age: Some(22),
                },
            ]
        );

        let never = target_crossings(&table, 1_000.0);
        assert!(never.iter().all(|c| c.year.is_none() && c.age.is_none()));
    }

    #[test]
    fn histogram_counts_every_value() {
        let values = (0..100).map(f64::from).collect::<Vec<_>>();
        let bins = histogram(&values, 10);
        assert_eq!(bins.len(), 10);
        assert!(bins.iter().all(|b| b.count == 10));
        assert_approx(bins[0].lower, 0.0);
        assert_approx(bins[9].upper, 99.0);
    }

    #[test]
    fn histogram_of_constant_values_is_one_bin() {
        let bins = histogram(&[5.0, 5.0, 5.0], 10);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
        assert!(histogram(&[], 10).is_empty());
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.start_age = 30;
        cli.end_age = 35;
        cli.simulations = 20;

        let inputs = build_inputs(&cli).expect("valid inputs");
        let report = simulate(&inputs).expect("valid run");
        let response = build_simulate_response(&inputs, &report);
        assert_eq!(response.yearly_percentiles.rows.len(), 5);
        assert_eq!(response.target_crossings.len(), DEFAULT_PERCENTILE_LEVELS.len());
        assert!(response.lower_confidence <= response.upper_confidence);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"lowerConfidence\""));
        assert!(json.contains("\"upperConfidence\""));
        assert!(json.contains("\"medianTerminalPot\""));
        assert!(json.contains("\"yearlyPercentiles\""));
        assert!(json.contains("\"targetCrossings\""));
        assert!(json.contains("\"histogram\""));
    }

    #[test]
    fn confidence_bounds_are_rounded_to_pennies() {
        assert_approx(round_to_pennies(1234.5678), 1234.57);
        assert_approx(round_to_pennies(-0.004), 0.0);
    }

    #[test]
    fn run_cli_reports_roulette_win_rate() {
        let json = run_cli([
            "pot-sim",
            "--mode",
            "roulette",
            "--spins",
            "2000",
            "--choice",
            "black",
        ])
        .expect("valid flags");
        assert!(json.contains("\"winRate\""));
        assert!(json.contains("\"choice\": \"black\""));
        assert!(json.contains("\"spins\": 2000"));
    }

    #[test]
    fn run_cli_rejects_invalid_horizon() {
        let err = run_cli(["pot-sim", "--start-age", "40", "--end-age", "30"])
            .expect_err("must reject");
        assert!(err.contains("--end-age"));
    }
}
