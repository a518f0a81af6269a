use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

use super::error::{ModelError, SimResult};
use super::sampler::{Sampler, WeightedOutcomeSet};
use super::types::{RouletteColour, RouletteOutcome, RouletteTally};

pub const TOTAL_SLOTS: u32 = 37;
pub const RED_SLOTS: u32 = 18;
pub const BLACK_SLOTS: u32 = 18;
pub const GREEN_SLOTS: u32 = 1;

/// Single-zero wheel: 18 red, 18 black, 1 green.
#[derive(Debug, Clone)]
pub struct RouletteSampler {
    wheel: WeightedOutcomeSet<RouletteColour>,
}

impl RouletteSampler {
    pub fn new() -> SimResult<Self> {
        let wheel = WeightedOutcomeSet::new([
            (RouletteColour::Red, f64::from(RED_SLOTS)),
            (RouletteColour::Black, f64::from(BLACK_SLOTS)),
            (RouletteColour::Green, f64::from(GREEN_SLOTS)),
        ])?;
        Ok(Self { wheel })
    }

    pub fn probability(&self, colour: RouletteColour) -> f64 {
        self.wheel
            .outcomes()
            .iter()
            .position(|c| *c == colour)
            .map_or(0.0, |idx| self.wheel.probability(idx))
    }
}

impl Sampler for RouletteSampler {
    type Output = RouletteColour;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> RouletteColour {
        self.wheel.sample(rng)
    }
}

pub fn spin<S, R>(wheel: &S, rng: &mut R) -> RouletteColour
where
    S: Sampler<Output = RouletteColour>,
    R: Rng + ?Sized,
{
    wheel.sample(rng)
}

pub fn run_roulette<S, R>(
    spins: u64,
    choice: RouletteColour,
    wheel: &S,
    rng: &mut R,
) -> SimResult<RouletteOutcome>
where
    S: Sampler<Output = RouletteColour>,
    R: Rng + ?Sized,
{
    if spins == 0 {
        return Err(ModelError::InvalidConfig(
            "spin count must be at least 1".to_string(),
        ));
    }

    let mut tally = RouletteTally::default();
    for _ in 0..spins {
        tally.record(spin(wheel, rng));
    }

    let win_rate = tally.count(choice) as f64 / spins as f64;
    log::debug!(
        "roulette: {spins} spins, {} won {:.4}",
        choice.name(),
        win_rate
    );
    Ok(RouletteOutcome {
        choice,
        tally,
        win_rate,
    })
}

/// Seeded convenience wrapper over [`run_roulette`] with the standard wheel.
pub fn simulate_roulette(
    spins: u64,
    choice: RouletteColour,
    seed: u64,
) -> SimResult<RouletteOutcome> {
    let wheel = RouletteSampler::new()?;
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    run_roulette(spins, choice, &wheel, &mut rng)
}
