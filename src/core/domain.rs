use serde::{Deserialize, Serialize};

use crate::core::error::{UcpError, UcpResult};
use crate::core::state::MAX_GENERATORS;

// --- Constants ---
pub const DEFAULT_PENALTY: f64 = 400.0;
pub const DEFAULT_TICKS_PER_HOUR: f64 = 60.0;

// --- Physical Types ---

/// A dispatchable thermal unit with a quadratic fuel cost curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    #[serde(default)]
    pub name: String,
    pub max_power: f64,    // MW
    pub cost_a: f64,       // EUR/MW^2h
    pub cost_b: f64,       // EUR/MWh
    pub cost_c: f64,       // EUR/h
    pub min_up_time: f64,  // ticks
    pub min_down_time: f64, // ticks
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            name: "Unit".to_string(),
            max_power: 1.0,
            cost_a: 0.0,
            cost_b: 1.0,
            cost_c: 0.0,
            min_up_time: 0.0,
            min_down_time: 0.0,
        }
    }
}

impl Generator {
    /// Hourly cost of running at output `p`.
    #[inline(always)]
    pub fn cost(&self, p: f64) -> f64 {
        self.cost_a * p * p + self.cost_b * p + self.cost_c
    }

    /// Cost per unit of energy when running flat out.
    /// Used to rank generators from most to least efficient.
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.cost(self.max_power) / self.max_power
    }
}

/// Everything a search needs to know about the microgrid. Immutable for the
/// duration of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub generators: Vec<Generator>,

    /// Per-tick load (MW).
    pub load: Vec<f64>,
    /// Per-tick renewable generation (MW). Empty means none.
    #[serde(default)]
    pub renewable: Vec<f64>,
    /// Per-tick clearing price (EUR/MWh).
    pub price: Vec<f64>,

    #[serde(default)]
    pub can_buy: bool,
    #[serde(default)]
    pub can_sell: bool,

    /// Cost per MWh of demand that can be neither produced nor bought.
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    #[serde(default = "default_ticks_per_hour")]
    pub ticks_per_hour: f64,
}

fn default_penalty() -> f64 {
    DEFAULT_PENALTY
}

fn default_ticks_per_hour() -> f64 {
    DEFAULT_TICKS_PER_HOUR
}

impl Problem {
    pub fn gen_count(&self) -> usize {
        self.generators.len()
    }

    pub fn tick_count(&self) -> usize {
        self.load.len()
    }

    /// Residual demand the thermal fleet is asked to cover at every tick.
    pub fn target(&self) -> Vec<f64> {
        self.load
            .iter()
            .enumerate()
            .map(|(t, &load)| {
                let res = self.renewable.get(t).copied().unwrap_or(0.0);
                (load - res).max(0.0)
            })
            .collect()
    }

    /// Ticks per coarse step when the horizon is split into `step_count`.
    pub fn step_size(&self, step_count: usize) -> UcpResult<usize> {
        if step_count == 0 {
            return Err(UcpError::ZeroSteps);
        }
        let ticks = self.tick_count();
        if ticks < step_count || ticks % step_count != 0 {
            return Err(UcpError::IndivisibleHorizon {
                ticks,
                steps: step_count,
            });
        }
        Ok(ticks / step_count)
    }

    /// Minimum down/up times expressed in coarse steps.
    pub fn normalized_min_times(&self, step_size: usize) -> (Vec<f64>, Vec<f64>) {
        let size = step_size as f64;
        self.generators
            .iter()
            .map(|g| (g.min_down_time / size, g.min_up_time / size))
            .unzip()
    }

    /// Checks the invariants every search relies on.
    pub fn validate(&self) -> UcpResult<()> {
        let gens = self.gen_count();
        if gens == 0 {
            return Err(UcpError::NoGenerators);
        }
        if gens > MAX_GENERATORS {
            return Err(UcpError::TooManyGenerators {
                count: gens,
                max: MAX_GENERATORS,
            });
        }

        let ticks = self.tick_count();
        if ticks == 0 {
            return Err(UcpError::LengthMismatch {
                name: "load",
                expected: 1,
                actual: 0,
            });
        }
        if self.price.len() != ticks {
            return Err(UcpError::LengthMismatch {
                name: "price",
                expected: ticks,
                actual: self.price.len(),
            });
        }
        if !self.renewable.is_empty() && self.renewable.len() != ticks {
            return Err(UcpError::LengthMismatch {
                name: "renewable",
                expected: ticks,
                actual: self.renewable.len(),
            });
        }
        for (name, values) in [("load", &self.load), ("renewable", &self.renewable), ("price", &self.price)] {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(UcpError::NonFinite { name, index });
            }
        }
        if !self.penalty.is_finite() {
            return Err(UcpError::InvalidOption {
                name: "penalty",
                reason: format!("must be finite, got {}", self.penalty),
            });
        }
        if !(self.ticks_per_hour > 0.0 && self.ticks_per_hour.is_finite()) {
            return Err(UcpError::InvalidOption {
                name: "ticks_per_hour",
                reason: format!("must be positive, got {}", self.ticks_per_hour),
            });
        }

        for (index, g) in self.generators.iter().enumerate() {
            let reason = if !(g.max_power > 0.0) {
                Some(format!("max power must be positive, got {}", g.max_power))
            } else if !(g.min_up_time >= 0.0 && g.min_down_time >= 0.0)
                || !(g.min_up_time.is_finite() && g.min_down_time.is_finite())
            {
                Some("minimum up/down times must be finite and not negative".to_string())
            } else if !g.alpha().is_finite() {
                Some("cost coefficients must be finite".to_string())
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(UcpError::InvalidGenerator { index, reason });
            }
        }
        Ok(())
    }
}

// --- Search Configuration ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmType {
    ParticleSwarm,
    Exhaustive,
}

/// Parameters of the binary particle swarm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PsoOptions {
    /// Master seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Independent swarms run in parallel; the best one wins.
    pub run_count: usize,
    pub iter_count: usize,
    pub particle_count: usize,
    pub step_count: usize,
}

impl Default for PsoOptions {
    fn default() -> Self {
        Self {
            seed: None,
            run_count: 2,
            iter_count: 180,
            particle_count: 48,
            step_count: 24,
        }
    }
}

impl PsoOptions {
    pub fn validate(&self) -> UcpResult<()> {
        let positive = [
            ("run_count", self.run_count),
            ("iter_count", self.iter_count),
            ("particle_count", self.particle_count),
            ("step_count", self.step_count),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(UcpError::InvalidOption {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Parameters of the exhaustive search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExhaustiveOptions {
    pub step_count: usize,
    /// Number of contiguous segments searched in parallel.
    pub task_count: usize,
}

impl Default for ExhaustiveOptions {
    fn default() -> Self {
        Self {
            step_count: 8,
            task_count: 8,
        }
    }
}

impl ExhaustiveOptions {
    pub fn validate(&self) -> UcpResult<()> {
        if self.step_count == 0 {
            return Err(UcpError::ZeroSteps);
        }
        if self.task_count == 0 {
            return Err(UcpError::InvalidOption {
                name: "task_count",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A complete, loadable scenario: the problem plus how to search it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub problem: Problem,
    #[serde(default = "default_algorithm")]
    pub algorithm: AlgorithmType,
    #[serde(default)]
    pub pso: PsoOptions,
    #[serde(default)]
    pub exhaustive: ExhaustiveOptions,
}

fn default_algorithm() -> AlgorithmType {
    AlgorithmType::ParticleSwarm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_problem(ticks: usize) -> Problem {
        Problem {
            generators: vec![Generator::default()],
            load: vec![1.0; ticks],
            renewable: vec![],
            price: vec![10.0; ticks],
            can_buy: true,
            can_sell: false,
            penalty: DEFAULT_PENALTY,
            ticks_per_hour: DEFAULT_TICKS_PER_HOUR,
        }
    }

    #[test]
    fn alpha_is_cost_per_mw_at_max() {
        let g = Generator {
            max_power: 30.0,
            cost_a: 0.03,
            cost_b: 9.0,
            cost_c: 1450.0,
            ..Default::default()
        };
        assert!((g.alpha() - 58.23333).abs() < 1e-4);
    }

    #[test]
    fn rejects_mismatched_price() {
        let mut p = flat_problem(24);
        p.price.pop();
        assert_eq!(
            p.validate(),
            Err(UcpError::LengthMismatch { name: "price", expected: 24, actual: 23 })
        );
    }

    #[test]
    fn step_size_requires_even_split() {
        let p = flat_problem(24);
        assert_eq!(p.step_size(6), Ok(4));
        assert!(matches!(p.step_size(5), Err(UcpError::IndivisibleHorizon { .. })));
        assert_eq!(p.step_size(0), Err(UcpError::ZeroSteps));
    }

    #[test]
    fn target_subtracts_renewables() {
        let mut p = flat_problem(3);
        p.renewable = vec![0.5, 2.0, 0.0];
        assert_eq!(p.target(), vec![0.5, 0.0, 1.0]);
    }
}
