use log::debug;
use rayon::prelude::*;

use crate::core::domain::Problem;
use crate::core::error::{UcpError, UcpResult};
use crate::core::state::{is_on, state_count, StateCode};
use crate::engine::dispatch::unit_output;
use crate::engine::evaluator::ScheduleEvaluator;

/// Precomputed cost of every (state code, step) pair.
///
/// The search loops evaluate the same `2^G * S` pairs over and over, so the
/// per-tick market/penalty arithmetic is done once up front.
/// Storage is a flattened 2D matrix; access is O(1) via
/// `index = step * 2^G + state`.
#[derive(Debug, Clone)]
pub struct CostTable {
    gen_count: usize,
    step_count: usize,
    step_size: usize,
    costs: Vec<f64>,
}

/// The per-tick cost model the table is filled from.
struct CostModel<'a> {
    problem: &'a Problem,
    target: &'a [f64],
    penalty: f64,
    alpha: Vec<f64>,
    /// Generator indices in ascending alpha (merit order).
    merit_order: Vec<usize>,
}

impl<'a> CostModel<'a> {
    fn new(problem: &'a Problem, target: &'a [f64], penalty: f64) -> Self {
        let alpha: Vec<f64> = problem.generators.iter().map(|g| g.alpha()).collect();
        let mut merit_order: Vec<usize> = (0..alpha.len()).collect();
        merit_order.sort_by(|&a, &b| alpha[a].total_cmp(&alpha[b]));
        Self {
            problem,
            target,
            penalty,
            alpha,
            merit_order,
        }
    }

    /// Cost of serving tick `t` with the units committed in `state`.
    fn tick_cost(&self, state: StateCode, t: usize) -> f64 {
        let m = self.problem;
        let gen_count = m.gen_count();
        let tph = m.ticks_per_hour;
        let price = m.price[t];

        let mut p_remaining = self.target[t];
        let mut e_remaining = p_remaining / tph;
        let mut cost = 0.0;

        for &gen in &self.merit_order {
            if !is_on(state, gen_count, gen) {
                continue;
            }
            let g = &m.generators[gen];
            let p = unit_output(g.max_power, self.alpha[gen], price, p_remaining, m.can_buy, m.can_sell);

            cost += g.cost(p) / tph;
            p_remaining -= p;
            e_remaining -= p / tph;
        }

        if e_remaining < 0.0 {
            // Surplus: revenue if it can be sold, wasted otherwise.
            if m.can_sell {
                cost += e_remaining * price;
            }
        } else if m.can_buy {
            cost += e_remaining * price;
        } else {
            cost += e_remaining * self.penalty;
        }
        cost
    }

    fn entry(&self, state: StateCode, step: usize, step_size: usize) -> f64 {
        let t1 = step * step_size;
        (t1..t1 + step_size).map(|t| self.tick_cost(state, t)).sum()
    }
}

impl CostTable {
    /// Builds the table for the problem's own residual demand and penalty.
    pub fn build(problem: &Problem, step_count: usize) -> UcpResult<Self> {
        let target = problem.target();
        Self::build_with_target(problem, step_count, problem.penalty, &target)
    }

    /// Builds the table against an explicit per-tick target, e.g. demand
    /// already net of battery support.
    pub fn build_with_target(
        problem: &Problem,
        step_count: usize,
        penalty: f64,
        target: &[f64],
    ) -> UcpResult<Self> {
        problem.validate()?;
        let step_size = problem.step_size(step_count)?;
        if target.len() != problem.tick_count() {
            return Err(UcpError::LengthMismatch {
                name: "target",
                expected: problem.tick_count(),
                actual: target.len(),
            });
        }

        let gen_count = problem.gen_count();
        let states = state_count(gen_count);
        let model = CostModel::new(problem, target, penalty);

        let mut costs = vec![f64::NAN; states * step_count];
        costs
            .par_chunks_mut(states)
            .enumerate()
            .for_each(|(step, row)| {
                for (state, slot) in row.iter_mut().enumerate() {
                    *slot = model.entry(state as StateCode, step, step_size);
                }
            });

        let table = Self {
            gen_count,
            step_count,
            step_size,
            costs,
        };

        #[cfg(debug_assertions)]
        table.verify_purity(&model);

        debug!(
            "Cost table built: {} states x {} steps ({} ticks/step)",
            states, step_count, step_size
        );
        Ok(table)
    }

    /// Recomputes every entry and requires bit-identical results. A mismatch
    /// means the cost model is not a pure function of `(state, step)`.
    #[cfg(debug_assertions)]
    fn verify_purity(&self, model: &CostModel<'_>) {
        let states = state_count(self.gen_count);
        (0..self.step_count).into_par_iter().for_each(|step| {
            for state in 0..states as StateCode {
                let again = model.entry(state, step, self.step_size);
                let stored = self.step_cost(state, step);
                assert_eq!(
                    stored.to_bits(),
                    again.to_bits(),
                    "cost of state {} at step {} is not reproducible ({} vs {})",
                    state,
                    step,
                    stored,
                    again
                );
            }
        });
    }

    pub fn gen_count(&self) -> usize {
        self.gen_count
    }

    pub fn step_size(&self) -> usize {
        self.step_size
    }

    /// Bounds-checked lookup.
    pub fn get(&self, state: StateCode, step: usize) -> UcpResult<f64> {
        let states = state_count(self.gen_count);
        if state as usize >= states {
            return Err(UcpError::IndexOutOfRange {
                axis: "state",
                index: state as usize,
                len: states,
            });
        }
        if step >= self.step_count {
            return Err(UcpError::IndexOutOfRange {
                axis: "step",
                index: step,
                len: self.step_count,
            });
        }
        Ok(self.step_cost(state, step))
    }

    /// Cheapest entry of a step over all state codes.
    pub fn step_minimum(&self, step: usize) -> f64 {
        let states = state_count(self.gen_count);
        self.costs[step * states..(step + 1) * states]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}

impl ScheduleEvaluator for CostTable {
    #[inline(always)]
    fn step_cost(&self, state: StateCode, step: usize) -> f64 {
        self.costs[(step << self.gen_count) + state as usize]
    }

    fn step_count(&self) -> usize {
        self.step_count
    }

    fn name(&self) -> &str {
        "Precomputed cost table"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Generator;

    fn single_unit(can_buy: bool, can_sell: bool) -> Problem {
        Problem {
            generators: vec![Generator {
                max_power: 10.0,
                cost_a: 0.0,
                cost_b: 6.0,
                cost_c: 0.0,
                ..Default::default()
            }],
            load: vec![4.0, 4.0, 0.0, 0.0],
            renewable: vec![],
            price: vec![30.0; 4],
            can_buy,
            can_sell,
            penalty: 100.0,
            ticks_per_hour: 1.0,
        }
    }

    #[test]
    fn every_entry_matches_a_fresh_evaluation() {
        let problem = Problem {
            generators: vec![
                Generator { max_power: 10.0, cost_b: 6.0, cost_c: 3.0, ..Default::default() },
                Generator { max_power: 4.0, cost_a: 0.5, cost_b: 40.0, ..Default::default() },
                Generator { max_power: 7.0, cost_b: 25.0, cost_c: 9.0, ..Default::default() },
            ],
            load: vec![4.0, 12.0, 20.0, 1.0, 9.0, 15.0],
            renewable: vec![],
            price: vec![30.0, 30.0, 45.0, 45.0, 10.0, 10.0],
            can_buy: true,
            can_sell: true,
            penalty: 100.0,
            ticks_per_hour: 1.0,
        };
        let table = CostTable::build(&problem, 3).unwrap();
        let target = problem.target();
        let model = CostModel::new(&problem, &target, problem.penalty);
        for step in 0..3 {
            for state in 0..8 {
                let expected = model.entry(state, step, table.step_size());
                assert_eq!(table.get(state, step).unwrap().to_bits(), expected.to_bits());
            }
        }
    }

    #[test]
    fn unit_off_buys_or_pays_penalty() {
        let buy = CostTable::build(&single_unit(true, false), 2).unwrap();
        assert_eq!(buy.step_cost(0, 0), 8.0 * 30.0);
        let penalty = CostTable::build(&single_unit(false, false), 2).unwrap();
        assert_eq!(penalty.step_cost(0, 0), 8.0 * 100.0);
    }

    #[test]
    fn cheap_unit_covers_demand_without_selling() {
        let t = CostTable::build(&single_unit(false, false), 2).unwrap();
        // 2 ticks at 4 MW, 6 EUR/MWh.
        assert_eq!(t.step_cost(1, 0), 48.0);
        assert_eq!(t.step_cost(1, 1), 0.0);
    }

    #[test]
    fn cheap_unit_runs_flat_out_when_selling() {
        let t = CostTable::build(&single_unit(false, true), 2).unwrap();
        // Produce 10 MW at 6, sell the 6 MW surplus at 30.
        let per_tick = 60.0 - 6.0 * 30.0;
        assert_eq!(t.step_cost(1, 0), 2.0 * per_tick);
    }

    #[test]
    fn expensive_unit_idles_when_buying() {
        let mut p = single_unit(true, false);
        p.price = vec![1.0; 4];
        let t = CostTable::build(&p, 2).unwrap();
        assert_eq!(t.step_cost(1, 0), 8.0);
    }

    #[test]
    fn building_twice_is_bit_identical() {
        let p = single_unit(true, true);
        let a = CostTable::build(&p, 4).unwrap();
        let b = CostTable::build(&p, 4).unwrap();
        assert!(a.costs.iter().zip(&b.costs).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn checked_lookup_reports_axis() {
        let t = CostTable::build(&single_unit(true, false), 2).unwrap();
        assert!(matches!(t.get(2, 0), Err(UcpError::IndexOutOfRange { axis: "state", .. })));
        assert!(matches!(t.get(0, 2), Err(UcpError::IndexOutOfRange { axis: "step", .. })));
        assert_eq!(t.step_minimum(1), 0.0);
    }
}
