#![allow(dead_code)]

use ucp_swarm::core::domain::{Generator, Problem};
use ucp_swarm::core::state::StateCode;
use ucp_swarm::engine::evaluator::ScheduleEvaluator;

/// Scores a schedule by how many unit-steps differ from `target`.
pub struct MockEvaluator {
    pub target: Vec<StateCode>,
}

impl ScheduleEvaluator for MockEvaluator {
    fn step_cost(&self, state: StateCode, step: usize) -> f64 {
        (state ^ self.target[step]).count_ones() as f64
    }

    fn step_count(&self) -> usize {
        self.target.len()
    }

    fn name(&self) -> &str {
        "Mock Evaluator"
    }
}

/// One unit that always beats the grid price, no market access, hourly ticks.
///
/// Demand only appears in steps 0 and 2 (of 4, two ticks each), so the
/// optimum runs the unit exactly there: `2*(10*30+5) + 2*(10*60+5) = 1820`.
pub fn single_cheap_unit() -> Problem {
    Problem {
        generators: vec![Generator {
            name: "Cheap".into(),
            max_power: 100.0,
            cost_a: 0.0,
            cost_b: 10.0,
            cost_c: 5.0,
            min_up_time: 0.0,
            min_down_time: 0.0,
        }],
        load: vec![30.0, 30.0, 0.0, 0.0, 60.0, 60.0, 0.0, 0.0],
        renewable: vec![],
        price: vec![50.0; 8],
        can_buy: false,
        can_sell: false,
        penalty: 400.0,
        ticks_per_hour: 1.0,
    }
}

pub const SINGLE_UNIT_OPTIMUM: f64 = 1820.0;

/// Three units with different merit and minimum times over 24 hourly ticks.
/// With 4 steps the normalized minimum times are 2, 1 and 0 steps.
pub fn small_fleet(can_buy: bool, can_sell: bool) -> Problem {
    let load = vec![
        12.0, 10.0, 10.0, 11.0, 14.0, 20.0, //
        32.0, 40.0, 44.0, 42.0, 38.0, 35.0, //
        30.0, 28.0, 27.0, 30.0, 36.0, 45.0, //
        50.0, 48.0, 40.0, 30.0, 20.0, 15.0,
    ];
    let renewable = (0..24).map(|t| if (10..16).contains(&t) { 8.0 } else { 0.0 }).collect();
    let price = (0..24).map(|t| if t < 12 { 40.0 } else { 70.0 }).collect();

    Problem {
        generators: vec![
            Generator {
                name: "Base".into(),
                max_power: 30.0,
                cost_a: 0.01,
                cost_b: 20.0,
                cost_c: 50.0,
                min_up_time: 12.0,
                min_down_time: 12.0,
            },
            Generator {
                name: "Mid".into(),
                max_power: 15.0,
                cost_a: 0.02,
                cost_b: 35.0,
                cost_c: 20.0,
                min_up_time: 6.0,
                min_down_time: 6.0,
            },
            Generator {
                name: "Peaker".into(),
                max_power: 8.0,
                cost_a: 0.0,
                cost_b: 55.0,
                cost_c: 5.0,
                min_up_time: 0.0,
                min_down_time: 0.0,
            },
        ],
        load,
        renewable,
        price,
        can_buy,
        can_sell,
        penalty: 400.0,
        ticks_per_hour: 1.0,
    }
}
