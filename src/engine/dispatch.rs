use log::debug;
use nalgebra::DMatrix;
use serde::Serialize;

use crate::core::domain::Problem;
use crate::core::error::{UcpError, UcpResult};
use crate::core::matrix;

/// Allocates power among committed units, one tick at a time.
///
/// Units are served in merit order, each producing [`unit_output`].
/// Returns `[tick][generator]` MW.
pub fn economic_dispatch(problem: &Problem, commitment: &DMatrix<u8>) -> UcpResult<DMatrix<f64>> {
    problem.validate()?;
    check_shape(problem, commitment.nrows(), commitment.ncols())?;

    let gen_count = problem.gen_count();
    let alpha: Vec<f64> = problem.generators.iter().map(|g| g.alpha()).collect();
    let mut order: Vec<usize> = (0..gen_count).collect();
    order.sort_by(|&a, &b| alpha[a].total_cmp(&alpha[b]));

    let target = problem.target();
    let mut power = DMatrix::<f64>::zeros(problem.tick_count(), gen_count);
    let mut out = vec![0.0; gen_count];

    for (t, &demand) in target.iter().enumerate() {
        let on = matrix::row(commitment, t)?;
        let price = problem.price[t];
        let mut remaining = demand;
        out.fill(0.0);

        for &gen in &order {
            if on[gen] == 0 {
                continue;
            }
            let p = unit_output(
                problem.generators[gen].max_power,
                alpha[gen],
                price,
                remaining,
                problem.can_buy,
                problem.can_sell,
            );
            out[gen] = p;
            remaining -= p;
        }
        matrix::set_row(&mut power, t, &out)?;
    }
    Ok(power)
}

/// Output of one committed unit given what is left of the residual demand.
///
/// Flat out when the surplus can be sold at a profit, idle when buying is
/// no more expensive, otherwise just enough to cover local demand.
#[inline]
pub fn unit_output(
    max_power: f64,
    alpha: f64,
    price: f64,
    remaining: f64,
    can_buy: bool,
    can_sell: bool,
) -> f64 {
    match (alpha < price, can_sell, can_buy) {
        (true, true, _) => max_power,
        (false, _, true) => 0.0,
        _ => max_power.min(remaining.max(0.0)),
    }
}

fn check_shape(problem: &Problem, rows: usize, cols: usize) -> UcpResult<()> {
    if rows != problem.tick_count() {
        return Err(UcpError::LengthMismatch {
            name: "commitment ticks",
            expected: problem.tick_count(),
            actual: rows,
        });
    }
    if cols != problem.gen_count() {
        return Err(UcpError::LengthMismatch {
            name: "commitment generators",
            expected: problem.gen_count(),
            actual: cols,
        });
    }
    Ok(())
}

/// Aggregated result of a dispatched schedule.
///
/// Grid exchange `p_sys` is positive when buying and negative when selling.
/// Energies are in MWh and costs in EUR.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Thermal output per tick (MW).
    pub p_thr: Vec<f64>,
    /// Grid exchange per tick (MW).
    pub p_sys: Vec<f64>,
    /// Cost of the grid exchange per tick.
    pub c_sys: Vec<f64>,
    /// Demand neither produced nor bought, per tick (MW).
    pub p_unmet: Vec<f64>,
    /// Production that could not be sold, per tick (MW).
    pub p_excess: Vec<f64>,
    /// Operating cost per generator over the horizon.
    pub c_thr_per_gen: Vec<f64>,

    pub e_thr_total: f64,
    pub e_sys_total: f64,
    pub e_unmet_total: f64,
    pub c_thr_total: f64,
    pub c_sys_total: f64,
    pub c_penalty_total: f64,
}

impl DispatchReport {
    pub fn new(problem: &Problem, commitment: &DMatrix<u8>, power: &DMatrix<f64>) -> UcpResult<Self> {
        check_shape(problem, commitment.nrows(), commitment.ncols())?;
        check_shape(problem, power.nrows(), power.ncols())?;

        let tph = problem.ticks_per_hour;
        let ticks = problem.tick_count();
        let target = problem.target();

        let mut c_thr_per_gen = Vec::with_capacity(problem.gen_count());
        for (gen, g) in problem.generators.iter().enumerate() {
            let on = matrix::column(commitment, gen)?;
            let p = matrix::column(power, gen)?;
            let cost: f64 = on
                .iter()
                .zip(&p)
                .filter(|&(&on, _)| on != 0)
                .map(|(_, &p)| g.cost(p) / tph)
                .sum();
            c_thr_per_gen.push(cost);
        }

        let mut report = Self {
            p_thr: Vec::with_capacity(ticks),
            p_sys: Vec::with_capacity(ticks),
            c_sys: Vec::with_capacity(ticks),
            p_unmet: Vec::with_capacity(ticks),
            p_excess: Vec::with_capacity(ticks),
            c_thr_total: c_thr_per_gen.iter().sum(),
            c_thr_per_gen,
            e_thr_total: 0.0,
            e_sys_total: 0.0,
            e_unmet_total: 0.0,
            c_sys_total: 0.0,
            c_penalty_total: 0.0,
        };

        for t in 0..ticks {
            let thermal: f64 = power.row(t).iter().sum();
            let balance = target[t] - thermal;
            let price = problem.price[t];

            let (sys, unmet, excess) = if balance > 0.0 {
                if problem.can_buy {
                    (balance, 0.0, 0.0)
                } else {
                    (0.0, balance, 0.0)
                }
            } else if problem.can_sell {
                (balance, 0.0, 0.0)
            } else {
                (0.0, 0.0, -balance)
            };

            let c_sys = sys * price / tph;
            report.p_thr.push(thermal);
            report.p_sys.push(sys);
            report.c_sys.push(c_sys);
            report.p_unmet.push(unmet);
            report.p_excess.push(excess);

            report.e_thr_total += thermal / tph;
            report.e_sys_total += sys / tph;
            report.e_unmet_total += unmet / tph;
            report.c_sys_total += c_sys;
            report.c_penalty_total += unmet / tph * problem.penalty;
        }

        debug!(
            "Dispatch: {:.3} MWh thermal, {:.3} MWh grid, total cost {:.2}",
            report.e_thr_total,
            report.e_sys_total,
            report.total_cost()
        );
        Ok(report)
    }

    /// Operating cost plus grid exchange plus unmet-demand penalty.
    pub fn total_cost(&self) -> f64 {
        self.c_thr_total + self.c_sys_total + self.c_penalty_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Generator;

    fn two_units(can_buy: bool, can_sell: bool) -> Problem {
        Problem {
            generators: vec![
                Generator { max_power: 5.0, cost_b: 50.0, ..Default::default() },
                Generator { max_power: 3.0, cost_b: 10.0, ..Default::default() },
            ],
            load: vec![6.0, 2.0],
            renewable: vec![],
            price: vec![20.0, 20.0],
            can_buy,
            can_sell,
            penalty: 400.0,
            ticks_per_hour: 1.0,
        }
    }

    #[test]
    fn cheapest_unit_is_loaded_first() {
        let p = two_units(false, false);
        let on = DMatrix::from_element(2, 2, 1u8);
        let power = economic_dispatch(&p, &on).unwrap();
        assert_eq!(matrix::row(&power, 0).unwrap(), vec![3.0, 3.0]);
        assert_eq!(matrix::row(&power, 1).unwrap(), vec![0.0, 2.0]);
    }

    #[test]
    fn buys_instead_of_running_expensive_unit() {
        let p = two_units(true, false);
        let on = DMatrix::from_element(2, 2, 1u8);
        let power = economic_dispatch(&p, &on).unwrap();
        assert_eq!(matrix::column(&power, 0).unwrap(), vec![0.0, 0.0]);

        let report = DispatchReport::new(&p, &on, &power).unwrap();
        assert_eq!(report.p_sys, vec![3.0, 0.0]);
        assert_eq!(report.c_sys_total, 60.0);
        // Unit 0 is committed at zero output: (0 + 0 + c) each tick.
        assert_eq!(report.c_thr_per_gen[0], 0.0);
    }

    #[test]
    fn sells_surplus_of_cheap_unit() {
        let p = two_units(false, true);
        let on = DMatrix::from_row_slice(2, 2, &[0, 1, 0, 1]);
        let power = economic_dispatch(&p, &on).unwrap();
        let report = DispatchReport::new(&p, &on, &power).unwrap();
        assert_eq!(report.p_thr, vec![3.0, 3.0]);
        assert_eq!(report.p_unmet, vec![3.0, 0.0]);
        assert_eq!(report.p_sys, vec![0.0, -1.0]);
        assert_eq!(report.c_penalty_total, 1200.0);
    }

    #[test]
    fn rejects_wrong_commitment_shape() {
        let p = two_units(true, true);
        let on = DMatrix::from_element(3, 2, 1u8);
        assert!(matches!(
            economic_dispatch(&p, &on),
            Err(UcpError::LengthMismatch { name: "commitment ticks", .. })
        ));
    }
}
