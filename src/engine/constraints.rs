use crate::core::state::{gen_bit, is_on, StateCode};

/// Reverts state switches that would break minimum down/up times, in place.
///
/// Single left-to-right pass. A unit trying to start before it has been off
/// for `min_down_norm` steps is held off; a unit trying to stop before it has
/// run `min_up_norm` steps is held on. The result always satisfies
/// [`is_schedule_valid`] for every generator, though it is not necessarily
/// the nearest valid schedule.
///
/// **Invariant**: `min_down_norm` and `min_up_norm` hold one entry per
/// generator, expressed in coarse steps.
pub fn fix_min_time_constraints(
    schedule: &mut [StateCode],
    gen_count: usize,
    min_down_norm: &[f64],
    min_up_norm: &[f64],
) {
    if schedule.is_empty() {
        return;
    }

    let mut down = vec![0u32; gen_count];
    let mut up = vec![0u32; gen_count];

    for gen in 0..gen_count {
        if is_on(schedule[0], gen_count, gen) {
            up[gen] += 1;
        } else {
            down[gen] += 1;
        }
    }

    for step in 1..schedule.len() {
        for gen in 0..gen_count {
            let bit = gen_bit(gen_count, gen);
            let was_on = schedule[step - 1] & bit != 0;
            let wants_on = schedule[step] & bit != 0;

            let stays_on = match (was_on, wants_on) {
                // Start-up: allowed once the unit has rested long enough.
                (false, true) => (down[gen] as f64) >= min_down_norm[gen],
                // Shut-down: refused until the unit has run long enough.
                (true, false) => (up[gen] as f64) < min_up_norm[gen],
                (_, on) => on,
            };

            if stays_on {
                schedule[step] |= bit;
                down[gen] = 0;
                up[gen] += 1;
            } else {
                schedule[step] &= !bit;
                up[gen] = 0;
                down[gen] += 1;
            }
        }
    }
}

/// Checks one generator's 0/1 track against its minimum down/up times
/// (in coarse steps). Minimums below one step can never bind.
pub fn is_schedule_valid(on_off: &[u8], min_down_norm: f64, min_up_norm: f64) -> bool {
    if min_down_norm < 1.0 && min_up_norm < 1.0 {
        return true;
    }
    let Some(&first) = on_off.first() else {
        return true;
    };

    let (mut down, mut up) = if first == 0 { (1u32, 0u32) } else { (0, 1) };

    for pair in on_off.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if curr == 1 {
            if prev == 0 && (down as f64) < min_down_norm {
                return false;
            }
            down = 0;
            up += 1;
        } else {
            if prev == 1 && (up as f64) < min_up_norm {
                return false;
            }
            up = 0;
            down += 1;
        }
    }
    true
}

/// Generators whose minimum times exceed one step and therefore need their
/// switches checked. The others can switch freely at this resolution.
pub fn verification_needed(min_down_norm: &[f64], min_up_norm: &[f64]) -> Vec<bool> {
    min_down_norm
        .iter()
        .zip(min_up_norm)
        .map(|(&d, &u)| d > 1.0 || u > 1.0)
        .collect()
}

/// Checks every generator of a step schedule.
pub fn is_schedule_feasible(
    schedule: &[StateCode],
    gen_count: usize,
    min_down_norm: &[f64],
    min_up_norm: &[f64],
) -> bool {
    let mut track = vec![0u8; schedule.len()];
    (0..gen_count).all(|gen| {
        crate::core::state::generator_track(schedule, gen_count, gen, &mut track);
        is_schedule_valid(&track, min_down_norm[gen], min_up_norm[gen])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const CHP_VALID: [u8; 24] = [
        0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 0, 1, 1, 0, 0, 0, 0, 1,
    ];
    const CHP_INVALID: [u8; 24] = [
        1, 0, 0, 0, 1, 0, 0, 1, 0, 0, 1, 1, 1, 1, 0, 0, 0, 1, 1, 0, 0, 0, 0, 1,
    ];

    #[test]
    fn chp_track_with_long_rest_is_valid() {
        assert!(is_schedule_valid(&CHP_VALID, 2.25, 0.0));
    }

    #[test]
    fn early_restart_breaks_min_down_time() {
        assert!(!is_schedule_valid(&CHP_INVALID, 2.25, 0.0));
    }

    #[test]
    fn sub_step_minimums_never_bind() {
        assert!(is_schedule_valid(&[1, 0, 1, 0, 1], 0.99, 0.5));
        assert!(!is_schedule_valid(&[1, 0, 1, 0, 1], 1.5, 0.5));
    }

    #[test]
    fn repair_holds_unit_off_until_rested() {
        let mut s = [0b1, 0b0, 0b1, 0b1, 0b1];
        fix_min_time_constraints(&mut s, 1, &[2.0], &[0.0]);
        assert_eq!(s, [0b1, 0b0, 0b0, 0b1, 0b1]);
    }

    #[test]
    fn repair_holds_unit_on_until_run_long_enough() {
        let mut s = [0b1, 0b0, 0b0, 0b0];
        fix_min_time_constraints(&mut s, 1, &[0.0], &[3.0]);
        assert_eq!(s, [0b1, 0b1, 0b1, 0b0]);
    }

    #[test]
    fn repaired_schedules_always_validate() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let gens = rng.gen_range(1..=4);
            let steps = rng.gen_range(1..=24);
            let down: Vec<f64> = (0..gens).map(|_| rng.gen_range(0.0..5.0)).collect();
            let up: Vec<f64> = (0..gens).map(|_| rng.gen_range(0.0..5.0)).collect();
            let mut s: Vec<StateCode> = (0..steps).map(|_| rng.gen_range(0..1 << gens)).collect();

            fix_min_time_constraints(&mut s, gens, &down, &up);
            assert!(is_schedule_feasible(&s, gens, &down, &up), "{:?}", s);
        }
    }

    #[test]
    fn verification_skips_fast_units() {
        assert_eq!(
            verification_needed(&[0.5, 2.0, 1.0], &[1.0, 0.0, 1.5]),
            vec![false, true, true]
        );
    }
}
