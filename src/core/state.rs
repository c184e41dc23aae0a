use nalgebra::DMatrix;

/// On/off state of every generator at one step, packed into the low
/// `gen_count` bits. Generator `i` lives at bit `gen_count - 1 - i`.
pub type StateCode = u32;

/// Upper bound on generators so that `2^G` states fit a `StateCode` and the
/// cost table stays addressable.
pub const MAX_GENERATORS: usize = 20;

/// Number of distinct state codes for `gen_count` generators.
#[inline(always)]
pub fn state_count(gen_count: usize) -> usize {
    1usize << gen_count
}

/// Mask of the meaningful bits of a state code.
#[inline(always)]
pub fn state_mask(gen_count: usize) -> StateCode {
    ((1u64 << gen_count) - 1) as StateCode
}

/// Bit selecting generator `gen` inside a state code.
#[inline(always)]
pub fn gen_bit(gen_count: usize, gen: usize) -> StateCode {
    1 << (gen_count - gen - 1)
}

#[inline(always)]
pub fn is_on(code: StateCode, gen_count: usize, gen: usize) -> bool {
    code & gen_bit(gen_count, gen) != 0
}

/// Packs one 0/1 flag per generator into a state code.
pub fn encode(bits: &[u8]) -> StateCode {
    let gen_count = bits.len();
    bits.iter()
        .enumerate()
        .filter(|&(_, &b)| b & 1 == 1)
        .fold(0, |acc, (gen, _)| acc | gen_bit(gen_count, gen))
}

/// Unpacks a state code into one 0/1 flag per generator.
pub fn decode(code: StateCode, gen_count: usize) -> Vec<u8> {
    (0..gen_count)
        .map(|gen| is_on(code, gen_count, gen) as u8)
        .collect()
}

/// Decodes schedule number `comb` of the exhaustive enumeration.
///
/// Step `i` occupies bits `[i*G, (i+1)*G)` of the combination, step 0 in the
/// lowest group.
#[inline]
pub fn decode_combination(comb: u64, gen_count: usize, out: &mut [StateCode]) {
    let mask = state_mask(gen_count) as u64;
    for (step, slot) in out.iter_mut().enumerate() {
        *slot = ((comb >> (step * gen_count)) & mask) as StateCode;
    }
}

/// Inverse of [`decode_combination`].
pub fn encode_combination(schedule: &[StateCode], gen_count: usize) -> u64 {
    let mask = state_mask(gen_count) as u64;
    schedule
        .iter()
        .enumerate()
        .fold(0u64, |acc, (step, &code)| {
            acc | ((code as u64 & mask) << (step * gen_count))
        })
}

/// On/off flags of a single generator across the whole schedule.
pub fn generator_track(schedule: &[StateCode], gen_count: usize, gen: usize, out: &mut [u8]) {
    for (slot, &code) in out.iter_mut().zip(schedule) {
        *slot = is_on(code, gen_count, gen) as u8;
    }
}

/// Step-resolution schedule as a `[step][generator]` 0/1 matrix.
pub fn to_step_matrix(schedule: &[StateCode], gen_count: usize) -> DMatrix<u8> {
    DMatrix::from_fn(schedule.len(), gen_count, |step, gen| {
        is_on(schedule[step], gen_count, gen) as u8
    })
}

/// Expands a step schedule to `[tick][generator]`; each tick inherits the
/// state of step `tick / step_size`.
pub fn expand_to_ticks(
    schedule: &[StateCode],
    gen_count: usize,
    step_size: usize,
    tick_count: usize,
) -> DMatrix<u8> {
    let last = schedule.len().saturating_sub(1);
    DMatrix::from_fn(tick_count, gen_count, |tick, gen| {
        let step = (tick / step_size).min(last);
        is_on(schedule[step], gen_count, gen) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_zero_is_most_significant() {
        assert_eq!(encode(&[1, 0, 0]), 0b100);
        assert_eq!(encode(&[0, 0, 1]), 0b001);
        assert!(is_on(0b010, 3, 1));
        assert!(!is_on(0b010, 3, 0));
    }

    #[test]
    fn round_trip_all_codes() {
        for gen_count in 1..=12 {
            for code in 0..state_count(gen_count) as StateCode {
                assert_eq!(encode(&decode(code, gen_count)), code);
            }
        }
    }

    #[test]
    fn combination_groups_step_zero_lowest() {
        let mut out = [0; 3];
        decode_combination(0b11_01_10, 2, &mut out);
        assert_eq!(out, [0b10, 0b01, 0b11]);
        assert_eq!(encode_combination(&out, 2), 0b11_01_10);
    }

    #[test]
    fn expansion_repeats_each_step() {
        let m = expand_to_ticks(&[0b1, 0b0], 1, 3, 6);
        let col: Vec<u8> = m.column(0).iter().copied().collect();
        assert_eq!(col, vec![1, 1, 1, 0, 0, 0]);
    }
}
