use crate::core::domain::Generator;

/// Named thermal unit archetypes. Times are in minutes.
///
/// "Fast"/"Slow" refers to minimum up/down time, "Low-Eff"/"Hi-Eff" to the
/// cost per MWh at rated power.
const PRESETS: &[(&str, f64, f64, f64, f64, f64)] = &[
    // name, rated MW, min up/down (min), a, b, c
    ("Large Fast Low-Eff", 30.0, 240.0, 0.03, 9.0, 1450.0),
    ("Large Fast Hi-Eff", 30.0, 240.0, 0.025, 8.0, 1200.0),
    ("Large Slow Low-Eff", 30.0, 360.0, 0.03, 9.0, 1450.0),
    ("Large Slow Hi-Eff", 30.0, 360.0, 0.025, 8.0, 1200.0),
    ("Medium Fast Low-Eff", 6.0, 90.0, 0.04, 37.0, 125.0),
    ("Medium Fast Hi-Eff", 6.0, 90.0, 0.04, 32.75, 90.0),
    ("Medium Slow Low-Eff", 6.0, 180.0, 0.04, 37.0, 125.0),
    ("Small Fast Low-Eff", 2.0, 60.0, 0.003, 32.75, 55.0),
    ("Small Fast Hi-Eff", 2.0, 60.0, 0.003, 27.75, 48.0),
    ("Small Slow Low-Eff", 2.0, 120.0, 0.003, 32.75, 55.0),
    ("Small Slow Hi-Eff", 2.0, 120.0, 0.003, 27.75, 48.0),
];

/// The default fleet mix, one entry per unit.
pub const DEFAULT_FLEET: &[&str] = &[
    "Large Fast Low-Eff",
    "Large Slow Low-Eff",
    "Large Slow Hi-Eff",
    "Medium Fast Low-Eff",
    "Medium Fast Hi-Eff",
    "Medium Slow Low-Eff",
    "Small Fast Hi-Eff",
    "Small Fast Hi-Eff",
    "Small Slow Hi-Eff",
];

pub fn preset(name: &str) -> Option<Generator> {
    PRESETS
        .iter()
        .find(|p| p.0.eq_ignore_ascii_case(name))
        .map(|&(name, max_power, min_time, a, b, c)| Generator {
            name: name.to_string(),
            max_power,
            cost_a: a,
            cost_b: b,
            cost_c: c,
            min_up_time: min_time,
            min_down_time: min_time,
        })
}

pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|p| p.0)
}

/// First `count` units of the default fleet, cycling if more are requested.
pub fn default_fleet(count: usize) -> Vec<Generator> {
    DEFAULT_FLEET
        .iter()
        .cycle()
        .take(count)
        .filter_map(|name| preset(name))
        .collect()
}
