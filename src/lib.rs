//! Unit commitment for small microgrids.
//!
//! Thermal generator on/off schedules are searched with a binary particle
//! swarm (`solvers::pso`) or an exhaustive pruned enumeration
//! (`solvers::exhaustive`). Both share a precomputed cost table
//! (`engine::cost_table`) and the minimum up/down-time machinery in
//! `engine::constraints`.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod solvers;
