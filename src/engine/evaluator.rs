use crate::core::state::StateCode;

/// Scores step-resolution schedules. Lower is better.
/// Implementations are shared by reference across worker threads.
pub trait ScheduleEvaluator: Send + Sync {
    /// Cost of committing `state` during coarse step `step`.
    fn step_cost(&self, state: StateCode, step: usize) -> f64;

    /// Number of coarse steps this evaluator covers.
    fn step_count(&self) -> usize;

    /// Total cost of a full schedule.
    fn fitness(&self, schedule: &[StateCode]) -> f64 {
        schedule
            .iter()
            .enumerate()
            .map(|(step, &state)| self.step_cost(state, step))
            .sum()
    }

    /// Returns the name of the cost model.
    fn name(&self) -> &str;
}
