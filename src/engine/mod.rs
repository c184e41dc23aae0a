pub mod constraints;
pub mod cost_table;
pub mod dispatch;
pub mod evaluator;
pub mod operators;
