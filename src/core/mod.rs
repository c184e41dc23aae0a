pub mod domain;
pub mod error;
pub mod matrix;
pub mod presets;
pub mod state;
