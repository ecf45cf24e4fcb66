//! Layout reconstruction: column detection over block positions, reading-order
//! linearization and document style statistics.

pub mod columns;
pub mod kmeans;
pub mod style;

pub use columns::{ColumnLayout, ColumnReconstructor};
pub use style::summarize_style;
