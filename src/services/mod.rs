mod analytics;
mod budgets;
mod cache_metrics;
mod rollup;
mod usage;

pub use analytics::*;
pub use budgets::*;
pub use cache_metrics::*;
pub use rollup::*;
pub use usage::*;
