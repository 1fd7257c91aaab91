mod budget;
mod cache;
mod tag;
mod usage;

pub use budget::*;
pub use cache::*;
pub use tag::*;
pub use usage::*;
