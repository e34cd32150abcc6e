pub(crate) mod types;

pub use types::{AssemblyCount, Query, ResolutionRecord};
