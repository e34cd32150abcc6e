pub(crate) mod config;
pub(crate) mod lookup;

pub use config::{Backoff, ResolverConfig, RetryPolicy};
pub use lookup::{Resolver, TaxonomySource};
