pub(crate) mod client;
pub(crate) mod types;

pub use client::{NcbiClient, NcbiConfig};
