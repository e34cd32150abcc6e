pub(crate) mod database;
pub(crate) mod schemas;
pub(crate) mod types;

pub use database::ResultCache;
