pub(crate) mod reader;
pub(crate) mod writer;

pub use reader::NameReader;
pub use writer::{write_records, RecordFormat, TSV_HEADER};
