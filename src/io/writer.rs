use std::io::Write;
use anyhow::Result;
use crate::query::ResolutionRecord;

pub const TSV_HEADER: &str = "genus\tspecies\toriginal_name\ttaxon_id\tscientific_name\tassembly_count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One tab-separated line per record
    Tsv,
    /// One JSON object per line
    JsonLines,
}

pub fn write_records<W: Write>(
    writer: &mut W,
    records: &[ResolutionRecord],
    format: RecordFormat,
    header: bool,
) -> Result<()> {
    match format {
        RecordFormat::Tsv => {
            if header {
                writeln!(writer, "{}", TSV_HEADER)?;
            }
            for record in records {
                writeln!(writer, "{}", record.to_tsv())?;
            }
        }
        RecordFormat::JsonLines => {
            for record in records {
                serde_json::to_writer(&mut *writer, record)?;
                writeln!(writer)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
