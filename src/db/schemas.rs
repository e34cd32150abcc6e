use rusqlite::{Connection, Result};

pub(crate) const REQUIRED_COLUMNS: [&str; 7] = [
    "name",
    "genus",
    "species",
    "taxon_id",
    "scientific_name",
    "assembly_count",
    "created_at",
];

pub(crate) fn initialize_schema(conn: &Connection) -> Result<()> {
    // One row per resolved input name
    conn.execute(
        "CREATE TABLE IF NOT EXISTS resolutions (
            name TEXT PRIMARY KEY,
            genus TEXT NOT NULL,
            species TEXT NOT NULL,
            taxon_id TEXT NOT NULL,
            scientific_name TEXT NOT NULL,
            assembly_count INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_resolutions_taxon
         ON resolutions(taxon_id)",
        [],
    )?;

    Ok(())
}
