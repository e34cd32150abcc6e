use rusqlite::{params, Connection, OptionalExtension, Row};
use anyhow::{Context, Result};
use std::path::Path;
use log::{debug, info};

use super::schemas::{initialize_schema, REQUIRED_COLUMNS};
use super::types::{CacheStats, CachedRecord};
use crate::query::{AssemblyCount, ResolutionRecord};

/// SQLite store of successfully resolved names
pub struct ResultCache {
    conn: Connection,
}

impl ResultCache {
    /// Create a new cache database or open an existing one
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open cache at {}", path.as_ref().display()))?;
        initialize_schema(&conn)?;
        Ok(ResultCache { conn })
    }

    /// Look up a cached record by the name it was resolved from
    pub fn get(&self, name: &str) -> Result<Option<ResolutionRecord>> {
        let record = self.conn.query_row(
            "SELECT name, genus, species, taxon_id, scientific_name, assembly_count
             FROM resolutions WHERE name = ?",
            params![name],
            record_from_row,
        ).optional()?;

        Ok(record)
    }

    /// Insert or replace the record for its original name.
    ///
    /// Degraded records, records without a taxon ID and records whose
    /// assembly count was declined are rejected.
    pub fn store(&mut self, record: &ResolutionRecord) -> Result<()> {
        if record.count_declined {
            return Err(anyhow::anyhow!("Refusing to cache {} without a reported assembly count", record.original_name));
        }
        let AssemblyCount::Count(count) = record.assembly_count else {
            return Err(anyhow::anyhow!("Refusing to cache degraded record for {}", record.original_name));
        };
        let Some(taxon_id) = &record.taxon_id else {
            return Err(anyhow::anyhow!("Refusing to cache {} without a taxon ID", record.original_name));
        };

        let count = i64::try_from(count).context("Assembly count out of range")?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO resolutions
             (name, genus, species, taxon_id, scientific_name, assembly_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.original_name,
                record.genus,
                record.species,
                taxon_id,
                record.scientific_name,
                count,
            ],
        )?;
        tx.commit()?;

        debug!("Cached {} -> {}", record.original_name, taxon_id);
        Ok(())
    }

    /// Remove one record
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM resolutions WHERE name = ?",
            params![name],
        )?;

        if removed > 0 {
            info!("Removed {} from cache", name);
        }
        Ok(removed > 0)
    }

    /// Remove every record, returning how many were deleted
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM resolutions", [])?;
        info!("Cleared {} cached records", removed);
        Ok(removed)
    }

    /// List cached records ordered by name
    pub fn list(&self, with_assemblies: bool) -> Result<Vec<CachedRecord>> {
        let query = if with_assemblies {
            "SELECT name, genus, species, taxon_id, scientific_name, assembly_count, created_at
             FROM resolutions
             WHERE assembly_count > 0
             ORDER BY name"
        } else {
            "SELECT name, genus, species, taxon_id, scientific_name, assembly_count, created_at
             FROM resolutions
             ORDER BY name"
        };

        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt.query_map([], |row| {
            Ok(CachedRecord {
                record: record_from_row(row)?,
                created_at: row.get(6)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Get cache statistics
    pub fn statistics(&self) -> Result<CacheStats> {
        let (total, with_assemblies, assemblies, taxa): (i64, i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(assembly_count > 0), 0),
                    COALESCE(SUM(assembly_count), 0),
                    COUNT(DISTINCT taxon_id)
             FROM resolutions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(CacheStats {
            total_records: total as usize,
            records_with_assemblies: with_assemblies as usize,
            total_assemblies: assemblies.max(0) as u64,
            distinct_taxa: taxa as usize,
        })
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        self.validate_schema(&mut report)?;
        if !report.has_errors() {
            self.validate_data(&mut report)?;
        }

        Ok(report)
    }

    fn validate_schema(&self, report: &mut ValidationReport) -> Result<()> {
        let columns: Vec<String> = self.conn.prepare(
            "SELECT name FROM pragma_table_info('resolutions')"
        )?.query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

        let missing: Vec<&str> = REQUIRED_COLUMNS.iter()
            .copied()
            .filter(|c| !columns.iter().any(|existing| existing == c))
            .collect();

        if columns.is_empty() {
            report.add_error("Missing required table 'resolutions'");
        } else if !missing.is_empty() {
            report.add_error(format!(
                "Resolutions table is missing columns: {}",
                missing.join(", ")
            ));
        }

        Ok(())
    }

    fn validate_data(&self, report: &mut ValidationReport) -> Result<()> {
        let negative = self.conn.query_row(
            "SELECT COUNT(*) FROM resolutions WHERE assembly_count < 0",
            [],
            |row| row.get::<_, i64>(0)
        )?;

        if negative > 0 {
            report.add_error(format!("Found {} records with a negative assembly count", negative));
        }

        let blank_ids = self.conn.query_row(
            "SELECT COUNT(*) FROM resolutions WHERE TRIM(taxon_id) = ''",
            [],
            |row| row.get::<_, i64>(0)
        )?;

        if blank_ids > 0 {
            report.add_error(format!("Found {} records without a taxon ID", blank_ids));
        }

        let unnamed: Vec<String> = self.conn.prepare(
            "SELECT name FROM resolutions
             WHERE TRIM(scientific_name) = '' OR scientific_name = 'Not found'
             ORDER BY name"
        )?.query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

        if !unnamed.is_empty() {
            report.add_warning(format!(
                "Records without a scientific name: {}",
                unnamed.join(", ")
            ));
        }

        // Genus-level hits share an ID with other names; flag IDs claimed by many
        let mut stmt = self.conn.prepare(
            "SELECT taxon_id, COUNT(*) FROM resolutions
             GROUP BY taxon_id HAVING COUNT(*) > 1
             ORDER BY taxon_id"
        )?;
        let shared = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for entry in shared {
            let (taxon_id, names) = entry?;
            report.add_warning(format!("Taxon {} is shared by {} names", taxon_id, names));
        }

        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ResolutionRecord> {
    let count: i64 = row.get(5)?;

    Ok(ResolutionRecord {
        original_name: row.get(0)?,
        genus: row.get(1)?,
        species: row.get(2)?,
        taxon_id: Some(row.get(3)?),
        scientific_name: row.get(4)?,
        assembly_count: AssemblyCount::Count(count.max(0) as u64),
        count_declined: false,
    })
}

#[derive(Default, Debug)]
pub struct ValidationReport {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationReport {
    fn add_error<S: Into<String>>(&mut self, msg: S) {
        self.errors.push(msg.into());
    }

    fn add_warning<S: Into<String>>(&mut self, msg: S) {
        self.warnings.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
