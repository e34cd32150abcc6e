use crate::query::ResolutionRecord;

/// A cached record with the time it was stored
#[derive(Debug)]
pub struct CachedRecord {
    pub record: ResolutionRecord,
    pub created_at: String,
}

/// Cache statistics
#[derive(Debug)]
pub struct CacheStats {
    pub total_records: usize,
    pub records_with_assemblies: usize,
    pub total_assemblies: u64,
    pub distinct_taxa: usize,
}
