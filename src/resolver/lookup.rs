use log::{debug, error, info, warn};

use super::config::ResolverConfig;
use crate::db::ResultCache;
use crate::error::ResolveError;
use crate::query::{AssemblyCount, Query, ResolutionRecord};

/// The lookups a resolution needs from NCBI
pub trait TaxonomySource {
    /// Taxon IDs matching a free-text term, best match first
    fn search(&self, term: &str) -> Result<Vec<String>, ResolveError>;

    /// Scientific name on file for a taxon ID
    fn scientific_name(&self, taxon_id: &str) -> Result<String, ResolveError>;

    /// Assembly count for a taxon; `None` when the service declined to answer
    fn assembly_count(&self, taxon_id: &str) -> Result<Option<u64>, ResolveError>;
}

/// Resolves organism names one at a time, retrying failed attempts
pub struct Resolver<S> {
    source: S,
    config: ResolverConfig,
}

impl<S: TaxonomySource> Resolver<S> {
    pub fn new(source: S, config: ResolverConfig) -> Self {
        Resolver { source, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve every query in order; always one record per query
    pub fn resolve_all(&self, queries: &[Query]) -> Vec<ResolutionRecord> {
        queries
            .iter()
            .enumerate()
            .map(|(idx, query)| {
                info!("Resolving {}/{}: {}", idx + 1, queries.len(), query.name);
                self.resolve(query)
            })
            .collect()
    }

    /// Like `resolve_all`, but serves names from the cache when possible and
    /// stores every record that is cacheable. Cache failures are logged and
    /// never cost a row.
    pub fn resolve_all_cached(
        &self,
        queries: &[Query],
        cache: &mut ResultCache,
        refresh: bool,
    ) -> Vec<ResolutionRecord> {
        let mut records = Vec::with_capacity(queries.len());
        let mut hits = 0;

        for (idx, query) in queries.iter().enumerate() {
            if !refresh {
                match cache.get(&query.name) {
                    Ok(Some(cached)) => {
                        debug!("Cache hit for {}", query.name);
                        hits += 1;
                        records.push(cached);
                        continue;
                    }
                    Ok(None) => {}
                    Err(err) => warn!("Cache lookup failed for {}: {:#}", query.name, err),
                }
            }

            info!("Resolving {}/{}: {}", idx + 1, queries.len(), query.name);
            let record = self.resolve(query);
            if record.is_cacheable() {
                if let Err(err) = cache.store(&record) {
                    warn!("Failed to cache {}: {:#}", query.name, err);
                }
            }
            records.push(record);
        }

        info!("{} of {} names served from cache", hits, queries.len());
        records
    }

    /// Resolve one name, retrying per the configured policy.
    ///
    /// Fields set by a failed attempt are kept, so a degraded record may carry
    /// a taxon ID even though its count is the error marker.
    pub fn resolve(&self, query: &Query) -> ResolutionRecord {
        let policy = &self.config.retry;
        let attempts = policy.attempts();
        let mut record = ResolutionRecord::new(query);
        let mut failures = 0;

        loop {
            let err = match self.attempt(query, &mut record) {
                Ok(()) => return record,
                Err(err) => err,
            };
            failures += 1;

            if failures >= attempts || !policy.should_retry(&err) {
                error!(
                    "Failed to fetch data for {} after {} attempt(s): {}",
                    query.name, failures, err
                );
                record.assembly_count = AssemblyCount::Error;
                return record;
            }

            let wait = policy.delay_for(failures);
            warn!(
                "Error fetching data for {}: {}. Retrying ({}/{}) in {:?}",
                query.name, err, failures, attempts, wait
            );
            std::thread::sleep(wait);
        }
    }

    fn attempt(&self, query: &Query, record: &mut ResolutionRecord) -> Result<(), ResolveError> {
        let mut found = self.find_taxon(&query.name, record)?;

        if !found && self.config.genus_fallback {
            debug!("No match for {}, searching genus {}", query.name, query.genus);
            found = self.find_taxon(&query.genus, record)?;
            if found {
                info!(
                    "Found genus {}\t{}",
                    record.taxon_id.as_deref().unwrap_or_default(),
                    record.scientific_name
                );
            }
        } else if found {
            info!(
                "Found {}\t{}",
                record.taxon_id.as_deref().unwrap_or_default(),
                record.scientific_name
            );
        }

        if !found {
            return Err(ResolveError::NotFound {
                term: query.name.clone(),
            });
        }

        if let Some(taxon_id) = record.taxon_id.clone() {
            match self.source.assembly_count(&taxon_id)? {
                Some(count) => {
                    record.assembly_count = AssemblyCount::Count(count);
                    record.count_declined = false;
                }
                None => {
                    debug!("Assembly count for {} unavailable, keeping default", taxon_id);
                    record.count_declined = true;
                }
            }
        }

        Ok(())
    }

    /// Search `term`; on a hit record the first ID and its scientific name
    fn find_taxon(&self, term: &str, record: &mut ResolutionRecord) -> Result<bool, ResolveError> {
        let ids = self.source.search(term)?;
        let Some(taxon_id) = ids.into_iter().next() else {
            return Ok(false);
        };

        record.taxon_id = Some(taxon_id.clone());
        record.scientific_name = self.source.scientific_name(&taxon_id)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::RetryPolicy;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    /// In-memory stand-in for NCBI that records every call
    #[derive(Default)]
    struct ScriptedSource {
        ids: HashMap<String, Vec<String>>,
        names: HashMap<String, String>,
        counts: HashMap<String, Option<u64>>,
        /// Number of upcoming `search` calls that fail with a network-style error
        failing_searches: Cell<u32>,
        /// Fail every assembly lookup
        failing_counts: bool,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedSource {
        fn with_taxon(mut self, term: &str, id: &str, name: &str, count: Option<u64>) -> Self {
            self.ids.insert(term.to_string(), vec![id.to_string()]);
            self.names.insert(id.to_string(), name.to_string());
            self.counts.insert(id.to_string(), count);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn searches(&self) -> usize {
            self.calls().iter().filter(|c| c.starts_with("search:")).count()
        }
    }

    impl TaxonomySource for ScriptedSource {
        fn search(&self, term: &str) -> Result<Vec<String>, ResolveError> {
            self.calls.borrow_mut().push(format!("search:{}", term));
            if self.failing_searches.get() > 0 {
                self.failing_searches.set(self.failing_searches.get() - 1);
                return Err(ResolveError::Http {
                    service: "esearch",
                    status: 503,
                });
            }
            Ok(self.ids.get(term).cloned().unwrap_or_default())
        }

        fn scientific_name(&self, taxon_id: &str) -> Result<String, ResolveError> {
            self.calls.borrow_mut().push(format!("fetch:{}", taxon_id));
            self.names
                .get(taxon_id)
                .cloned()
                .ok_or_else(|| ResolveError::malformed("efetch", "no Taxon in TaxaSet"))
        }

        fn assembly_count(&self, taxon_id: &str) -> Result<Option<u64>, ResolveError> {
            self.calls.borrow_mut().push(format!("count:{}", taxon_id));
            if self.failing_counts {
                return Err(ResolveError::malformed("datasets", "no taxonomy report"));
            }
            Ok(self.counts.get(taxon_id).copied().flatten())
        }
    }

    fn quick_config(max_retries: u32) -> ResolverConfig {
        ResolverConfig {
            retry: RetryPolicy {
                max_retries,
                delay: Duration::ZERO,
                ..RetryPolicy::default()
            },
            genus_fallback: true,
        }
    }

    fn queries(names: &[&str]) -> Vec<Query> {
        names.iter().map(|n| Query::parse(n).unwrap()).collect()
    }

    fn catalog() -> ScriptedSource {
        ScriptedSource::default()
            .with_taxon("Homo sapiens", "9606", "Homo sapiens", Some(2114))
            .with_taxon("Anabaena", "1163", "Anabaena", Some(87))
    }

    #[test]
    fn test_full_name_match_skips_genus_fallback() {
        let resolver = Resolver::new(catalog(), quick_config(5));
        let record = resolver.resolve(&Query::parse("Homo sapiens").unwrap());

        assert_eq!(
            record.to_tsv(),
            "Homo\tsapiens\tHomo sapiens\t9606\tHomo sapiens\t2114"
        );
        assert_eq!(
            resolver.source.calls(),
            vec!["search:Homo sapiens", "fetch:9606", "count:9606"]
        );
    }

    #[test]
    fn test_genus_fallback_runs_once_before_assembly_lookup() {
        let resolver = Resolver::new(catalog(), quick_config(5));
        let record = resolver.resolve(&Query::parse("Anabaena sp.").unwrap());

        assert_eq!(record.taxon_id.as_deref(), Some("1163"));
        assert_eq!(record.scientific_name, "Anabaena");
        assert_eq!(record.assembly_count, AssemblyCount::Count(87));
        assert_eq!(
            resolver.source.calls(),
            vec!["search:Anabaena sp.", "search:Anabaena", "fetch:1163", "count:1163"]
        );
    }

    #[test]
    fn test_declined_assembly_lookup_keeps_zero() {
        let source = ScriptedSource::default().with_taxon("Homo sapiens", "9606", "Homo sapiens", None);
        let resolver = Resolver::new(source, quick_config(5));
        let record = resolver.resolve(&Query::parse("Homo sapiens").unwrap());

        assert_eq!(record.assembly_count, AssemblyCount::Count(0));
        assert!(!record.is_degraded());
        assert!(!record.is_cacheable());
    }

    #[test]
    fn test_unknown_name_degrades_after_retries() {
        let resolver = Resolver::new(catalog(), quick_config(3));
        let record = resolver.resolve(&Query::parse("Something unknown").unwrap());

        assert_eq!(
            record.to_tsv(),
            "Something\tunknown\tSomething unknown\tNone\tNot found\tError"
        );
        // full name then genus, once per attempt
        assert_eq!(resolver.source.searches(), 6);
    }

    #[test]
    fn test_not_found_without_retry() {
        let mut config = quick_config(5);
        config.retry.retry_not_found = false;
        let resolver = Resolver::new(catalog(), config);
        let record = resolver.resolve(&Query::parse("Something unknown").unwrap());

        assert!(record.is_degraded());
        assert_eq!(resolver.source.searches(), 2);
    }

    #[test]
    fn test_genus_fallback_disabled() {
        let mut config = quick_config(1);
        config.genus_fallback = false;
        let resolver = Resolver::new(catalog(), config);
        let record = resolver.resolve(&Query::parse("Anabaena sp.").unwrap());

        assert!(record.is_degraded());
        assert_eq!(resolver.source.calls(), vec!["search:Anabaena sp."]);
    }

    #[test]
    fn test_transient_failures_recover() {
        let source = catalog();
        source.failing_searches.set(2);
        let resolver = Resolver::new(source, quick_config(5));
        let record = resolver.resolve(&Query::parse("Homo sapiens").unwrap());

        assert_eq!(record.assembly_count, AssemblyCount::Count(2114));
        assert_eq!(resolver.source.searches(), 3);
    }

    #[test]
    fn test_degraded_record_keeps_partial_fields() {
        let mut source = catalog();
        source.failing_counts = true;
        let resolver = Resolver::new(source, quick_config(2));
        let record = resolver.resolve(&Query::parse("Homo sapiens").unwrap());

        assert_eq!(
            record.to_tsv(),
            "Homo\tsapiens\tHomo sapiens\t9606\tHomo sapiens\tError"
        );
    }

    #[test]
    fn test_zero_max_retries_still_yields_row() {
        let resolver = Resolver::new(catalog(), quick_config(0));
        let records = resolver.resolve_all(&queries(&["Something unknown"]));
        assert_eq!(records.len(), 1);
        assert!(records[0].is_degraded());
    }

    #[test]
    fn test_output_order_matches_input() {
        let names = [
            "Anabaena sp.",
            "Something unknown",
            "Homo sapiens",
            "Aquamonas haywardensis",
        ];
        let resolver = Resolver::new(catalog(), quick_config(2));
        let records = resolver.resolve_all(&queries(&names));

        assert_eq!(records.len(), names.len());
        for (record, name) in records.iter().zip(names) {
            assert_eq!(record.original_name, name);
        }
        assert!(!records[0].is_degraded());
        assert!(records[1].is_degraded());
        assert!(!records[2].is_degraded());
        assert!(records[3].is_degraded());
    }

    #[test]
    fn test_cached_resolution() -> Result<()> {
        let dir = tempdir()?;
        let mut cache = ResultCache::new(dir.path().join("cache.db"))?;
        let names = queries(&["Homo sapiens", "Something unknown"]);

        let resolver = Resolver::new(catalog(), quick_config(1));
        let first = resolver.resolve_all_cached(&names, &mut cache, false);
        assert_eq!(cache.statistics()?.total_records, 1);

        // A second pass only goes to the network for the uncached name
        let resolver = Resolver::new(catalog(), quick_config(1));
        let second = resolver.resolve_all_cached(&names, &mut cache, false);
        assert_eq!(first, second);
        assert_eq!(
            resolver.source.calls(),
            vec!["search:Something unknown", "search:Something"]
        );

        // Refresh bypasses the lookup
        let resolver = Resolver::new(catalog(), quick_config(1));
        resolver.resolve_all_cached(&names, &mut cache, true);
        assert!(resolver.source.calls().contains(&"search:Homo sapiens".to_string()));

        Ok(())
    }

    #[test]
    fn test_declined_assembly_count_is_not_cached() -> Result<()> {
        let dir = tempdir()?;
        let mut cache = ResultCache::new(dir.path().join("cache.db"))?;
        let names = queries(&["Homo sapiens"]);

        let source = ScriptedSource::default().with_taxon("Homo sapiens", "9606", "Homo sapiens", None);
        let resolver = Resolver::new(source, quick_config(1));
        let records = resolver.resolve_all_cached(&names, &mut cache, false);

        assert_eq!(records[0].assembly_count, AssemblyCount::Count(0));
        assert_eq!(cache.get("Homo sapiens")?, None);

        // Once the service answers, the real count is fetched and kept
        let resolver = Resolver::new(catalog(), quick_config(1));
        let records = resolver.resolve_all_cached(&names, &mut cache, false);
        assert_eq!(records[0].assembly_count, AssemblyCount::Count(2114));
        assert_eq!(
            cache.get("Homo sapiens")?.map(|r| r.assembly_count),
            Some(AssemblyCount::Count(2114))
        );

        Ok(())
    }

    #[test]
    fn test_broken_cache_still_yields_every_row() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.db");
        let mut cache = ResultCache::new(&path)?;
        rusqlite::Connection::open(&path)?.execute("DROP TABLE resolutions", [])?;

        let names = queries(&["Homo sapiens", "Anabaena sp."]);
        for refresh in [false, true] {
            let resolver = Resolver::new(catalog(), quick_config(1));
            let records = resolver.resolve_all_cached(&names, &mut cache, refresh);

            assert_eq!(records.len(), 2);
            assert_eq!(records[0].assembly_count, AssemblyCount::Count(2114));
            assert_eq!(records[1].assembly_count, AssemblyCount::Count(87));
        }

        Ok(())
    }
}
