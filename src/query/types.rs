use serde::{Serialize, Serializer};
use std::fmt;

/// Placeholder used when no scientific name could be fetched
pub const NOT_FOUND: &str = "Not found";

/// Marker written in place of the assembly count once retries are exhausted
pub const ERROR_MARKER: &str = "Error";

/// An organism name split into genus and the remaining epithet(s)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// The name exactly as it was supplied
    pub name: String,
    /// First whitespace-separated token
    pub genus: String,
    /// Remaining tokens joined by a single space (may be empty)
    pub species: String,
}

impl Query {
    /// Split a name like "Genus species" or "Genus sp.". Returns `None` for blank input.
    pub fn parse(name: &str) -> Option<Self> {
        let mut tokens = name.split_whitespace();
        let genus = tokens.next()?.to_string();
        let species = tokens.collect::<Vec<_>>().join(" ");

        Some(Query {
            name: name.to_string(),
            genus,
            species,
        })
    }
}

/// Assembly count column: a number, or the error marker for a degraded row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyCount {
    Count(u64),
    Error,
}

impl AssemblyCount {
    pub fn is_error(&self) -> bool {
        matches!(self, AssemblyCount::Error)
    }
}

impl Default for AssemblyCount {
    fn default() -> Self {
        AssemblyCount::Count(0)
    }
}

impl fmt::Display for AssemblyCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyCount::Count(n) => write!(f, "{}", n),
            AssemblyCount::Error => write!(f, "{}", ERROR_MARKER),
        }
    }
}

impl Serialize for AssemblyCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AssemblyCount::Count(n) => serializer.serialize_u64(*n),
            AssemblyCount::Error => serializer.serialize_str(ERROR_MARKER),
        }
    }
}

/// One output row per input name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionRecord {
    pub genus: String,
    pub species: String,
    pub original_name: String,
    pub taxon_id: Option<String>,
    pub scientific_name: String,
    pub assembly_count: AssemblyCount,
    /// The assembly service answered with a non-success status, so the count
    /// is a default rather than a reported value
    #[serde(skip)]
    pub count_declined: bool,
}

impl ResolutionRecord {
    /// A record with the defaults every lookup starts from
    pub fn new(query: &Query) -> Self {
        ResolutionRecord {
            genus: query.genus.clone(),
            species: query.species.clone(),
            original_name: query.name.clone(),
            taxon_id: None,
            scientific_name: NOT_FOUND.to_string(),
            assembly_count: AssemblyCount::default(),
            count_declined: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.assembly_count.is_error()
    }

    /// Only records whose every field came from a successful lookup are worth keeping
    pub fn is_cacheable(&self) -> bool {
        !self.is_degraded() && !self.count_declined && self.taxon_id.is_some()
    }

    /// Tab-separated form: genus, species, name, taxon id, scientific name, count
    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.genus,
            self.species,
            self.original_name,
            self.taxon_id.as_deref().unwrap_or("None"),
            self.scientific_name,
            self.assembly_count,
        )
    }
}
