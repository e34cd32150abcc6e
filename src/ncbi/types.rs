use serde::{Deserialize, Deserializer};

/// Count type the Datasets taxonomy report uses for genome assemblies
pub const COUNT_TYPE_ASSEMBLY: &str = "COUNT_TYPE_ASSEMBLY";

/// Body of `esearch.fcgi?retmode=json`
#[derive(Debug, Deserialize)]
pub(crate) struct ESearchResponse {
    #[serde(default)]
    pub esearchresult: Option<ESearchResult>,
    /// Present on rate-limit and API key errors
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ESearchResult {
    #[serde(default)]
    pub idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    pub error: Option<String>,
}

/// Root of `efetch.fcgi?db=taxonomy&retmode=xml`
#[derive(Debug, Deserialize)]
pub(crate) struct TaxaSet {
    #[serde(rename = "Taxon", default)]
    pub taxa: Vec<TaxonRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaxonRecord {
    #[serde(rename = "TaxId")]
    pub tax_id: String,
    #[serde(rename = "ScientificName")]
    pub scientific_name: String,
    #[serde(rename = "Rank", default)]
    pub rank: Option<String>,
}

/// Request body for the Datasets taxonomy dataset report
#[derive(Debug, serde::Serialize)]
pub(crate) struct DatasetReportRequest<'a> {
    pub taxons: [&'a str; 1],
}

/// Response of the Datasets taxonomy dataset report
#[derive(Debug, Deserialize)]
pub(crate) struct DatasetReport {
    #[serde(default)]
    pub reports: Vec<TaxonomyReport>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaxonomyReport {
    pub taxonomy: Option<TaxonomyNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaxonomyNode {
    // Zero-valued counts may be omitted entirely
    #[serde(default)]
    pub counts: Vec<TaxonCount>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaxonCount {
    #[serde(rename = "type")]
    pub count_type: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub count: u64,
}

impl TaxonomyNode {
    pub fn assembly_count(&self) -> Option<u64> {
        self.counts
            .iter()
            .find(|c| c.count_type == COUNT_TYPE_ASSEMBLY)
            .map(|c| c.count)
    }
}

/// Datasets emits 64-bit integers either as JSON numbers or as strings
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
