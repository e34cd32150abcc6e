use std::cell::Cell;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use super::types::{DatasetReport, DatasetReportRequest, ESearchResponse, TaxaSet};
use crate::error::ResolveError;
use crate::resolver::TaxonomySource;

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DATASETS_BASE_URL: &str = "https://api.ncbi.nlm.nih.gov/datasets/v2";

/// E-utilities allow 3 requests per second without an API key, 10 with one
const INTERVAL_ANONYMOUS: Duration = Duration::from_millis(334);
const INTERVAL_WITH_KEY: Duration = Duration::from_millis(100);

const ESEARCH: &str = "esearch";
const EFETCH: &str = "efetch";
const DATASETS: &str = "datasets";

/// Connection settings for the NCBI services
#[derive(Debug, Clone)]
pub struct NcbiConfig {
    /// Contact address required by the E-utilities usage policy
    pub email: String,
    /// Tool name reported to E-utilities
    pub tool: String,
    pub api_key: Option<String>,
    pub eutils_base: String,
    pub datasets_base: String,
    pub timeout: Duration,
    /// Minimum spacing between consecutive E-utilities requests
    pub request_interval: Duration,
}

impl NcbiConfig {
    pub fn new<S: Into<String>>(email: S) -> Self {
        NcbiConfig {
            email: email.into(),
            tool: env!("CARGO_PKG_NAME").to_string(),
            api_key: None,
            eutils_base: EUTILS_BASE_URL.to_string(),
            datasets_base: DATASETS_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            request_interval: INTERVAL_ANONYMOUS,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.request_interval = if api_key.is_some() {
            INTERVAL_WITH_KEY
        } else {
            INTERVAL_ANONYMOUS
        };
        self.api_key = api_key;
        self
    }

    pub fn with_tool<S: Into<String>>(mut self, tool: S) -> Self {
        self.tool = tool.into();
        self
    }
}

/// Blocking client for Entrez taxonomy lookups and Datasets assembly counts
pub struct NcbiClient {
    config: NcbiConfig,
    client: Client,
    last_request: Cell<Option<Instant>>,
}

impl NcbiClient {
    pub fn new(config: NcbiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(NcbiClient {
            config,
            client,
            last_request: Cell::new(None),
        })
    }

    /// Search the taxonomy database, returning matching taxon IDs in rank order
    pub fn search(&self, term: &str) -> Result<Vec<String>, ResolveError> {
        let response = self.eutils_get(ESEARCH, &[("term", term), ("retmode", "json")])?;
        let body = response.text()?;
        parse_esearch(&body)
    }

    /// Fetch the full taxonomy record and return its scientific name
    pub fn fetch_scientific_name(&self, taxon_id: &str) -> Result<String, ResolveError> {
        let response = self.eutils_get(EFETCH, &[("id", taxon_id), ("retmode", "xml")])?;
        let body = response.text()?;
        parse_efetch(&body)
    }

    /// Number of genome assemblies on file for a taxon.
    ///
    /// `Ok(None)` when the Datasets service answers with a non-success status.
    pub fn fetch_assembly_count(&self, taxon_id: &str) -> Result<Option<u64>, ResolveError> {
        let url = format!("{}/taxonomy/dataset_report", self.config.datasets_base);

        let mut request = self
            .client
            .post(&url)
            .header("accept", "application/json")
            .json(&DatasetReportRequest { taxons: [taxon_id] });
        if let Some(key) = &self.config.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            warn!("Datasets report for taxon {} returned HTTP {}", taxon_id, status.as_u16());
            return Ok(None);
        }

        let body = response.text()?;
        parse_dataset_report(&body).map(Some)
    }

    fn eutils_get(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<Response, ResolveError> {
        let url = format!("{}/{}.fcgi", self.config.eutils_base, endpoint);

        let mut query: Vec<(&str, &str)> = vec![
            ("db", "taxonomy"),
            ("tool", self.config.tool.as_str()),
            ("email", self.config.email.as_str()),
        ];
        if let Some(key) = &self.config.api_key {
            query.push(("api_key", key.as_str()));
        }
        query.extend_from_slice(params);

        self.pace();
        debug!("GET {} {:?}", url, params);
        let response = self.client.get(&url).query(&query).send()?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(ResolveError::RateLimited { service: endpoint }),
            status if !status.is_success() => Err(ResolveError::Http {
                service: endpoint,
                status: status.as_u16(),
            }),
            _ => Ok(response),
        }
    }

    /// Sleep until the E-utilities request interval has elapsed
    fn pace(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.config.request_interval {
                std::thread::sleep(self.config.request_interval - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }
}

impl TaxonomySource for NcbiClient {
    fn search(&self, term: &str) -> Result<Vec<String>, ResolveError> {
        NcbiClient::search(self, term)
    }

    fn scientific_name(&self, taxon_id: &str) -> Result<String, ResolveError> {
        self.fetch_scientific_name(taxon_id)
    }

    fn assembly_count(&self, taxon_id: &str) -> Result<Option<u64>, ResolveError> {
        self.fetch_assembly_count(taxon_id)
    }
}

pub(crate) fn parse_esearch(body: &str) -> Result<Vec<String>, ResolveError> {
    let response: ESearchResponse =
        serde_json::from_str(body).map_err(|e| ResolveError::malformed(ESEARCH, e.to_string()))?;

    if let Some(message) = response.error {
        return Err(esearch_failure(message));
    }

    let result = response
        .esearchresult
        .ok_or_else(|| ResolveError::malformed(ESEARCH, "missing esearchresult"))?;

    match result.error {
        Some(message) => Err(esearch_failure(message)),
        None => Ok(result.idlist),
    }
}

fn esearch_failure(message: String) -> ResolveError {
    if message.to_lowercase().contains("rate limit") {
        ResolveError::RateLimited { service: ESEARCH }
    } else {
        ResolveError::malformed(ESEARCH, message)
    }
}

pub(crate) fn parse_efetch(body: &str) -> Result<String, ResolveError> {
    let taxa: TaxaSet =
        quick_xml::de::from_str(body).map_err(|e| ResolveError::malformed(EFETCH, e.to_string()))?;

    let taxon = taxa
        .taxa
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::malformed(EFETCH, "no Taxon in TaxaSet"))?;

    debug!(
        "Fetched taxon {} ({}) rank={}",
        taxon.tax_id,
        taxon.scientific_name,
        taxon.rank.as_deref().unwrap_or("unknown")
    );
    Ok(taxon.scientific_name)
}

/// Assembly count from the first report, zero when no assembly entry is listed
pub(crate) fn parse_dataset_report(body: &str) -> Result<u64, ResolveError> {
    let report: DatasetReport =
        serde_json::from_str(body).map_err(|e| ResolveError::malformed(DATASETS, e.to_string()))?;

    let taxonomy = report
        .reports
        .into_iter()
        .next()
        .and_then(|r| r.taxonomy)
        .ok_or_else(|| ResolveError::malformed(DATASETS, "no taxonomy report"))?;

    Ok(taxonomy.assembly_count().unwrap_or(0))
}
