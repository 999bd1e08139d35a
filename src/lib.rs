use std::fmt;
use tracing::{info, warn};

pub mod config;
pub mod convocatoria;
pub mod extractor;

mod data;
mod error;
mod utils;

pub use config::Config;
pub use convocatoria::{Convocatoria, ConvocatoriaData, SchemaDescription};
pub use data::Table;
pub use error::CrawlerError;
pub use extractor::{Extractor, LlmExtractor, Outcome};

#[async_trait::async_trait]
pub trait Storage {
    /// Creates the backing table if it does not exist yet.
    async fn ensure_schema(&self) -> Result<(), CrawlerError>;
    /// Appends `records` in order, returning how many rows were added.
    async fn insert_batch(&self, records: &[Convocatoria]) -> Result<u64, CrawlerError>;
    async fn count(&self) -> Result<u32, CrawlerError>;
}

/// Everything one run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub targets: Vec<String>,
    pub instruction: String,
    pub schema: SchemaDescription,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlStatus {
    Saved { extracted: usize, inserted: u64 },
    ExtractionFailed(String),
    MalformedPayload(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReport {
    pub url: String,
    pub status: UrlStatus,
}

impl fmt::Display for UrlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            UrlStatus::Saved {
                extracted,
                inserted,
            } => write!(
                f,
                "[saved]     {} ({} extracted, {} inserted)",
                self.url, extracted, inserted
            ),
            UrlStatus::ExtractionFailed(m) => write!(f, "[failed]    {}: {}", self.url, m),
            UrlStatus::MalformedPayload(m) => write!(f, "[malformed] {}: {}", self.url, m),
        }
    }
}

/// Visits every target once, in order, and stores what the extractor finds.
///
/// A failed or malformed extraction only affects its own URL. Storage errors
/// abort the run.
pub async fn run_extraction<E, S>(
    extractor: &E,
    storage: &S,
    job: &ExtractionJob,
) -> Result<Vec<UrlReport>, CrawlerError>
where
    E: Extractor + Sync,
    S: Storage + Sync,
{
    storage.ensure_schema().await?;
    info!("Targets: {}", job.targets.len());

    let mut reports = Vec::with_capacity(job.targets.len());
    for url in &job.targets {
        info!("Crawling {}", url);

        let payload = match extractor.extract(url, &job.instruction, &job.schema).await {
            Outcome::Success(payload) => payload,
            Outcome::Failure(message) => {
                let e = CrawlerError::ExtractionFailure {
                    url: url.clone(),
                    message: message.clone(),
                };
                warn!("{}", e);
                reports.push(UrlReport {
                    url: url.clone(),
                    status: UrlStatus::ExtractionFailed(message),
                });
                continue;
            }
        };

        let records = match convocatoria::normalize_payload(&payload) {
            Ok(records) => records,
            Err(e) => {
                warn!("{} from {}", e, url);
                let message = match e {
                    CrawlerError::MalformedPayload(m) => m,
                    other => other.to_string(),
                };
                reports.push(UrlReport {
                    url: url.clone(),
                    status: UrlStatus::MalformedPayload(message),
                });
                continue;
            }
        };
        info!("Extraction succeeded: {} records from {}", records.len(), url);

        let inserted = storage.insert_batch(&records).await?;
        info!("Saved {} rows from {}", inserted, url);

        reports.push(UrlReport {
            url: url.clone(),
            status: UrlStatus::Saved {
                extracted: records.len(),
                inserted,
            },
        });
    }

    Ok(reports)
}
