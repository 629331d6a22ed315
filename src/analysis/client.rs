//! Analysis client: one normalized photo in, one validated reading set out.

use std::time::Duration;

use tracing::{debug, info};

use crate::analysis::readings::ReadingSet;
use crate::analysis::transport::{InferenceRequest, InferenceTransport};
use crate::error::{StripError, StripResult};
use crate::processing::NormalizedImage;

/// Instruction sent with every photo.
pub const ANALYSIS_INSTRUCTION: &str = "Analyze this water test strip image and compare it to the standard color chart. \
Provide readings for pH, ammonia, nitrite, and nitrate levels. \
Format the response as a JSON object with these parameters and their values.";

pub struct AnalysisClient {
    transport: Box<dyn InferenceTransport>,
    timeout: Option<Duration>,
}

impl AnalysisClient {
    pub fn new(transport: Box<dyn InferenceTransport>) -> Self {
        Self {
            transport,
            timeout: None,
        }
    }

    /// Bound each request; `None` waits for the service indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Submit `image` once and parse the reply. Never retries.
    pub async fn analyze(&self, image: &NormalizedImage) -> StripResult<ReadingSet> {
        let request = InferenceRequest::new(ANALYSIS_INSTRUCTION, image);
        debug!(
            width = image.width,
            height = image.height,
            payload_bytes = request.image_data_uri.len(),
            "submitting photo for analysis"
        );

        let completion = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.complete(&request))
                .await
                .map_err(|_| timeout_error(limit))??,
            None => self.transport.complete(&request).await?,
        };

        let readings = ReadingSet::from_completion(&completion)?;
        info!(
            ph = readings.ph,
            ammonia = readings.ammonia,
            nitrite = readings.nitrite,
            nitrate = readings.nitrate,
            "analysis complete"
        );
        Ok(readings)
    }
}

fn timeout_error(limit: Duration) -> StripError {
    let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
    StripError::timeout("analysis request", millis)
        .with_recovery_suggestion("Check connectivity or raise --timeout")
}
