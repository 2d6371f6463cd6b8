use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_cloudfront::error::DisplayErrorContext;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};

use crate::error::HandlerError;
use crate::event::{CustomResourceEvent, RequestType};

pub const INVALIDATION_PATHS: [&str; 1] = ["/*"];
pub const COMPLETED: &str = "Completed";

#[async_trait]
pub trait InvalidationApi: Send + Sync {
    /// returns the id of the new invalidation.
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[&str],
        caller_reference: &str,
    ) -> Result<String, HandlerError>;

    async fn invalidation_status(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<String, HandlerError>;
}

pub struct CloudFrontInvalidations {
    client: aws_sdk_cloudfront::Client,
}

impl CloudFrontInvalidations {
    pub fn new(client: aws_sdk_cloudfront::Client) -> Self {
        Self { client }
    }
}

fn cloudfront_error(e: impl std::error::Error) -> HandlerError {
    HandlerError::CloudFront(DisplayErrorContext(e).to_string())
}

#[async_trait]
impl InvalidationApi for CloudFrontInvalidations {
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[&str],
        caller_reference: &str,
    ) -> Result<String, HandlerError> {
        let paths = Paths::builder()
            .quantity(paths.len() as i32)
            .set_items(Some(paths.iter().map(|p| p.to_string()).collect()))
            .build()
            .map_err(cloudfront_error)?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference)
            .build()
            .map_err(cloudfront_error)?;
        let out = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(cloudfront_error)?;
        out.invalidation()
            .map(|i| i.id().to_string())
            .ok_or_else(|| HandlerError::CloudFront("create invalidation returned no invalidation".into()))
    }

    async fn invalidation_status(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<String, HandlerError> {
        let out = self
            .client
            .get_invalidation()
            .distribution_id(distribution_id)
            .id(invalidation_id)
            .send()
            .await
            .map_err(cloudfront_error)?;
        out.invalidation()
            .map(|i| i.status().to_string())
            .ok_or_else(|| HandlerError::CloudFront(format!("invalidation {invalidation_id} not found")))
    }
}

/// Invalidates everything on the distribution and waits for it to finish.
/// Nothing to undo on Delete.
pub struct InvalidationHandler<A> {
    api: A,
    poll_interval: Duration,
}

impl<A: InvalidationApi> InvalidationHandler<A> {
    pub fn new(api: A, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// returns the distribution id, which is also the physical id.
    pub async fn handle(&self, event: &CustomResourceEvent) -> Result<String, HandlerError> {
        let distribution_id = event
            .property_str("distributionId")
            .ok_or(HandlerError::MissingProperty("distributionId"))?;
        match event.request_type {
            RequestType::Create | RequestType::Update => self.invalidate(distribution_id).await?,
            RequestType::Delete => {}
        }
        Ok(distribution_id.to_string())
    }

    async fn invalidate(&self, distribution_id: &str) -> Result<(), HandlerError> {
        let caller_reference = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
            .to_string();
        let invalidation_id = self
            .api
            .create_invalidation(distribution_id, &INVALIDATION_PATHS, &caller_reference)
            .await?;
        tracing::info!(distribution_id, %invalidation_id, "created invalidation");
        // no timeout, the lambda's own timeout bounds this
        loop {
            let status = self.api.invalidation_status(distribution_id, &invalidation_id).await?;
            if status == COMPLETED {
                tracing::info!(distribution_id, %invalidation_id, "invalidation completed");
                return Ok(());
            }
            tracing::debug!(%status, "waiting for invalidation");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
