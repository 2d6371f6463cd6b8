// Lambda behind the custom resources of an aws-web-pub stack.
//
// CloudFormation invokes the function once per lifecycle event and waits
// for a response PUT to the event's presigned url. Every event gets exactly
// one response; handler failures are reported as FAILED, only a response
// that couldn't be delivered fails the invocation itself.

use std::sync::Arc;
use std::time::Duration;

use lambda_runtime::{service_fn, Error, LambdaEvent};

pub mod deployment;
pub mod error;
pub mod event;
pub mod invalidation;
pub mod response;

use deployment::{DeploymentHandler, ObjectStore, S3ObjectStore};
use error::HandlerError;
use event::{CustomResourceEvent, BUCKET_DEPLOYMENT_TYPE, INVALIDATION_TYPE};
use invalidation::{CloudFrontInvalidations, InvalidationApi, InvalidationHandler};
use response::{CallbackResponse, HttpResponseSender, ResponseSender};

/// how long to wait between invalidation status checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(20);

pub struct Handlers<A, S, R> {
    invalidation: InvalidationHandler<A>,
    deployment: DeploymentHandler<S>,
    sender: R,
}

impl<A: InvalidationApi, S: ObjectStore, R: ResponseSender> Handlers<A, S, R> {
    pub fn new(invalidation: InvalidationHandler<A>, deployment: DeploymentHandler<S>, sender: R) -> Self {
        Self {
            invalidation,
            deployment,
            sender,
        }
    }

    /// runs the handler for the event's resource type and reports the outcome.
    pub async fn handle(&self, event: CustomResourceEvent) -> Result<CallbackResponse, HandlerError> {
        tracing::info!(
            request_type = ?event.request_type,
            resource_type = %event.resource_type,
            logical_id = %event.logical_resource_id,
            "handling custom resource event"
        );
        let outcome = match event.resource_type.as_str() {
            INVALIDATION_TYPE => self.invalidation.handle(&event).await,
            BUCKET_DEPLOYMENT_TYPE => self.deployment.handle(&event).await,
            other => Err(HandlerError::UnsupportedResourceType(other.to_string())),
        };
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "custom resource request failed");
        }
        let response = CallbackResponse::from_outcome(&event, &outcome);
        self.sender.send(&event.response_url, &response).await?;
        Ok(response)
    }
}

/// Lambda runtime entry point
pub async fn run() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();

    let config = aws_config::load_from_env().await;
    let handlers = Arc::new(Handlers::new(
        InvalidationHandler::new(
            CloudFrontInvalidations::new(aws_sdk_cloudfront::Client::new(&config)),
            POLL_INTERVAL,
        ),
        DeploymentHandler::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&config))),
        HttpResponseSender,
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<CustomResourceEvent>| {
        let handlers = Arc::clone(&handlers);
        async move { handlers.handle(event.payload).await.map_err(Error::from) }
    }))
    .await
}
