use async_trait::async_trait;
use serde::Serialize;

use crate::error::HandlerError;
use crate::event::CustomResourceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// the body PUT to the event's response url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub request_id: String,
    pub stack_id: String,
    pub logical_resource_id: String,
    pub physical_resource_id: String,
}

impl CallbackResponse {
    /// `outcome` is the physical id on success. When it's unknown the event's
    /// physical id is kept, and a resource that never got one uses its logical id.
    pub fn from_outcome(event: &CustomResourceEvent, outcome: &Result<String, HandlerError>) -> Self {
        let fallback_id = || {
            event
                .physical_resource_id
                .clone()
                .unwrap_or_else(|| event.logical_resource_id.clone())
        };
        let (status, reason, physical_resource_id) = match outcome {
            Ok(id) => (ResponseStatus::Success, String::new(), id.clone()),
            Err(e) => (ResponseStatus::Failed, e.to_string(), fallback_id()),
        };
        Self {
            status,
            reason,
            request_id: event.request_id.clone(),
            stack_id: event.stack_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            physical_resource_id,
        }
    }
}

#[async_trait]
pub trait ResponseSender: Send + Sync {
    async fn send(&self, url: &str, response: &CallbackResponse) -> Result<(), HandlerError>;
}

/// PUTs the response with a blocking http client on tokio's blocking pool.
pub struct HttpResponseSender;

#[async_trait]
impl ResponseSender for HttpResponseSender {
    async fn send(&self, url: &str, response: &CallbackResponse) -> Result<(), HandlerError> {
        let url = url.to_string();
        let body = serde_json::to_string(response)?;
        tracing::info!(%body, "sending response");
        tokio::task::spawn_blocking(move || put_json(&url, &body))
            .await
            .map_err(|e| HandlerError::Callback(e.to_string()))?
    }
}

fn put_json(url: &str, body: &str) -> Result<(), HandlerError> {
    match ureq::put(url)
        .set("Content-Type", "application/json; charset=UTF-8")
        .send_string(body)
    {
        Ok(resp) if (200..300).contains(&resp.status()) => Ok(()),
        Ok(resp) => Err(HandlerError::CallbackStatus(resp.status())),
        Err(ureq::Error::Status(code, _)) => Err(HandlerError::CallbackStatus(code)),
        Err(e) => Err(HandlerError::Callback(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RequestType;
    use serde_json::Map;

    fn event(physical_id: Option<&str>) -> CustomResourceEvent {
        CustomResourceEvent {
            request_type: RequestType::Update,
            response_url: "https://example.com/response".into(),
            stack_id: "stack".into(),
            request_id: "req".into(),
            resource_type: "Custom::CloudFrontInvalidation".into(),
            logical_resource_id: "WebDistributionInvalidation".into(),
            physical_resource_id: physical_id.map(String::from),
            resource_properties: Map::new(),
        }
    }

    #[test]
    fn success_body() {
        let response = CallbackResponse::from_outcome(&event(None), &Ok("E123".into()));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "Status": "SUCCESS",
                "Reason": "",
                "RequestId": "req",
                "StackId": "stack",
                "LogicalResourceId": "WebDistributionInvalidation",
                "PhysicalResourceId": "E123",
            })
        );
    }

    #[test]
    fn failure_keeps_the_known_physical_id() {
        let err = Err(HandlerError::MissingProperty("distributionId"));
        let response = CallbackResponse::from_outcome(&event(Some("E999")), &err);
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.reason, "distributionId is required");
        assert_eq!(response.physical_resource_id, "E999");

        let response = CallbackResponse::from_outcome(&event(None), &err);
        assert_eq!(response.physical_resource_id, "WebDistributionInvalidation");
    }
}
