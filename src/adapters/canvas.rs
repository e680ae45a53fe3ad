// file: src/adapters/canvas.rs
use super::SinkAdapter;
use crate::config::CanvasConfig;
use crate::error::{SyncError, SyncResult};
use crate::http_config::HttpConfig;
use crate::models::{CreatedEvent, SinkEvent, SinkEventPayload};
use crate::translator::is_tagged;
use crate::utils::circuit_breaker::CircuitBreaker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use reqwest::header::LINK;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Window searched for our events. Nothing is ever created outside it.
const START_DATE: &str = "2022-01-01";
const END_DATE: &str = "2032-01-01";
const PER_PAGE: &str = "100";

lazy_static! {
    static ref NEXT_LINK: Option<Regex> = Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).ok();
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    workflow_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCreated {
    id: u64,
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    context_code: String,
    #[serde(flatten)]
    payload: &'a SinkEventPayload,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    calendar_event: EventBody<'a>,
}

pub struct CanvasClient {
    http: Client,
    base_url: String,
    key: String,
    breaker: CircuitBreaker,
}

impl CanvasClient {
    pub fn new(config: CanvasConfig, http: &HttpConfig) -> SyncResult<Self> {
        let client = http
            .build_client()
            .map_err(|e| SyncError::config(format!("could not build Canvas HTTP client: {}", e)))?;
        Ok(Self {
            http: client,
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key,
            breaker: CircuitBreaker::new("canvas", http.breaker_config()),
        })
    }

    fn events_url(&self) -> String {
        format!("{}/api/v1/calendar_events", self.base_url)
    }

    /// Sends `request` with the API token. Transport failures and 5xx
    /// responses count against the circuit breaker; other statuses are left
    /// to the caller.
    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        self.breaker
            .execute(|| async move {
                let response = request
                    .bearer_auth(&self.key)
                    .send()
                    .await
                    .map_err(|e| SyncError::sink_adapter(format!("request failed: {}", e)))?;
                if response.status().is_server_error() {
                    return Err(SyncError::sink_adapter(format!("HTTP {}", response.status())));
                }
                Ok(response)
            })
            .await
            .map_err(|e| e.flatten(|| SyncError::sink_adapter("Canvas unavailable, circuit open")))
    }
}

fn ensure_success(response: Response, action: &str) -> SyncResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(SyncError::sink_adapter(format!("{} failed: HTTP {}", action, response.status())))
    }
}

fn context_code(sink_group: &str) -> String {
    format!("course_{}", sink_group)
}

fn next_link(header: &str) -> Option<String> {
    (*NEXT_LINK)
        .as_ref()?
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Keeps live events carrying our tag.
fn tagged_event(raw: RawEvent) -> Option<SinkEvent> {
    if raw.workflow_state.as_deref() == Some("deleted") {
        return None;
    }
    let title = raw.title.unwrap_or_default();
    if !is_tagged(&title) {
        return None;
    }
    Some(SinkEvent {
        id: raw.id.to_string(),
        title,
        updated_at: raw.updated_at,
    })
}

fn create_request<'a>(sink_group: &str, payload: &'a SinkEventPayload) -> CreateRequest<'a> {
    CreateRequest {
        calendar_event: EventBody {
            context_code: context_code(sink_group),
            payload,
        },
    }
}

#[async_trait]
impl SinkAdapter for CanvasClient {
    async fn list_tagged_events(&self, sink_group: &str) -> SyncResult<Vec<SinkEvent>> {
        let mut events = Vec::new();
        let mut request = self.http.get(self.events_url()).query(&[
            ("context_codes[]", context_code(sink_group).as_str()),
            ("start_date", START_DATE),
            ("end_date", END_DATE),
            ("per_page", PER_PAGE),
        ]);

        loop {
            let response = ensure_success(self.send(request).await?, "listing events")?;
            let next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);

            let page: Vec<RawEvent> = response
                .json()
                .await
                .map_err(|e| SyncError::sink_adapter(format!("unexpected event listing: {}", e)))?;
            events.extend(page.into_iter().filter_map(tagged_event));

            match next {
                Some(url) => request = self.http.get(url),
                None => break,
            }
        }

        debug!("Canvas has {} tagged events for course {}", events.len(), sink_group);
        Ok(events)
    }

    async fn create_event(&self, sink_group: &str, payload: &SinkEventPayload) -> SyncResult<CreatedEvent> {
        let request = self.http.post(self.events_url()).json(&create_request(sink_group, payload));
        let response = ensure_success(self.send(request).await?, "creating event")?;
        let created: RawCreated = response
            .json()
            .await
            .map_err(|e| SyncError::sink_adapter(format!("unexpected create response: {}", e)))?;
        Ok(CreatedEvent {
            id: created.id.to_string(),
        })
    }

    async fn delete_event(&self, event_id: &str) -> SyncResult<()> {
        let request = self.http.delete(format!("{}/{}", self.events_url(), event_id));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Event {} already gone from Canvas", event_id);
            return Ok(());
        }
        ensure_success(response, "deleting event")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::TAG_TITLE;
    use chrono::NaiveDate;

    fn raw(id: u64, title: &str, state: Option<&str>) -> RawEvent {
        RawEvent {
            id,
            title: Some(title.to_string()),
            updated_at: Utc::now(),
            workflow_state: state.map(String::from),
        }
    }

    #[test]
    fn test_next_link() {
        let header = r#"<https://canvas.test/api/v1/calendar_events?page=1>; rel="current", <https://canvas.test/api/v1/calendar_events?page=2>; rel="next", <https://canvas.test/api/v1/calendar_events?page=5>; rel="last""#;
        assert_eq!(
            next_link(header),
            Some("https://canvas.test/api/v1/calendar_events?page=2".to_string())
        );

        let last_page = r#"<https://canvas.test/api/v1/calendar_events?page=5>; rel="current""#;
        assert_eq!(next_link(last_page), None);
    }

    #[test]
    fn test_only_live_tagged_events_kept() {
        let ours = format!("Lecture{}", TAG_TITLE);
        assert_eq!(tagged_event(raw(1, &ours, Some("active"))).map(|e| e.id), Some("1".to_string()));
        assert!(tagged_event(raw(2, "Office hours", None)).is_none());
        assert!(tagged_event(raw(3, &ours, Some("deleted"))).is_none());
    }

    #[test]
    fn test_create_request_shape() {
        let start = NaiveDate::from_ymd_opt(2022, 3, 25).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let payload = SinkEventPayload {
            title: format!("john{}", TAG_TITLE),
            location_name: "Room 1".to_string(),
            description: "Monday".to_string(),
            start_at: start,
            end_at: start + chrono::Duration::hours(2),
        };

        let json = serde_json::to_value(create_request("169", &payload)).unwrap();
        let event = &json["calendar_event"];
        assert_eq!(event["context_code"], "course_169");
        assert_eq!(event["location_name"], "Room 1");
        assert_eq!(event["end_at"], "2022-03-25T10:00:00");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_sink_error() {
        let config = CanvasConfig {
            url: "http://127.0.0.1:9/".to_string(),
            key: "token".to_string(),
        };
        let client = CanvasClient::new(config, &HttpConfig::canvas_api()).unwrap();
        assert_eq!(client.events_url(), "http://127.0.0.1:9/api/v1/calendar_events");

        let err = client.delete_event("1").await.unwrap_err();
        assert!(matches!(err, SyncError::SinkAdapter(_)));
        assert!(err.is_retryable());
    }
}
