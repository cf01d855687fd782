//! Google Calendar API v3 client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CalendarError, Result};
use crate::provider::CalendarProvider;
use crate::types::{merge_by_id, BusyInterval, CalendarEvent, CalendarInfo, NewEvent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: String,
    time_max: String,
    time_zone: &'a str,
    items: Vec<FreeBusyItem<'a>>,
}

#[derive(Debug, Serialize)]
struct FreeBusyItem<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyInterval>,
}

/// Retry settings for transient HTTP failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT || status.is_server_error()
}

fn retry_delay(attempt: u32, policy: &RetryPolicy, retry_after: Option<&reqwest::header::HeaderValue>) -> Duration {
    if let Some(secs) = retry_after
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_secs(secs.min(30));
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(
        policy
            .initial_backoff_ms
            .saturating_mul(exponent)
            .min(policy.max_backoff_ms),
    )
}

async fn send_with_retry(request: RequestBuilder, policy: &RetryPolicy) -> Result<Response> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return Ok(request.send().await?);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable(status) && attempt < attempts {
                    let delay = retry_delay(attempt, policy, response.headers().get(reqwest::header::RETRY_AFTER));
                    warn!(attempt, attempts, %status, ?delay, "GOOGLE_RETRY");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                if (err.is_timeout() || err.is_connect()) && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    warn!(attempt, attempts, error = %err, ?delay, "GOOGLE_RETRY");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                if err.is_timeout() {
                    return Err(CalendarError::Timeout);
                }
                return Err(CalendarError::Http(err));
            }
        }
    }

    Err(CalendarError::Timeout)
}

/// Map a non-success response to an error.
async fn check(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(CalendarError::AuthExpired);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(CalendarError::NotFound(context.to_string()));
    }
    Err(CalendarError::Api {
        status: status.as_u16(),
        message: body,
    })
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Calendar provider backed by the Google Calendar v3 REST API.
pub struct GoogleCalendarClient {
    client: Client,
    api_url: String,
    access_token: SecretString,
    retry: RetryPolicy,
}

impl GoogleCalendarClient {
    pub fn new(client: Client, api_url: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            access_token,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| CalendarError::Configuration(format!("invalid calendar API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Configuration("calendar API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn list_single(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        query: Option<&str>,
    ) -> Result<Vec<CalendarEvent>> {
        let url = self.url(&["calendars", calendar_id, "events"])?;
        let time_min = rfc3339(time_min);
        let time_max = rfc3339(time_max);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .bearer_auth(self.access_token.expose_secret())
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "250"),
                ]);
            if let Some(q) = query {
                request = request.query(&[("q", q)]);
            }
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = check(send_with_retry(request, &self.retry).await?, calendar_id).await?;
            let body: EventListResponse = response.json().await?;

            events.extend(body.items.into_iter().filter(|e| !e.is_cancelled()));

            match body.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(calendar_id, count = events.len(), "GOOGLE_EVENTS_LISTED");
        Ok(events)
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        search_terms: &[String],
    ) -> Result<Vec<CalendarEvent>> {
        let terms: Vec<&str> = search_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        if terms.is_empty() {
            return self.list_single(calendar_id, time_min, time_max, None).await;
        }

        let mut result_sets = Vec::with_capacity(terms.len());
        for term in terms {
            result_sets.push(self.list_single(calendar_id, time_min, time_max, Some(term)).await?);
        }
        Ok(merge_by_id(result_sets))
    }

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<CalendarEvent> {
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let request = self.client.get(url).bearer_auth(self.access_token.expose_secret());
        let response = check(send_with_retry(request, &self.retry).await?, event_id).await?;
        Ok(response.json().await?)
    }

    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<CalendarEvent> {
        let url = self.url(&["calendars", calendar_id, "events"])?;
        let request = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(event);
        let response = check(send_with_retry(request, &self.retry).await?, calendar_id).await?;
        Ok(response.json().await?)
    }

    async fn update_event(&self, calendar_id: &str, event_id: &str, event: &CalendarEvent) -> Result<CalendarEvent> {
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let request = self
            .client
            .put(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(event);
        let response = check(send_with_retry(request, &self.retry).await?, event_id).await?;
        Ok(response.json().await?)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let request = self.client.delete(url).bearer_auth(self.access_token.expose_secret());
        check(send_with_retry(request, &self.retry).await?, event_id).await?;
        Ok(())
    }

    async fn free_busy(
        &self,
        calendar_ids: &[String],
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>> {
        let url = self.url(&["freeBusy"])?;
        let body = FreeBusyRequest {
            time_min: rfc3339(time_min),
            time_max: rfc3339(time_max),
            time_zone: "UTC",
            items: calendar_ids.iter().map(|id| FreeBusyItem { id }).collect(),
        };
        let request = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body);
        let response = check(send_with_retry(request, &self.retry).await?, "freeBusy").await?;
        let parsed: FreeBusyResponse = response.json().await?;

        let mut busy: Vec<BusyInterval> = parsed.calendars.into_values().flat_map(|c| c.busy).collect();
        busy.sort_by_key(|b| b.start);
        Ok(busy)
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        let url = self.url(&["users", "me", "calendarList"])?;
        let request = self.client.get(url).bearer_auth(self.access_token.expose_secret());
        let response = check(send_with_retry(request, &self.retry).await?, "calendarList").await?;
        let body: CalendarListResponse = response.json().await?;
        Ok(body.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> GoogleCalendarClient {
        GoogleCalendarClient::new(Client::new(), api_url, SecretString::from("token".to_string()))
    }

    #[test]
    fn test_url_encodes_calendar_id() {
        let url = client("https://www.googleapis.com/calendar/v3")
            .url(&["calendars", "en.usa#holiday@group.v.calendar.google.com", "events"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/en.usa%23holiday@group.v.calendar.google.com/events"
        );
    }

    #[test]
    fn test_url_tolerates_trailing_slash() {
        let url = client("http://localhost:9000/v3/").url(&["freeBusy"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/v3/freeBusy");
    }

    #[test]
    fn test_retry_delay_backoff_and_header() {
        let policy = RetryPolicy::default();
        assert_eq!(retry_delay(1, &policy, None), Duration::from_millis(250));
        assert_eq!(retry_delay(2, &policy, None), Duration::from_millis(500));
        assert_eq!(retry_delay(10, &policy, None), Duration::from_millis(2_000));

        let header = reqwest::header::HeaderValue::from_static("90");
        assert_eq!(retry_delay(1, &policy, Some(&header)), Duration::from_secs(30));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_free_busy_response_parses() {
        let json = r#"{
            "calendars": {
                "primary": {"busy": [
                    {"start": "2024-01-02T15:00:00Z", "end": "2024-01-02T16:00:00Z"},
                    {"start": "2024-01-02T09:00:00Z", "end": "2024-01-02T10:00:00Z"}
                ]}
            }
        }"#;
        let parsed: FreeBusyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.calendars["primary"].busy.len(), 2);
    }
}
