//! Google Distance Matrix client.
//!
//! Only the first row/element of the response is read: the route is a
//! single origin/destination pair.

use super::{Measurement, TravelTimeProvider};
use crate::config::Settings;
use crate::errors::JamError;
use crate::jam::Departure;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const ENDPOINT: &str = "/maps/api/distancematrix/json";

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    duration_in_traffic: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: Option<f64>,
}

/// Distance Matrix API client for one fixed route.
pub struct DistanceMatrixClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    origin: String,
    destination: String,
    timeout: Duration,
}

impl DistanceMatrixClient {
    pub fn new(settings: &Settings) -> Result<Self, JamError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| JamError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: settings.provider_base_url.clone(),
            api_key: settings.api_key.clone(),
            origin: settings.origin.clone(),
            destination: settings.destination.clone(),
            timeout: settings.request_timeout,
        })
    }

    async fn fetch(&self, departure: &Departure) -> Result<MatrixResponse, JamError> {
        let url = format!("{}{}", self.base_url, ENDPOINT);
        let departure_param = departure.api_param();

        debug!(
            "Requesting travel time {} -> {} (departure_time={})",
            self.origin, self.destination, departure_param
        );

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("origins", self.origin.as_str()),
                ("destinations", self.destination.as_str()),
                ("departure_time", departure_param.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JamError::Upstream(format!(
                        "Request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else if e.is_connect() {
                    JamError::Upstream(format!("Cannot connect to {}", self.base_url))
                } else {
                    // reqwest errors carry the URL, which includes the key
                    JamError::Upstream(format!("Failed to send request: {}", e.without_url()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JamError::Upstream(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<MatrixResponse>()
            .await
            .map_err(|e| JamError::UpstreamFormat(format!("invalid JSON: {}", e.without_url())))
    }
}

/// Pull the traffic-aware duration out of a decoded response.
fn extract_duration(response: MatrixResponse) -> Result<f64, JamError> {
    if response.status != "OK" {
        let detail = response.error_message.unwrap_or_default();
        return Err(JamError::Upstream(format!(
            "API status {} {}",
            response.status, detail
        )));
    }

    let element = response
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or_else(|| JamError::UpstreamFormat("response has no route element".to_string()))?;

    if element.status != "OK" {
        return Err(JamError::Upstream(format!(
            "route element status {}",
            element.status
        )));
    }

    element
        .duration_in_traffic
        .and_then(|d| d.value)
        .ok_or_else(|| JamError::UpstreamFormat("missing duration_in_traffic.value".to_string()))
}

impl TravelTimeProvider for DistanceMatrixClient {
    async fn measure(&self, departure: &Departure) -> Result<Measurement, JamError> {
        let response = self.fetch(departure).await?;
        let travel_time_seconds = extract_duration(response)?;

        info!(
            "Provider reports {:.0}s for departure {}",
            travel_time_seconds,
            departure.clock_string()
        );

        Ok(Measurement {
            travel_time_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkSettings;
    use crate::jam::{DepartureRequest, DepartureResolver};
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> Settings {
        Settings {
            origin: "A St".to_string(),
            destination: "B Ave".to_string(),
            baseline_minutes: 9.0,
            timezone: chrono_tz::America::New_York,
            departures: vec![DepartureRequest::Now],
            api_key: "test-key".to_string(),
            provider_base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(5),
            sink: SinkSettings::Csv {
                path: "jam.csv".into(),
                layout: Default::default(),
            },
            notify: None,
        }
    }

    fn departure(request: DepartureRequest) -> Departure {
        DepartureResolver::new(chrono_tz::America::New_York)
            .resolve(request, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap())
            .unwrap()
    }

    fn ok_body(seconds: u64) -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "rows": [{
                "elements": [{
                    "status": "OK",
                    "duration": { "value": 540, "text": "9 mins" },
                    "duration_in_traffic": { "value": seconds, "text": "x mins" }
                }]
            }]
        })
    }

    #[tokio::test]
    async fn test_measure_now() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .and(query_param("origins", "A St"))
            .and(query_param("destinations", "B Ave"))
            .and(query_param("departure_time", "now"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body(1080)))
            .expect(1)
            .mount(&server)
            .await;

        let client = DistanceMatrixClient::new(&settings(&server.uri())).unwrap();
        let m = client.measure(&departure(DepartureRequest::Now)).await.unwrap();
        assert_eq!(m.travel_time_seconds, 1080.0);
    }

    #[tokio::test]
    async fn test_measure_explicit_departure_sends_epoch() {
        let server = MockServer::start().await;
        let dep = departure("08:30".parse().unwrap());
        Mock::given(method("GET"))
            .and(query_param("departure_time", dep.api_param().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body(540)))
            .expect(1)
            .mount(&server)
            .await;

        let client = DistanceMatrixClient::new(&settings(&server.uri())).unwrap();
        let m = client.measure(&dep).await.unwrap();
        assert_eq!(m.travel_time_seconds, 540.0);
    }

    #[tokio::test]
    async fn test_missing_duration_in_traffic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "rows": [{ "elements": [{ "status": "OK", "duration": { "value": 540 } }] }]
            })))
            .mount(&server)
            .await;

        let client = DistanceMatrixClient::new(&settings(&server.uri())).unwrap();
        let err = client
            .measure(&departure(DepartureRequest::Now))
            .await
            .unwrap_err();
        assert!(matches!(err, JamError::UpstreamFormat(_)));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid.",
                "rows": []
            })))
            .mount(&server)
            .await;

        let client = DistanceMatrixClient::new(&settings(&server.uri())).unwrap();
        let err = client
            .measure(&departure(DepartureRequest::Now))
            .await
            .unwrap_err();
        assert!(matches!(err, JamError::Upstream(_)));
        assert!(err.to_string().contains("REQUEST_DENIED"));
    }

    #[tokio::test]
    async fn test_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = DistanceMatrixClient::new(&settings(&server.uri())).unwrap();
        let err = client
            .measure(&departure(DepartureRequest::Now))
            .await
            .unwrap_err();
        assert!(matches!(err, JamError::Upstream(_)));
    }

    #[test]
    fn test_extract_duration_element_not_found() {
        let response: MatrixResponse = serde_json::from_value(serde_json::json!({
            "status": "OK",
            "rows": [{ "elements": [{ "status": "NOT_FOUND" }] }]
        }))
        .unwrap();
        assert!(matches!(
            extract_duration(response).unwrap_err(),
            JamError::Upstream(_)
        ));
    }

    #[test]
    fn test_extract_duration_empty_rows() {
        let response: MatrixResponse =
            serde_json::from_value(serde_json::json!({ "status": "OK" })).unwrap();
        assert!(matches!(
            extract_duration(response).unwrap_err(),
            JamError::UpstreamFormat(_)
        ));
    }
}
