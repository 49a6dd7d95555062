use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::local_time::parse_utc_timestamp;

#[derive(Debug, Error)]
pub enum SunTimesError {
    #[error("Sunrise/sunset request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Sunrise/sunset service answered with status '{0}'")]
    Status(String),
    #[error("Unexpected sunrise/sunset results: {0}")]
    Results(#[from] serde_json::Error),
    #[error("Sunrise/sunset response has an invalid {field} '{value}': {source}")]
    Timestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Sunrise and sunset of one day, as UTC instants.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SunApiResponse {
    // an empty string when the request is rejected
    results: serde_json::Value,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SunApiResults {
    sunrise: String,
    sunset: String,
}

/// Client for the sunrise-sunset.org JSON API.
#[derive(Debug, Clone)]
pub struct SunriseSunsetClient {
    http: reqwest::Client,
    base_url: String,
}

impl SunriseSunsetClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn fetch(&self, latitude: f64, longitude: f64, date: NaiveDate) -> Result<SunTimes, SunTimesError> {
        log::debug!("Fetching sun times for {},{} on {}", latitude, longitude, date);
        let response: SunApiResponse = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lng", longitude.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
                ("formatted", "0".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(status) = response.status.filter(|s| s != "OK") {
            return Err(SunTimesError::Status(status));
        }
        let results: SunApiResults = serde_json::from_value(response.results)?;

        Ok(SunTimes {
            sunrise: parse_sun_time("sunrise", &results.sunrise)?,
            sunset: parse_sun_time("sunset", &results.sunset)?,
        })
    }
}

fn parse_sun_time(field: &'static str, value: &str) -> Result<DateTime<Utc>, SunTimesError> {
    parse_utc_timestamp(value).map_err(|source| SunTimesError::Timestamp {
        field,
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn client_for(server: &MockServer) -> SunriseSunsetClient {
        SunriseSunsetClient::new(reqwest::Client::new(), format!("{}/json", server.uri()))
    }

    #[tokio::test]
    async fn test_fetch_sun_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .and(query_param("lat", "50"))
            .and(query_param("lng", "4"))
            .and(query_param("date", "2024-07-01"))
            .and(query_param("formatted", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {
                    "sunrise": "2024-07-01T03:32:41+00:00",
                    "sunset": "2024-07-01T20:01:12+00:00",
                    "solar_noon": "2024-07-01T11:46:56+00:00",
                    "day_length": 59311
                },
                "status": "OK",
                "tzid": "UTC"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sun = client_for(&server)
            .fetch(50.0, 4.0, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await
            .unwrap();

        assert_eq!(sun.sunrise, utc("2024-07-01T03:32:41Z"));
        assert_eq!(sun.sunset, utc("2024-07-01T20:01:12Z"));
    }

    #[tokio::test]
    async fn test_invalid_request_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": "",
                "status": "INVALID_REQUEST"
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch(50.0, 4.0, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await;
        assert!(matches!(result, Err(SunTimesError::Status(s)) if s == "INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn test_missing_sunset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {"sunrise": "2024-07-01T03:32:41+00:00"}
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch(50.0, 4.0, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await;
        assert!(matches!(result, Err(SunTimesError::Results(_))));
    }

    #[tokio::test]
    async fn test_unexpected_timestamp_format() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {"sunrise": "3:32:41 AM", "sunset": "8:01:12 PM"},
                "status": "OK"
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch(50.0, 4.0, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await;
        assert!(matches!(result, Err(SunTimesError::Timestamp { field: "sunrise", .. })));
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch(50.0, 4.0, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await;
        assert!(matches!(result, Err(SunTimesError::Request(_))));
    }
}
