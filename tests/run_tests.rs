use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use om_shutters::{
    config::{Config, OutputId},
    decision::ShutterAction,
    history::HistoryFile,
    openmotics::OpenMoticsClient,
    runner::ShutterRun,
    sun_times::SunriseSunsetClient,
};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

struct TestHome {
    sun_server: MockServer,
    gateway_server: MockServer,
    _dir: TempDir,
    history_path: PathBuf,
}

impl TestHome {
    /// Sun service answering sunrise 04:00Z / sunset 19:30Z for 2024-07-01, and a gateway that accepts everything.
    async fn new(history: &str) -> Self {
        let sun_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .and(query_param("date", "2024-07-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {
                    "sunrise": "2024-07-01T04:00:00+00:00",
                    "sunset": "2024-07-01T19:30:00+00:00"
                },
                "status": "OK"
            })))
            .mount(&sun_server)
            .await;

        let gateway_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true, "token": "t0k"})))
            .mount(&gateway_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/set_output"))
            .and(query_param("token", "t0k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .mount(&gateway_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let history_path = dir.path().join("history.json");
        std::fs::write(&history_path, history).unwrap();

        Self {
            sun_server,
            gateway_server,
            _dir: dir,
            history_path,
        }
    }

    fn config(&self, dry_run: bool, shutters: &str) -> Config {
        format!(
            r#"{{
                "dry_run": {},
                "credentials": {{"username": "rick", "password": "secret", "om_host": "{}"}},
                "location": {{"latitude": 50, "longitude": 4}},
                "shutters": {}
            }}"#,
            dry_run,
            self.gateway_server.uri(),
            shutters
        )
        .parse()
        .unwrap()
    }

    async fn run(&self, config: &Config, now: &str) -> color_eyre::eyre::Result<om_shutters::runner::RunSummary> {
        let sun_client = SunriseSunsetClient::new(reqwest::Client::new(), format!("{}/json", self.sun_server.uri()));
        let gateway = OpenMoticsClient::new(reqwest::Client::new(), config.credentials.as_ref().unwrap());
        let history = HistoryFile::new(&self.history_path);
        ShutterRun::new(config, &sun_client, &gateway, &history, Duration::ZERO)
            .run(utc(now))
            .await
    }

    async fn switched_outputs(&self) -> Vec<String> {
        self.gateway_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/set_output")
            .filter_map(|r| r.url.query_pairs().find(|(k, _)| k == "id").map(|(_, v)| v.to_string()))
            .collect()
    }

    fn history(&self) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(&self.history_path).unwrap()).unwrap()
    }
}

const ROOMS: &str = r#"{
    "bedroom": [1, 2, true, true, "09:00", null],
    "kitchen": [3, 4, true, true, null, null],
    "living": [5, 6, false, true, null, "17:00"]
}"#;

#[tokio::test]
async fn test_morning_run_rises_due_rooms() {
    let home = TestHome::new("{}").await;
    let config = home.config(false, ROOMS);

    // 08:00 in Brussels: kitchen may rise, bedroom waits for 09:00, living never rises automatically
    let summary = home.run(&config, "2024-07-01T06:00:00Z").await.unwrap();

    assert_eq!(
        summary.decision.rise,
        vec![ShutterAction {
            room: "kitchen".to_string(),
            output: OutputId(3)
        }]
    );
    assert!(summary.decision.shut.is_empty());
    assert_eq!(summary.rise.triggered, 1);
    assert_eq!(home.switched_outputs().await, vec!["3"]);
    assert_eq!(home.history(), serde_json::json!({"3": "2024-07-01T06:00:00+00:00"}));
}

#[tokio::test]
async fn test_afternoon_run_rises_then_shuts() {
    let home = TestHome::new(r#"{"3": "2024-07-01T06:00:00+00:00"}"#).await;
    let config = home.config(false, ROOMS);

    // 18:00 in Brussels: past living's latest_down, sun still up
    let summary = home.run(&config, "2024-07-01T16:00:00Z").await.unwrap();

    assert_eq!(summary.rise.triggered, 1);
    assert_eq!(summary.rise.already_triggered, 1);
    assert_eq!(summary.shut.triggered, 1);
    assert_eq!(home.switched_outputs().await, vec!["1", "6"]);
    assert_eq!(
        home.history(),
        serde_json::json!({
            "1": "2024-07-01T16:00:00+00:00",
            "3": "2024-07-01T06:00:00+00:00",
            "6": "2024-07-01T16:00:00+00:00"
        })
    );
}

#[tokio::test]
async fn test_repeated_runs_do_not_trigger_twice() {
    let home = TestHome::new("{}").await;
    let config = home.config(false, ROOMS);

    home.run(&config, "2024-07-01T20:00:00Z").await.unwrap();
    let summary = home.run(&config, "2024-07-01T20:15:00Z").await.unwrap();

    assert_eq!(summary.rise.triggered + summary.shut.triggered, 0);
    assert_eq!(summary.rise.already_triggered, 2);
    assert_eq!(summary.shut.already_triggered, 3);
    assert_eq!(home.switched_outputs().await, vec!["1", "3", "2", "4", "6"]);
}

#[tokio::test]
async fn test_dry_run_leaves_gateway_and_history_alone() {
    let original = r#"{"9": "2024-06-30T20:00:00+00:00"}"#;
    let home = TestHome::new(original).await;
    let config = home.config(true, ROOMS);

    let summary = home.run(&config, "2024-07-01T20:00:00Z").await.unwrap();

    assert_eq!(summary.rise.dry_run + summary.shut.dry_run, 5);
    assert!(home.gateway_server.received_requests().await.unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&home.history_path).unwrap(), original);
}

#[tokio::test]
async fn test_nothing_to_do_before_sunrise() {
    let home = TestHome::new("{}").await;
    let config = home.config(false, ROOMS);

    let summary = home.run(&config, "2024-07-01T03:00:00Z").await.unwrap();

    assert!(summary.decision.is_empty());
    assert!(home.gateway_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sun_lookup_failure_aborts_run() {
    let home = TestHome::new("{}").await;
    let config = home.config(false, ROOMS);

    // the mocked sun service only knows 2024-07-01
    let result = home.run(&config, "2024-07-02T20:00:00Z").await;

    assert!(result.is_err());
    assert!(home.gateway_server.received_requests().await.unwrap().is_empty());
    assert_eq!(home.history(), serde_json::json!({}));
}

#[tokio::test]
async fn test_corrupt_history_aborts_run() {
    let home = TestHome::new("{").await;
    let config = home.config(false, ROOMS);

    let result = home.run(&config, "2024-07-01T20:00:00Z").await;

    assert!(result.is_err());
    assert!(home.switched_outputs().await.is_empty());
}
