use std::fs;

use caserun::config::{ConfigLoader, RunMode};
use caserun::loader::{CaseLoader, FileLoader};
use caserun::runner::{CaseRunner, Coordinator, Schedule};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 配置文件 + 环境常量 + TOML 用例文件完整运行
#[tokio::test]
async fn test_environment_constants_drive_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("X-Api-Key", "dev-key-123"))
        .and(query_param("tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "orders": [{"id": "o-1", "total": 20}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("caserun.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[engine]
mode = "pooled"
workers = 2

[environments.dev]
base_url = "{}"
api_key = "dev-key-123"
"#,
            mock_server.uri()
        ),
    )
    .unwrap();

    let cases_path = temp_dir.path().join("cases.toml");
    fs::write(
        &cases_path,
        r#"
[[cases]]
id = "list-orders"

[[cases.steps]]
name = "list"
expect = ["status == 200", "body.orders[0].total >= 10", "body.orders contains [{\"id\": \"o-1\"}]"]

[cases.steps.request]
path = "/orders"
headers = { "X-Api-Key" = "{{api_key}}" }
query = { tenant = "{{tenant}}" }
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(Some(&config_path)).unwrap();
    assert_eq!(config.engine.mode, RunMode::Pooled);
    assert_eq!(config.schedule(), Schedule::Pooled { workers: 2 });

    let cli_vars = vec![("tenant".to_string(), "acme".to_string())];
    let constants = ConfigLoader::build_constants(&config, Some("dev"), &cli_vars).unwrap();
    let cases = FileLoader::new(&cases_path).load().unwrap();

    let run = tokio::task::spawn_blocking(move || {
        let runner = CaseRunner::from_config(&config, constants).unwrap();
        Coordinator::new(runner).run(&cases, config.schedule()).unwrap()
    })
    .await
    .unwrap();

    assert!(run.success());
    mock_server.verify().await;
}

#[test]
fn test_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::find_upwards(temp_dir.path()).is_none());

    let config = caserun::config::RunConfig::default();
    assert_eq!(config.schedule(), Schedule::Sequential);
    assert_eq!(config.engine.timeout_ms, 5000);
    assert!(config.auth.is_none());
}

#[test]
fn test_malformed_assertion_is_a_load_error() {
    let temp_dir = TempDir::new().unwrap();
    let cases_path = temp_dir.path().join("cases.json");
    fs::write(
        &cases_path,
        r#"[{"id": "bad", "steps": [{"request": {"path": "/x"}, "expect": ["body.id matches \"(\""]}]}]"#,
    )
    .unwrap();

    let err = FileLoader::new(&cases_path).load().unwrap_err().to_string();
    assert!(err.contains("body.id matches"), "{}", err);
    assert!(err.contains("invalid regex"), "{}", err);
}
