mod common;

use brrtapi::testing::TestClient;
use brrtapi::EngineConfig;
use common::users_app;
use std::io::Write;
use std::time::Duration;

#[tokio::test]
async fn test_engine_follows_file_config() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
docs_path = "/api/openapi.json"
docs_yaml_path = "/api/openapi.yaml"
schema_path_prefix = "/api/schemas/"
slow_task_threshold_ms = 40
default_task_timeout_ms = 2000
expose_internal_errors = true
"#
    )
    .unwrap();

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.default_task_timeout(), Some(Duration::from_secs(2)));

    let client = TestClient::new(users_app(config).build().unwrap());
    let supervisor = client.engine().supervisor().config();
    assert_eq!(supervisor.slow_threshold, Duration::from_millis(40));
    assert_eq!(supervisor.default_timeout, Some(Duration::from_secs(2)));

    client.get("/api/openapi.json").send().await.assert_status(200);
    let yaml = client.get("/api/openapi.yaml").send().await;
    yaml.assert_status(200);
    assert!(yaml.text().contains("title: Users"));
    client
        .get("/api/schemas/get_user")
        .send()
        .await
        .assert_status(200);
    client.get("/openapi.json").send().await.assert_status(404);
}

#[test]
fn test_yaml_config_and_invalid_file() {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(file, "register_docs_routes: false\nvalidate_responses: false").unwrap();
    let config = EngineConfig::from_file(file.path()).unwrap();
    assert!(!config.register_docs_routes);
    assert!(!config.validate_responses);

    let engine = users_app(config).build().unwrap();
    assert_eq!(engine.registry().len(), 2);

    let mut broken = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(broken, "slow_task_threshold_ms = \"soon\"").unwrap();
    assert!(EngineConfig::from_file(broken.path()).is_err());
}
