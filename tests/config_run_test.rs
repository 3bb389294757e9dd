//! Configuration document to run report

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use stressrig_config::ConfigLoader;
use stressrig_core::{MonitorState, ResourceId};
use stressrig_execution::testing::ScriptedCluster;
use stressrig_execution::{build_suites, BuildError, TestRunner};
use stressrig_logging::RecordingSink;
use tempfile::NamedTempFile;

const DOCUMENT: &str = r#"{
    // logical name -> deployment
    "Images": {
        "receiver": "test-shutdown-receiver",
        "sender": "test-shutdown-sender"
    },
    "Tests": {
        /* runs second */
        "b-down": [
            { "Action": "scale", "Pod": "receiver", "Units": "0" }
        ],
        "a-up": [
            { "Action": "scale", "Pod": "receiver", "Units": 2 },
            { "Action": "scale", "Pod": "sender", "Units": 1 },
            { "Action": "pause", "For": "30s" }
        ]
    },
    "Options": {
        "Match": ["panic"],
        "LostMatch": "connection lost",
        "BatchSize": 2,
        "PollInterval": "500ms"
    }
}"#;

fn write_config(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[tokio::test(start_paused = true)]
async fn test_document_to_report() -> Result<()> {
    let file = write_config(DOCUMENT)?;
    let config = ConfigLoader::with_prefix("STRESSRIG_IT_RUN").from_file(file.path())?;
    let suites = build_suites(&config, &[])?;
    assert_eq!(suites.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["a-up", "b-down"]);

    let receiver = ResourceId::new("test-shutdown-receiver");
    let sender = ResourceId::new("test-shutdown-sender");
    let cluster = ScriptedCluster::new();
    cluster.push_status(&receiver, "test-shutdown-receiver 3 2 1 config");
    cluster.push_status(&receiver, "test-shutdown-receiver 3 2 2 config");
    cluster.push_status(&receiver, "test-shutdown-receiver 4 0 0 config");
    cluster.push_status(&sender, "test-shutdown-sender 1 1 1 config");
    cluster.push_log(&receiver, "up\nconnection lost\nreconnecting\nup\npanic: boom\n");
    cluster.push_log_with_exit(
        &sender,
        "hello\n",
        Err(stressrig_execution::ClusterError::UnknownResource(sender.clone())),
    );

    let sink = Arc::new(RecordingSink::new());
    let runner = TestRunner::new(Arc::new(cluster.clone()), config.options.clone(), sink.clone());

    let start = tokio::time::Instant::now();
    let report = runner.run(&suites).await;
    assert!(start.elapsed() >= Duration::from_secs(30));

    assert_eq!(report.failures(), 0);
    assert_eq!(
        cluster.scale_calls(),
        vec![(receiver.clone(), 2), (sender.clone(), 1), (receiver.clone(), 0)]
    );

    let r = &report.resources[&receiver];
    assert_eq!((r.status.lines_seen, r.status.lines_matched), (5, 2));
    assert_eq!(r.state, Some(MonitorState::Done));
    assert!(r.status.last_error.is_none());

    let s = &report.resources[&sender];
    assert_eq!(s.status.lines_seen, 1);
    assert_eq!(s.state, Some(MonitorState::Failed));
    assert!(s.status.last_error.is_some());
    assert_eq!(report.stream_errors(), 1);
    assert!(!report.is_success());

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["resources"]["test-shutdown-receiver"]["status"]["lines_matched"], 2);
    assert_eq!(json["resources"]["test-shutdown-sender"]["state"], "failed");
    Ok(())
}

#[tokio::test]
async fn test_build_error_prevents_any_side_effect() -> Result<()> {
    let document = DOCUMENT.replace(r#""Pod": "sender""#, r#""Pod": "missing""#);
    let file = write_config(&document)?;
    let config = ConfigLoader::with_prefix("STRESSRIG_IT_BUILD").from_file(file.path())?;

    let err = build_suites(&config, &[]).unwrap_err();
    assert!(matches!(err.root(), BuildError::UnresolvedResource { name } if name == "missing"));
    assert!(err.to_string().contains("\"a-up\", action 1"));
    Ok(())
}

#[tokio::test]
async fn test_suite_selection() -> Result<()> {
    let file = write_config(DOCUMENT)?;
    let config = ConfigLoader::with_prefix("STRESSRIG_IT_SELECT").from_file(file.path())?;

    let suites = build_suites(&config, &["b-down".to_string()])?;
    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0].name, "b-down");

    assert_eq!(
        build_suites(&config, &["c".to_string()]).unwrap_err(),
        BuildError::UnknownSuite("c".to_string())
    );
    Ok(())
}
