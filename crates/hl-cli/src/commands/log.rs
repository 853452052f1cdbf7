//! Log command: one hook event in, one JSONL line out.
//!
//! The flow is read → project → correlate → append. Only the append can fail
//! the command; correlation problems cost enrichment and are logged.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hl_core::{CorrelationSignal, SessionId, SpawnDescriptor, correlate, project, read_event};
use hl_store::{FileStateStorage, SessionLog, StoreError};

use crate::config::Config;

/// Handles one hook input document.
///
/// Returns the session log written to, or `None` when the input was not a
/// usable event.
pub fn run(config: &Config, input: &str) -> Result<Option<PathBuf>> {
    run_at(config, input, Utc::now())
}

fn run_at(config: &Config, input: &str, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    let Some(event) = read_event(input) else {
        return Ok(None);
    };
    let log_dir = config.resolved_log_dir();

    let mut projection = project(&event, &config.project_options());
    if let Some(signal) = projection.signal.take() {
        match resolve(config, &log_dir, &event.session_id, &signal, now) {
            Ok(Some(descriptor)) => projection.enrich(&descriptor),
            Ok(None) => {}
            Err(e) => tracing::warn!(
                error = %e,
                session_id = %event.session_id,
                "correlation unavailable, logging without enrichment"
            ),
        }
    }

    let record = projection.into_record(&event, now);
    let log = SessionLog::new(log_dir, config.lock_timeout());
    let path = log.append(&record).context("failed to append hook record")?;
    Ok(Some(path))
}

/// Applies a correlation signal to the session's persisted table.
fn resolve(
    config: &Config,
    log_dir: &Path,
    session_id: &SessionId,
    signal: &CorrelationSignal,
    now: DateTime<Utc>,
) -> Result<Option<SpawnDescriptor>, StoreError> {
    let mut storage = FileStateStorage::open(log_dir, session_id, config.lock_timeout())?;
    Ok(correlate(&mut storage, signal, now, config.max_tracked_agents))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Duration;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            log_dir: Some(dir.path().join("logs")),
            ..Config::default()
        };
        (dir, config)
    }

    fn lines(config: &Config, session: &str) -> Vec<Value> {
        let path = config
            .resolved_log_dir()
            .join(format!("hooks-{session}.jsonl"));
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn log(config: &Config, event: &Value) {
        run(config, &event.to_string()).unwrap().unwrap();
    }

    fn task_pre() -> Value {
        json!({
            "session_id": "s1",
            "hook_event_name": "PreToolUse",
            "tool_name": "Task",
            "tool_use_id": "toolu_1",
            "tool_input": {"subagent_type": "general-purpose", "description": "explore repo", "prompt": "look"}
        })
    }

    fn task_post() -> Value {
        json!({
            "session_id": "s1",
            "hook_event_name": "PostToolUse",
            "tool_name": "Task",
            "tool_use_id": "toolu_1",
            "tool_input": {"subagent_type": "general-purpose", "description": "explore repo", "prompt": "look"},
            "tool_response": {"agentId": "a1", "content": [{"type": "text", "text": "done"}]}
        })
    }

    fn subagent_stop() -> Value {
        json!({
            "session_id": "s1",
            "hook_event_name": "SubagentStop",
            "agent_id": "a1",
            "stop_hook_active": false
        })
    }

    #[test]
    fn user_prompt_scenario() {
        let (_dir, config) = setup();
        log(
            &config,
            &json!({"session_id":"s1","hook_event_name":"UserPromptSubmit","prompt":"pwd?"}),
        );

        let written = lines(&config, "s1");
        assert_eq!(written.len(), 1);
        assert_eq!(written[0]["event"], "UserPromptSubmit");
        assert_eq!(written[0]["prompt"], "pwd?");
        assert_eq!(written[0]["session_id"], "s1");
        assert!(written[0]["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn bash_scenario() {
        let (_dir, config) = setup();
        log(
            &config,
            &json!({
                "session_id": "s1",
                "hook_event_name": "PreToolUse",
                "tool_name": "Bash",
                "tool_input": {"command": "pwd", "description": "check cwd"}
            }),
        );

        let record = &lines(&config, "s1")[0];
        assert_eq!(record["bash_command"], "pwd");
        assert_eq!(record["bash_description"], "check cwd");
        assert_eq!(record["bash_timeout"], Value::Null);
        assert_eq!(record["bash_background"], Value::Null);
    }

    #[test]
    fn malformed_input_writes_nothing() {
        let (_dir, config) = setup();
        for input in ["", "not json", "[1]", "42"] {
            assert_eq!(run(&config, input).unwrap(), None);
        }
        assert!(!config.resolved_log_dir().exists());
    }

    #[test]
    fn same_kind_records_share_keys() {
        let (_dir, config) = setup();
        log(
            &config,
            &json!({
                "session_id": "s1",
                "hook_event_name": "PreToolUse",
                "tool_name": "Read",
                "tool_input": {"file_path": "/a", "offset": 10, "limit": 20},
                "cwd": "/work"
            }),
        );
        log(
            &config,
            &json!({"session_id":"s1","hook_event_name":"PreToolUse","tool_name":"Read","tool_input":{}}),
        );

        let written = lines(&config, "s1");
        let keys = |v: &Value| -> Vec<String> { v.as_object().unwrap().keys().cloned().collect() };
        assert_eq!(keys(&written[0]), keys(&written[1]));
        insta::assert_snapshot!(
            keys(&written[0]).join(","),
            @"ts,session_id,event,cwd,permission_mode,tool_name,tool_use_id,file_path,read_offset,read_limit"
        );
    }

    #[test]
    fn completion_before_registration_scenario() {
        let (_dir, config) = setup();
        log(&config, &task_pre());
        log(&config, &subagent_stop());
        log(&config, &task_post());

        let written = lines(&config, "s1");
        assert_eq!(written.len(), 3);
        let stop = &written[1];
        assert_eq!(stop["event"], "SubagentStop");
        assert_eq!(stop["agent_id"], "a1");
        assert_eq!(stop["subagent_type"], "general-purpose");
        assert_eq!(stop["subagent_description"], "explore repo");

        let post = &written[2];
        assert_eq!(post["agent_id"], "a1");
        assert_eq!(post["subagent_response"], "done");
    }

    #[test]
    fn correlation_is_order_independent_when_spawn_comes_first() {
        for order in [["post", "stop"], ["stop", "post"]] {
            let (_dir, config) = setup();
            log(&config, &task_pre());
            for step in order {
                match step {
                    "post" => log(&config, &task_post()),
                    _ => log(&config, &subagent_stop()),
                }
            }

            let stop = lines(&config, "s1")
                .into_iter()
                .find(|r| r["event"] == "SubagentStop")
                .unwrap();
            assert_eq!(stop["subagent_type"], "general-purpose", "order {order:?}");
            assert_eq!(stop["subagent_description"], "explore repo", "order {order:?}");
        }
    }

    #[test]
    fn corrupt_state_does_not_block_logging() {
        let (_dir, config) = setup();
        let state_dir = config.resolved_log_dir().join("state");
        fs::create_dir_all(&state_dir).unwrap();
        fs::write(state_dir.join("agents-s1.json"), "garbage").unwrap();

        log(&config, &subagent_stop());

        let written = lines(&config, "s1");
        assert_eq!(written.len(), 1);
        assert_eq!(written[0]["subagent_type"], Value::Null);
    }

    #[test]
    fn similar_session_ids_do_not_share_state() {
        let (_dir, config) = setup();
        log(
            &config,
            &json!({
                "session_id": "a/b",
                "hook_event_name": "PreToolUse",
                "tool_name": "Task",
                "tool_input": {"subagent_type": "from-a-slash-b", "description": "x"}
            }),
        );
        log(
            &config,
            &json!({"session_id": "a_b", "hook_event_name": "SubagentStop", "agent_id": "x1"}),
        );

        let stop = lines(&config, "a_b");
        assert_eq!(stop.len(), 1);
        assert_eq!(stop[0]["subagent_type"], Value::Null);
        assert_eq!(lines(&config, "a%2Fb").len(), 1);
    }

    #[test]
    fn interleaved_sessions_keep_separate_logs() {
        let (_dir, config) = setup();
        let start = Utc::now();
        let events = [("s1", "a"), ("s2", "b"), ("s1", "c"), ("s2", "d"), ("s1", "e")];
        for (i, (session, prompt)) in events.iter().enumerate() {
            let input = json!({"session_id": session, "hook_event_name": "UserPromptSubmit", "prompt": prompt});
            let now = start + Duration::milliseconds(i64::try_from(i).unwrap());
            run_at(&config, &input.to_string(), now).unwrap();
        }

        assert_eq!(lines(&config, "s1").len(), 3);
        assert_eq!(lines(&config, "s2").len(), 2);
        let log = SessionLog::new(config.resolved_log_dir(), config.lock_timeout());
        assert_eq!(
            log.latest(),
            Some(config.resolved_log_dir().join("hooks-s1.jsonl"))
        );
    }
}
