// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-agent scenarios: a scripted pool queue drives the listener, the
//! in-process host runs the engine against fake adapters, and the fakes'
//! recordings are checked end to end.

use drover_adapters::{
    FakeContainerApi, FakeQueueApi, FakeTaskManager, FakeTimelineApi, HandlerKind, PluginHooks,
    TaskHandler, TaskManager, TestPlugin,
};
use drover_adapters::{ScriptedHandler, ScriptedRun};
use drover_core::{
    FakeClock, JobMessage, JobMessageBuilder, MaskHint, MaskKind, PoolId, RecordId, RecordState,
    TaskInstance, TaskInstanceBuilder, TaskResult, TimelineRecord,
};
use drover_daemon::{Agent, InProcessHost};
use drover_engine::prepare::MANIFEST_FILE;
use drover_engine::{FeedbackConfig, PluginRegistry, WorkerDeps};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct Fleet {
    _dir: tempfile::TempDir,
    queue: Arc<FakeQueueApi>,
    timeline: Arc<FakeTimelineApi>,
    container: Arc<FakeContainerApi>,
    handler: Arc<ScriptedHandler>,
    agent: Agent,
}

/// Cadences far beyond test duration so every flush we observe is the
/// drain-time flush.
fn slow_config() -> FeedbackConfig {
    FeedbackConfig {
        console_delay: Duration::from_secs(3600),
        timeline_delay: Duration::from_secs(3600),
        log_delay: Duration::from_secs(3600),
        lock_interval: Duration::from_secs(7200),
        ..FeedbackConfig::default()
    }
}

fn shell_task(id: &str, instance: &str) -> TaskInstance {
    TaskInstanceBuilder::default()
        .id(id)
        .instance_id(instance)
        .name(id)
        .version("1.0.0")
        .build()
}

fn fleet(tasks: Vec<TaskInstance>, plugins: PluginRegistry) -> Fleet {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path().join("tasks"));
    for task in &tasks {
        let task_dir = manager.task_dir(task);
        std::fs::create_dir_all(&task_dir).unwrap();
        std::fs::write(
            task_dir.join(MANIFEST_FILE),
            r#"{"execution": {"shell": {"target": "run.sh"}}}"#,
        )
        .unwrap();
    }

    let queue = Arc::new(FakeQueueApi::new());
    let timeline = Arc::new(FakeTimelineApi::new());
    let container = Arc::new(FakeContainerApi::new());
    let handler = Arc::new(ScriptedHandler::new(HandlerKind::Shell));
    let handlers: HashMap<HandlerKind, Arc<dyn TaskHandler>> =
        HashMap::from([(HandlerKind::Shell, handler.clone() as Arc<dyn TaskHandler>)]);

    let deps = Arc::new(WorkerDeps {
        queue: queue.clone(),
        timeline: timeline.clone(),
        container: container.clone(),
        task_manager: Arc::new(manager),
        handlers,
        plugins,
        config: slow_config(),
        worker_name: "agent-e2e".to_string(),
        work_dir: dir.path().join("work"),
    });
    let host = Arc::new(InProcessHost::new(deps, FakeClock::new()));
    let agent = Agent::new(queue.clone(), PoolId(7), "agent-e2e", host);

    Fleet {
        _dir: dir,
        queue,
        timeline,
        container,
        handler,
        agent,
    }
}

fn record<'a>(
    merged: &'a HashMap<RecordId, TimelineRecord>,
    id: &str,
) -> &'a TimelineRecord {
    &merged[&RecordId::from_string(id)]
}

/// The mixed-result job: one passing task, one hard failure, and an
/// after-job plugin that still runs and succeeds. The job as a whole
/// fails, the timeline tells the full story, and the request row is
/// closed out with the failure.
#[tokio::test(start_paused = true)]
async fn failed_task_still_yields_a_complete_timeline() {
    let mut plugins = PluginRegistry::new();
    let report = Arc::new(TestPlugin::new("report", PluginHooks::AFTER));
    plugins.register("build", report.clone());

    let f = fleet(
        vec![shell_task("compile", "rec-a"), shell_task("package", "rec-b")],
        plugins,
    );
    f.handler.push_run(ScriptedRun::ok(["compiling", "compiled"]));
    f.handler.push_run(ScriptedRun::failing(["kaboom"], 1));

    let message: JobMessage = JobMessageBuilder::default()
        .job_id("job-e2e")
        .job_name("nightly")
        .tasks(vec![shell_task("compile", "rec-a"), shell_task("package", "rec-b")])
        .build();
    f.queue.push_job(1, &message);

    // the exhausted poll script reads as a dead pool, ending the run
    let run = f.agent.run().await;
    assert!(run.is_err());

    // listener hygiene: claimed, acknowledged, session torn down
    assert_eq!(f.queue.messages_deleted.lock().clone(), vec![1]);
    assert_eq!(f.queue.sessions_created.lock().len(), 1);
    assert_eq!(f.queue.sessions_deleted.lock().len(), 1);

    // the request row was closed with the job's failure
    let patches = f.queue.patches.lock().clone();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].request_id, message.request_id);
    assert_eq!(patches[0].result, Some(TaskResult::Failed));
    assert!(patches[0].finish_time.is_some());

    let merged = f.timeline.merged_records();
    let compile = record(&merged, "rec-a");
    assert_eq!(compile.result, Some(TaskResult::Succeeded));
    assert_eq!(compile.state, Some(RecordState::Completed));
    assert!(compile.log.is_some());

    let package = record(&merged, "rec-b");
    assert_eq!(package.result, Some(TaskResult::Failed));
    assert_eq!(package.error_count, 1);

    let job = &merged[&message.job_record_id()];
    assert_eq!(job.result, Some(TaskResult::Failed));
    assert_eq!(job.name.as_deref(), Some("nightly"));
    assert_eq!(job.worker_name.as_deref(), Some("agent-e2e"));

    // the after plugin saw the failure and still completed
    let plugin_record = merged
        .values()
        .find(|r| r.name.as_deref() == Some("Test plugin report"))
        .unwrap();
    assert_eq!(plugin_record.result, Some(TaskResult::Succeeded));
    assert!(report.calls.lock().contains(&"after_job(false)".to_string()));

    // console feed carries task output and the plugin's line
    let lines = f.timeline.feed_lines.lock().clone();
    assert!(lines.contains(&"compiling".to_string()));
    assert!(lines.contains(&"kaboom".to_string()));
    assert!(lines.contains(&"plugin report after".to_string()));

    // finished log pages were uploaded for both tasks
    assert_eq!(f.timeline.uploaded_pages.lock().len(), 2);
}

/// A clean job: secrets arriving as mask hints never reach the console
/// feed, progress commands land on the record, and the request row is
/// closed with success.
#[tokio::test(start_paused = true)]
async fn green_job_masks_secrets_and_reports_progress() {
    let f = fleet(vec![shell_task("deploy", "rec-a")], PluginRegistry::new());
    f.handler.push_run(ScriptedRun::ok([
        "token is hunter2-hunter2",
        "##drover[task.setprogress value=100]deployed",
    ]));

    let message: JobMessage = JobMessageBuilder::default()
        .job_id("job-green")
        .job_name("deploy")
        .tasks(vec![shell_task("deploy", "rec-a")])
        .variables(HashMap::from([(
            "deploy.token".to_string(),
            "hunter2-hunter2".to_string(),
        )]))
        .mask_hints(vec![MaskHint {
            kind: MaskKind::Variable,
            value: "deploy.token".to_string(),
        }])
        .build();
    f.queue.push_job(9, &message);

    let _ = f.agent.run().await;

    let patches = f.queue.patches.lock().clone();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].result, Some(TaskResult::Succeeded));

    let lines = f.timeline.feed_lines.lock().clone();
    assert!(lines.iter().any(|l| l.contains("token is ********")));
    assert!(!lines.iter().any(|l| l.contains("hunter2")));

    let merged = f.timeline.merged_records();
    let deploy = record(&merged, "rec-a");
    assert_eq!(deploy.result, Some(TaskResult::Succeeded));
    assert_eq!(deploy.percent_complete, Some(100));
    assert_eq!(deploy.current_operation.as_deref(), Some("deployed"));

    // nothing was uploaded to the container in this job
    assert!(f.container.uploads.lock().is_empty());
}
