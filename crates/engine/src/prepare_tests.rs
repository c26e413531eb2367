// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_adapters::{FakeTaskManager, ScriptedHandler};
use drover_core::TaskInstanceBuilder;

fn write_manifest(manager: &FakeTaskManager, task: &TaskInstance, manifest: &str) {
    let dir = manager.task_dir(task);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
}

fn handlers(kinds: &[HandlerKind]) -> HashMap<HandlerKind, Arc<dyn TaskHandler>> {
    kinds
        .iter()
        .map(|&kind| {
            (
                kind,
                Arc::new(ScriptedHandler::new(kind)) as Arc<dyn TaskHandler>,
            )
        })
        .collect()
}

fn task(id: &str, version: &str) -> TaskInstance {
    TaskInstanceBuilder::default()
        .id(id)
        .name(id)
        .version(version)
        .build()
}

#[tokio::test]
async fn binds_handlers_in_declared_order() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path());
    let a = task("compile", "1.0.0");
    let b = task("publish", "2.0.0");
    write_manifest(&manager, &a, r#"{"execution": {"shell": {"target": "run.sh"}}}"#);
    write_manifest(&manager, &b, r#"{"execution": {"shell": {"target": "push.sh"}}}"#);

    let prepared = prepare_tasks(
        &manager,
        &handlers(&[HandlerKind::Shell]),
        &[a.clone(), b.clone()],
    )
    .await
    .unwrap();

    assert_eq!(prepared.len(), 2);
    assert_eq!(prepared[0].task.id, "compile");
    assert_eq!(prepared[1].task.id, "publish");
    assert_eq!(prepared[0].target, manager.task_dir(&a).join("run.sh"));
}

#[tokio::test]
async fn prefers_native_over_shell_over_interpreted() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path());
    let t = task("build", "1.0.0");
    write_manifest(
        &manager,
        &t,
        r#"{"execution": {
            "interpreted": {"target": "main.py"},
            "shell": {"target": "run.sh"},
            "native": {"target": "bin/build"}
        }}"#,
    );

    let all = handlers(&[HandlerKind::Native, HandlerKind::Shell, HandlerKind::Interpreted]);
    let prepared = prepare_tasks(&manager, &all, &[t.clone()]).await.unwrap();
    assert_eq!(prepared[0].kind, HandlerKind::Native);

    // without a native handler, the shell target wins
    let no_native = handlers(&[HandlerKind::Shell, HandlerKind::Interpreted]);
    let prepared = prepare_tasks(&manager, &no_native, &[t]).await.unwrap();
    assert_eq!(prepared[0].kind, HandlerKind::Shell);
    assert!(prepared[0].target.ends_with("run.sh"));
}

#[tokio::test]
async fn no_matching_handler_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path());
    let t = task("exotic", "1.0.0");
    write_manifest(&manager, &t, r#"{"execution": {"jvm": {"target": "Main.class"}}}"#);

    let err = prepare_tasks(&manager, &handlers(&[HandlerKind::Shell]), &[t])
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::NoHandler { ref task } if task == "exotic"));
}

#[tokio::test]
async fn missing_manifest_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path());
    let t = task("ghost", "0.1.0");

    let err = prepare_tasks(&manager, &handlers(&[HandlerKind::Shell]), &[t])
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::ManifestIo { .. }));
}

#[tokio::test]
async fn malformed_manifest_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path());
    let t = task("broken", "0.1.0");
    write_manifest(&manager, &t, "not json");

    let err = prepare_tasks(&manager, &handlers(&[HandlerKind::Shell]), &[t])
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::ManifestParse { .. }));
}

#[tokio::test]
async fn duplicate_tasks_are_fetched_once() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path());
    let t = task("lint", "1.0.0");
    write_manifest(&manager, &t, r#"{"execution": {"shell": {"target": "lint.sh"}}}"#);

    let prepared = prepare_tasks(
        &manager,
        &handlers(&[HandlerKind::Shell]),
        &[t.clone(), t.clone()],
    )
    .await
    .unwrap();

    assert_eq!(prepared.len(), 2);
    assert_eq!(manager.ensured.lock().clone(), vec!["lint:1.0.0".to_string()]);
}

#[tokio::test]
async fn many_tasks_prepare_with_bounded_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FakeTaskManager::new(dir.path());
    let tasks: Vec<TaskInstance> = (0..12)
        .map(|n| task(&format!("step{n}"), "1.0.0"))
        .collect();
    for t in &tasks {
        write_manifest(&manager, t, r#"{"execution": {"shell": {"target": "go.sh"}}}"#);
    }

    let prepared = prepare_tasks(&manager, &handlers(&[HandlerKind::Shell]), &tasks)
        .await
        .unwrap();
    let ids: Vec<String> = prepared.iter().map(|p| p.task.id.clone()).collect();
    assert_eq!(ids, (0..12).map(|n| format!("step{n}")).collect::<Vec<_>>());
}
