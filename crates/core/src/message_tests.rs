// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn job_info_excludes_endpoints() {
    let msg = JobMessageBuilder::default()
        .variables(HashMap::from([(
            "build.buildId".to_string(),
            "77".to_string(),
        )]))
        .endpoints(vec![ServiceEndpoint {
            name: "drop".to_string(),
            url: "https://drop.example".to_string(),
            authorization: HashMap::from([("token".to_string(), "s3cret".to_string())]),
        }])
        .build();

    let info = msg.job_info();
    assert_eq!(info.job_id, msg.job_id);
    assert_eq!(info.lock_token, "lock-token-1");
    assert_eq!(info.variables["build.buildId"], "77");

    let json = serde_json::to_string(&info).unwrap();
    assert!(!json.contains("s3cret"));
}

#[test]
fn deserializes_wire_message() {
    let body = r#"{
        "jobId": "5e952d21-42d5-41bd-a6c6-3953c4c2ba2a",
        "jobName": "CI build",
        "planId": "plan-9",
        "timelineId": "tl-9",
        "requestId": 7,
        "lockToken": "tok",
        "tasks": [
            {
                "id": "shellscript",
                "instanceId": "rec-a",
                "name": "ShellScript",
                "version": "0.1.0",
                "inputs": {"scriptPath": "$(build.sourceDirectory)/ci.sh"},
                "continueOnError": true
            }
        ],
        "maskHints": [{"kind": "variable", "value": "system.accessToken"}]
    }"#;

    let msg: JobMessage = serde_json::from_str(body).unwrap();
    assert_eq!(msg.request_id, 7);
    assert_eq!(msg.tasks.len(), 1);
    assert!(msg.tasks[0].continue_on_error);
    assert_eq!(msg.tasks[0].key(), "shellscript:0.1.0");
    assert_eq!(msg.mask_hints[0].kind, MaskKind::Variable);
    // omitted collections default
    assert!(msg.variables.is_empty());
    assert!(msg.endpoints.is_empty());
}

#[test]
fn task_label_prefers_display_name() {
    let task = TaskInstanceBuilder::default()
        .name("cmdline")
        .display_name("Run ad-hoc script")
        .build();
    assert_eq!(task.label(), "Run ad-hoc script");

    let bare = TaskInstanceBuilder::default().name("cmdline").build();
    assert_eq!(bare.label(), "cmdline");
}
