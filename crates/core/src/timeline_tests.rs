// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending_to_in_progress = { RecordState::Pending, RecordState::InProgress, true },
    in_progress_to_completed = { RecordState::InProgress, RecordState::Completed, true },
    pending_to_completed = { RecordState::Pending, RecordState::Completed, true },
    completed_to_in_progress = { RecordState::Completed, RecordState::InProgress, false },
    in_progress_to_pending = { RecordState::InProgress, RecordState::Pending, false },
    same_state = { RecordState::InProgress, RecordState::InProgress, true },
)]
fn state_advances_forward_only(from: RecordState, to: RecordState, accepted: bool) {
    let mut record = TimelineRecord::stub(RecordId::new());
    record.state = Some(from);
    assert_eq!(record.advance_state(to), accepted);
    let expected = if accepted { to } else { from };
    assert_eq!(record.state, Some(expected));
}

#[test]
fn advance_from_unset_always_accepts() {
    let mut record = TimelineRecord::stub(RecordId::new());
    assert!(record.advance_state(RecordState::Completed));
    assert_eq!(record.state, Some(RecordState::Completed));
}

#[parameterized(
    all_green = { vec![TaskResult::Succeeded, TaskResult::Succeeded], TaskResult::Succeeded },
    one_failure_wins = { vec![TaskResult::Succeeded, TaskResult::Failed, TaskResult::Succeeded], TaskResult::Failed },
    issues_beat_skipped = { vec![TaskResult::Skipped, TaskResult::SucceededWithIssues], TaskResult::SucceededWithIssues },
    skipped_beats_green = { vec![TaskResult::Succeeded, TaskResult::Skipped], TaskResult::Skipped },
    empty_is_green = { vec![], TaskResult::Succeeded },
)]
fn worst_of_picks_most_severe(results: Vec<TaskResult>, expected: TaskResult) {
    assert_eq!(TaskResult::worst_of(results), expected);
}

#[test]
fn failed_is_the_only_non_success() {
    assert!(TaskResult::Succeeded.is_success());
    assert!(TaskResult::SucceededWithIssues.is_success());
    assert!(TaskResult::Skipped.is_success());
    assert!(!TaskResult::Failed.is_success());
}

#[test]
fn issues_capped_but_counts_keep_going() {
    let mut record = TimelineRecord::stub(RecordId::new());
    for n in 0..15 {
        record.add_issue(
            Issue {
                kind: IssueKind::Error,
                category: "Task".to_string(),
                message: format!("boom {n}"),
            },
            10,
        );
    }
    record.add_issue(
        Issue {
            kind: IssueKind::Warning,
            category: "Task".to_string(),
            message: "careful".to_string(),
        },
        10,
    );

    assert_eq!(record.error_count, 15);
    assert_eq!(record.warning_count, 1);
    // 10 errors retained plus the one warning
    assert_eq!(record.issues.len(), 11);
    assert_eq!(
        record
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::Error)
            .count(),
        10
    );
}

#[test]
fn unset_fields_are_omitted_from_wire_payload() {
    let mut record = TimelineRecord::stub(RecordId::from_string("rec-wire"));
    record.advance_state(RecordState::InProgress);
    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["id"], "rec-wire");
    assert_eq!(json["state"], "in_progress");
    assert!(json.get("result").is_none());
    assert!(json.get("startTime").is_none());
    assert!(json.get("issues").is_none());
    assert_eq!(json["errorCount"], 0);
}
