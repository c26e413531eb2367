// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_adapters::FakeQueueApi;
use drover_core::{JobMessageBuilder, TaskResult};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingHost {
    jobs: Mutex<Vec<JobMessage>>,
}

#[async_trait]
impl WorkerHost for RecordingHost {
    async fn run_job(&self, message: JobMessage) -> TaskResult {
        self.jobs.lock().push(message);
        TaskResult::Succeeded
    }
}

fn agent(queue: Arc<FakeQueueApi>, host: Arc<RecordingHost>) -> Agent {
    Agent::new(queue, PoolId(1), "agent-1", host)
}

#[tokio::test(start_paused = true)]
async fn job_request_messages_reach_the_host() {
    let queue = Arc::new(FakeQueueApi::new());
    let job = JobMessageBuilder::default().job_name("nightly build").build();
    queue.push_job(100, &job);
    let host = Arc::new(RecordingHost::default());

    let _ = agent(queue.clone(), host.clone()).run().await;
    let jobs = host.jobs.lock();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, job.job_id);
    assert_eq!(jobs[0].job_name, "nightly build");
    // delivery finished, so the message was acknowledged
    assert_eq!(queue.messages_deleted.lock().clone(), vec![100]);
}

#[tokio::test(start_paused = true)]
async fn non_job_messages_are_skipped_but_acknowledged() {
    let queue = Arc::new(FakeQueueApi::new());
    queue.push_message(QueueMessage {
        message_id: 5,
        message_type: "AgentRefresh".to_string(),
        body: String::new(),
    });
    let host = Arc::new(RecordingHost::default());

    let _ = agent(queue.clone(), host.clone()).run().await;
    assert!(host.jobs.lock().is_empty());
    assert_eq!(queue.messages_deleted.lock().clone(), vec![5]);
}

#[tokio::test(start_paused = true)]
async fn undecodable_job_bodies_are_dropped() {
    let queue = Arc::new(FakeQueueApi::new());
    queue.push_message(QueueMessage {
        message_id: 6,
        message_type: QueueMessage::JOB_REQUEST.to_string(),
        body: "not json".to_string(),
    });
    let job = JobMessageBuilder::default().build();
    queue.push_job(7, &job);
    let host = Arc::new(RecordingHost::default());

    let _ = agent(queue.clone(), host.clone()).run().await;
    // the bad message did not stop the good one behind it
    assert_eq!(host.jobs.lock().len(), 1);
    assert_eq!(queue.messages_deleted.lock().clone(), vec![6, 7]);
}

#[tokio::test(start_paused = true)]
async fn stop_ends_the_run_cleanly() {
    let queue = Arc::new(FakeQueueApi::new());
    let host = Arc::new(RecordingHost::default());
    let a = agent(queue.clone(), host);

    a.stop();
    let result = a.run().await;
    assert!(result.is_ok());
    assert_eq!(a.state(), ListenerState::Stopped);
}
