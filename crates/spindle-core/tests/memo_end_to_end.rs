use std::time::Duration;

use serde_json::json;
use spindle_core::app::StatusTracker;
use spindle_core::impls::InMemoryProvider;
use spindle_core::ports::{
    DEFAULT_JOB_NAME, ExecutionProvider, FixedClock, IdGenerator, ProviderConfig, UlidGenerator,
};
use spindle_core::{Checkpoint, JobState, MemoValue, Memoizer, TaskDescriptor};

fn descriptor(ids: &impl IdGenerator) -> TaskDescriptor {
    TaskDescriptor::new(ids.generate_task_id(), "f", "h1", "e")
        .with_args([MemoValue::Int(1), MemoValue::Int(2)])
}

fn id_gen() -> UlidGenerator<FixedClock> {
    UlidGenerator::new(FixedClock::new(chrono::Utc::now()))
}

#[test]
fn second_identical_descriptor_hits_the_cache() {
    let ids = id_gen();
    let memo: Memoizer = Memoizer::new(true, Checkpoint::new());

    let mut first = descriptor(&ids);
    assert_eq!(memo.check_memo(&mut first).unwrap(), None);
    let hash = first.hashsum.clone().expect("hash assigned on check");

    memo.update_memo(&first, json!(42));

    let mut second = descriptor(&ids);
    assert_ne!(first.task_id, second.task_id);
    assert_eq!(memo.check_memo(&mut second).unwrap(), Some(json!(42)));
    assert_eq!(second.hashsum.as_deref(), Some(hash.as_str()));
}

#[test]
fn hit_survives_a_checkpoint_restart() {
    let ids = id_gen();
    let before: Memoizer = Memoizer::new(true, Checkpoint::new());
    let mut task = descriptor(&ids);
    before.check_memo(&mut task).unwrap();
    before.update_memo(&task, json!(42));

    // 外部の永続化を模して JSON を経由する
    let persisted = serde_json::to_string(&before.checkpoint()).unwrap();
    let restored: Checkpoint = serde_json::from_str(&persisted).unwrap();

    let after: Memoizer = Memoizer::new(true, restored);
    assert_eq!(after.check_memo(&mut descriptor(&ids)).unwrap(), Some(json!(42)));
}

#[tokio::test]
async fn miss_dispatch_poll_update_then_hit() {
    let ids = id_gen();
    let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
    let provider = InMemoryProvider::new(ProviderConfig::new("local", Duration::ZERO));
    let mut tracker = StatusTracker::new();

    let mut task = descriptor(&ids);
    assert_eq!(memo.check_memo(&mut task).unwrap(), None);

    let job_id = provider
        .submit("python -m worker", 1, DEFAULT_JOB_NAME)
        .await
        .unwrap();
    tracker.track(job_id.clone());
    tracker.poll_until_terminal(&provider).await.unwrap();

    let job = tracker.get(&job_id).unwrap();
    assert_eq!(job.state(), JobState::Completed);
    memo.update_memo(&task, json!({ "exit_code": job.status.as_ref().unwrap().exit_code() }));

    let mut rerun = descriptor(&ids);
    assert_eq!(
        memo.check_memo(&mut rerun).unwrap(),
        Some(json!({ "exit_code": 0 }))
    );
}
