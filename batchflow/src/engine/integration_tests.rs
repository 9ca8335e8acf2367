//! End-to-end tests for volume request dispatch.

use super::{EngineServices, PauseGate, ProcessVolumeRequestHandler};
use crate::config::{EngineConfig, InMemoryConfigurationCache};
use crate::errors::EngineError;
use crate::events::ProcessGroupRemoved;
use crate::filters::OverflowPolicy;
use crate::pipeline::Handler;
use crate::process::{
    InMemoryVolumeHandler, MockStateManager, ProcessExecutionContext, ProcessRepository,
    ProcessState, ProcessStatus,
};
use crate::testing::{
    assert_process_errored, assert_process_untouched, assert_volume_generated, EngineFixture,
    FailingProcess, MockProcess,
};
use std::sync::Arc;
use std::time::Duration;

async fn dispatch_all(
    handler: &Arc<ProcessVolumeRequestHandler>,
    requests: Vec<ProcessExecutionContext>,
) -> Vec<ProcessExecutionContext> {
    let tasks: Vec<_> = requests
        .into_iter()
        .map(|ctx| {
            let handler = handler.clone();
            tokio::spawn(async move {
                handler.handle(&ctx).await;
                ctx
            })
        })
        .collect();

    futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

#[tokio::test]
async fn test_generates_volume_end_to_end() {
    let process = Arc::new(MockProcess::new(1).with_volume(["a", "b"]));
    let fixture = EngineFixture::new().with_process(process.clone(), 3);
    let handler = fixture.handler();

    let ctx = fixture.new_request(100, 1);
    handler.handle(&ctx).await;

    assert_volume_generated(&ctx);
    assert_eq!(process.volume_calls(), 1);
    assert_eq!(fixture.volume.pending(), 2);
    assert_eq!(
        fixture.state_manager.get(100).map(|s| s.status),
        Some(ProcessStatus::VolumeGenerated)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pipeline_built_once_per_key_under_concurrency() {
    let process = Arc::new(MockProcess::new(1));
    let fixture = EngineFixture::new().with_process(process.clone(), 0);
    let handler = Arc::new(fixture.handler());

    let requests = (0..16).map(|id| fixture.new_request(id, 1)).collect();
    let done = dispatch_all(&handler, requests).await;

    for ctx in &done {
        assert_volume_generated(ctx);
    }
    assert_eq!(process.volume_calls(), 16);
    assert_eq!(handler.pipeline_count(), 1);
    assert_eq!(fixture.events.subscriber_count::<ProcessGroupRemoved>(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_volume_generation_is_serialized_per_key() {
    let process = Arc::new(MockProcess::new(1).with_delay(Duration::from_millis(20)));
    let fixture = EngineFixture::new().with_process(process.clone(), 0);
    let handler = Arc::new(fixture.handler());

    let requests = (0..4).map(|id| fixture.new_request(id, 1)).collect();
    dispatch_all(&handler, requests).await;

    assert_eq!(process.volume_calls(), 4);
    assert_eq!(process.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_keys_are_throttled_independently() {
    let slow = Duration::from_millis(100);
    let first = Arc::new(MockProcess::new(1).with_delay(slow));
    let second = Arc::new(MockProcess::new(2).with_delay(slow));
    let fixture = EngineFixture::new()
        .with_process(first.clone(), 0)
        .with_process(second.clone(), 0);
    let handler = Arc::new(fixture.handler());

    let requests = vec![fixture.new_request(1, 1), fixture.new_request(2, 2)];
    let started = std::time::Instant::now();
    dispatch_all(&handler, requests).await;

    assert!(started.elapsed() < slow * 2);
    assert_eq!(handler.pipeline_count(), 2);
}

#[tokio::test]
async fn test_duplicate_request_is_ignored_until_group_removed() {
    let process = Arc::new(MockProcess::new(1));
    let fixture = EngineFixture::new().with_process(process.clone(), 0);
    let handler = fixture.handler();

    handler.handle(&fixture.new_request(7, 1)).await;
    assert!(handler.is_duplicate(1, 7));

    // Reset the store so only the duplicate check stands in the way.
    let repeat = fixture.new_request(7, 1);
    handler.handle(&repeat).await;
    assert_process_untouched(&repeat);
    assert_eq!(process.volume_calls(), 1);

    let delivered = fixture
        .events
        .publish(&ProcessGroupRemoved::new(3, [7, 8]));
    assert_eq!(delivered, 1);
    assert!(!handler.is_duplicate(1, 7));

    let again = fixture.new_request(7, 1);
    handler.handle(&again).await;
    assert_volume_generated(&again);
    assert_eq!(process.volume_calls(), 2);
}

#[tokio::test]
async fn test_failing_process_is_retried_then_marked_errored() {
    let process = Arc::new(FailingProcess::new(1));
    let fixture = EngineFixture::new().with_process(process.clone(), 2);
    let handler = fixture.handler();

    let ctx = fixture.new_request(1, 1);
    handler.handle(&ctx).await;

    assert_eq!(process.calls(), 3);
    assert_process_errored(&ctx, "Error generating volume");
    assert!(ctx
        .error_message()
        .is_some_and(|m| m.contains("volume source unavailable")));
}

#[tokio::test]
async fn test_zero_retries_runs_once() {
    let process = Arc::new(FailingProcess::new(1));
    let fixture = EngineFixture::new().with_process(process.clone(), 0);
    let handler = fixture.handler();

    let ctx = fixture.new_request(1, 1);
    handler.handle(&ctx).await;

    assert_eq!(process.calls(), 1);
    assert_process_errored(&ctx, "Error generating volume");
}

#[tokio::test]
async fn test_unlimited_retries_recover() {
    let process = Arc::new(MockProcess::new(1));
    let fixture = EngineFixture::new().with_process(process.clone(), -1);
    let handler = fixture.handler();

    let ctx = fixture.new_request(1, 1);
    handler.handle(&ctx).await;
    assert_volume_generated(&ctx);
}

#[tokio::test]
async fn test_generated_process_is_not_regenerated() {
    let process = Arc::new(MockProcess::new(1));
    let fixture = EngineFixture::new().with_process(process.clone(), 0);
    let handler = fixture.handler();

    fixture
        .state_manager
        .insert(ProcessState::new(5, 1).with_status(ProcessStatus::VolumeGenerated));
    let ctx = ProcessExecutionContext::new(ProcessState::new(5, 1));
    handler.handle(&ctx).await;

    assert_process_untouched(&ctx);
    assert_eq!(process.volume_calls(), 0);
}

#[tokio::test]
async fn test_unknown_process_marks_error_and_is_not_cached() {
    let fixture = EngineFixture::new();
    let handler = fixture.handler();

    let ctx = fixture.new_request(1, 42);
    handler.handle(&ctx).await;
    assert_process_errored(&ctx, "Volume handler not found");
    assert!(!handler.contains(42));

    let process = Arc::new(MockProcess::new(42));
    fixture.repository.register_process(process.clone());

    let retry = fixture.new_request(2, 42);
    handler.handle(&retry).await;
    assert_volume_generated(&retry);
    assert!(handler.contains(42));
}

#[tokio::test]
async fn test_missing_configuration_marks_error() {
    let fixture = EngineFixture {
        configuration: Arc::new(InMemoryConfigurationCache::new()),
        ..EngineFixture::new()
    };
    fixture.repository.register_process(Arc::new(MockProcess::new(1)));
    let handler = fixture.handler();

    let ctx = fixture.new_request(1, 1);
    handler.handle(&ctx).await;

    assert_process_errored(&ctx, "Error building volume pipeline");
    assert_eq!(handler.pipeline_count(), 0);
}

#[tokio::test]
async fn test_state_manager_failure_is_contained() {
    let repository = Arc::new(ProcessRepository::new());
    let process = Arc::new(MockProcess::new(1));
    repository.register_process(process.clone());

    let mut states = MockStateManager::new();
    states
        .expect_process_by_id()
        .times(1)
        .returning(|process_id| Err(EngineError::ProcessNotFound { process_id }));

    let fixture = EngineFixture::new();
    let services = EngineServices {
        registry: repository,
        state_manager: Arc::new(states),
        ..fixture.services()
    };
    let handler = ProcessVolumeRequestHandler::new(services).with_config(fixture.config.clone());

    let ctx = ProcessExecutionContext::new(ProcessState::new(9, 1));
    handler.handle(&ctx).await;

    assert_process_errored(&ctx, "Process 9 not found");
    assert_eq!(process.volume_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paused_requests_wait_for_resume() {
    let process = Arc::new(MockProcess::new(1));
    let fixture = EngineFixture::new().with_process(process.clone(), 0);
    let gate = Arc::new(PauseGate::new());
    let handler = Arc::new(fixture.handler().with_pause_gate(gate.clone()));

    handler.pause();
    assert!(gate.is_paused());

    let pending = tokio::spawn({
        let handler = handler.clone();
        let ctx = fixture.new_request(1, 1);
        async move {
            handler.handle(&ctx).await;
            ctx
        }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(process.volume_calls(), 0);

    handler.resume();
    let ctx = pending.await.unwrap();
    assert_volume_generated(&ctx);
    assert!(!handler.is_paused());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reject_policy_fails_overflowing_request() {
    let process = Arc::new(MockProcess::new(1).with_delay(Duration::from_millis(50)));
    let fixture = EngineFixture::new()
        .with_process(process.clone(), 0)
        .with_config(
            EngineConfig::new()
                .with_retry_delay_ms(1)
                .with_throttle_policy(OverflowPolicy::Reject),
        );
    let handler = Arc::new(fixture.handler());

    let requests = vec![fixture.new_request(1, 1), fixture.new_request(2, 1)];
    let done = dispatch_all(&handler, requests).await;

    let rejected: Vec<_> = done.iter().filter(|ctx| ctx.is_errored()).collect();
    assert_eq!(rejected.len(), 1);
    assert_process_errored(rejected[0], "Throttled");
    assert_eq!(process.volume_calls(), 1);
}

#[tokio::test]
async fn test_evict_and_clear_release_subscriptions() {
    let fixture = EngineFixture::new()
        .with_process(Arc::new(MockProcess::new(1)), 0)
        .with_process(Arc::new(MockProcess::new(2)), 0);
    let handler = fixture.handler();

    handler.handle(&fixture.new_request(1, 1)).await;
    handler.handle(&fixture.new_request(2, 2)).await;
    assert_eq!(fixture.events.subscriber_count::<ProcessGroupRemoved>(), 2);

    assert!(handler.evict(1));
    assert!(!handler.evict(1));
    assert!(!handler.contains(1));
    assert_eq!(fixture.events.subscriber_count::<ProcessGroupRemoved>(), 1);

    handler.clear();
    assert_eq!(handler.pipeline_count(), 0);
    assert_eq!(fixture.events.subscriber_count::<ProcessGroupRemoved>(), 0);
}

#[tokio::test]
async fn test_dropping_handler_unsubscribes() {
    let fixture = EngineFixture::new().with_process(Arc::new(MockProcess::new(1)), 0);
    let handler = fixture.handler();
    handler.handle(&fixture.new_request(1, 1)).await;
    assert_eq!(fixture.events.subscriber_count::<ProcessGroupRemoved>(), 1);

    drop(handler);
    assert_eq!(fixture.events.subscriber_count::<ProcessGroupRemoved>(), 0);
}

#[tokio::test]
async fn test_handler_trait_never_fails() {
    let fixture = EngineFixture::new().with_process(Arc::new(FailingProcess::new(1)), 0);
    let handler: Arc<dyn Handler<ProcessExecutionContext>> = Arc::new(fixture.handler());

    let ctx = fixture.new_request(1, 1);
    handler.handle(&ctx).await.unwrap();
    assert_process_errored(&ctx, "Error generating volume");
}

#[tokio::test]
async fn test_volume_lands_in_custom_handler() {
    let volume = Arc::new(InMemoryVolumeHandler::new());
    let fixture = EngineFixture {
        volume: volume.clone(),
        ..EngineFixture::new()
    }
    .with_process(Arc::new(MockProcess::new(1).with_volume(["only"])), 0);
    let handler = fixture.handler();

    handler.handle(&fixture.new_request(1, 1)).await;
    assert_eq!(volume.pending(), 1);
}

#[tokio::test]
async fn test_failed_state_write_back_does_not_regenerate_volume() {
    let process = Arc::new(MockProcess::new(1).with_volume(["a", "b"]));
    let fixture = EngineFixture::new().with_process(process.clone(), 3);

    let mut states = MockStateManager::new();
    states
        .expect_process_by_id()
        .returning(|process_id| Ok(ProcessState::new(process_id, 1)));
    states
        .expect_update_process()
        .times(1)
        .returning(|_| Err(EngineError::internal("store unavailable")));

    let services = EngineServices {
        state_manager: Arc::new(states),
        ..fixture.services()
    };
    let handler = ProcessVolumeRequestHandler::new(services).with_config(fixture.config.clone());

    let ctx = ProcessExecutionContext::new(ProcessState::new(5, 1));
    handler.handle(&ctx).await;

    assert_eq!(process.volume_calls(), 1);
    assert_eq!(fixture.volume.pending(), 2);
    assert_eq!(ctx.status(), ProcessStatus::VolumeGenerated);
    assert!(ctx.error_message().is_none());
}

struct PanickingProcess;

#[async_trait::async_trait]
impl crate::process::BaseProcess for PanickingProcess {
    fn process_key(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "panicking"
    }

    async fn handle_volume(
        &self,
        _volume: &dyn crate::process::VolumeHandler,
        _ctx: &ProcessExecutionContext,
    ) -> anyhow::Result<()> {
        panic!("volume source exploded")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_process_is_contained() {
    let fixture = EngineFixture::new().with_process(Arc::new(PanickingProcess), 0);
    let handler = Arc::new(fixture.handler());

    let ctx = fixture.new_request(3, 1);
    let joined = tokio::spawn({
        let handler = handler.clone();
        async move {
            handler.handle(&ctx).await;
            ctx
        }
    })
    .await;

    let ctx = joined.expect("panic escaped the request handler");
    assert_process_errored(&ctx, "Volume generation panicked");
    assert_process_errored(&ctx, "volume source exploded");

    let next = fixture.new_request(4, 1);
    handler.handle(&next).await;
    assert_process_errored(&next, "volume source exploded");
}
