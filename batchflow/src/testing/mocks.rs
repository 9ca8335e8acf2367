//! Mock processes and stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::errors::{EngineError, EngineResult};
use crate::pipeline::Handler;
use crate::process::{BaseProcess, ProcessExecutionContext, SupportingData, VolumeHandler};

#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// A stage that records calls and can fail or stall on demand.
#[derive(Debug)]
pub struct RecordingHandler<M> {
    calls: AtomicUsize,
    fail_first: usize,
    delay: Option<Duration>,
    in_flight: InFlight,
    spans: Mutex<Vec<(Instant, Instant)>>,
    _message: PhantomData<fn(&M)>,
}

impl<M> Default for RecordingHandler<M> {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            delay: None,
            in_flight: InFlight::default(),
            spans: Mutex::new(Vec::new()),
            _message: PhantomData,
        }
    }
}

impl<M> RecordingHandler<M> {
    /// Creates a handler that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handler whose first `count` calls fail.
    #[must_use]
    pub fn failing(count: usize) -> Self {
        Self {
            fail_first: count,
            ..Self::default()
        }
    }

    /// Makes every call take at least `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the entry and exit instant of every completed call.
    #[must_use]
    pub fn spans(&self) -> Vec<(Instant, Instant)> {
        self.spans.lock().clone()
    }

    /// Returns the highest number of overlapping calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.max()
    }
}

#[async_trait]
impl<M> Handler<M> for RecordingHandler<M>
where
    M: Send + Sync + 'static,
{
    async fn handle(&self, _message: &M) -> EngineResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let entered = Instant::now();
        self.in_flight.enter();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.exit();
        self.spans.lock().push((entered, Instant::now()));

        if call < self.fail_first {
            return Err(EngineError::Process(anyhow::anyhow!("recorded failure {}", call + 1)));
        }
        Ok(())
    }
}

/// A business process that records its calls.
#[derive(Debug, Default)]
pub struct MockProcess {
    key: i32,
    volume: Vec<String>,
    delay: Option<Duration>,
    supporting_data: bool,
    supporting_failures: usize,
    volume_calls: AtomicUsize,
    supporting_calls: AtomicUsize,
    in_flight: InFlight,
}

impl MockProcess {
    /// Creates a process producing no volume.
    #[must_use]
    pub fn new(key: i32) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    /// Sets the items persisted on each volume call.
    #[must_use]
    pub fn with_volume<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.volume = items.into_iter().map(Into::into).collect();
        self
    }

    /// Makes each volume call take at least `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Enables supporting data whose first `failures` loads fail.
    #[must_use]
    pub fn with_supporting_data(mut self, failures: usize) -> Self {
        self.supporting_data = true;
        self.supporting_failures = failures;
        self
    }

    /// Returns the number of volume calls.
    #[must_use]
    pub fn volume_calls(&self) -> usize {
        self.volume_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of supporting-data loads.
    #[must_use]
    pub fn supporting_data_calls(&self) -> usize {
        self.supporting_calls.load(Ordering::SeqCst)
    }

    /// Returns the highest number of overlapping volume calls.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.max()
    }
}

#[async_trait]
impl BaseProcess for MockProcess {
    fn process_key(&self) -> i32 {
        self.key
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn handle_volume(
        &self,
        volume: &dyn VolumeHandler,
        ctx: &ProcessExecutionContext,
    ) -> anyhow::Result<()> {
        self.volume_calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.exit();

        volume.persist(ctx, self.volume.clone()).await?;
        Ok(())
    }

    fn as_supporting_data(&self) -> Option<&dyn SupportingData> {
        self.supporting_data.then_some(self as &dyn SupportingData)
    }
}

#[async_trait]
impl SupportingData for MockProcess {
    async fn initialize_supporting_data(&self, _ctx: &ProcessExecutionContext) -> anyhow::Result<()> {
        let call = self.supporting_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.supporting_failures {
            anyhow::bail!("supporting data unavailable");
        }
        Ok(())
    }
}

/// A business process whose volume generation always fails.
#[derive(Debug)]
pub struct FailingProcess {
    key: i32,
    error: String,
    calls: AtomicUsize,
}

impl FailingProcess {
    /// Creates a failing process.
    #[must_use]
    pub fn new(key: i32) -> Self {
        Self::with_error(key, "volume source unavailable")
    }

    /// Creates a failing process with a custom error.
    #[must_use]
    pub fn with_error(key: i32, error: impl Into<String>) -> Self {
        Self {
            key,
            error: error.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of volume calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseProcess for FailingProcess {
    fn process_key(&self) -> i32 {
        self.key
    }

    fn name(&self) -> &str {
        "failing"
    }

    async fn handle_volume(
        &self,
        _volume: &dyn VolumeHandler,
        _ctx: &ProcessExecutionContext,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("{}", self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{InMemoryVolumeHandler, ProcessState};

    #[tokio::test]
    async fn test_recording_handler_fails_first_calls() {
        let handler = RecordingHandler::<u32>::failing(2);

        assert!(handler.handle(&1).await.is_err());
        assert!(handler.handle(&1).await.is_err());
        assert!(handler.handle(&1).await.is_ok());
        assert_eq!(handler.call_count(), 3);
        assert_eq!(handler.spans().len(), 3);
        assert_eq!(handler.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_recording_handler_delay() {
        let handler = RecordingHandler::<u32>::new().with_delay(Duration::from_millis(10));
        handler.handle(&1).await.unwrap();

        let (entered, exited) = handler.spans()[0];
        assert!(exited.duration_since(entered) >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_mock_process_persists_volume() {
        let process = MockProcess::new(4).with_volume(["x", "y"]);
        let volume = InMemoryVolumeHandler::new();
        let ctx = ProcessExecutionContext::new(ProcessState::new(1, 4));

        process.handle_volume(&volume, &ctx).await.unwrap();
        assert_eq!(process.volume_calls(), 1);
        assert_eq!(volume.pending(), 2);
        assert!(process.as_supporting_data().is_none());
    }

    #[tokio::test]
    async fn test_mock_process_supporting_data_failures() {
        let process = MockProcess::new(4).with_supporting_data(1);
        let ctx = ProcessExecutionContext::new(ProcessState::new(1, 4));
        let supporting = process.as_supporting_data().unwrap();

        assert!(supporting.initialize_supporting_data(&ctx).await.is_err());
        assert!(supporting.initialize_supporting_data(&ctx).await.is_ok());
        assert_eq!(process.supporting_data_calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_process() {
        let process = FailingProcess::with_error(2, "boom");
        let ctx = ProcessExecutionContext::new(ProcessState::new(1, 2));

        let err = process
            .handle_volume(&InMemoryVolumeHandler::new(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(process.calls(), 1);
    }
}
