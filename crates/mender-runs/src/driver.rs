//! Run driver - starts runs and folds their deltas into the registry

use crate::aggregator::RunAggregator;
use crate::registry::{RunHandle, RunRegistry};
use crate::report::RunReport;
use crate::storage::ReportStore;
use futures::stream::{Stream, StreamExt};
use futures::FutureExt;
use mender_core::fail_open::fail_open;
use mender_core::{MenderError, Result, RunId, RunRequest, RunState, StateDelta};
use mender_orchestrator::FixLoop;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{error, info};

/// Owns everything needed to execute runs
#[derive(Clone)]
pub struct RunDriver {
    fix_loop: FixLoop,
    registry: RunRegistry,
    store: Option<ReportStore>,
    timeout: Option<Duration>,
}

impl RunDriver {
    pub fn new(fix_loop: FixLoop, registry: RunRegistry) -> Self {
        Self {
            fix_loop,
            registry,
            store: None,
            timeout: None,
        }
    }

    /// Persist every finished report
    pub fn with_store(mut self, store: ReportStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Abort runs that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Register a run and execute it in the background.
    ///
    /// Returns as soon as the initial report is readable from the registry.
    pub async fn start(&self, request: RunRequest, max_retries: u32) -> Result<RunId> {
        let (handle, state, report) = self.register(&request, max_retries).await?;
        let run_id = handle.run_id().clone();

        let driver = self.clone();
        tokio::spawn(async move {
            driver.drive(handle, state, report).await;
        });

        Ok(run_id)
    }

    /// Register a run and execute it on the current task
    pub async fn run(&self, request: RunRequest, max_retries: u32) -> Result<(RunId, RunReport)> {
        let (handle, state, report) = self.register(&request, max_retries).await?;
        let run_id = handle.run_id().clone();
        let report = self.drive(handle, state, report).await;
        Ok((run_id, report))
    }

    async fn register(
        &self,
        request: &RunRequest,
        max_retries: u32,
    ) -> Result<(RunHandle, RunState, RunReport)> {
        request.validate()?;

        let run_id = RunId::generate();
        let report = RunReport::new(request);
        let handle = self.registry.create(run_id.clone(), report.clone()).await;
        info!(
            "Run {} registered for {} (max retries {})",
            run_id, request.repository_url, max_retries
        );

        Ok((handle, RunState::new(request, max_retries), report))
    }

    /// Execute one run to a finished report. Never fails: faults, including
    /// a panicking collaborator, end up in the report.
    async fn drive(&self, handle: RunHandle, state: RunState, initial: RunReport) -> RunReport {
        let mut aggregator = RunAggregator::new(initial, state.max_retries);
        let deltas = self.fix_loop.stream(state);

        let folded = AssertUnwindSafe(fold(deltas, &mut aggregator, &handle))
            .catch_unwind()
            .map(|caught| {
                caught.unwrap_or_else(|payload| {
                    Err(MenderError::Other(format!(
                        "Run panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                })
            });
        let fault = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, folded).await {
                Ok(result) => result.err(),
                Err(_) => Some(MenderError::Deadline(limit.as_secs())),
            },
            None => folded.await.err(),
        };

        if let Some(e) = &fault {
            error!("Run {} faulted: {}", handle.run_id(), e);
        }

        let report = aggregator.finish(fault.as_ref());
        handle.publish(&report).await;
        info!(
            "Run {} finished: {} (score {})",
            handle.run_id(),
            report.final_status(),
            report.score_breakdown.final_total_score
        );

        if let Some(store) = &self.store {
            fail_open("report_store", || store.save(handle.run_id(), &report)).await;
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Fold each delta and publish the snapshot before pulling the next one
async fn fold(
    deltas: impl Stream<Item = Result<StateDelta>>,
    aggregator: &mut RunAggregator,
    handle: &RunHandle,
) -> Result<()> {
    futures::pin_mut!(deltas);

    while let Some(delta) = deltas.next().await {
        let report = aggregator.apply(&delta?);
        handle.publish(report).await;
    }

    Ok(())
}
