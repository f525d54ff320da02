// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Background task that runs a function at a fixed period.
//!
//! A `CycleWorker` is controlled through operations that never fail but report what they did
//! with one of the builtin worker outcomes, which makes them easy to expose via REST.

use crate::result::{builtin, Outcome};
use futures::future::BoxFuture;
use futures::Future;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Type of the function run by a worker.
type Task = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Lifecycle states of a worker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorkerState {
    /// The worker has never been started.
    None,

    /// The worker is running its task periodically.
    Working,

    /// The worker was started and then stopped.
    Stopped,
}

/// Operations that can be requested from a worker, for dispatch via `CycleWorker::handle`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorkerRequest {
    /// Start the worker.
    Start,

    /// Stop the worker.
    Stop,

    /// Run the task once right now.
    Invoke,

    /// Change the period of the worker and (re)start it.
    UpdatePeriod(Duration),

    /// Query the state of the worker.
    Status,
}

/// A named task that runs at a fixed period on the tokio runtime.
pub struct CycleWorker {
    /// Name of the worker, for logging purposes.
    name: String,

    /// Time between consecutive runs of the task.
    period: Duration,

    /// The function to run.
    task: Task,

    /// Current state of the worker.
    state: WorkerState,

    /// Handle to the background loop while the worker is running.
    handle: Option<JoinHandle<()>>,
}

impl CycleWorker {
    /// Creates a new worker called `name` that runs `task` every `period` once started.
    ///
    /// Panics if `period` is zero.
    pub fn new<N, F, Fut>(name: N, period: Duration, task: F) -> Self
    where
        N: Into<String>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        assert!(!period.is_zero(), "Worker period must be positive");
        let task: Task = Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(task()) });
        Self { name: name.into(), period, task, state: WorkerState::None, handle: None }
    }

    /// Returns the name of the worker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current period of the worker.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns the current state of the worker.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Dispatches `request` to the matching operation.
    pub fn handle(&mut self, request: WorkerRequest) -> Outcome {
        match request {
            WorkerRequest::Start => self.start(),
            WorkerRequest::Stop => self.stop(),
            WorkerRequest::Invoke => self.invoke(),
            WorkerRequest::UpdatePeriod(period) => self.update_period(period),
            WorkerRequest::Status => self.status(),
        }
    }

    /// Starts running the task periodically, beginning immediately.
    pub fn start(&mut self) -> Outcome {
        match self.state {
            WorkerState::None => {
                self.start_worker();
                builtin::WORKER_STARTED
            }
            WorkerState::Working => builtin::WORKER_ALREADY_STARTED,
            WorkerState::Stopped => {
                self.start_worker();
                builtin::WORKER_RESTARTED
            }
        }
    }

    /// Stops running the task.  A run in progress is cancelled.
    pub fn stop(&mut self) -> Outcome {
        match self.state {
            WorkerState::None => builtin::WORKER_NOT_STARTED,
            WorkerState::Working => {
                self.stop_worker();
                builtin::WORKER_STOPPED
            }
            WorkerState::Stopped => builtin::WORKER_ALREADY_STOPPED,
        }
    }

    /// Runs the task once, right now, in addition to the periodic runs.
    pub fn invoke(&mut self) -> Outcome {
        match self.state {
            WorkerState::None => builtin::WORKER_NOT_STARTED,
            WorkerState::Working => {
                debug!("Invoking worker {} on demand", self.name);
                let task = self.task.clone();
                tokio::spawn(async move { task().await });
                builtin::WORKER_INVOKED
            }
            WorkerState::Stopped => builtin::WORKER_CANNOT_INVOKE,
        }
    }

    /// Changes the period of the worker to `period` and (re)starts it.
    pub fn update_period(&mut self, period: Duration) -> Outcome {
        if period.is_zero() {
            return Outcome::from_message(format!("Invalid period for worker {}", self.name));
        }

        match self.state {
            WorkerState::None => {
                self.period = period;
                self.start_worker();
                builtin::WORKER_STARTED_PERIOD
            }
            WorkerState::Working => {
                self.stop_worker();
                self.period = period;
                self.start_worker();
                builtin::WORKER_RESTARTED_PERIOD
            }
            WorkerState::Stopped => {
                self.period = period;
                self.start_worker();
                builtin::WORKER_RESTARTED_PERIOD
            }
        }
    }

    /// Reports the state of the worker as an outcome.
    pub fn status(&self) -> Outcome {
        match self.state {
            WorkerState::None => builtin::WORKER_STATUS_NONE,
            WorkerState::Working => builtin::WORKER_STATUS_WORKING,
            WorkerState::Stopped => builtin::WORKER_STATUS_STOPPED,
        }
    }

    /// Spawns the periodic loop.
    fn start_worker(&mut self) {
        info!("Starting worker {} with period {:?}", self.name, self.period);
        let task = self.task.clone();
        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                task().await;
            }
        }));
        self.state = WorkerState::Working;
    }

    /// Cancels the periodic loop.
    fn stop_worker(&mut self) {
        info!("Stopping worker {}", self.name);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.state = WorkerState::Stopped;
    }
}

impl Drop for CycleWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Creates a worker with a period of 100ms that counts its runs.
    fn counting_worker() -> (CycleWorker, Arc<AtomicUsize>) {
        let runs = Arc::from(AtomicUsize::new(0));
        let worker = {
            let runs = runs.clone();
            CycleWorker::new("counter", Duration::from_millis(100), move || {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        (worker, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle() {
        let (mut worker, runs) = counting_worker();
        assert_eq!("counter", worker.name());
        assert_eq!(builtin::WORKER_STATUS_NONE, worker.status());
        assert_eq!(builtin::WORKER_NOT_STARTED, worker.stop());
        assert_eq!(builtin::WORKER_NOT_STARTED, worker.invoke());

        assert_eq!(builtin::WORKER_STARTED, worker.start());
        assert_eq!(WorkerState::Working, worker.state());
        assert_eq!(builtin::WORKER_ALREADY_STARTED, worker.start());
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(3, runs.load(Ordering::SeqCst));

        assert_eq!(builtin::WORKER_STOPPED, worker.stop());
        assert_eq!(builtin::WORKER_STATUS_STOPPED, worker.status());
        assert_eq!(builtin::WORKER_ALREADY_STOPPED, worker.stop());
        assert_eq!(builtin::WORKER_CANNOT_INVOKE, worker.invoke());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(3, runs.load(Ordering::SeqCst));

        assert_eq!(builtin::WORKER_RESTARTED, worker.start());
        assert_eq!(builtin::WORKER_STATUS_WORKING, worker.status());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke() {
        let (mut worker, runs) = counting_worker();
        assert_eq!(builtin::WORKER_STARTED, worker.start());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(1, runs.load(Ordering::SeqCst));

        assert_eq!(builtin::WORKER_INVOKED, worker.invoke());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(2, runs.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_period() {
        let (mut worker, runs) = counting_worker();
        assert_eq!(
            builtin::WORKER_STARTED_PERIOD,
            worker.handle(WorkerRequest::UpdatePeriod(Duration::from_secs(1)))
        );
        assert_eq!(Duration::from_secs(1), worker.period());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(2, runs.load(Ordering::SeqCst));

        assert_eq!(
            builtin::WORKER_RESTARTED_PERIOD,
            worker.handle(WorkerRequest::UpdatePeriod(Duration::from_secs(2)))
        );
        assert_eq!(builtin::WORKER_STOPPED, worker.handle(WorkerRequest::Stop));
        assert_eq!(
            builtin::WORKER_RESTARTED_PERIOD,
            worker.handle(WorkerRequest::UpdatePeriod(Duration::from_secs(3)))
        );
        assert_eq!(builtin::WORKER_STATUS_WORKING, worker.handle(WorkerRequest::Status));
    }

    #[tokio::test]
    async fn test_update_period_zero() {
        let (mut worker, _runs) = counting_worker();
        let outcome = worker.update_period(Duration::ZERO);
        assert!(outcome.exception().is_some());
        assert_eq!(WorkerState::None, worker.state());
    }

    #[test]
    #[should_panic(expected = "period must be positive")]
    fn test_new_zero_period() {
        CycleWorker::new("bad", Duration::ZERO, || async {});
    }
}
