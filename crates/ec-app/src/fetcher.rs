//! Per-column execution of remote analyses.
//!
//! Every run gets its own worker thread; outcomes come back over a channel
//! tagged with the [`RunToken`] captured at start, so the owner can drop
//! results whose column has since been cleared, removed or re-run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread;
use std::time::Duration;

use ec_core::{InputValues, RunToken};
use serde::Serialize;
use serde_json::Value;

use crate::fingerprint::input_fingerprint;
use crate::state::{Action, RunTicket};

/// Body sent to the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub input_values: InputValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_module_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Analysis service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed analysis response: {0}")]
    Malformed(String),

    #[error("Analysis worker stopped unexpectedly")]
    WorkerPanicked,
}

/// The remote analysis collaborator. Timeouts and transport are its
/// concern; the fetcher only needs a result or an error.
pub trait AnalysisService: Send + Sync {
    fn execute(&self, endpoint_path: &str, request: &AnalysisRequest)
    -> Result<Value, AnalysisError>;
}

impl<F> AnalysisService for F
where
    F: Fn(&str, &AnalysisRequest) -> Result<Value, AnalysisError> + Send + Sync,
{
    fn execute(
        &self,
        endpoint_path: &str,
        request: &AnalysisRequest,
    ) -> Result<Value, AnalysisError> {
        self(endpoint_path, request)
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub token: RunToken,
    pub fingerprint: String,
    pub module_version: u32,
    pub sub_module_type: Option<String>,
    pub result: Result<Value, AnalysisError>,
}

impl FetchOutcome {
    /// The action that commits this outcome.
    pub fn into_action(self) -> Action {
        match self.result {
            Ok(result) => Action::RunSucceeded {
                token: self.token,
                result,
                fingerprint: self.fingerprint,
                module_version: self.module_version,
                sub_module_type: self.sub_module_type,
            },
            Err(err) => Action::RunFailed {
                token: self.token,
                message: err.to_string(),
            },
        }
    }
}

pub struct CaseResultFetcher {
    service: Arc<dyn AnalysisService>,
    tx: Sender<FetchOutcome>,
    rx: Receiver<FetchOutcome>,
    in_flight: usize,
}

impl CaseResultFetcher {
    pub fn new(service: Arc<dyn AnalysisService>) -> Self {
        let (tx, rx) = channel();
        Self {
            service,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Runs started and not yet received.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Start the analysis for a ticket on a worker thread.
    pub fn spawn(&mut self, endpoint_path: &str, ticket: &RunTicket) {
        let request = AnalysisRequest {
            input_values: ticket.input_values.clone(),
            sub_module_type: ticket.sub_module_type.clone(),
        };
        let fingerprint = input_fingerprint(
            &ticket.input_values,
            ticket.module_version,
            ticket.sub_module_type.as_deref(),
        );
        let token = ticket.token;
        let module_version = ticket.module_version;
        let sub_module_type = ticket.sub_module_type.clone();
        let endpoint_path = endpoint_path.to_string();
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();

        tracing::debug!(session = %token.session, generation = token.generation, endpoint = %endpoint_path, "starting analysis");

        thread::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| {
                service.execute(&endpoint_path, &request)
            }))
            .unwrap_or(Err(AnalysisError::WorkerPanicked));

            // receiver gone means the screen was torn down
            let _ = tx.send(FetchOutcome {
                token,
                fingerprint,
                module_version,
                sub_module_type,
                result,
            });
        });
        self.in_flight += 1;
    }

    pub fn try_recv(&mut self) -> Option<FetchOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(outcome)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<FetchOutcome> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
