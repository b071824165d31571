//! Request ingress: hands generation requests to a background processor.
//!
//! [`Ingress::submit`] never blocks on generation. Accepted requests travel
//! over a channel to the processor started by [`Ingress::start`], which runs
//! each one as its own tokio task; distinct requests therefore run in
//! parallel and share nothing but the [`GenerationService`].
//!
//! A missing payload, or one without a source location, is logged and
//! dropped. That is a no-op for the caller, not an error.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{error, info, warn};
use waver_core::process::GenerationService;

/// One incoming generation request, e.g. `{"sourceUrl": "https://host/user/repo.git"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(rename = "sourceUrl", alias = "sourceLocation", default)]
    pub source_url: Option<String>,
}

impl GenerationRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: Some(source_url.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ingress {
    requests: mpsc::UnboundedSender<String>,
}

impl Ingress {
    /// Start the background processor. The returned handle completes once
    /// every `Ingress` clone is dropped and all accepted requests finished.
    pub fn start(service: GenerationService) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(process_requests(service, rx));
        (Self { requests: tx }, worker)
    }

    /// Forward `request` to the processor. Returns whether it was accepted.
    pub fn submit(&self, request: Option<GenerationRequest>) -> bool {
        let Some(request) = request else {
            warn!("Received an empty request payload, ignoring");
            return false;
        };
        let source = match request.source_url {
            Some(source) if !source.trim().is_empty() => source.trim().to_string(),
            _ => {
                warn!("Received a request without 'sourceUrl', ignoring");
                return false;
            }
        };

        info!(source = %source, "Accepted generation request");
        if self.requests.send(source).is_err() {
            error!("Request processor has stopped, dropping request");
            return false;
        }
        true
    }
}

async fn process_requests(service: GenerationService, mut rx: mpsc::UnboundedReceiver<String>) {
    let mut jobs = JoinSet::new();
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(source) => {
                    let service = service.clone();
                    jobs.spawn(async move { handle_request(&service, &source).await });
                }
                None => break,
            },
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => log_join(joined),
        }
    }
    while let Some(joined) = jobs.join_next().await {
        log_join(joined);
    }
    info!("Request processor stopped");
}

async fn handle_request(service: &GenerationService, source: &str) {
    match service.generate(source).await {
        Ok(report) => info!(
            source,
            successful = report.success_count(),
            failed = report.failure_count(),
            "Request completed"
        ),
        Err(e) => error!(source, error = ?e, "Request failed"),
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Request worker did not complete");
    }
}
