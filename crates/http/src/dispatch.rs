//! Execution context for resource operations
//!
//! Resource handles (bucket/collection) carry a tagged execution mode
//! instead of referencing a patched client: `Live` sends immediately
//! through the transport, `Recording` appends the built request to the
//! active batch queue. Selected once when entering `batch()` and passed
//! to nested resource objects by value.

use std::sync::{Arc, Mutex, PoisonError};

use carton_domain::{Result, WireRequest, WireResponse};

use crate::transport::Transport;

/// Synthetic status acknowledging a locally queued sub-request.
pub(crate) const QUEUED_STATUS: u16 = 202;

#[derive(Clone)]
pub(crate) enum Dispatch {
    /// Send immediately through the transport with a default retry budget.
    Live { transport: Arc<Transport>, retry: u32 },
    /// Append to the active batch queue; nothing is sent until flush.
    Recording { queue: Arc<Mutex<Vec<WireRequest>>> },
}

impl Dispatch {
    /// Execute or record one request.
    ///
    /// In recording mode the response is a synthetic local acknowledgment;
    /// real sub-responses only exist once the batch is flushed.
    pub(crate) async fn execute(
        &self,
        request: WireRequest,
        retry_override: Option<u32>,
    ) -> Result<WireResponse> {
        match self {
            Self::Live { transport, retry } => {
                transport.send(&request, retry_override.unwrap_or(*retry)).await
            }
            Self::Recording { queue } => {
                queue.lock().unwrap_or_else(PoisonError::into_inner).push(request);
                Ok(WireResponse { status: QUEUED_STATUS, headers: Vec::new(), body: None })
            }
        }
    }

    pub(crate) fn live_transport(&self) -> Option<&Arc<Transport>> {
        match self {
            Self::Live { transport, .. } => Some(transport),
            Self::Recording { .. } => None,
        }
    }

    pub(crate) fn default_retry(&self) -> u32 {
        match self {
            Self::Live { retry, .. } => *retry,
            Self::Recording { .. } => 0,
        }
    }
}
