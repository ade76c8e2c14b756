//! Error reporting sink

use tracing::error;

use crate::errors::DispatchError;

/// Destination for unexpected errors swallowed outside strict mode
pub trait ErrorSink: Send + Sync {
    fn report_exception(&self, error: &DispatchError);
}

/// Reports errors to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report_exception(&self, err: &DispatchError) {
        error!(error = %err, domain = err.is_domain(), "Unexpected error during dispatch");
    }
}
