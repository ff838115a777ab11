//! Failure reporting hook.

use crate::error::ApiError;

/// Receives every classified request failure, including failures that end a
/// body part way through.
pub trait ErrorReporter: Send + Sync + 'static {
    fn report(&self, uri: &str, error: &ApiError);
}

/// Default reporter: server-side failures are logged at error level,
/// client-side ones at debug.
#[derive(Debug, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, uri: &str, error: &ApiError) {
        let status = error.status_code();
        if status.is_server_error() {
            tracing::error!(uri, status = status.as_u16(), code = error.code(), error = %error, "stream failed");
        } else {
            tracing::debug!(uri, status = status.as_u16(), code = error.code(), error = %error, "stream refused");
        }
    }
}
