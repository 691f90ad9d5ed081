// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{error::Error as StdError, fmt};

use snafu::Snafu;

type BoxedSource = Box<dyn StdError + Send + Sync>;

/// Result type for job iterations and the worker loop.
pub type WorkResult<T = ()> = std::result::Result<T, WorkError>;

/// How the worker loop reacts to a failed job iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorSeverity {
    /// Counted as a failure; the worker sleeps and retries next interval.
    #[display("transient")]
    Transient,

    /// The worker leaves its loop without waiting for a finish request.
    #[display("fatal")]
    Fatal,
}

/// Error returned by a [`Job`](crate::Job) iteration.
///
/// # Example
///
/// ```rust
/// use sleepy_common_worker::{WorkError, WorkResult, WorkResultExt};
///
/// fn sync_once(online: bool, target: &str) -> WorkResult {
///     if target.is_empty() {
///         return Err(WorkError::fatal("missing target directory"));
///     }
///     if !online {
///         return Err(WorkError::transient("remote unavailable"));
///     }
///     std::fs::metadata(target).fatal("target not readable")?;
///     Ok(())
/// }
///
/// assert!(sync_once(false, "/tmp").unwrap_err().is_transient());
/// assert!(sync_once(true, "").unwrap_err().is_fatal());
/// ```
#[derive(Debug)]
pub struct WorkError {
    severity: ErrorSeverity,
    message:  String,
    source:   Option<BoxedSource>,
}

impl WorkError {
    fn new(severity: ErrorSeverity, message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self {
            severity,
            message: message.into(),
            source,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorSeverity::Transient, message, None)
    }

    pub fn fatal(message: impl Into<String>) -> Self { Self::new(ErrorSeverity::Fatal, message, None) }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub const fn severity(&self) -> ErrorSeverity { self.severity }

    pub fn is_fatal(&self) -> bool { self.severity == ErrorSeverity::Fatal }

    pub fn is_transient(&self) -> bool { self.severity == ErrorSeverity::Transient }

    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for WorkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Classifies foreign errors inside a job, in the style of
/// `snafu::ResultExt::context`.
pub trait WorkResultExt<T> {
    /// Turns an error into a transient [`WorkError`] with `message`.
    fn transient(self, message: impl Into<String>) -> WorkResult<T>;

    /// Turns an error into a fatal [`WorkError`] with `message`.
    fn fatal(self, message: impl Into<String>) -> WorkResult<T>;
}

impl<T, E> WorkResultExt<T> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn transient(self, message: impl Into<String>) -> WorkResult<T> {
        self.map_err(|e| WorkError::transient(message).with_source(e))
    }

    fn fatal(self, message: impl Into<String>) -> WorkResult<T> {
        self.map_err(|e| WorkError::fatal(message).with_source(e))
    }
}

/// Errors raised while starting the worker thread.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SpawnError {
    /// The operating system refused to create the thread.
    #[snafu(display("Failed to spawn worker thread {name}"))]
    SpawnThread {
        name:   String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_display_includes_severity() {
        assert_eq!(WorkError::transient("busy").to_string(), "[transient] busy");
        assert_eq!(WorkError::fatal("broken").to_string(), "[fatal] broken");
    }

    #[test]
    fn test_source_is_preserved() {
        let io = std::io::Error::other("disk gone");
        let err = WorkError::fatal("write failed").with_source(io);
        assert!(err.is_fatal());
        assert_eq!(err.message(), "write failed");
        assert_eq!(err.to_string(), "[fatal] write failed: disk gone");
        assert_eq!(err.source().unwrap().to_string(), "disk gone");
        assert!(WorkError::transient("x").source().is_none());
    }

    #[test]
    fn test_result_ext_classifies() {
        let failed: Result<(), std::io::Error> = Err(std::io::Error::other("timeout"));
        let err = failed.transient("fetch").unwrap_err();
        assert_eq!(err.severity(), ErrorSeverity::Transient);
        assert!(err.source().is_some());

        let ok: Result<u8, std::io::Error> = Ok(3);
        assert_eq!(ok.fatal("never").unwrap(), 3);
    }
}
