//! Optional-backend availability, resolved once per process.
//!
//! Each backend sits behind a cargo feature. Providers ask this module
//! before touching a backend and never probe it themselves.

use std::sync::OnceLock;

use super::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Brokerage gateway transport (feature `broker`).
    Broker,
    /// Columnar archive reader (feature `archive`).
    Archive,
}

impl Backend {
    pub fn feature(self) -> &'static str {
        match self {
            Backend::Broker => "broker",
            Backend::Archive => "archive",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub broker: bool,
    pub archive: bool,
}

impl Capabilities {
    pub fn has(&self, backend: Backend) -> bool {
        match backend {
            Backend::Broker => self.broker,
            Backend::Archive => self.archive,
        }
    }
}

static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();

pub fn capabilities() -> &'static Capabilities {
    CAPABILITIES.get_or_init(|| Capabilities {
        broker: cfg!(feature = "broker"),
        archive: cfg!(feature = "archive"),
    })
}

/// `EnvironmentUnavailable` unless `backend` was compiled in.
pub fn require(backend: Backend) -> Result<(), DataError> {
    if capabilities().has(backend) {
        Ok(())
    } else {
        Err(DataError::EnvironmentUnavailable(format!(
            "{:?} backend is not available; rebuild with feature '{}'",
            backend,
            backend.feature()
        )))
    }
}

/// Unwrap a constructor result, terminating the process on failure.
///
/// Used by the infallible `new` constructors.
pub fn fail_fast<T>(result: Result<T, DataError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_match_compiled_features() {
        let caps = capabilities();
        assert_eq!(caps.broker, cfg!(feature = "broker"));
        assert_eq!(caps.archive, cfg!(feature = "archive"));
        assert_eq!(require(Backend::Archive).is_ok(), caps.archive);
    }

    #[test]
    fn fail_fast_passes_success_through() {
        assert_eq!(fail_fast(Ok::<_, DataError>(7)), 7);
    }
}
