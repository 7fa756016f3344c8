use thiserror::Error;
use tracing::warn;

/// Failure of a single network, parse or generation attempt.
///
/// None of these escape the pipeline: callers turn them into neutral
/// defaults through [`soft_fail`].
#[derive(Debug, Error)]
pub enum NewsError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("summary generator failed: {0}")]
    Generator(String),

    #[error("task timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type NewsResult<T> = std::result::Result<T, NewsError>;

/// Log a failed attempt and substitute `fallback`.
pub fn soft_fail<T>(result: NewsResult<T>, fallback: T, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "{} failed, using fallback", what);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_fail_substitutes_fallback() {
        let failed: NewsResult<Vec<u8>> = Err(NewsError::Parse("bad xml".into()));
        assert!(soft_fail(failed, Vec::new(), "parse").is_empty());

        let ok: NewsResult<u8> = Ok(7);
        assert_eq!(soft_fail(ok, 0, "noop"), 7);
    }
}
