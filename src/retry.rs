use crate::error::{Error, Result};

/// Run `attempt` up to `max_attempts` times, retrying only on retryable errors.
///
/// The closure receives the zero-based attempt index. Fatal errors are returned
/// immediately; if every attempt fails with a retryable error, the last one is returned.
pub fn with_retries<T>(max_attempts: usize, mut attempt: impl FnMut(usize) -> Result<T>) -> Result<T> {
    assert!(max_attempts > 0, "max_attempts must be at least 1");

    let mut last = None;
    for i in 0..max_attempts {
        match attempt(i) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                tracing::trace!(attempt = i, error = %err, "retrying");
                last = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last.unwrap_or_else(|| Error::InvariantViolation("retry loop ended without an outcome".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cut_failure() -> Error { Error::NoBalancedCutFound { a: 0, b: 1, attempts: 1 } }

    #[test]
    fn returns_first_success() {
        let mut calls = 0;
        let value = with_retries(5, |i| {
            calls += 1;
            if i < 2 { Err(cut_failure()) } else { Ok(i) }
        }).unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_bound() {
        let mut calls = 0;
        let result: Result<()> = with_retries(4, |_| { calls += 1; Err(cut_failure()) });

        assert!(matches!(result, Err(Error::NoBalancedCutFound { .. })));
        assert_eq!(calls, 4);
    }

    #[test]
    fn fatal_errors_stop_immediately() {
        let mut calls = 0;
        let result: Result<()> = with_retries(10, |_| {
            calls += 1;
            Err(Error::InvalidConfig("bad".into()))
        });

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    #[should_panic(expected = "max_attempts must be at least 1")]
    fn zero_attempts_panics() {
        let _ = with_retries(0, |_| Ok(()));
    }
}
