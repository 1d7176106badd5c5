use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Outcome of an operation run under [`with_deadline`] that did not succeed.
#[derive(Debug)]
pub enum DeadlineError<E> {
    /// The limit passed before the operation settled.
    Elapsed(Duration),
    /// The operation settled with its own error first.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for DeadlineError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineError::Elapsed(after) => {
                write!(f, "deadline of {}ms elapsed", after.as_millis())
            }
            DeadlineError::Failed(e) => e.fmt(f),
        }
    }
}

impl<E: StdError + 'static> StdError for DeadlineError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DeadlineError::Elapsed(_) => None,
            DeadlineError::Failed(e) => Some(e),
        }
    }
}

/// Run `operation` with an optional time limit.
///
/// Exactly one outcome is produced. If the operation and the timer are ready
/// in the same poll the operation wins. On timeout the operation future is
/// dropped along with everything it owns, such as sockets and agent slots.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pulith_http::{DeadlineError, with_deadline};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let slow = async {
///     tokio::time::sleep(Duration::from_secs(10)).await;
///     Ok::<_, std::io::Error>(())
/// };
/// let outcome = with_deadline(slow, Some(Duration::from_millis(10))).await;
/// assert!(matches!(outcome, Err(DeadlineError::Elapsed(_))));
/// # }
/// ```
pub async fn with_deadline<F, T, E>(
    operation: F,
    limit: Option<Duration>,
) -> Result<T, DeadlineError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    let Some(limit) = limit else {
        return operation.await.map_err(DeadlineError::Failed);
    };

    tokio::select! {
        biased;
        outcome = operation => outcome.map_err(DeadlineError::Failed),
        () = tokio::time::sleep(limit) => Err(DeadlineError::Elapsed(limit)),
    }
}
