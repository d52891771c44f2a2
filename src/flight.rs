//! Collapses concurrent executions for the same key into a single one.
//!
//! When many tasks miss the cache for the same key at the same time, each of them would fetch
//! the value from the source on its own - a classic request storm. A [Flight] prevents this:
//! the first caller for a key becomes the leader and actually runs the fetch, all callers
//! arriving while it is in flight simply await its outcome. Once the leader finishes, every
//! waiter observes the very same result (or error) and the in-flight record is discarded, so
//! a later call for the same key starts a fresh execution.
//!
//! Note that a [Flight] never caches results. It only bridges the window in which a fetch is
//! running, everything else is the job of the actual cache.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

/// Contains the outcome of a collapsed execution.
///
/// As `anyhow::Error` cannot be cloned, the error of the single execution is shared behind an
/// `Arc` so that every collapsed caller can observe the same failure.
pub type SharedResult<T> = Result<T, Arc<anyhow::Error>>;

/// Distinguishes the first caller for a key from all callers joining an in-flight execution.
enum Role<T> {
    Leader(watch::Sender<Option<SharedResult<T>>>),
    Joiner(watch::Receiver<Option<SharedResult<T>>>),
}

/// Clears the call record of a leader once it is dropped.
///
/// The leader might never reach its own cleanup code: a caller can abandon the whole lookup,
/// e.g. via `tokio::time::timeout`, which drops the leading future mid-flight. Tying the
/// cleanup to `Drop` guarantees that the record vanishes on every exit path, so the key stays
/// fetchable for later callers.
struct CallRecord<'a, T> {
    calls: &'a Mutex<HashMap<String, watch::Receiver<Option<SharedResult<T>>>>>,
    key: &'a str,
}

impl<T> Drop for CallRecord<'_, T> {
    fn drop(&mut self) {
        let _ = self.calls.lock().unwrap().remove(self.key);
    }
}

/// Ensures that for each key at most one execution is in flight at a time.
///
/// # Examples
/// ```
/// # use peercache::flight::Flight;
/// #[tokio::main]
/// async fn main() {
///     let flight = Flight::new();
///
///     let value = flight
///         .execute("answer", async { Ok::<_, anyhow::Error>(42) })
///         .await
///         .unwrap();
///     assert_eq!(value, 42);
/// }
/// ```
pub struct Flight<T> {
    calls: Mutex<HashMap<String, watch::Receiver<Option<SharedResult<T>>>>>,
}

impl<T: Clone> Flight<T> {
    /// Creates a new flight with an empty call table.
    pub fn new() -> Self {
        Flight {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Executes the given task unless an execution for the same key is already in flight.
    ///
    /// The first caller for a key runs **task** to completion and publishes the outcome. All
    /// callers which arrive while that execution is running do not execute their own task at
    /// all - they block until the leading execution finishes and receive a clone of its result
    /// (or its error). The in-flight record is removed before the outcome is published,
    /// therefore a subsequent call for the same key is free to retry and may succeed even if
    /// the previous execution failed.
    ///
    /// The record is also removed if the leading future is dropped before completing (e.g.
    /// because the caller abandoned the lookup via a timeout). The callers which joined that
    /// execution receive an error, later callers start a fresh execution.
    pub async fn execute<F>(&self, key: &str, task: F) -> SharedResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let role = {
            let mut calls = self.calls.lock().unwrap();
            match calls.get(key) {
                Some(receiver) => Role::Joiner(receiver.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    let _ = calls.insert(key.to_owned(), receiver);
                    Role::Leader(sender)
                }
            }
        };

        match role {
            Role::Leader(sender) => {
                let record = CallRecord {
                    calls: &self.calls,
                    key,
                };

                let outcome = task.await.map_err(Arc::new);

                // Clear the call record first so that a caller arriving after the publication
                // below always starts a fresh execution...
                drop(record);
                let _ = sender.send(Some(outcome.clone()));

                outcome
            }
            Role::Joiner(mut receiver) => match receiver.wait_for(|slot| slot.is_some()).await {
                Ok(slot) => slot.as_ref().cloned().unwrap_or_else(|| {
                    Err(Arc::new(anyhow::anyhow!(
                        "The collapsed execution vanished without publishing a result."
                    )))
                }),
                Err(_) => Err(Arc::new(anyhow::anyhow!(
                    "The leading execution was aborted before publishing a result."
                ))),
            },
        }
    }

    /// Returns the number of executions currently in flight.
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Determines if no execution is currently in flight.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().unwrap().is_empty()
    }
}

impl<T: Clone> Default for Flight<T> {
    fn default() -> Self {
        Flight::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Flight;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    /// Simulates a slow fetch: the sleep suspends the leader long enough for the
    /// other callers to join the in-flight record.
    async fn slow_fetch(counter: &AtomicUsize) -> anyhow::Result<String> {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok("result".to_owned())
    }

    async fn failing_fetch(counter: &AtomicUsize) -> anyhow::Result<String> {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(anyhow::anyhow!("the source is on fire"))
    }

    /// Simulates a fetch which takes longer than any caller is willing to wait.
    async fn stalled_fetch() -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("too late".to_owned())
    }

    #[test]
    fn concurrent_executions_are_collapsed() {
        crate::testing::test_async(async {
            let flight = Flight::new();
            let counter = AtomicUsize::new(0);

            let (first, second, third) = futures::join!(
                flight.execute("answer", slow_fetch(&counter)),
                flight.execute("answer", slow_fetch(&counter)),
                flight.execute("answer", slow_fetch(&counter))
            );

            // All callers received the outcome of a single execution...
            assert_eq!(first.unwrap(), "result");
            assert_eq!(second.unwrap(), "result");
            assert_eq!(third.unwrap(), "result");
            assert_eq!(counter.load(Ordering::SeqCst), 1);

            // ...and the call table is empty again.
            assert_eq!(flight.is_empty(), true);
        });
    }

    #[test]
    fn distinct_keys_execute_independently() {
        crate::testing::test_async(async {
            let flight = Flight::new();
            let counter = AtomicUsize::new(0);

            let (first, second) = futures::join!(
                flight.execute("foo", slow_fetch(&counter)),
                flight.execute("bar", slow_fetch(&counter))
            );

            assert_eq!(first.unwrap(), "result");
            assert_eq!(second.unwrap(), "result");
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn abandoned_executions_leave_no_record_behind() {
        crate::testing::test_async(async {
            let flight = Flight::new();

            // The caller gives up on the leading execution via an external deadline, which
            // drops the leading future mid-flight...
            let abandoned = tokio::time::timeout(
                Duration::from_millis(5),
                flight.execute("answer", stalled_fetch()),
            )
            .await;
            assert_eq!(abandoned.is_err(), true);

            // ...but the call table must not keep a dead record for the key...
            assert_eq!(flight.is_empty(), true);

            // ...and a later call starts a fresh execution instead of joining one.
            let counter = AtomicUsize::new(0);
            let retry = flight.execute("answer", slow_fetch(&counter)).await;
            assert_eq!(retry.unwrap(), "result");
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn errors_are_shared_and_not_sticky() {
        crate::testing::test_async(async {
            let flight = Flight::new();
            let failures = AtomicUsize::new(0);

            let (first, second) = futures::join!(
                flight.execute("answer", failing_fetch(&failures)),
                flight.execute("answer", failing_fetch(&failures))
            );

            // Both callers observe the error of the single execution...
            assert_eq!(
                first.unwrap_err().to_string(),
                "the source is on fire".to_owned()
            );
            assert_eq!(
                second.unwrap_err().to_string(),
                "the source is on fire".to_owned()
            );
            assert_eq!(failures.load(Ordering::SeqCst), 1);

            // ...but the failure is not remembered: a fresh call may succeed.
            let successes = AtomicUsize::new(0);
            let retry = flight.execute("answer", slow_fetch(&successes)).await;
            assert_eq!(retry.unwrap(), "result");
            assert_eq!(successes.load(Ordering::SeqCst), 1);
        });
    }
}
