use std::future::Future;

use anyhow::Error;
use serenity::async_trait;

/// Result of one guarded handler run
#[derive(Debug)]
pub enum Outcome<T = ()> {
    /// Handler ran to completion
    Handled(T),
    /// Handler failed and the failure was reported
    Failed(Error),
}

impl<T> Outcome<T> {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled(_))
    }
}

/// Receives handler failures
#[async_trait]
pub trait Reporter<O: ?Sized + Sync>: Sync {
    /// Must not fail; internal problems are logged and dropped
    async fn report(&self, error: &Error, origin: &O);
}

/// Runs a handler and contains its failure
///
/// Errors never escape: they are logged, handed to the reporter exactly once,
/// and returned as [`Outcome::Failed`] for the caller to inspect or drop.
pub async fn guard<O, R, F, T>(label: &str, origin: &O, reporter: &R, handler: F) -> Outcome<T>
where
    O: ?Sized + Sync,
    R: Reporter<O> + ?Sized,
    F: Future<Output = anyhow::Result<T>>,
{
    match handler.await {
        Ok(value) => {
            log::debug!("{} handled", label);
            Outcome::Handled(value)
        }
        Err(why) => {
            log::error!("{} failed: {:?}", label, why);
            reporter.report(&why, origin).await;
            Outcome::Failed(why)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, bail};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingReporter {
        calls: AtomicUsize,
        origins: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Reporter<str> for CountingReporter {
        async fn report(&self, _error: &Error, origin: &str) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.origins.lock().unwrap().push(origin.to_string());
        }
    }

    #[tokio::test]
    async fn success_is_not_reported() {
        let reporter = CountingReporter::default();
        let outcome = guard("ping", "ping", &reporter, async { Ok(()) }).await;
        assert!(outcome.is_handled());
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_is_reported_exactly_once() {
        let reporter = CountingReporter::default();
        let outcome: Outcome = guard("say", "say", &reporter, async { Err(anyhow!("boom")) }).await;

        let Outcome::Failed(error) = outcome else {
            panic!("expected a failure");
        };
        assert_eq!(error.to_string(), "boom");
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*reporter.origins.lock().unwrap(), vec!["say".to_string()]);
    }

    #[tokio::test]
    async fn handled_value_is_passed_through() {
        let reporter = CountingReporter::default();
        let outcome = guard("facts", "message", &reporter, async { Ok(42) }).await;
        assert!(matches!(outcome, Outcome::Handled(42)));
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_independent() {
        let reporter = CountingReporter::default();
        for i in 0..3 {
            let origin = format!("event-{}", i);
            guard("chat", origin.as_str(), &reporter, async move {
                if i % 2 == 0 {
                    bail!("even event {}", i);
                }
                Ok(())
            })
            .await;
        }
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *reporter.origins.lock().unwrap(),
            vec!["event-0".to_string(), "event-2".to_string()]
        );
    }
}
