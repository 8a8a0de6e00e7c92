//! Graded source outcomes and the ordered fallback resolver.
//!
//! A lookup walks its sources in priority order and stops at the first one
//! that finds a value. A source that positively reports absence
//! ([`Outcome::NotFound`]) always hands over to the next one. A source that
//! could not answer ([`Outcome::Failed`]) is either recorded and skipped or
//! returned to the caller, depending on the [`ErrorPolicy`].

use std::future::Future;

use common::ErrorPolicy;
use sources::{SourceError, SourceResult};
use tracing::{debug, warn};

use crate::error::{QueryError, QueryResult};

/// Result of asking one source for one value.
#[derive(Debug)]
pub enum Outcome<T> {
    Found(T),
    NotFound,
    Failed(SourceError),
}

impl<T> Outcome<T> {
    /// Adapt an adapter's `Ok(Some)` / `Ok(None)` / `Err` triple.
    pub fn from_lookup(result: SourceResult<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Outcome::Found(value),
            Ok(None) => Outcome::NotFound,
            Err(e) => Outcome::Failed(e),
        }
    }

    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Found(value),
            None => Outcome::NotFound,
        }
    }

    pub fn and_then<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Outcome<U>,
    {
        match self {
            Outcome::Found(value) => f(value),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Failed(e) => Outcome::Failed(e),
        }
    }

    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        self.and_then(|value| Outcome::Found(f(value)))
    }
}

/// A source that failed during resolution and was skipped.
#[derive(Debug)]
pub struct SourceFailure {
    pub source_name: &'static str,
    pub error: SourceError,
}

/// What a lookup produced, and which sources were degraded along the way.
#[derive(Debug)]
pub struct Resolution<T> {
    pub value: Option<T>,
    /// Name of the source that produced `value`.
    pub source: Option<&'static str>,
    pub failures: Vec<SourceFailure>,
}

impl<T> Resolution<T> {
    /// No source had the value and none of them failed.
    pub fn is_confirmed_absent(&self) -> bool {
        self.value.is_none() && self.failures.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// The value, or [`QueryError::Degraded`] when it is missing and a
    /// failed source might have had it.
    pub fn confirmed(self, what: &'static str, key: &str) -> QueryResult<Option<T>> {
        match self.value {
            Some(value) => Ok(Some(value)),
            None if self.failures.is_empty() => Ok(None),
            None => Err(QueryError::Degraded {
                what,
                key: key.to_string(),
                failures: self.failures,
            }),
        }
    }
}

/// Drives one lookup through its sources in order.
///
/// ```rust,ignore
/// let mut resolver = Resolver::new("stored_url", image_id.as_str(), policy);
/// resolver.try_source("row_store", async { ... }).await?;
/// resolver.try_source("search_index", async { ... }).await?;
/// let resolution = resolver.finish();
/// ```
pub struct Resolver<T> {
    what: &'static str,
    key: String,
    policy: ErrorPolicy,
    value: Option<T>,
    source: Option<&'static str>,
    failures: Vec<SourceFailure>,
}

impl<T> Resolver<T> {
    pub fn new(what: &'static str, key: impl Into<String>, policy: ErrorPolicy) -> Self {
        Self {
            what,
            key: key.into(),
            policy,
            value: None,
            source: None,
            failures: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    /// Run `probe` unless an earlier source already found the value.
    ///
    /// The probe future is never polled once a value is found, so skipped
    /// sources see no traffic.
    pub async fn try_source<F>(&mut self, source_name: &'static str, probe: F) -> QueryResult<()>
    where
        F: Future<Output = Outcome<T>>,
    {
        if self.value.is_some() {
            return Ok(());
        }

        match probe.await {
            Outcome::Found(value) => {
                debug!(what = self.what, key = %self.key, source = source_name, "Resolved");
                self.value = Some(value);
                self.source = Some(source_name);
            }
            Outcome::NotFound => {
                debug!(what = self.what, key = %self.key, source = source_name, "Not found, falling back");
            }
            Outcome::Failed(error) => {
                warn!(
                    what = self.what,
                    key = %self.key,
                    source = source_name,
                    error = %error,
                    "Source failed"
                );
                match self.policy {
                    ErrorPolicy::Propagate => return Err(QueryError::from_source(source_name, error)),
                    ErrorPolicy::FallThrough => self.failures.push(SourceFailure {
                        source_name,
                        error,
                    }),
                }
            }
        }
        Ok(())
    }

    /// Carry over failures from a nested lookup this one depends on.
    pub fn absorb<U>(&mut self, nested: &mut Resolution<U>) {
        self.failures.append(&mut nested.failures);
    }

    pub fn finish(self) -> Resolution<T> {
        if self.value.is_none() {
            debug!(
                what = self.what,
                key = %self.key,
                failures = self.failures.len(),
                "No source had a value"
            );
        }
        Resolution {
            value: self.value,
            source: self.source,
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn down(name: &str) -> SourceError {
        SourceError::Unavailable(name.to_string())
    }

    #[tokio::test]
    async fn second_source_wins_after_first_fails_and_third_is_skipped() {
        let third_calls = AtomicUsize::new(0);
        let mut resolver = Resolver::new("thing", "k", ErrorPolicy::FallThrough);

        resolver
            .try_source("first", async { Outcome::<u32>::Failed(down("first")) })
            .await
            .unwrap();
        resolver
            .try_source("second", async { Outcome::Found(7) })
            .await
            .unwrap();
        resolver
            .try_source("third", async {
                third_calls.fetch_add(1, Ordering::SeqCst);
                Outcome::Found(9)
            })
            .await
            .unwrap();

        let resolution = resolver.finish();
        assert_eq!(resolution.value, Some(7));
        assert_eq!(resolution.source, Some("second"));
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].source_name, "first");
        assert!(resolution.is_degraded());
    }

    #[tokio::test]
    async fn all_misses_is_confirmed_absence() {
        let mut resolver = Resolver::<u32>::new("thing", "k", ErrorPolicy::FallThrough);
        resolver.try_source("a", async { Outcome::NotFound }).await.unwrap();
        resolver.try_source("b", async { Outcome::NotFound }).await.unwrap();

        let resolution = resolver.finish();
        assert!(resolution.value.is_none());
        assert!(resolution.is_confirmed_absent());
    }

    #[tokio::test]
    async fn all_failures_is_degraded_absence_not_error() {
        let mut resolver = Resolver::<u32>::new("thing", "k", ErrorPolicy::FallThrough);
        resolver
            .try_source("a", async { Outcome::Failed(down("a")) })
            .await
            .unwrap();
        resolver
            .try_source("b", async { Outcome::Failed(down("b")) })
            .await
            .unwrap();

        let resolution = resolver.finish();
        assert!(resolution.value.is_none());
        assert!(!resolution.is_confirmed_absent());
        assert_eq!(resolution.failures.len(), 2);
    }

    #[tokio::test]
    async fn propagate_policy_stops_at_first_failure() {
        let second_calls = AtomicUsize::new(0);
        let mut resolver = Resolver::<u32>::new("thing", "k", ErrorPolicy::Propagate);

        let err = resolver
            .try_source("a", async { Outcome::Failed(down("a")) })
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Source { source_name: "a", .. }));

        // Callers use `?`, so nothing after the failure runs; a miss still falls back.
        let mut resolver = Resolver::<u32>::new("thing", "k", ErrorPolicy::Propagate);
        resolver.try_source("a", async { Outcome::NotFound }).await.unwrap();
        resolver
            .try_source("b", async {
                second_calls.fetch_add(1, Ordering::SeqCst);
                Outcome::Found(1)
            })
            .await
            .unwrap();
        assert_eq!(resolver.finish().value, Some(1));
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absorb_moves_nested_failures() {
        let mut nested = Resolution::<String> {
            value: None,
            source: None,
            failures: vec![SourceFailure {
                source_name: "nested",
                error: down("nested"),
            }],
        };
        let mut resolver = Resolver::<u32>::new("outer", "k", ErrorPolicy::FallThrough);
        resolver.absorb(&mut nested);
        resolver.try_source("a", async { Outcome::Found(3) }).await.unwrap();

        let resolution = resolver.finish();
        assert_eq!(resolution.value, Some(3));
        assert_eq!(resolution.failures.len(), 1);
        assert!(nested.failures.is_empty());
    }

    #[test]
    fn confirmed_separates_absence_from_degradation() {
        let found = Resolution {
            value: Some(1),
            source: Some("a"),
            failures: vec![SourceFailure {
                source_name: "b",
                error: down("b"),
            }],
        };
        assert_eq!(found.confirmed("thing", "k").unwrap(), Some(1));

        let absent = Resolution::<i32> {
            value: None,
            source: None,
            failures: Vec::new(),
        };
        assert_eq!(absent.confirmed("thing", "k").unwrap(), None);

        let degraded = Resolution::<i32> {
            value: None,
            source: None,
            failures: vec![SourceFailure {
                source_name: "a",
                error: down("a"),
            }],
        };
        match degraded.confirmed("thing", "k") {
            Err(QueryError::Degraded { what, key, failures }) => {
                assert_eq!(what, "thing");
                assert_eq!(key, "k");
                assert_eq!(failures[0].source_name, "a");
            }
            other => panic!("expected degraded error, got {other:?}"),
        }
    }

    #[test]
    fn outcome_combinators() {
        assert!(matches!(
            Outcome::from_lookup(Ok(Some(2))).map(|v: i32| v * 2),
            Outcome::Found(4)
        ));
        assert!(matches!(
            Outcome::<i32>::from_lookup(Ok(None)),
            Outcome::NotFound
        ));
        assert!(matches!(
            Outcome::<i32>::from_lookup(Err(down("x"))).map(|v| v + 1),
            Outcome::Failed(_)
        ));
        assert!(matches!(
            Outcome::Found(1).and_then(|_| Outcome::<i32>::NotFound),
            Outcome::NotFound
        ));
    }
}
