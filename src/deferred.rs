//! Deferred value synchronization
//!
//! Reference resolvers may produce values synchronously or hand back a future
//! that settles later. [`Deferred`] lets the entities resolver treat both
//! shapes uniformly: a batch resolver returns a list of per-item values that
//! may individually be deferred, and [`Deferred::join_all`] flattens exactly
//! one level of that nesting into a single deferred list.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

/// A value, or a handle that will produce one later.
pub enum Deferred<T> {
    /// The value is already available.
    Ready(T),
    /// The value settles when the boxed future completes.
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Deferred<T> {
    /// Wrap an immediately available value
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    /// Wrap a future that settles later
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Deferred::Pending(future.boxed())
    }

    /// Whether the value has not settled yet
    pub fn is_deferred(&self) -> bool {
        matches!(self, Deferred::Pending(_))
    }

    /// Settle the value, suspending the caller until it is available.
    ///
    /// Ready values resolve without yielding to the executor.
    pub async fn resolve(self) -> T {
        match self {
            Deferred::Ready(value) => value,
            Deferred::Pending(future) => future.await,
        }
    }

    /// Transform the eventual value without settling it
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Deferred::Ready(value) => Deferred::Ready(f(value)),
            Deferred::Pending(future) => Deferred::pending(future.map(f)),
        }
    }

    /// Flatten one level: a list of possibly-deferred values becomes a
    /// deferred list of settled values, in input order.
    ///
    /// Pending entries are polled concurrently. If every entry is already
    /// ready the result is ready too, with no suspension point.
    pub fn join_all<I>(values: I) -> Deferred<Vec<T>>
    where
        I: IntoIterator<Item = Deferred<T>>,
    {
        let values: Vec<Deferred<T>> = values.into_iter().collect();
        if values.iter().any(Deferred::is_deferred) {
            Deferred::pending(futures::future::join_all(
                values.into_iter().map(Deferred::resolve),
            ))
        } else {
            Deferred::Ready(
                values
                    .into_iter()
                    .filter_map(|value| match value {
                        Deferred::Ready(value) => Some(value),
                        Deferred::Pending(_) => None,
                    })
                    .collect(),
            )
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Ready(_) => f.write_str("Deferred::Ready"),
            Deferred::Pending(_) => f.write_str("Deferred::Pending"),
        }
    }
}

impl<T: Send + 'static> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Deferred::Ready(value)
    }
}
