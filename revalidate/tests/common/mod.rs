//! Shared loaders for integration tests.
#![allow(dead_code)]

use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;

/// Loader factory counting how often its loaders are invoked.
#[derive(Clone, Default)]
pub struct Loader {
    calls: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaders produced by a gated factory block until [`Loader::release`].
    pub fn gated() -> Self {
        Self {
            calls: Arc::default(),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lets `n` blocked loaders finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Waits until at least `n` loaders have been invoked.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loader was not invoked in time");
    }

    async fn enter(calls: Arc<AtomicUsize>, gate: Option<Arc<Semaphore>>) {
        calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }

    pub fn returning<T>(
        &self,
        value: T,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<T, Infallible>> + Send + 'static
    where
        T: Send + 'static,
    {
        let calls = Arc::clone(&self.calls);
        let gate = self.gate.clone();
        move || {
            async move {
                Self::enter(calls, gate).await;
                Ok(value)
            }
            .boxed()
        }
    }

    pub fn failing<T>(
        &self,
        message: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<T, io::Error>> + Send + 'static
    where
        T: Send + 'static,
    {
        let calls = Arc::clone(&self.calls);
        let gate = self.gate.clone();
        move || {
            async move {
                Self::enter(calls, gate).await;
                Err(io::Error::other(message))
            }
            .boxed()
        }
    }

    /// A loader that never completes.
    pub fn hanging<T>(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<T, io::Error>> + Send + 'static
    where
        T: Send + 'static,
    {
        let calls = Arc::clone(&self.calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<Result<T, io::Error>>().await
            }
            .boxed()
        }
    }

    pub fn panicking<T>(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<T, io::Error>> + Send + 'static
    where
        T: Send + 'static,
    {
        let calls = Arc::clone(&self.calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                panic!("loader panicked")
            }
            .boxed()
        }
    }
}

/// Loader that must never be invoked.
pub fn unreachable_loader<T>()
-> impl FnOnce() -> BoxFuture<'static, Result<T, Infallible>> + Send + 'static
where
    T: Send + 'static,
{
    || async { panic!("loader must not be called") }.boxed()
}
