// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A render loop that suspends on missing data, retries once it arrives, and routes failures to
//! an error boundary.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use serde_json::{Value, json};
use suspense_fetch::{
    Arg, ConfigError, FetchOptions, FetchScope, Fetched, Operation, OperationError, RemoteFetcher, RemoteRequest,
    Suspense, Transport,
};
use tick::Clock;

/// Pretends to be an HTTP backend.
struct Backend {
    calls: AtomicU32,
}

impl Transport<Value> for Backend {
    async fn retrieve(&self, request: RemoteRequest) -> Result<Value, OperationError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        tokio::time::sleep(Duration::from_millis(30)).await;
        match request.url() {
            "/api/offline" => Err(OperationError::from_message("503 service unavailable")),
            url => Ok(json!({ "url": url, "data": request.data(), "call": call })),
        }
    }
}

/// Renders until the data is available, the way a suspense-aware UI would.
async fn render<F>(label: &str, mut attempt: F)
where
    F: FnMut() -> Suspense<Value>,
{
    loop {
        match attempt() {
            Suspense::Ready(fetched) => {
                println!("{label}: rendered {}", fetched.value());
                return;
            }
            Suspense::Suspended(handle) => {
                println!("{label}: suspended");
                handle.await;
            }
            Suspense::Failed(error) => {
                println!("{label}: error boundary caught '{error}'");
                return;
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let clock = Clock::new_tokio();
    let scope = FetchScope::builder(clock.clone())
        .name("profile_page")
        .with_logs(true)
        .build();

    let versions = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&versions);
    let load_profile = Operation::named("load_profile", move |args: Vec<Arg>| {
        let version = counter.fetch_add(1, Ordering::Relaxed) + 1;
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, OperationError>(json!({ "user": args.first().map(ToString::to_string), "version": version }))
        }
    });

    let profile = || {
        or_failed(scope.fetch((
            load_profile.clone(),
            vec![Arg::from("ada")],
            FetchOptions::new().expire(Duration::from_secs(30)),
        )))
    };

    // Two components asking for the same profile share one load.
    tokio::join!(render("header", profile), render("sidebar", profile));
    render("footer", profile).await;

    if let Some(fetched) = profile().ready() {
        let fresh = fetched.refresh().refresh_resolved().await;
        println!("refreshed: {:?}", fresh.map(Fetched::into_value));
    }
    println!("load_profile ran {} times", versions.load(Ordering::Relaxed));

    let remote = RemoteFetcher::new(scope_for_remote(clock), Backend { calls: AtomicU32::new(0) });
    render("feed", || or_failed(remote.fetch(("/api/feed", vec![json!({ "page": 1 })])))).await;
    render("status", || or_failed(remote.fetch("/api/offline"))).await;
}

fn scope_for_remote(clock: Clock) -> FetchScope<Value> {
    FetchScope::builder(clock).name("remote").with_logs(true).build()
}

/// Malformed calls go to the error boundary too.
fn or_failed(attempt: Result<Suspense<Value>, ConfigError>) -> Suspense<Value> {
    attempt.unwrap_or_else(|error| Suspense::Failed(OperationError::new(error)))
}
