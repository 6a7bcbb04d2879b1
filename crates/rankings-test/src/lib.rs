//! Helpers for testing the web server and services.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test. Data files written into it are deleted as soon as it is dropped.
//!
//!  - When using [`Server`], make sure that the server is held until all requests to it have been
//!    made. The server stops serving when dropped.

use std::net::{SocketAddr, TcpListener};
use std::path::Path;

use axum::Router;
use reqwest::Url;
use serde::Serialize;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the rankings crates and mutes all
///    other logs (such as hyper or tower).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("rankings=trace,rankings_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped. Use it as a guard to
/// automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Serializes `value` as JSON into the file at `path`.
///
/// Use this to write record stores by hand, including ones that do not match the record schema.
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) {
    let data = serde_json::to_vec_pretty(value).unwrap();
    std::fs::write(path, data).unwrap();
}

/// Asserts that `actual` is within a relative tolerance of `expected`.
///
/// Sums of floating point revenues depend on the summation order, so they are never compared
/// bit-for-bit.
#[track_caller]
pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = expected.abs().max(1.0) * 1e-9;
    assert!(
        (actual - expected).abs() <= tolerance,
        "{actual} is not close to {expected}"
    );
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
}

impl Server {
    /// Creates a new test server serving the given router.
    pub fn with_router(router: Router) -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router.into_make_service())
                .await
                .unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses the loopback address the server is bound to as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://{}/{}", self.addr(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
