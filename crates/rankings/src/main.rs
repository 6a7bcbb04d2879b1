//! Rankings.
//!
//! A web service answering analytical queries over a collection of business records: the
//! businesses with the highest revenue, and the cities and activity categories with the highest
//! summed revenue. Computed rankings are cached for a short time, and concurrent requests for the
//! same ranking share a single computation.

#![warn(missing_debug_implementations, clippy::all)]

mod cli;
mod endpoints;
mod healthcheck;
mod logging;
mod server;


fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
