// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

pub mod rankings;
pub mod single_flight;
pub mod utils;

pub use utils::*;
