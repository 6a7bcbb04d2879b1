pub mod currency;
pub mod futures;
