pub mod aggregator;
pub mod beckn;
pub mod cache;
pub mod geocoding;
pub mod providers;
pub mod transactions;
