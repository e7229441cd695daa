pub mod coin_store;
pub mod migrate;

pub use coin_store::CoinStore;
pub use migrate::migrate;
