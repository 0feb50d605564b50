pub mod beacon_chain;
pub mod env;
pub mod execution_chain;
pub mod explorer;
pub mod health;
pub mod json_codecs;
pub mod log;
pub mod rewards;
pub mod server;
pub mod sync_duties;
pub mod units;
pub mod upstream;
