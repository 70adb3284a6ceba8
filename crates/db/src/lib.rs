pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{
    connect, connect_from_config, connect_pool, connect_with_settings, DbPool, PoolSettings,
};
