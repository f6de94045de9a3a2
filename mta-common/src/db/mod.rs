//! Database schema, migrations and runtime settings

pub mod init;
pub mod migrations;
pub mod settings;

pub use init::{connect_in_memory, init_database, init_schema};
pub use migrations::run_migrations;
pub use settings::RuntimeSettings;
