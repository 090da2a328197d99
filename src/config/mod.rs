// Re-export all items from the submodules
mod connections;
mod env_vars;

// Re-export connection settings
pub use connections::{
    ConnectionConfig,
    ConnectionsConfig,
    load_connections,
};

// Re-export environment variable expansion
pub use env_vars::expand_env_vars;
