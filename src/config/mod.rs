// Re-export all items from the submodules
mod env_vars;
mod sftp_config;

// Re-export remote session configuration
pub use sftp_config::{
    Credential,
    ImageSettings,
    SessionSettings,
    SftpConfig,
    load_or_create_config,
};

// Re-export environment variable functions
pub use env_vars::{
    expand_env_vars,
    has_env_reference,
};
