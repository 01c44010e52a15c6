// Permission errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Invalid permission mode: {0} (expected allow, deny or ask)")]
    InvalidMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
