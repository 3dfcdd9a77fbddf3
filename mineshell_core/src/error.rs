use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("task error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("no instance.json found in {0}")]
    MissingInstance(PathBuf),
    #[error("invalid {file}: {source}")]
    InvalidData {
        file: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported modloader: {0}")]
    UnsupportedModloader(String),
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
    #[error("missing {field} for {name}")]
    MissingMetadata { name: String, field: &'static str },
    #[error("hash mismatch for {0}")]
    HashMismatch(String),
    #[error("no installer found for {0}")]
    NoInstaller(String),
    #[error("minecraft version {0} not found in version manifest")]
    UnknownMinecraftVersion(String),
    #[error("instance '{0}' already exists")]
    InstanceExists(String),
}

pub type Result<T> = std::result::Result<T, Error>;
