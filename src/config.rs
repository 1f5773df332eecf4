use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown backend {other}, expected file/memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub data_dir: PathBuf,
    pub storage_prefix: String,
    pub storage_backend: StorageBackend,
    pub seed_demo_data: bool,
    pub store_queue_size: usize,
    pub event_buffer_size: usize,
    pub courier_tick: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            storage_prefix: env::var("STORAGE_PREFIX")
                .unwrap_or_else(|_| "deliveryApp_".to_string()),
            storage_backend: parse_or_default("STORAGE_BACKEND", StorageBackend::File)?,
            seed_demo_data: parse_or_default("SEED_DEMO_DATA", true)?,
            store_queue_size: parse_or_default("STORE_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            courier_tick: Duration::from_millis(parse_or_default("COURIER_TICK_MS", 3000)?),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            data_dir: PathBuf::from("data"),
            storage_prefix: "deliveryApp_".to_string(),
            storage_backend: StorageBackend::Memory,
            seed_demo_data: true,
            store_queue_size: 1024,
            event_buffer_size: 1024,
            courier_tick: Duration::from_millis(3000),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::StorageBackend;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("FILE".parse::<StorageBackend>(), Ok(StorageBackend::File));
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("redis".parse::<StorageBackend>().is_err());
    }
}
