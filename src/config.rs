use crate::errors::{EngineError, EngineResult};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    /// Built dashboard assets, served as the fallback route.
    pub static_dir: PathBuf,
    pub command_buffer: usize,
    pub broadcast_buffer: usize,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = parse_var_or::<u16>("SERVER_PORT", "3001")?;
        let command_buffer = parse_var_or::<usize>("COMMAND_BUFFER", "256")?;
        let broadcast_buffer = parse_var_or::<usize>("BROADCAST_BUFFER", "1024")?;

        if command_buffer == 0 || broadcast_buffer == 0 {
            return Err(EngineError::Config("channel buffers must be non-zero".into()));
        }

        Ok(Self {
            server_host: env_var_or("SERVER_HOST", "0.0.0.0"),
            server_port,
            static_dir: PathBuf::from(env_var_or("STATIC_DIR", "dashboard/dist")),
            command_buffer,
            broadcast_buffer,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var_or<T>(key: &str, default: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .parse::<T>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
