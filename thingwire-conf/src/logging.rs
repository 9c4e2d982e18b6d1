use std::ops::Deref;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use simple_logger::SimpleLogger;

use thingwire::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    #[serde(default = "Log::level_default")]
    pub level: Level,
    #[serde(default = "Log::console_default")]
    pub console: bool,
}

impl Default for Log {
    #[inline]
    fn default() -> Self {
        Self { level: Self::level_default(), console: Self::console_default() }
    }
}

impl Log {
    #[inline]
    fn level_default() -> Level {
        Level { inner: log::LevelFilter::Info }
    }
    #[inline]
    fn console_default() -> bool {
        true
    }
}

/// Installs the process logger described by `log`. Call once at startup.
pub fn init(log: &Log) -> Result<()> {
    if !log.console {
        return Ok(());
    }
    SimpleLogger::new().with_level(log.level.inner()).init()?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct Level {
    inner: log::LevelFilter,
}

impl Level {
    #[inline]
    pub fn inner(&self) -> log::LevelFilter {
        self.inner
    }
}

impl Deref for Level {
    type Target = log::LevelFilter;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'de> Deserialize<'de> for Level {
    #[inline]
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = String::deserialize(deserializer)?;
        let inner = log::LevelFilter::from_str(&level)
            .map_err(|_| de::Error::custom(format!("unknown log level `{level}`")))?;
        Ok(Level { inner })
    }
}
