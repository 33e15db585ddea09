use crate::{
    addr::inet_ntoa,
    backends::{self, BackendEntry, BackendServer},
    stats,
};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::{
    fs::OpenOptions,
    io::{Read, Write},
    path::Path,
};
use xdp_lb_common::DestInfo;

/// A backend set that can be applied to the redirect table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub source_addr: String,
    #[serde(default)]
    pub backends: Vec<BackendEntry>,
}

impl Config {
    /// Rebuilds the backend list from a table read, one entry per distinct
    /// destination with the source address of the first slot.
    pub fn from_slots(slots: &[DestInfo]) -> Self {
        Self {
            source_addr: slots
                .first()
                .map(|s| inet_ntoa(s.saddr))
                .unwrap_or_default(),
            backends: stats::aggregate(slots)
                .into_iter()
                .map(|be| BackendEntry {
                    server: be.server,
                    mac: be.mac,
                    ifindex: be.ifindex,
                })
                .collect(),
        }
    }

    pub fn servers(&self) -> Vec<BackendServer> {
        backends::with_source(&self.source_addr, &self.backends)
    }

    pub fn description(&self) -> String {
        format!(
            "{} backends with source {}",
            self.backends.len(),
            self.source_addr
        )
    }
}

pub struct ConfigFile {
    path: String,
}

impl ConfigFile {
    pub fn new<S: AsRef<str>>(filename: &S) -> Self {
        Self {
            path: String::from(filename.as_ref()),
        }
    }

    pub fn load(&self) -> Result<Config, anyhow::Error> {
        if !Path::new(&self.path).try_exists()? {
            return Err(anyhow!("Config file does not exits, {}", self.path));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .context(format!("Can't read config file: {}", self.path))?;
        let mut contents = String::new();
        let size = file.read_to_string(&mut contents)?;

        log::info!("Read {} bytes from: {}", size, self.path);

        let cfg: Config = toml::from_str(&contents)
            .context(format!("Invalid config file: {}", self.path))?;

        log::info!("Found in config: {}", cfg.description());
        Ok(cfg)
    }

    pub fn save(&self, cfg: &Config) -> Result<(), anyhow::Error> {
        if Path::new(&self.path).try_exists()? {
            log::info!("Config file will be overridden, {}", self.path);
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .context(format!("Can't write to config file: {}", self.path))?;

        log::info!("Saving config: {}", cfg.description());

        let contents = toml::to_string(cfg)?;

        file.write_all(contents.as_bytes())?;

        log::info!(
            "Wrote {} bytes to config file: {}",
            contents.len(),
            self.path
        );

        Ok(())
    }
}
