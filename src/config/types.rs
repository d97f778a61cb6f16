//! Configuration types

use crate::replay::TimestampFormat;
use crate::telemetry::LogConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};

/// Standard syslog port, used for both ends by default
pub const DEFAULT_PORT: u16 = 514;

/// Settings file (all fields optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub replay: ReplaySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplaySettings {
    pub dst_port: Option<u16>,
    pub src_port: Option<u16>,
    pub format: Option<String>,
    pub convert: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl LoggingSettings {
    pub fn to_log_config(&self) -> LogConfig {
        let defaults = LogConfig::new();
        LogConfig {
            level: self.level.clone().unwrap_or(defaults.level),
            format: self.format.clone().unwrap_or(defaults.format),
        }
    }
}

/// Values taken from the command line. `None` defers to the settings file.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub dest_address: String,
    pub src_address: Option<String>,
    pub dst_port: Option<u16>,
    pub src_port: Option<u16>,
    pub format: Option<String>,
    /// `Some(false)` turns off a `convert = true` from the settings file
    pub convert: Option<bool>,
}

/// Settings for one run, fixed before any network activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    pub dst: Ipv4Addr,
    /// Source address to put on the wire; the egress interface's if unset
    pub src: Option<Ipv4Addr>,
    pub dst_port: u16,
    pub src_port: u16,
    pub format: TimestampFormat,
    pub convert: bool,
}

impl ReplayConfig {
    /// Merge command-line values over the settings file and validate them.
    pub fn resolve(args: &CliArgs, file: &Config) -> Result<Self> {
        let dst = parse_address(&args.dest_address, "destination")?;
        let src = args
            .src_address
            .as_deref()
            .map(|s| parse_address(s, "source"))
            .transpose()?;

        let format = match args.format.as_deref().or(file.replay.format.as_deref()) {
            Some(name) => name.parse()?,
            None => TimestampFormat::default(),
        };

        Ok(Self {
            dst,
            src,
            dst_port: args.dst_port.or(file.replay.dst_port).unwrap_or(DEFAULT_PORT),
            src_port: args.src_port.or(file.replay.src_port).unwrap_or(DEFAULT_PORT),
            format,
            convert: args.convert.or(file.replay.convert).unwrap_or(false),
        })
    }
}

fn parse_address(s: &str, what: &str) -> Result<Ipv4Addr> {
    match s.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(addr)) => addr.to_ipv4_mapped().ok_or_else(|| {
            Error::Config(format!("{} address {} is IPv6, which is not supported", what, s))
        }),
        Err(_) => Err(Error::Config(format!(
            "please specify a valid {} address (got `{}`)",
            what, s
        ))),
    }
}
