use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_YT_DLP: &str = "yt-dlp";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    pub yt_dlp_path: PathBuf,
    pub connect_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let addr = var("VIDEO_RELAY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("VIDEO_RELAY_ADDR is not a socket address: {addr}"))?;

        let yt_dlp_path = var("YT_DLP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_YT_DLP));

        let connect_timeout = match var("VIDEO_RELAY_CONNECT_TIMEOUT_SECS") {
            Some(secs) => secs.trim().parse::<u64>().with_context(|| {
                format!("VIDEO_RELAY_CONNECT_TIMEOUT_SECS is not a number of seconds: {secs}")
            })?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        Ok(Self {
            addr,
            yt_dlp_path,
            connect_timeout: Duration::from_secs(connect_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.yt_dlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("VIDEO_RELAY_ADDR", "127.0.0.1:8080"),
            ("YT_DLP_PATH", "/opt/bin/yt-dlp"),
            ("VIDEO_RELAY_CONNECT_TIMEOUT_SECS", " 3 "),
        ])
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.yt_dlp_path, PathBuf::from("/opt/bin/yt-dlp"));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("VIDEO_RELAY_ADDR", "  ")]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3000".parse().unwrap());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(load(&[("VIDEO_RELAY_ADDR", "localhost")]).is_err());
        assert!(load(&[("VIDEO_RELAY_CONNECT_TIMEOUT_SECS", "soon")]).is_err());
    }
}
