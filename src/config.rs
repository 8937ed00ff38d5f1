use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::Value;

/// Placeholder blocks emitted by `--new`.
pub const SCAFFOLD_BLOCKS: usize = 5;

/// Problems locating, reading or decoding the server list. All of these
/// are fatal to the invocation; nothing is probed on a bad config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{}: file is missing", .0.display())]
    Missing(PathBuf),
    #[error("{}: {}", .0.display(), .1)]
    Unreadable(PathBuf, std::io::Error),
    #[error("{}: does not look like a toml file: {}", .0.display(), .1)]
    Deserialization(PathBuf, toml::de::Error),
    #[error("{}: no [servers] table", .0.display())]
    NoServersTable(PathBuf),
    #[error("{}: refusing to overwrite an existing file", .0.display())]
    AlreadyExists(PathBuf),
    #[error("{}: cannot write: {}", .0.display(), .1)]
    Unwritable(PathBuf, std::io::Error),
    #[error("cannot determine a home directory for the default config path")]
    NoHome,
}

/// One `[servers.<name>]` block as declared, before validation.
///
/// Field values stay loosely typed on purpose: the validator owns the type
/// checks, so a bad value degrades or skips a single target instead of
/// failing the whole parse.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTarget {
    pub name: String,
    pub ip: Option<Value>,
    pub ports: Option<Value>,
    pub scan: Option<Value>,
}

/// Default server-list location: `$HOME/.config/host-watch/servers.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("host-watch")
        .join("servers.toml"))
}

/// Parse server blocks out of a TOML document, in declaration order.
pub fn parse_targets_str(content: &str, path: &Path) -> Result<Vec<RawTarget>, ConfigError> {
    let doc: Value = toml::from_str(content)
        .map_err(|e| ConfigError::Deserialization(path.to_path_buf(), e))?;
    let servers = doc
        .get("servers")
        .and_then(Value::as_table)
        .ok_or_else(|| ConfigError::NoServersTable(path.to_path_buf()))?;

    let mut out = Vec::with_capacity(servers.len());
    for (name, block) in servers {
        let table = block.as_table();
        out.push(RawTarget {
            name: name.clone(),
            ip: table.and_then(|t| t.get("ip")).cloned(),
            ports: table.and_then(|t| t.get("ports")).cloned(),
            scan: table.and_then(|t| t.get("scan")).cloned(),
        });
    }
    Ok(out)
}

/// Load server blocks from a file path.
pub fn load_targets(path: impl AsRef<Path>) -> Result<Vec<RawTarget>, ConfigError> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::Missing(path.to_path_buf()))
        }
        Err(e) => return Err(ConfigError::Unreadable(path.to_path_buf(), e)),
    };
    parse_targets_str(&content, path)
}

/// Render a scaffold server list with `count` placeholder blocks for the
/// user to fill in. Parsing a scaffold back yields `count` targets with an
/// empty address, an empty port list and scanning off.
pub fn scaffold(count: usize) -> String {
    let mut out = String::from("[servers]\n");
    for i in 1..=count {
        out.push_str(&format!(
            "\n[servers.server-{i}]\n\
             # enter an address here, e.g. \"192.168.1.1\"\n\
             ip = \"\"\n\
             # enter a list, e.g. [22, 1337, 65535]\n\
             ports = []\n\
             # set true to check the ports above\n\
             scan = false\n"
        ));
    }
    out
}

/// Write a scaffold to `path`, refusing to clobber an existing file.
pub fn write_scaffold(path: impl AsRef<Path>, count: usize) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    fs::write(path, scaffold(count)).map_err(|e| ConfigError::Unwritable(path.to_path_buf(), e))
}
