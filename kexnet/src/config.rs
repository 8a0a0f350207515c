//! Command line and environment configuration.
//!
//! Every option can also come from a `KEX_*` variable. Variables may be kept in
//! an env file (default `.env`) which is loaded before arguments are parsed.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kextrust::crypto::keys::{load_public_key, DEFAULT_KEY_BITS};
use kextrust::{Authority, Credentials, PrincipalKeyPair, Registry};
use tokio::runtime::Handle;

use crate::client::{Directory, HttpExchange};
use crate::error::{NetError, Result};
use crate::telemetry::DEFAULT_FILTER;

pub const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Parser, Debug)]
#[command(name = "kex", version, about = "Trent-brokered three-party session key exchange")]
pub struct Cli {
    /// Env file read before arguments; missing files are ignored.
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, env = "KEX_LOG", default_value = DEFAULT_FILTER)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate an RSA key pair as PKCS#1 PEM files.
    Keygen(KeygenArgs),
    /// Run the authority.
    Trent(AuthorityArgs),
    /// Run a principal that can initiate and accept sessions.
    Agent(AgentArgs),
}

#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    #[arg(long)]
    pub private: PathBuf,

    #[arg(long)]
    pub public: PathBuf,

    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    pub bits: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AuthorityArgs {
    #[arg(long, env = "KEX_LISTEN", default_value = "127.0.0.1:9000")]
    pub listen: SocketAddr,

    #[arg(long, env = "KEX_PRIVATE_KEY")]
    pub private_key: PathBuf,

    /// Registered principal as ID=PUBLIC_KEY_FILE. Repeatable.
    #[arg(
        long = "principal",
        env = "KEX_PRINCIPALS",
        value_delimiter = ',',
        value_parser = parse_assignment
    )]
    pub principals: Vec<(String, String)>,
}

impl AuthorityArgs {
    /// Load the authority's key pair and registry.
    pub fn load(&self) -> Result<Authority> {
        if self.principals.is_empty() {
            return Err(NetError::Config("no principals registered".into()));
        }
        let keys = PrincipalKeyPair::load(&self.private_key).map_err(|e| {
            NetError::Config(format!("authority key {}: {e}", self.private_key.display()))
        })?;
        let registry = Registry::from_pem_files(self.principals.iter().map(|(id, path)| (id.as_str(), path)))?;
        Ok(Authority::new(keys, registry))
    }
}

#[derive(Args, Debug, Clone)]
pub struct AgentArgs {
    #[arg(long, env = "KEX_ID")]
    pub id: String,

    #[arg(long, env = "KEX_LISTEN", default_value = "127.0.0.1:9001")]
    pub listen: SocketAddr,

    #[arg(long, env = "KEX_PRIVATE_KEY")]
    pub private_key: PathBuf,

    /// The authority's public key, provisioned out of band.
    #[arg(long, env = "KEX_AUTHORITY_KEY")]
    pub authority_key: PathBuf,

    #[arg(long, env = "KEX_AUTHORITY_URL", default_value = "http://127.0.0.1:9000")]
    pub authority_url: String,

    /// Known peer as ID=BASE_URL. Repeatable.
    #[arg(long = "peer", env = "KEX_PEERS", value_delimiter = ',', value_parser = parse_assignment)]
    pub peers: Vec<(String, String)>,

    #[arg(long, env = "KEX_AUTHORITY_TIMEOUT_SECS", default_value_t = 5)]
    pub authority_timeout_secs: u64,

    #[arg(long, env = "KEX_PEER_TIMEOUT_SECS", default_value_t = 15)]
    pub peer_timeout_secs: u64,

    /// Serve only; do not read commands from stdin.
    #[arg(long, env = "KEX_HEADLESS")]
    pub headless: bool,
}

impl AgentArgs {
    pub fn credentials(&self) -> Result<Credentials> {
        let keys = PrincipalKeyPair::load(&self.private_key).map_err(|e| {
            NetError::Config(format!("private key {}: {e}", self.private_key.display()))
        })?;
        let authority_key = load_public_key(&self.authority_key).map_err(|e| {
            NetError::Config(format!("authority key {}: {e}", self.authority_key.display()))
        })?;
        Ok(Credentials::new(self.id.clone(), keys, authority_key))
    }

    pub fn directory(&self) -> Directory {
        self.peers
            .iter()
            .fold(Directory::new(self.authority_url.clone()), |dir, (id, url)| {
                dir.with_peer(id.clone(), url.clone())
            })
    }

    pub fn exchange(&self, handle: Handle) -> Result<HttpExchange> {
        Ok(HttpExchange::new(handle, self.directory())?.with_timeouts(
            Duration::from_secs(self.authority_timeout_secs),
            Duration::from_secs(self.peer_timeout_secs),
        ))
    }
}

/// Parse `ID=VALUE`.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((id, value)) if !id.trim().is_empty() && !value.trim().is_empty() => {
            Ok((id.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(NetError::InvalidAssignment(raw.to_owned())),
    }
}

/// The env file named on the command line, found before clap runs so the
/// file's variables can feed `env` fallbacks.
pub fn env_file_from_args<I, S>(args: I) -> PathBuf
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        if let Some(path) = arg.strip_prefix("--env-file=") {
            return PathBuf::from(path);
        }
        if arg == "--env-file" {
            if let Some(path) = args.next() {
                return PathBuf::from(path.as_ref());
            }
        }
    }
    PathBuf::from(DEFAULT_ENV_FILE)
}

/// Load `path` into the process environment if it exists. Existing
/// variables win.
pub fn load_env_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    dotenv::from_path(path).map_err(|e| NetError::Config(format!("env file {}: {e}", path.display())))?;
    Ok(true)
}
