//! `kex`: key generation, the authority server, and agents.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kexnet::config::{env_file_from_args, load_env_file, AgentArgs, AuthorityArgs, Cli, Command, KeygenArgs};
use kexnet::telemetry::init_tracing;
use kexnet::{agent_router, authority_router, console, serve};
use kextrust::{Agent, PrincipalKeyPair};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = env_file_from_args(std::env::args());
    let loaded = load_env_file(&env_file)?;
    let cli = Cli::parse();

    init_tracing(&cli.log);
    if loaded {
        info!(path = %env_file.display(), "loaded env file");
    }

    match cli.command {
        Command::Keygen(args) => keygen(&args),
        Command::Trent(args) => trent(args).await,
        Command::Agent(args) => agent(args).await,
    }
}

fn keygen(args: &KeygenArgs) -> Result<()> {
    let keys = PrincipalKeyPair::generate(args.bits)?;
    keys.save(&args.private, &args.public)
        .with_context(|| format!("writing {} and {}", args.private.display(), args.public.display()))?;
    info!(
        bits = args.bits,
        private = %args.private.display(),
        public = %args.public.display(),
        "key pair written"
    );
    Ok(())
}

async fn trent(args: AuthorityArgs) -> Result<()> {
    let authority = Arc::new(args.load().context("loading authority")?);
    info!(principals = ?authority.registry().ids(), "authority ready");

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    serve(listener, authority_router(authority)).await?;
    Ok(())
}

async fn agent(args: AgentArgs) -> Result<()> {
    let credentials = args.credentials().context("loading agent keys")?;
    let exchange = args.exchange(Handle::current())?;
    let agent = Arc::new(Agent::new(credentials, Arc::new(exchange)));
    info!(id = agent.id(), peers = ?args.directory().peers(), "agent ready");

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    let server = tokio::spawn(serve(listener, agent_router(Arc::clone(&agent))));

    if args.headless {
        server.await??;
        return Ok(());
    }

    // The console blocks on stdin, so it gets its own thread.
    let (done_tx, done_rx) = oneshot::channel();
    let console_agent = Arc::clone(&agent);
    std::thread::spawn(move || {
        let result = console::run(&console_agent, io::stdin().lock(), io::stdout());
        let _ = done_tx.send(result);
    });

    tokio::select! {
        res = server => res??,
        res = done_rx => res.context("console thread exited")??,
    }
    Ok(())
}
