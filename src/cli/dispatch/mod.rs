//! Map parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::session;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_secret: session_opts.secret,
        session_ttl_seconds: session_opts.ttl_seconds,
        secure_cookies: session_opts.secure_cookies,
        hash_memory_kib: session_opts.hash_memory_kib,
        hash_iterations: session_opts.hash_iterations,
        hash_parallelism: session_opts.hash_parallelism,
    }))
}
