use std::sync::Arc;

use clap::Parser;
use cli::{Args, Commands};
use keel_config::config::Config;
use keel_dl::http_client::configure_http_client;
use keel_events::{ChannelSink, EventSinkHandle};
use keel_operations::KeelContext;
use logging::setup_logging;
use progress::spawn_event_handler;
use tracing::{debug, warn};
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};

mod backend;
mod cli;
mod create_repo;
mod logging;
mod progress;
mod search;
mod sync;
mod utils;

fn parse_headers(headers: &[String]) -> HeaderMap {
    headers
        .iter()
        .filter_map(|header| {
            let (key, value) = header.split_once(':')?;
            let parsed = (
                key.trim().parse::<HeaderName>(),
                value.trim().parse::<HeaderValue>(),
            );
            match parsed {
                (Ok(key), Ok(value)) => Some((key, value)),
                _ => {
                    warn!("Ignoring invalid header '{header}'");
                    None
                }
            }
        })
        .collect()
}

fn configure_transport(args: &Args) -> miette::Result<()> {
    let proxy = match args.proxy.as_deref() {
        Some(proxy) => {
            Some(
                Proxy::new(proxy)
                    .map_err(|err| miette::miette!("Invalid proxy '{proxy}': {err}"))?,
            )
        }
        None => None,
    };
    let user_agent = args.user_agent.clone();
    let headers = args.header.as_deref().map(parse_headers);

    configure_http_client(|config| {
        if proxy.is_some() {
            config.proxy = proxy;
        }
        if let Some(user_agent) = user_agent {
            config.user_agent = Some(user_agent);
        }
        if headers.is_some() {
            config.headers = headers;
        }
    });
    Ok(())
}

fn handle_cli() -> miette::Result<()> {
    let args = Args::parse();

    setup_logging(&args);
    utils::set_color(!args.no_color);
    configure_transport(&args)?;

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::new()?,
    };
    debug!(
        repositories = config.repositories.len(),
        "configuration loaded"
    );

    let (sink, receiver) = ChannelSink::new();
    let events: EventSinkHandle = Arc::new(sink);
    let ctx = KeelContext::new(config, events);
    let guard = spawn_event_handler(receiver);

    let result = match &args.command {
        Commands::Sync {
            force,
        } => sync::sync(&ctx, *force).map_err(Into::into),
        Commands::Search(search_args) => search::search(&ctx, search_args).map_err(Into::into),
        Commands::CreateRepo(create_args) => {
            create_repo::create_repo(&ctx, create_args).map_err(Into::into)
        }
    };

    // Drop the context first to close the event channel, then drain it.
    drop(ctx);
    guard.finish();
    result
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers_skips_invalid() {
        let headers = parse_headers(&[
            "X-Token: abc".to_string(),
            "no-separator".to_string(),
            "Bad Name: value".to_string(),
        ]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-token").unwrap(), "abc");
    }
}
