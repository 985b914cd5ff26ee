use std::{path::PathBuf, sync::Arc};

use chanmirror_config::config::{self, get_config, set_config_path, Config};
use chanmirror_core::{error::MirrorError, MirrorResult};
use chanmirror_dl::{
    http_client::configure_http_client,
    transport::{HttpTransport, Transport},
};
use chanmirror_events::{ChannelSink, EventSinkHandle, NullSink};
use chanmirror_operations::{
    clone::load_upstream, utils::read_packages_list, MirrorContext, SyncMode,
};
use clap::Parser;
use cli::{Action, Args};
use list::list_mirror;
use logging::setup_logging;
use progress::{spawn_event_handler, ProgressGuard};
use sync::sync_packages;
use tracing::{debug, info};
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};
use utils::{default_packages_list, progress_enabled, COLOR, JSON, PROGRESS};
use validate::validate_packages;

mod cli;
mod list;
mod logging;
mod progress;
mod sync;
mod utils;
mod validate;

fn create_context(config: Config, repo_root: PathBuf) -> (MirrorContext, Option<ProgressGuard>) {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport);

    if progress_enabled() {
        let (sink, receiver) = ChannelSink::new();
        let events: EventSinkHandle = Arc::new(sink);
        let ctx = MirrorContext::new(config, events, transport, repo_root);
        let guard = spawn_event_handler(receiver);
        (ctx, Some(guard))
    } else {
        let events: EventSinkHandle = Arc::new(NullSink);
        let ctx = MirrorContext::new(config, events, transport, repo_root);
        (ctx, None)
    }
}

/// Loads the config file and applies the command-line overrides on top of it.
fn load_config(args: &Args) -> MirrorResult<Config> {
    if let Some(ref path) = args.config {
        set_config_path(path)?;
    }
    config::init()?;

    let mut config = get_config();
    if let Some(ref platforms) = args.platforms {
        config.platforms = Some(platforms.clone());
    }
    if let Some(limit) = args.parallel_limit {
        config.parallel_limit = Some(limit);
    }
    if args.no_sha256 {
        config.validate_sha256 = Some(false);
    }
    if let Some(ref user_agent) = args.user_agent {
        config.user_agent = Some(user_agent.clone());
    }
    config.resolve()?;
    Ok(config)
}

fn parse_headers(headers: &[String]) -> MirrorResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for header in headers {
        let (key, value) = header.split_once(':').ok_or_else(|| {
            MirrorError::Custom(format!("Invalid header `{header}`, expected `Key: Value`"))
        })?;
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|err| MirrorError::Custom(format!("Invalid header name `{key}`: {err}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|err| MirrorError::Custom(format!("Invalid header value `{value}`: {err}")))?;
        map.append(name, value);
    }
    Ok(map)
}

fn setup_http_client(args: &Args, config: &Config) -> MirrorResult<()> {
    let proxy = args
        .proxy
        .as_deref()
        .map(Proxy::new)
        .transpose()
        .map_err(|err| MirrorError::Custom(format!("Invalid proxy: {err}")))?;
    let headers = args.header.as_deref().map(parse_headers).transpose()?;
    let user_agent = config.user_agent.clone();
    let timeout = config.get_timeout();

    configure_http_client(|client| {
        if proxy.is_some() {
            client.proxy = proxy;
        }
        if user_agent.is_some() {
            client.user_agent = user_agent;
        }
        if headers.is_some() {
            client.headers = headers;
        }
        client.timeout = timeout;
    });
    Ok(())
}

async fn handle_cli() -> MirrorResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        let mut color = COLOR.write().unwrap();
        *color = false;
    }

    if args.no_progress || args.quiet || args.json {
        let mut progress = PROGRESS.write().unwrap();
        *progress = false;
    }

    if args.json {
        let mut json = JSON.write().unwrap();
        *json = true;
    }

    let config = load_config(&args)?;
    setup_http_client(&args, &config)?;

    let upstream = args
        .upstream_channel
        .clone()
        .unwrap_or_else(|| config.get_upstream_channel());
    debug!(
        action = ?args.action,
        target = %args.target_directory.display(),
        "starting"
    );

    let (ctx, progress_guard) = create_context(config, args.target_directory.clone());

    let result = run_action(&args, ctx, &upstream).await;

    if let Some(guard) = progress_guard {
        guard.finish();
    }
    progress::stop();

    result
}

/// Runs the requested action. The context is consumed so its event sender is gone once this
/// returns and the progress thread can drain and exit.
async fn run_action(args: &Args, ctx: MirrorContext, upstream: &str) -> MirrorResult<()> {
    match args.action {
        Action::Clone | Action::Check => {
            let packages_list = match args.packages_list {
                Some(ref path) => path.clone(),
                None => default_packages_list()?,
            };
            let specs = read_packages_list(&packages_list)?;
            info!(
                "Mirroring {} specs from {} into {}",
                specs.len(),
                upstream,
                ctx.repo_root().display()
            );

            let resolver = load_upstream(&ctx, upstream).await?;
            let ctx = ctx.with_resolver(resolver);
            let mode = if args.action == Action::Check {
                SyncMode::Check
            } else {
                SyncMode::Clone
            };
            sync_packages(&ctx, &specs, mode).await
        }
        Action::Validate => validate_packages(&ctx, false),
        Action::Clean => validate_packages(&ctx, true),
        Action::List => list_mirror(&ctx),
    }
}

#[tokio::main]
async fn main() {
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

    if let Err(err) = handle_cli().await {
        progress::stop();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
