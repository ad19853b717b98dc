use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use filex_api::{FileBackend, RestBackend, RestConfig};
use filex_core::events::{drain, notices};
use filex_core::{
    preview_url, validate_page_size, EntityId, EventSink, ExplorerEvent, ExplorerQuery, FileRecord, FilterForm,
    SortDirection, SortKey,
};
use filex_ops::{BulkRequest, OpsConfig, Orchestrator, Target};
use filex_store::{ExplorerStore, StoreConfig};
use metrics::counter;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "filexctl", version, about = "filex CLI: browse and bulk-manage platform files")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Instance base URL, e.g. https://acme.my.salesforce.com
    #[arg(long = "instance-url", env = "FILEX_INSTANCE_URL", global = true)]
    instance_url: Option<String>,

    /// Bearer token forwarded to the platform
    #[arg(long = "token", env = "FILEX_ACCESS_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// REST path under the instance URL
    #[arg(long = "api-path", env = "FILEX_API_PATH", global = true)]
    api_path: Option<String>,

    /// HTTP timeout per call, in seconds
    #[arg(long = "timeout-secs", env = "FILEX_HTTP_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List one page of files
    Ls {
        /// Free-text search on file names
        #[arg(long = "search")]
        search: Option<String>,
        /// Sort field: CreatedDate, LastModifiedDate, Title, ContentSize, CreatedBy.Name (or created/modified/name/size/creator)
        #[arg(long = "sort", default_value = "CreatedDate")]
        sort: SortKey,
        /// ASC or DESC
        #[arg(long = "dir", default_value = "DESC")]
        dir: SortDirection,
        #[arg(long = "page", default_value_t = 1)]
        page: u32,
        /// 25, 50 or 100 (default: FILEX_PAGE_SIZE or 25)
        #[arg(long = "page-size", value_parser = parse_page_size)]
        page_size: Option<u32>,
        #[arg(long = "type")]
        file_type: Option<String>,
        #[arg(long = "owner")]
        owner_id: Option<String>,
        /// Created on or after (YYYY-MM-DD)
        #[arg(long = "from")]
        created_from: Option<String>,
        /// Created on or before (YYYY-MM-DD)
        #[arg(long = "to")]
        created_to: Option<String>,
        /// Minimum size in KB
        #[arg(long = "min-size")]
        min_size: Option<i64>,
        /// Maximum size in KB
        #[arg(long = "max-size")]
        max_size: Option<i64>,
        /// orphaned, low_usage, lightly_connected or heavy_usage
        #[arg(long = "usage")]
        usage_level: Option<String>,
        /// Only files owned by inactive users
        #[arg(long = "inactive-owners", action = ArgAction::SetTrue)]
        inactive_owners: bool,
        /// Only files with no links
        #[arg(long = "orphaned", action = ArgAction::SetTrue)]
        orphaned: bool,
    },
    /// Share files with a user
    Share {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
        /// User id to share with
        #[arg(long = "user")]
        user: Option<String>,
        /// Display name of a single file; selects the single-item call
        #[arg(long = "name")]
        name: Option<String>,
    },
    /// Transfer ownership of files
    Chown {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
        /// New owner's user id
        #[arg(long = "owner")]
        owner: Option<String>,
        /// Display name of a single file; selects the single-item call
        #[arg(long = "name")]
        name: Option<String>,
    },
    /// Delete files
    Rm {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long = "yes", action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Show where a file is shared or referenced
    Connections { id: String },
    /// Active users (share targets and owners)
    Users,
    /// File types available for filtering
    Types,
    /// File owners available for filtering
    Owners,
    /// Print the preview URL for a content version
    PreviewUrl { version_id: String },
}

fn parse_page_size(s: &str) -> std::result::Result<u32, String> {
    let n = s.parse::<u32>().map_err(|e| e.to_string())?;
    validate_page_size(n).map_err(|e| e.to_string())
}

fn init_tracing() {
    let env = std::env::var("FILEX_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("FILEX_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid FILEX_METRICS_ADDR; expected host:port");
        }
    }
}

fn rest_config(cli: &Cli) -> Result<RestConfig> {
    // flags win over the environment; clap already folds env into the flags
    let mut cfg = match &cli.instance_url {
        Some(url) => RestConfig::new(url.clone()),
        None => RestConfig::from_env()?,
    };
    if let Some(t) = &cli.token { cfg.access_token = Some(t.clone()); }
    if let Some(p) = &cli.api_path { cfg.api_path = p.clone(); }
    if let Some(s) = cli.timeout_secs { cfg.timeout_secs = s; }
    Ok(cfg)
}

/// Human-readable size, two decimals at most.
fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes <= 0 { return "0 Bytes".to_string(); }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

fn print_file_row(f: &FileRecord) {
    let modified = f.last_modified_date.or(f.created_date).map(|d| d.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_else(|| "-".into());
    let usage = f.usage_level.map(|u| u.label()).unwrap_or("-");
    println!(
        "{:<18} {:<36} {:<6} {:>10} {:<20} {:<18} {}",
        f.content_document_id,
        truncate(&f.file_name, 36),
        f.file_type.as_deref().unwrap_or("-"),
        format_size(f.content_size),
        truncate(f.current_owner.as_deref().unwrap_or("-"), 20),
        usage,
        modified
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { return s.to_string(); }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Print queued notices to stderr.
fn flush_notices(rx: &Receiver<ExplorerEvent>) {
    for n in notices(&drain(rx)) {
        eprintln!("{}: {}", n.title, n.message);
    }
}

#[derive(Debug, Clone, Copy)]
enum OptionList { Users, Types, Owners }

async fn print_options(backend: Arc<dyn FileBackend>, which: OptionList, output: Output) -> Result<()> {
    counter!("filexctl_commands_total", 1u64, "cmd" => "options");
    let (sink, rx) = EventSink::channel();
    let store = ExplorerStore::new(backend, OpsConfig::from_env(), StoreConfig::default(), sink);
    let res = match which {
        OptionList::Users => store.user_options().await,
        OptionList::Types => store.file_type_options().await,
        OptionList::Owners => store.owner_options().await,
    };
    flush_notices(&rx);
    // drop the placeholder entry
    let opts: Vec<_> = res?.into_iter().filter(|o| !o.value.is_empty()).collect();
    match output {
        Output::Human => {
            for o in &opts { println!("{:<20} {}", o.value, o.label); }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(&opts)?),
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Run one job with a live progress line on stderr.
async fn run_job(backend: Arc<dyn FileBackend>, req: BulkRequest, output: Output) -> Result<()> {
    let (sink, rx) = EventSink::channel();
    let orch = Arc::new(Orchestrator::new(backend, OpsConfig::from_env()).with_events(sink));
    let mut progress = orch.subscribe();
    let ticker = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = progress.borrow_and_update().clone();
            if p.is_processing {
                let action = p.action.map(|a| a.as_str()).unwrap_or("job");
                eprint!("\r{}: {}/{} ({}%)", action, p.processed, p.total, p.percentage());
            }
        }
    });
    let res = orch.run(req).await;
    ticker.abort();
    eprintln!();
    flush_notices(&rx);
    match res {
        Ok(report) => {
            match output {
                Output::Human => println!("{}", report.message),
                Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "job failed");
            Err(anyhow!(e))
        }
    }
}

fn to_ids(raw: Vec<String>) -> Vec<EntityId> { raw.into_iter().map(EntityId::from).collect() }

/// One named file when exactly one id is given with `--name`, otherwise the id list.
fn target_of(ids: Vec<String>, name: Option<String>) -> Target {
    match (ids.as_slice(), name) {
        ([one], Some(name)) => Target::from_parts(Some(EntityId::new(one.clone())), Some(name), to_ids(ids.clone())),
        _ => Target::Many(to_ids(ids)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    if let Commands::PreviewUrl { version_id } = &cli.command {
        let path = preview_url(version_id);
        let base = cli.instance_url.as_deref().map(|u| u.trim_end_matches('/')).unwrap_or("");
        println!("{}{}", base, path);
        return Ok(());
    }

    let rest = rest_config(&cli)?;
    let host = rest.host().to_string();
    let backend: Arc<dyn FileBackend> = Arc::new(RestBackend::new(rest)?);
    let output = cli.output;

    match cli.command {
        Commands::Ls {
            search,
            sort,
            dir,
            page,
            page_size,
            file_type,
            owner_id,
            created_from,
            created_to,
            min_size,
            max_size,
            usage_level,
            inactive_owners,
            orphaned,
        } => {
            counter!("filexctl_commands_total", 1u64, "cmd" => "ls");
            let cfg = StoreConfig { show_orphaned_only: orphaned, host, ..StoreConfig::from_env() };
            let form = FilterForm {
                search_term: search.unwrap_or_default(),
                file_type: file_type.unwrap_or_default(),
                owner_id: owner_id.unwrap_or_default(),
                created_date_from: created_from.unwrap_or_default(),
                created_date_to: created_to.unwrap_or_default(),
                min_size,
                max_size,
                usage_level: usage_level.unwrap_or_default(),
                inactive_owners,
            };
            let query = ExplorerQuery {
                search_term: form.search_term.clone(),
                filters: form.active(),
                page_number: page.max(1),
                page_size: page_size.unwrap_or(cfg.page_size),
                sort_by: sort,
                sort_direction: dir,
            };
            info!(page = query.page_number, size = query.page_size, sort = sort.as_str(), "ls invoked");
            let (sink, rx) = EventSink::channel();
            let mut store = ExplorerStore::new(backend, OpsConfig::from_env(), cfg, sink).with_query(query);
            let loaded = store.load().await;
            flush_notices(&rx);
            loaded?;
            let snap = store.page();
            match output {
                Output::Human => {
                    if snap.items.is_empty() {
                        println!("{}", snap.empty_message());
                    } else {
                        println!("{:<18} {:<36} {:<6} {:>10} {:<20} {:<18} {}", "ID", "NAME", "TYPE", "SIZE", "OWNER", "USAGE", "MODIFIED");
                        for f in &snap.items { print_file_row(f); }
                    }
                    let w = snap.window();
                    println!("{}  (page {} of {})", w.info(), w.page_number, w.total_pages());
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&*snap)?),
            }
        }
        Commands::Share { ids, user, name } => {
            counter!("filexctl_commands_total", 1u64, "cmd" => "share");
            run_job(backend, BulkRequest::share(target_of(ids, name), user), output).await?;
        }
        Commands::Chown { ids, owner, name } => {
            counter!("filexctl_commands_total", 1u64, "cmd" => "chown");
            run_job(backend, BulkRequest::reassign(target_of(ids, name), owner), output).await?;
        }
        Commands::Rm { ids, yes } => {
            counter!("filexctl_commands_total", 1u64, "cmd" => "rm");
            if !yes && !confirm(&filex_store::delete_confirm_text(ids.len()))? {
                eprintln!("aborted");
                return Ok(());
            }
            run_job(backend, BulkRequest::delete(to_ids(ids)), output).await?;
        }
        Commands::Connections { id } => {
            counter!("filexctl_commands_total", 1u64, "cmd" => "connections");
            let (sink, rx) = EventSink::channel();
            let store = ExplorerStore::new(backend, OpsConfig::from_env(), StoreConfig { host, ..StoreConfig::default() }, sink);
            let res = store.connections(&EntityId::new(id)).await;
            flush_notices(&rx);
            let views = res?;
            match output {
                Output::Human => {
                    if views.is_empty() { println!("No connections"); }
                    for v in &views {
                        let c = &v.connection;
                        let link = match (&c.url, v.link) {
                            (Some(u), Some(t)) => format!("{} ({:?})", u, t),
                            _ => "-".to_string(),
                        };
                        println!("{:<18} {:<30} {:<12} {:<12} {}", c.linked_entity_id, truncate(&c.entity_name, 30), c.entity_type.as_deref().unwrap_or("-"), v.share_label, link);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&views)?),
            }
        }
        Commands::Users => print_options(backend, OptionList::Users, output).await?,
        Commands::Types => print_options(backend, OptionList::Types, output).await?,
        Commands::Owners => print_options(backend, OptionList::Owners, output).await?,
        Commands::PreviewUrl { .. } => bail!("preview-url is handled before connecting"),
    }
    Ok(())
}
