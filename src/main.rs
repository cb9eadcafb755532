use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use estate_sync::api::{
  Article, Attachment, FieldValue, HttpTransport, MutationRequest, Property, ReferenceEntity,
  Transport,
};
use estate_sync::cache::{
  CacheSource, DurableStore, NoopStore, ReferenceCache, ReferenceDomain, SqliteStore, SystemClock,
};
use estate_sync::config::{CacheConfig, Config};
use estate_sync::{Collection, ListParams};

/// Environment variable holding the tracing filter directives.
const LOG_ENV: &str = "ESTATE_SYNC_LOG";

#[derive(Parser, Debug)]
#[command(name = "estate-sync")]
#[command(about = "Fetch and edit listings and articles from the estate backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/estate-sync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the account type table
  AccountTypes {
    /// Bypass fresh cached copies
    #[arg(long)]
    refresh: bool,
    /// Leave out the administrator type
    #[arg(long)]
    exclude_admin: bool,
  },
  /// Drop the cached account type table
  CacheClear,
  /// List properties
  Properties {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    size: Option<u32>,
    #[arg(long)]
    sort: Option<String>,
  },
  /// Show one property
  Property { id: u64 },
  /// List articles
  Articles {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    size: Option<u32>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    status: Option<String>,
  },
  /// Show one article
  Article { id: u64 },
  /// Update fields of an article
  ArticleUpdate {
    id: u64,
    #[command(flatten)]
    fields: FieldArgs,
  },
  /// Create an article
  ArticleCreate {
    #[command(flatten)]
    fields: FieldArgs,
  },
}

#[derive(clap::Args, Debug)]
struct FieldArgs {
  /// Scalar field, repeatable
  #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_pair)]
  set: Vec<(String, String)>,
  /// List field with comma-separated items, repeatable
  #[arg(long = "list", value_name = "KEY=A,B", value_parser = parse_pair)]
  list: Vec<(String, String)>,
  /// File attachment, repeatable
  #[arg(long = "attach", value_name = "NAME=PATH", value_parser = parse_pair)]
  attach: Vec<(String, String)>,
}

impl FieldArgs {
  fn into_request(self) -> Result<MutationRequest> {
    let mut request = MutationRequest::new();
    for (name, value) in self.set {
      request = request.field(name, parse_scalar(&value));
    }
    for (name, value) in self.list {
      let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect();
      request = request.field(name, FieldValue::List(items));
    }
    for (name, path) in self.attach {
      request = request.attach(name, read_attachment(Path::new(&path))?);
    }
    Ok(request)
  }
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
  }
}

/// Booleans and plain integers keep their type; everything else is text.
fn parse_scalar(value: &str) -> FieldValue {
  match value {
    "true" => FieldValue::Bool(true),
    "false" => FieldValue::Bool(false),
    _ => match value.parse::<i64>() {
      Ok(n) if n.to_string() == value => FieldValue::Integer(n),
      _ => FieldValue::Text(value.to_string()),
    },
  }
}

fn read_attachment(path: &Path) -> Result<Attachment> {
  let bytes =
    std::fs::read(path).map_err(|e| eyre!("Failed to read attachment {}: {}", path.display(), e))?;
  let file_name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .ok_or_else(|| eyre!("Attachment path has no file name: {}", path.display()))?;

  let attachment = Attachment::new(file_name, bytes);
  Ok(match content_type_for(path) {
    Some(content_type) => attachment.with_content_type(content_type),
    None => attachment,
  })
}

fn content_type_for(path: &Path) -> Option<&'static str> {
  let ext = path.extension()?.to_str()?.to_ascii_lowercase();
  match ext.as_str() {
    "jpg" | "jpeg" => Some("image/jpeg"),
    "png" => Some("image/png"),
    "webp" => Some("image/webp"),
    "gif" => Some("image/gif"),
    "pdf" => Some("application/pdf"),
    _ => None,
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountTypesOutput {
  source: CacheSource,
  fetched_at: DateTime<Utc>,
  data: Vec<ReferenceEntity>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = init_logging(config.log_dir.as_deref());
  match &config.source {
    Some(path) => tracing::debug!(path = %path.display(), "loaded config"),
    None => tracing::debug!("no config file found, using defaults"),
  }

  run(args.command, &config).await
}

fn init_logging(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
  use tracing_subscriber::{fmt, prelude::*, EnvFilter};

  let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
  let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "estate-sync.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      (
        Some(fmt::layer().with_ansi(false).with_writer(writer)),
        Some(guard),
      )
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(env_filter)
    .with(stderr_layer)
    .with(file_layer)
    .init();

  guard
}

fn open_store(config: &CacheConfig) -> Result<Arc<dyn DurableStore>> {
  if !config.enabled {
    return Ok(Arc::new(NoopStore));
  }
  let store = match &config.path {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open()?,
  };
  Ok(Arc::new(store))
}

async fn run(command: Command, config: &Config) -> Result<()> {
  let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
    &config.api.base_url,
    config.api.timeout(),
  )?);
  let ordering = config.sync.load_ordering;

  match command {
    Command::AccountTypes {
      refresh,
      exclude_admin,
    } => {
      let cache = reference_cache(config, transport)?;
      let result = if exclude_admin {
        cache
          .get_excluding(estate_sync::cache::ADMIN_ACCOUNT_TYPE_ID, refresh)
          .await?
      } else {
        cache.get(refresh).await?
      };
      print_json(&AccountTypesOutput {
        source: result.source,
        fetched_at: result.fetched_at,
        data: result.data,
      })
    }
    Command::CacheClear => {
      let cache = reference_cache(config, transport)?;
      cache.invalidate();
      tracing::info!(key = %cache.domain().storage_key, "reference cache cleared");
      Ok(())
    }
    Command::Properties { page, size, sort } => {
      let properties: Collection<Property> = Collection::new(transport).with_ordering(ordering);
      let params = ListParams {
        page,
        size,
        sort,
        ..ListParams::default()
      };
      properties.load_all(&params).await?;
      print_records(&properties.snapshot().items)
    }
    Command::Property { id } => {
      let properties: Collection<Property> = Collection::new(transport);
      print_json(&properties.load_one(id).await?)
    }
    Command::Articles {
      page,
      size,
      category,
      status,
    } => {
      let articles: Collection<Article> = Collection::new(transport).with_ordering(ordering);
      let params = ListParams {
        page,
        size,
        category,
        status,
        ..ListParams::default()
      };
      articles.load_all(&params).await?;
      print_records(&articles.snapshot().items)
    }
    Command::Article { id } => {
      let articles: Collection<Article> = Collection::new(transport);
      print_json(&articles.load_one(id).await?)
    }
    Command::ArticleUpdate { id, fields } => {
      let articles: Collection<Article> = Collection::new(transport);
      print_json(&articles.apply_update(id, fields.into_request()?).await?)
    }
    Command::ArticleCreate { fields } => {
      let articles: Collection<Article> = Collection::new(transport);
      print_json(&articles.apply_create(fields.into_request()?).await?)
    }
  }
}

fn reference_cache(config: &Config, transport: Arc<dyn Transport>) -> Result<ReferenceCache> {
  let store = open_store(&config.cache)?;
  Ok(
    ReferenceCache::new(
      ReferenceDomain::account_types(),
      store,
      transport,
      Arc::new(SystemClock),
    )
    .with_ttl(config.cache.ttl()),
  )
}

fn print_records<R: Serialize>(items: &[Arc<R>]) -> Result<()> {
  let records: Vec<&R> = items.iter().map(Arc::as_ref).collect();
  print_json(&records)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  let json =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", json);
  Ok(())
}
