//! `fetch` command: concurrent object requests through the resource cache.

use bytesize::ByteSize;
use futures_util::future::join_all;
use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, info, warn};
use url::Url;

use catalog_core::{AsyncResult, GetError, Resource, ResourceCache, Tagged};

use crate::cli::{FetchArgs, GlobalOpts};
use crate::config::{self, Config, OutputSettings};
use crate::error::CliError;
use crate::http::{self, FetchError, ObjectInfo};
use crate::output;

type ObjectResult = AsyncResult<ObjectInfo, FetchError>;

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct FetchReport {
    objects: Vec<ObjectReport>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct ObjectReport {
    url: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<FetchError>,
}

impl ObjectReport {
    fn new(url: &Url, outcome: &ObjectResult) -> Self {
        let mut report = Self {
            url: url.to_string(),
            state: outcome.tag().name().to_lowercase(),
            status: None,
            bytes: None,
            content_type: None,
            error: None,
        };
        match outcome {
            AsyncResult::Ok(info) => {
                report.status = Some(info.status);
                report.bytes = Some(info.bytes);
                report.content_type.clone_from(&info.content_type);
            }
            AsyncResult::Err(err) => {
                if let FetchError::Status { status, .. } = err {
                    report.status = Some(*status);
                }
                report.error = Some(err.clone());
            }
            AsyncResult::Init | AsyncResult::Pending(_) => {}
        }
        report
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    urls: usize,
    passes: u32,
    requests: u64,
    fetches: u64,
    failed: usize,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl ObjectRow {
    fn new(report: &ObjectReport, color: bool) -> Self {
        let detail = match (&report.error, &report.content_type) {
            (Some(err), _) => err.to_string(),
            (None, Some(content_type)) => content_type.clone(),
            (None, None) => String::new(),
        };
        Self {
            url: report.url.clone(),
            state: output::paint_state(&report.state, report.error.is_none(), color),
            status: report.status.map(|s| s.to_string()).unwrap_or_default(),
            size: report
                .bytes
                .map(|b| ByteSize::b(b).to_string())
                .unwrap_or_default(),
            detail,
        }
    }
}

fn format_report(report: &FetchReport, color: bool) -> String {
    let rows: Vec<ObjectRow> = report
        .objects
        .iter()
        .map(|o| ObjectRow::new(o, color))
        .collect();
    let s = &report.summary;
    format!(
        "{}\n{} requests, {} fetches ({} URLs, {} passes, {} failed)",
        output::render_table(&rows),
        s.requests,
        s.fetches,
        s.urls,
        s.passes,
        s.failed
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: FetchArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let settings = config::output_settings(global, cfg)?;
    let urls = parse_urls(&args.urls)?;
    let timeout = config::fetch_timeout(global, cfg)?;

    let client = http::build_client(timeout, &cfg.fetch.user_agent).map_err(|e| CliError::Client {
        message: e.to_string(),
    })?;
    let resource = http::object_resource(client, timeout);
    let cache = ResourceCache::new(cfg.cache_config());

    info!(urls = urls.len(), repeat = args.repeat, refetch = args.refetch, "fetching objects");
    let mut outcomes = run_pass(&cache, &resource, &urls, args.repeat).await?;
    let mut passes = 1;
    if args.refetch {
        let invalidated = cache.invalidate_resource(&resource);
        debug!(invalidated, "invalidated entries before refetch");
        outcomes = run_pass(&cache, &resource, &urls, args.repeat).await?;
        passes += 1;
    }

    if let Some(sweeper) = cache.shutdown() {
        if let Err(err) = sweeper.await {
            warn!(error = %err, "cache sweeper ended abnormally");
        }
    }

    let stats = cache.stats();
    debug!(?stats, "cache statistics");
    let objects: Vec<ObjectReport> = urls
        .iter()
        .zip(&outcomes)
        .map(|(url, outcome)| ObjectReport::new(url, outcome))
        .collect();
    let failures: Vec<FetchError> = outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            AsyncResult::Err(err) => Some(err),
            _ => None,
        })
        .collect();

    let report = FetchReport {
        summary: Summary {
            urls: urls.len(),
            passes,
            requests: request_count(urls.len(), args.repeat, passes),
            fetches: stats.fetches,
            failed: failures.len(),
        },
        objects,
    };
    print_report(&report, settings)?;

    match failures.into_iter().next() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn print_report(report: &FetchReport, settings: OutputSettings) -> Result<(), CliError> {
    let color = output::should_color(settings.color);
    let out = output::render_single(
        settings.format,
        report,
        |r| format_report(r, color),
        |r| {
            r.objects
                .iter()
                .map(|o| format!("{}\t{}", o.url, o.state))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, settings.quiet);
    Ok(())
}

/// Issue `repeat` concurrent requests per URL; one outcome per URL.
async fn run_pass(
    cache: &ResourceCache,
    resource: &Resource<Url, ObjectInfo, FetchError>,
    urls: &[Url],
    repeat: u32,
) -> Result<Vec<ObjectResult>, CliError> {
    let requests = urls
        .iter()
        .flat_map(|url| (0..repeat).map(move |_| cache.get(resource, url)));
    let results = join_all(requests).await;

    let stride = usize::try_from(repeat).unwrap_or(1).max(1);
    let mut outcomes = Vec::with_capacity(urls.len());
    for (url, result) in urls.iter().zip(results.into_iter().step_by(stride)) {
        let outcome = match result {
            Ok(info) => AsyncResult::Ok(info),
            Err(GetError::Fetch(err)) => {
                warn!(url = %url, error = %err, "fetch failed");
                AsyncResult::Err(err)
            }
            Err(GetError::Cache(err)) => return Err(err.into()),
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn parse_urls(raw: &[String]) -> Result<Vec<Url>, CliError> {
    raw.iter()
        .map(|s| {
            let url = Url::parse(s).map_err(|e| CliError::Validation {
                field: "url".into(),
                reason: format!("'{s}': {e}"),
            })?;
            match url.scheme() {
                "http" | "https" => Ok(url),
                other => Err(CliError::Validation {
                    field: "url".into(),
                    reason: format!("'{s}': unsupported scheme '{other}'"),
                }),
            }
        })
        .collect()
}

fn request_count(urls: usize, repeat: u32, passes: u32) -> u64 {
    u64::try_from(urls).unwrap_or(u64::MAX) * u64::from(repeat) * u64::from(passes)
}
