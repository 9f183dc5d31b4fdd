use mangarock_api::requests::manga::Manga;
use mangarock_api::storage::chapter_dir_name;
use mangarock_api::{
    convert_dir, BatchReport, ClientConfig, ConvertOptions, DownloadOptions, FailurePolicy,
    MangaRockClient,
};

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "mrdl",
    version,
    about = "CLI tool to browse mangarock and download chapters as PNG pages"
)]
struct Arguments {
    #[command(flatten)]
    client: ClientArgs,
    #[arg(long, help = "append logs to this file instead of printing them")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ClientArgs {
    #[arg(long, env = "MANGAROCK_API_URL", default_value = MangaRockClient::API_URL)]
    api_url: String,
    #[arg(long, env = "MANGAROCK_META_URL", default_value = MangaRockClient::META_URL)]
    meta_url: String,
    #[arg(long, default_value_t = 30, help = "request timeout in seconds")]
    timeout_secs: u64,
    #[arg(
        long = "option",
        value_parser = parse_key_val,
        help = "extra query parameter sent with every api request, e.g. country=Japan"
    )]
    options: Vec<(String, String)>,
}

impl ClientArgs {
    fn into_config(self) -> ClientConfig {
        ClientConfig::builder()
            .api_url(self.api_url)
            .meta_url(self.meta_url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .options(self.options.into_iter().collect::<BTreeMap<_, _>>())
            .build()
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search series by keywords
    Search { query: String },
    /// List the latest updated series
    Latest,
    /// Show a manga and its chapters
    Manga { id: String },
    /// Show an author and their series
    Author { id: String },
    /// Download the pages of a chapter
    Download {
        manga_id: String,
        chapter_id: String,
        #[arg(short, long, default_value = ".", help = "destination folder")]
        path: PathBuf,
        #[arg(short, long, default_value_t = 1, help = "pages fetched at the same time")]
        concurrency: usize,
        #[arg(long, help = "keep downloading when a page fails")]
        keep_going: bool,
        #[arg(long, help = "convert the downloaded pages to png")]
        convert: bool,
    },
    /// Convert every .mri file of a folder to png
    Convert {
        dir: PathBuf,
        #[arg(long, help = "keep converting when a file fails")]
        keep_going: bool,
    },
    /// Stream a single page to a file
    Fetch {
        url: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = std::fs::File::options()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();

            Ok(Some(guard))
        }
        None => {
            registry.with(fmt::layer().compact()).init();

            Ok(None)
        }
    }
}

fn policy(keep_going: bool) -> FailurePolicy {
    if keep_going {
        FailurePolicy::CollectAll
    } else {
        FailurePolicy::AbortOnFirst
    }
}

fn check_report(what: &str, report: &BatchReport) -> anyhow::Result<()> {
    let failed = report.errors().count();

    for (index, e) in report.errors() {
        tracing::error!("{what} {index} failed: {e}");
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} {what}s failed", report.len());
    }

    Ok(())
}

fn print_manga(manga: &Manga) {
    let author = manga
        .author
        .as_ref()
        .map(|author| author.name.as_str())
        .unwrap_or("unknown author");

    println!("{}  {} ({author})", manga.id, manga.name);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();

    let _guard = init_tracing(args.log_file.as_deref())?;

    let client = MangaRockClient::with_config(args.client.into_config())?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping");
                cancel.cancel();
            }
        }
    });

    match args.command {
        Command::Search { query } => {
            let ids = client.search(&query).await?;

            for manga in client.mangas(&ids).await? {
                print_manga(&manga);
            }
        }
        Command::Latest => {
            for manga in client.latest().await? {
                print_manga(&manga);
            }
        }
        Command::Manga { id } => {
            let manga = client.manga(&id).await?;

            print_manga(&manga.manga);
            println!("{}\n", manga.description);

            for chapter in &manga.chapters {
                println!("{:>5}  {}  {}", chapter.order, chapter.id, chapter.name);
            }
        }
        Command::Author { id } => {
            let (author, mangas) = client.author(&id).await?;

            println!("{}  {}", author.id, author.name);
            for manga in &mangas {
                print_manga(manga);
            }
        }
        Command::Download {
            manga_id,
            chapter_id,
            path,
            concurrency,
            keep_going,
            convert,
        } => {
            let chapter = client.chapter(&manga_id, &chapter_id).await?;

            let dir = path.join(chapter_dir_name(&chapter));
            println!("Download {} into {}", chapter.name, dir.display());

            let options = DownloadOptions::builder()
                .concurrency(concurrency)
                .policy(policy(keep_going))
                .cancel(cancel.clone())
                .build();

            let report = client.download_chapter(&chapter, &dir, &options).await?;
            check_report("page", &report)?;

            if convert {
                println!("Converting pages...");

                let options = ConvertOptions::builder()
                    .policy(policy(keep_going))
                    .cancel(cancel)
                    .build();

                let report = convert_dir(&dir, &options).await?;
                check_report("file", &report)?;
            }

            println!("Done.");
        }
        Command::Convert { dir, keep_going } => {
            let options = ConvertOptions::builder()
                .policy(policy(keep_going))
                .cancel(cancel)
                .build();

            let report = convert_dir(&dir, &options).await?;
            check_report("file", &report)?;

            println!("Converted {} files.", report.written().count());
        }
        Command::Fetch { url, output } => {
            let written = client.fetch_page_to_file(&url, &output, &cancel).await?;

            println!("Saved {written} bytes to {}", output.display());
        }
    }

    Ok(())
}
