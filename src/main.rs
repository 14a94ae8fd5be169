use clap::{Parser, Subcommand};
use pagetree::cache::RenderCache;
use pagetree::site::Site;
use pagetree::store::JsonFileStore;
use pagetree::{config, logging, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared flags for commands that take a request path.
#[derive(clap::Args, Clone)]
struct RequestArgs {
    /// URL path to resolve, e.g. /blog/category/rust/
    path: String,

    /// Value of the `page` query parameter for listings
    #[arg(long)]
    page: Option<String>,
}

#[derive(Parser)]
#[command(name = "pagetree")]
#[command(about = "Inspect and render a block-composed page tree")]
#[command(long_about = "\
Inspect and render a block-composed page tree

The site lives in a single JSON document: the page tree, its snippets
(authors, categories, menus, subscribers) and the social settings.

  site.json
  ├── roots       # top-level page ids, in order
  ├── pages       # every page node with its typed payload
  ├── snippets    # authors, categories, menus, subscribers
  └── settings    # social links for the footer

URLs resolve against the live part of the tree: each path segment is
a child slug below the home page, and blog listings add the sub-routes
latest/, subscribe/ and category/<slug>/.

Run 'pagetree gen-config' to generate a documented site.toml.")]
#[command(version)]
struct Cli {
    /// Site document
    #[arg(long, default_value = "site.json", global = true)]
    site: PathBuf,

    /// Directory holding site.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-validate live pages, links and settings
    Check,
    /// Print the page tree
    Tree,
    /// Show what a URL resolves to
    Resolve(RequestArgs),
    /// Render a URL to HTML on stdout
    Render {
        #[command(flatten)]
        request: RequestArgs,

        /// Keep rendered pages in this directory between runs
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check => {
            let site = open_site(&cli.site, &cli.config_dir, cli.verbose)?;
            let report = site.check();
            output::print_check(&report, site.tree());
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        Command::Tree => {
            let site = open_site(&cli.site, &cli.config_dir, cli.verbose)?;
            output::print_tree(site.tree());
        }
        Command::Resolve(request) => {
            let site = open_site(&cli.site, &cli.config_dir, cli.verbose)?;
            let response = site.resolve(&request.path, request.page.as_deref())?;
            output::print_resolve(&response, site.tree(), site.snippets());
        }
        Command::Render { request, cache_dir } => {
            let mut site = open_site(&cli.site, &cli.config_dir, cli.verbose)?;
            let cache = cache_dir.as_deref().map(|dir| Arc::new(RenderCache::load(dir)));
            if let Some(cache) = &cache {
                site.enable_cache(Arc::clone(cache));
            }
            let html = site.render(&request.path, request.page.as_deref())?;
            println!("{}", html);
            if let (Some(cache), Some(dir)) = (&cache, &cache_dir) {
                std::fs::create_dir_all(dir)?;
                cache.save(dir)?;
                eprintln!("{}", output::format_cache_stats(&cache.stats()));
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `site.toml`, start logging, and open the site document.
fn open_site(
    path: &Path,
    config_dir: &Path,
    verbose: bool,
) -> Result<Site<JsonFileStore>, Box<dyn std::error::Error>> {
    let site_config = config::load_config(config_dir)?;
    logging::init_logging(&site_config.logging, verbose)?;
    tracing::debug!(site = %path.display(), "opening site document");
    let store = JsonFileStore::open(path)?;
    Ok(Site::open(store, site_config)?)
}
