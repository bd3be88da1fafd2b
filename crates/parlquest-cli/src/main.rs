use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use parlquest::dispatch::parse_document;
use parlquest::export::{
    CsvExporter, ExportChain, ExportFormat, FlatFileExporter, JsonExporter, StoreExporter,
};
use parlquest::store::{LocalStore, Store};
use parlquest::themes::ingest::{
    LevelRow, aggregate_totals, compact_levels, import_forest, load_level_table,
};
use parlquest::themes::{ROOT_LEVEL, ThemeTree};
use parlquest::utils::{HarvestRequest, extract_question_id};
use parlquest::{Config, Fetch, Harvester, QuestionId, WebScraper};

#[derive(Parser)]
#[command(name = "parlquest")]
#[command(about = "An Assemblée nationale parliamentary question harvester", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        short = 'c',
        long = "config",
        default_value = "parlquest.toml",
        global = true,
        help = "Path to the TOML configuration file"
    )]
    config: PathBuf,

    #[arg(
        long = "store",
        global = true,
        help = "Store directory, overriding storage.root"
    )]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl search results and harvest every question not already stored
    Harvest {
        #[arg(help = "Legislature to crawl; every configured legislature when omitted")]
        legislature: Option<u8>,

        #[arg(
            long,
            help = "Documents per result page",
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        per_page: Option<u32>,

        #[arg(
            long,
            value_name = "URL",
            requires = "legislature",
            help = "Resume from a result page URL carrying an (offset) segment"
        )]
        resume_url: Option<String>,

        #[arg(long, help = "Restrict the crawl to one topic (rubrique)")]
        theme: Option<String>,

        #[arg(
            long,
            value_parser = parse_export_format,
            help = "Export destination: store, json, flat or csv"
        )]
        format: Option<ExportFormat>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        output: OutputFormat,
    },
    /// Fetch and parse a single question page
    Question {
        #[arg(help = "Question identifier (e.g. 14-78012QE) or page URL")]
        target: String,

        #[arg(long, help = "Legislature selecting the parser, taken from the identifier by default")]
        legislature: Option<u8>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        output: OutputFormat,
    },
    /// Count questions filed under a topic across legislatures
    ByTheme {
        #[arg(help = "Topic name as used by the search form")]
        theme: String,

        #[arg(long, default_value_t = 5, help = "Document URLs to keep per legislature")]
        per_legislature: usize,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        output: OutputFormat,
    },
    /// Manage the topic hierarchy
    Themes {
        #[command(subcommand)]
        action: ThemeCommands,
    },
}

#[derive(Subcommand)]
enum ThemeCommands {
    /// Import a nested hierarchy JSON file into the store
    Import {
        #[arg(help = "JSON file holding a list of {name, level, total, children} trees")]
        file: PathBuf,
    },
    /// Build the nested hierarchy from four level tables and print it
    Compact {
        #[arg(
            num_args = 4,
            value_names = ["LEVEL0", "LEVEL1", "LEVEL2", "LEVEL3"],
            help = "CSV files (header row, then name and parent columns) or JSON {name, parent} rows, leaves first"
        )]
        levels: Vec<PathBuf>,

        #[arg(long, help = "Also import the compacted hierarchy into the store")]
        import: bool,
    },
    /// Recompute every topic's question total from the stored questions
    Aggregate,
    /// Find the ancestor of a topic at a given level
    Resolve {
        name: String,

        #[arg(long, default_value_t = 0, help = "Level of the named topic")]
        level: u8,

        #[arg(long, default_value_t = ROOT_LEVEL, help = "Level to climb to")]
        stop: u8,
    },
    /// List every fine-grained label accepted under coarse labels
    Accepted {
        #[arg(required = true)]
        labels: Vec<String>,

        #[arg(long, default_value_t = 1, help = "Level of the coarse labels")]
        level: u8,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        output: OutputFormat,
    },
    /// Print the stored hierarchy, or the subtree of one topic
    Tree {
        #[arg(long, help = "Topic name whose subtree to print")]
        name: Option<String>,

        #[arg(long, default_value_t = ROOT_LEVEL, help = "Level of the named topic")]
        level: u8,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        output: OutputFormat,
    },
}

fn parse_export_format(s: &str) -> Result<ExportFormat, String> {
    ExportFormat::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        log::error!("Error reading {}: {}", path.display(), e);
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        log::error!("Error parsing {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn print_tree(tree: &ThemeTree, depth: usize) {
    println!(
        "{}{} (level {}, {} questions)",
        "  ".repeat(depth),
        tree.name,
        tree.level,
        tree.total
    );
    for child in &tree.children {
        print_tree(child, depth + 1);
    }
}

fn build_scraper(config: &Config) -> WebScraper {
    WebScraper::new(&config.http).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let mut config = Config::load_or_default(&cli.config).unwrap_or_else(|e| {
        log::error!("Error loading config: {}", e);
        process::exit(1);
    });
    if let Some(root) = cli.store {
        config.storage.root = root;
    }
    let store = LocalStore::new(&config.storage.root);

    match cli.command {
        Commands::Harvest {
            legislature,
            per_page,
            resume_url,
            theme,
            format,
            output,
        } => {
            let scraper = build_scraper(&config);
            let per_page = per_page.unwrap_or(config.search.documents_per_page);
            let format = format.unwrap_or(config.storage.export_format);

            let root = config.storage.root.clone();
            let exporter = match format {
                ExportFormat::Store => ExportChain::new().with(StoreExporter::new(&store)),
                ExportFormat::Json => ExportChain::new()
                    .with(StoreExporter::new(&store))
                    .with(JsonExporter::new(root.join("export"))),
                ExportFormat::Flat => ExportChain::new()
                    .with(StoreExporter::new(&store))
                    .with(FlatFileExporter::new(root.join("questions.jsonl"))),
                ExportFormat::Csv => ExportChain::new()
                    .with(StoreExporter::new(&store))
                    .with(CsvExporter::new(root.join("questions.csv"))),
            };
            let harvester =
                Harvester::new(&scraper, &store, &exporter, config.search.search_url.clone());

            let all_stats = match legislature {
                Some(legislature) => {
                    let mut request = HarvestRequest::new(legislature, per_page);
                    request.resume_url = resume_url;
                    request.theme = theme;

                    log::info!("Harvesting legislature {} into {}...", legislature, format);
                    let stats = harvester.harvest(request).await.unwrap_or_else(|e| {
                        log::error!("Invalid args: {e}");
                        process::exit(1);
                    });
                    vec![stats]
                }
                None => {
                    if theme.is_some() {
                        log::warn!("--theme only applies to a single legislature, ignoring it");
                    }
                    let range = config.search.first_legislature..=config.search.last_legislature;
                    log::info!("Harvesting legislatures {:?} into {}...", range, format);
                    harvester.harvest_range(range, per_page).await
                }
            };

            match output {
                OutputFormat::Json => serialize_json(&all_stats),
                OutputFormat::Text => {
                    for stats in &all_stats {
                        print!("{}", stats);
                    }
                }
            }
        }

        Commands::Question {
            target,
            legislature,
            output,
        } => {
            let raw_id = if target.starts_with("http") {
                extract_question_id(&target).unwrap_or_else(|| {
                    log::error!("No question identifier in {}", target);
                    process::exit(1);
                })
            } else {
                target.as_str()
            };
            let id = QuestionId::from_str(raw_id).unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });
            let url = if target.starts_with("http") {
                target.clone()
            } else {
                id.document_url()
            };
            let legislature = legislature.unwrap_or(id.legislature());

            log::info!("Fetching question from {}...", url);
            let scraper = build_scraper(&config);
            let html = scraper.get(&url).await.unwrap_or_else(|e| {
                log::error!("Error fetching question: {}", e);
                process::exit(1);
            });
            let question = parse_document(&html, &id, legislature).unwrap_or_else(|e| {
                log::error!("Error parsing question: {}", e);
                process::exit(1);
            });

            match output {
                OutputFormat::Json => serialize_json(&question),
                OutputFormat::Text => println!("{}", question),
            }
        }

        Commands::ByTheme {
            theme,
            per_legislature,
            output,
        } => {
            let scraper = build_scraper(&config);
            let exporter = StoreExporter::new(&store);
            let harvester =
                Harvester::new(&scraper, &store, &exporter, config.search.search_url.clone());

            log::info!("Searching questions filed under {}...", theme);
            let summary = harvester
                .questions_by_theme(&theme, per_legislature, config.search.documents_per_page)
                .await;

            match output {
                OutputFormat::Json => serialize_json(&summary),
                OutputFormat::Text => print!("{}", summary),
            }
        }

        Commands::Themes { action } => run_theme_command(action, &store),
    }
}

fn run_theme_command(action: ThemeCommands, store: &dyn Store) {
    match action {
        ThemeCommands::Import { file } => {
            let forest: Vec<ThemeTree> = read_json(&file);
            let count = import_forest(store, &forest).unwrap_or_else(|e| {
                log::error!("Error importing themes: {}", e);
                process::exit(1);
            });
            println!("Imported {} themes.", count);
        }

        ThemeCommands::Compact { levels, import } => {
            let tables: [Vec<LevelRow>; 4] = [0, 1, 2, 3].map(|level| {
                let path = &levels[level];
                load_level_table(path).unwrap_or_else(|e| {
                    log::error!("Error reading {}: {}", path.display(), e);
                    process::exit(1);
                })
            });
            let forest = compact_levels(&tables);
            if import {
                import_forest(store, &forest).unwrap_or_else(|e| {
                    log::error!("Error importing themes: {}", e);
                    process::exit(1);
                });
            }
            serialize_json(&forest);
        }

        ThemeCommands::Aggregate => {
            let updated = aggregate_totals(store).unwrap_or_else(|e| {
                log::error!("Error aggregating totals: {}", e);
                process::exit(1);
            });
            println!("Updated {} theme totals.", updated);
        }

        ThemeCommands::Resolve { name, level, stop } => {
            let ancestor = store
                .get_theme(&name, level)
                .and_then(|theme| store.get_parent_theme(&theme.unique_identifier, stop))
                .unwrap_or_else(|e| {
                    log::error!("Error resolving {}: {}", name, e);
                    process::exit(1);
                });
            println!("{}", ancestor);
        }

        ThemeCommands::Accepted {
            labels,
            level,
            output,
        } => {
            let coarse = labels.iter().map(String::as_str).collect::<Vec<_>>();
            let accepted = store
                .hierarchy()
                .and_then(|h| h.accepted_labels(&coarse, level).map_err(Into::into))
                .unwrap_or_else(|e| {
                    log::error!("Error collecting labels: {}", e);
                    process::exit(1);
                });

            match output {
                OutputFormat::Json => serialize_json(&accepted),
                OutputFormat::Text => {
                    if accepted.is_empty() {
                        println!("No labels to display.");
                    }
                    for label in &accepted {
                        println!("{}", label);
                    }
                }
            }
        }

        ThemeCommands::Tree {
            name,
            level,
            output,
        } => {
            let trees = match name {
                Some(name) => store
                    .get_theme(&name, level)
                    .and_then(|theme| store.get_subthemes(&theme.unique_identifier)),
                None => store.hierarchy().map(|h| h.trees()),
            }
            .unwrap_or_else(|e| {
                log::error!("Error reading themes: {}", e);
                process::exit(1);
            });

            match output {
                OutputFormat::Json => serialize_json(&trees),
                OutputFormat::Text => {
                    if trees.is_empty() {
                        println!("No themes to display.");
                    }
                    for tree in &trees {
                        print_tree(tree, 0);
                    }
                }
            }
        }
    }
}
