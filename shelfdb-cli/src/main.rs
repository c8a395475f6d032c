use clap::{Parser, Subcommand, ValueEnum};
use shelfdb::lookup::{Candidate, GoogleBooksClient, MetadataLookup};
use shelfdb::{
    BookInput, BookRecord, BookUpdate, DeleteOutcome, FilterField, RecordFilter,
    RecordSelector, ShelfDbError, SortKey, SortOrder, Store,
};
use std::io::{BufRead, Write};
use std::process;

/// Results shown by `browse`
const BROWSE_RESULTS: usize = 10;

/// shelfdb CLI — manage a personal library stored as genre/author/year folders
#[derive(Parser)]
#[command(name = "shelfdb", version, about)]
struct Cli {
    /// Path to the library root directory
    #[arg(long, default_value = "data")]
    data_dir: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    /// Entry mode: type books in by hand, or pick them from the remote catalog
    #[arg(long, default_value = "manual")]
    mode: Mode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Manual,
    Lookup,
}

#[derive(Subcommand)]
enum Command {
    /// Add a new book
    Add {
        /// Genre (manual mode)
        #[arg(long)]
        genre: Option<String>,
        /// Author (manual mode)
        #[arg(long)]
        author: Option<String>,
        /// Publication year (manual mode)
        #[arg(long)]
        year: Option<String>,
        /// Title (manual mode)
        #[arg(long)]
        title: Option<String>,
        /// Page count (manual mode)
        #[arg(long)]
        pages: Option<String>,
        /// Free-text search (lookup mode)
        #[arg(long)]
        query: Option<String>,
        /// 1-based result to save (lookup mode); omit to only show results
        #[arg(long)]
        pick: Option<usize>,
    },

    /// Show remote catalog results without saving anything (lookup mode)
    Browse {
        /// Topic to search for
        query: Option<String>,
    },

    /// List books, optionally with a fuzzy filter
    List {
        /// Filter on title, author or genre (e.g. --filter author=asimov)
        #[arg(long = "filter", value_parser = parse_filter)]
        filter: Option<(FilterField, String)>,
    },

    /// Change the title and/or page count of a book
    Update {
        /// Index from `list`, or an id genre/author/title
        selector: String,
        /// New title (empty keeps the current one)
        #[arg(long)]
        title: Option<String>,
        /// New page count (empty keeps the current one)
        #[arg(long)]
        pages: Option<String>,
    },

    /// Delete a book
    Delete {
        /// Index from `list`, or an id genre/author/title
        selector: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show all books ordered by one or two keys (title, pages, genre, author, year)
    Sort {
        /// Primary sort key
        primary: SortKey,
        /// Secondary sort key for ties
        #[arg(long)]
        then: Option<SortKey>,
        /// Sort in descending order
        #[arg(long)]
        desc: bool,
        /// Show at most this many books
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show library statistics
    Stats,
}

fn parse_filter(s: &str) -> Result<(FilterField, String), String> {
    let pos = s.find('=').ok_or_else(|| {
        format!("Invalid field=value filter: no '=' found in '{s}'")
    })?;
    let field: FilterField = s[..pos].parse()?;
    Ok((field, s[pos + 1..].to_string()))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(exit_code(e.as_ref()));
    }
}

/// 2 when the user can fix the input and retry, 1 for everything else
fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    match err.downcast_ref::<ShelfDbError>() {
        Some(e) if e.is_recoverable() => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    log::debug!("Opening library at {}", cli.data_dir);
    let store = Store::open(&cli.data_dir)?;

    match cli.command {
        Command::Add {
            genre,
            author,
            year,
            title,
            pages,
            query,
            pick,
        } => match cli.mode {
            Mode::Manual => {
                let input = BookInput {
                    genre: genre.unwrap_or_default(),
                    author: author.unwrap_or_default(),
                    year: year.unwrap_or_default(),
                    title: title.unwrap_or_default(),
                    page_count: pages.unwrap_or_default(),
                };
                let record = store.create(&input)?;
                print_output(&record_json(None, &record), &cli.format)?;
            }
            Mode::Lookup => {
                let query = query.ok_or("--query is required in lookup mode")?;
                let client = GoogleBooksClient::new(&store.config().lookup)?;
                let candidates = client.search(&query, store.config().lookup.max_results)?;

                match pick {
                    None => print_output(&candidates_json(&candidates), &cli.format)?,
                    Some(n) => {
                        let candidate = n
                            .checked_sub(1)
                            .and_then(|i| candidates.get(i))
                            .ok_or_else(|| {
                                format!("--pick must be between 1 and {}", candidates.len())
                            })?;
                        let record = store.create(&candidate.to_input())?;
                        print_output(&record_json(None, &record), &cli.format)?;
                    }
                }
            }
        },

        Command::Browse { query } => {
            if cli.mode != Mode::Lookup {
                return Err("browse is only available with --mode lookup".into());
            }
            let query = query
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| "books".to_string());
            let client = GoogleBooksClient::new(&store.config().lookup)?;
            let candidates = client.search(&query, BROWSE_RESULTS)?;
            print_output(&candidates_json(&candidates), &cli.format)?;
        }

        Command::List { filter } => {
            let filter = filter.map(|(field, query)| RecordFilter::new(field, query));
            let listed = store.listing(filter.as_ref())?;
            let items: Vec<serde_json::Value> = listed
                .iter()
                .map(|l| record_json(Some(l.index), &l.record))
                .collect();
            print_output(&serde_json::Value::Array(items), &cli.format)?;
        }

        Command::Update {
            selector,
            title,
            pages,
        } => {
            let selector: RecordSelector = selector.parse()?;
            let changes = BookUpdate {
                title: title.filter(|t| !t.trim().is_empty()),
                page_count: pages.filter(|p| !p.trim().is_empty()),
            };
            let record = store.update(&selector, &changes)?;
            print_output(&record_json(None, &record), &cli.format)?;
        }

        Command::Delete { selector, yes } => {
            let selector: RecordSelector = selector.parse()?;
            let confirmed = yes || confirm_delete(&store.get(&selector)?)?;
            match store.delete(&selector, confirmed)? {
                DeleteOutcome::Deleted(record) => print_output(
                    &serde_json::json!({ "ok": true, "deleted": record.display_id() }),
                    &cli.format,
                )?,
                DeleteOutcome::Cancelled => print_output(
                    &serde_json::json!({ "ok": false, "cancelled": true }),
                    &cli.format,
                )?,
            }
        }

        Command::Sort {
            primary,
            then,
            desc,
            limit,
        } => {
            let order = if desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            let mut records = store.sort_by(primary, then, order)?;
            if let Some(limit) = limit {
                records.truncate(limit);
            }
            let items: Vec<serde_json::Value> =
                records.iter().map(|r| record_json(None, r)).collect();
            print_output(&serde_json::Value::Array(items), &cli.format)?;
        }

        Command::Stats => {
            let stats = store.aggregate()?;
            print_output(&serde_json::to_value(&stats)?, &cli.format)?;
        }
    }

    Ok(())
}

fn confirm_delete(record: &BookRecord) -> Result<bool, Box<dyn std::error::Error>> {
    print!("Delete '{}'? (y/n): ", record.display_id());
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn record_json(index: Option<usize>, record: &BookRecord) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    if let Some(index) = index {
        obj.insert("index".into(), index.into());
    }
    obj.insert("id".into(), record.display_id().into());
    obj.insert("title".into(), record.title.clone().into());
    obj.insert("pages".into(), record.page_count.into());
    obj.insert("genre".into(), record.classification.genre.clone().into());
    obj.insert("author".into(), record.classification.author.clone().into());
    obj.insert("year".into(), record.classification.year.into());
    serde_json::Value::Object(obj)
}

fn candidates_json(candidates: &[Candidate]) -> serde_json::Value {
    let items = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            serde_json::json!({
                "pick": i + 1,
                "title": c.title,
                "authors": c.authors,
                "categories": c.categories,
                "year": c.published_year,
                "pages": c.page_count,
            })
        })
        .collect();
    serde_json::Value::Array(items)
}
