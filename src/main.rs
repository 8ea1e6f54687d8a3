use clap::Parser;
use dtext::batch::convert_jsonl;
use dtext::{Options, Pipeline};
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dtext")]
#[command(about = "Convert DText markup to HTML-flavoured markdown", long_about = None)]
struct Args {
    /// Input file (reads stdin when omitted)
    file: Option<PathBuf>,

    /// Print only the literal text
    #[arg(long, conflicts_with = "tree")]
    raw: bool,

    /// Print the bracket tag tree as JSON
    #[arg(long)]
    tree: bool,

    /// Read wiki pages as JSON lines and write converted pages as JSON lines
    #[arg(long, conflicts_with_all = ["raw", "tree"])]
    pages: bool,

    /// JSON file with conversion options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Site root for wiki, tag search and user links
    #[arg(long)]
    base_url: Option<String>,

    /// Also convert <b>-style tags
    #[arg(long)]
    html_tags: bool,
}

fn main() -> dtext::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => Options::from_file(path)?,
        None => Options::default(),
    };
    if let Some(base_url) = &args.base_url {
        options.base_url = base_url.clone();
    }
    options.html_tags |= args.html_tags;
    let pipeline = Pipeline::new(&options)?;

    if args.pages {
        let report = match &args.file {
            Some(path) => convert_jsonl(&pipeline, BufReader::new(fs::File::open(path)?), io::stdout().lock())?,
            None => convert_jsonl(&pipeline, io::stdin().lock(), io::stdout().lock())?,
        };
        log::info!(
            "{} converted, {} skipped, {} failed",
            report.converted,
            report.skipped,
            report.failures.len()
        );
        return Ok(());
    }

    let input = match &args.file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    if args.tree {
        let tree = pipeline.tag_tree(&input)?;
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else if args.raw {
        print!("{}", pipeline.to_raw(Some(&input))?);
    } else {
        print!("{}", pipeline.to_markup(Some(&input))?);
    }
    Ok(())
}
