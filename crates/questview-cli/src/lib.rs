//! Shared CLI definitions for questview.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for questview
#[derive(Clone, Parser, Debug)]
#[command(
    name = "questview",
    version,
    about = "Paginated, searchable views over a de-duplicated CSV dataset",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Path to the CSV source file (overrides config and CSV_PATH)
    #[arg(short = 'f', long = "csv", value_name = "PATH", global = true)]
    pub csv_path: Option<PathBuf>,

    /// Read configuration from this file instead of ~/.config/questview/config.toml
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Column used to de-duplicate rows (default: question)
    #[arg(long = "identity-column", value_name = "COL", global = true)]
    pub identity_column: Option<String>,

    /// Delimiter to use when reading the source file, as an ASCII value (e.g. 59 for ';')
    #[arg(long = "delimiter", value_name = "BYTE", global = true)]
    pub delimiter: Option<u8>,

    /// Number of rows sampled when inferring column types (default: 100000)
    #[arg(long = "infer-schema-length", value_name = "N", global = true)]
    pub infer_schema_length: Option<usize>,

    /// Page size used when a request does not specify one (default: 100)
    #[arg(long = "default-page-size", value_name = "N", global = true)]
    pub default_page_size: Option<usize>,

    /// Largest page size a request may ask for (default: 500)
    #[arg(long = "max-page-size", value_name = "N", global = true)]
    pub max_page_size: Option<usize>,

    /// Enable debug logging on stderr (overrides QUESTVIEW_LOG)
    #[arg(long = "debug", action, global = true)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/questview/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operations available from the command line
#[derive(Clone, Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print dataset metadata (row count, columns, default sort, searchable column) as JSON
    Metadata,

    /// Print one page of rows as JSON
    Rows {
        /// 1-based page number
        #[arg(long = "page", default_value_t = 1)]
        page: i64,

        /// Rows per page (default from config; may not exceed the configured maximum)
        #[arg(long = "page-size", value_name = "N")]
        page_size: Option<i64>,

        /// Case-insensitive substring to look for in the searchable column
        #[arg(long = "search", value_name = "TEXT")]
        search: Option<String>,

        /// Column to sort by; unknown columns fall back to the default sort column
        #[arg(long = "sort-by", value_name = "COL")]
        sort_by: Option<String>,

        /// Sort direction (asc or desc); anything else sorts ascending
        #[arg(long = "sort-dir", value_name = "DIR", default_value = "asc")]
        sort_dir: String,
    },

    /// Serve JSON-lines requests on stdin, writing one JSON response per line to stdout
    Serve,

    /// Write a copy of a CSV file with duplicate rows removed (first occurrence kept)
    Dedup {
        /// Source CSV file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Destination for the de-duplicated CSV
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Column to check for duplicates (default: the identity column)
        #[arg(long = "column", value_name = "COL")]
        column: Option<String>,
    },
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn render_arguments(out: &mut String, cmd: &clap::Command) {
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if !arg.get_action().takes_values() || placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout. Global options
/// come first, then one section per subcommand.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    render_arguments(&mut out, &cmd);

    for sub in cmd.get_subcommands() {
        if sub.get_name() == "help" {
            continue;
        }
        out.push_str(&format!("\n## `{}`\n\n", sub.get_name()));
        if let Some(about) = sub.get_about() {
            out.push_str(&format!("{}\n\n", about));
        }
        render_arguments(&mut out, sub);
    }

    out
}
