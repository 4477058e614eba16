//! table-converter CLI
//!
//! ```bash
//! table-converter convert input.csv -o out.csv -c config.yaml
//! table-converter convert input.csv -a 'assign:title=Titre:required' -a 'filter-not-empty:title'
//! table-converter show-config -c config.json      # Print the parsed configuration
//! table-converter parse input.csv                 # Print the decoded records as JSON
//! table-converter actions                         # Action DSL reference
//! ```

use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use table_converter::logging::{init_logging, LogConfig};
use table_converter::{actions_description, convert_file, load_config, read_csv_file, Config, ConvertOptions};
use tracing::debug;

#[derive(Parser)]
#[command(name = "table-converter", version)]
#[command(about = "Convert tables row by row with declarative actions", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Configuration file (YAML for .yaml/.yml, JSON otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Action string, applied after the configuration file (repeatable)
    #[arg(short = 'a', long = "action")]
    actions: Vec<String>,

    /// Separator between the parts of an action string
    #[arg(long, default_value = ":")]
    action_delimiter: char,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV file
    Convert {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Input delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output delimiter
        #[arg(long, default_value = ",")]
        output_delimiter: char,

        /// Also write `_staging` columns
        #[arg(long)]
        keep_staging: bool,
    },

    /// Print the parsed configuration as JSON
    ShowConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Parse a CSV file and print its records as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the action DSL reference
    Actions,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = init_logging(&LogConfig::from_verbosity(cli.verbose)) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            config,
            delimiter,
            output_delimiter,
            keep_staging,
        } => {
            let options = ConvertOptions {
                input_delimiter: delimiter,
                output_delimiter,
                keep_staging,
            };
            cmd_convert(&input, output.as_deref(), &config, &options)
        }

        Commands::ShowConfig { config } => cmd_show_config(&config),

        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Actions => {
            println!("{}", actions_description());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build_config(args: &ConfigArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::new(),
    };
    config.add_actions(args.actions.as_slice(), args.action_delimiter)?;
    debug!(actions = config.actions.len(), picks = config.picks.len(), "configuration ready");
    Ok(config)
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    args: &ConfigArgs,
    options: &ConvertOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;
    let summary = convert_file(config, input, output, options)?;

    eprintln!("   Encoding: {}", summary.input.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(summary.input.delimiter));
    eprintln!("   Columns: {}", summary.input.headers.join(", "));
    eprintln!("{}", summary.message());
    Ok(())
}

fn cmd_show_config(args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_parse(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let table = read_csv_file(input, delimiter)?;

    eprintln!("   Encoding: {}", table.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(table.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("Parsed {} records", table.records.len());

    let json = serde_json::to_string_pretty(&table.records)?;
    match output {
        Some(path) => fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
