use clap::Parser;
use color_eyre::Result;
use questview::error_display::user_message_from_report;
use questview::logging::init_logging;
use questview::serve::serve;
use questview::{
    dedup_file, AppConfig, ConfigManager, DatasetGateway, DedupSummary, GatewayConfig,
    PageRequest, Settings, APP_NAME,
};
use questview_cli::{Args, Command};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn open_gateway(args: &Args) -> Result<(Settings, DatasetGateway)> {
    let settings = Settings::load(APP_NAME, args)?;
    let gateway = DatasetGateway::open(settings.gateway_config())?;
    Ok((settings, gateway))
}

fn run_dedup(
    args: &Args,
    input: &Path,
    output: &Path,
    column: Option<&str>,
) -> Result<DedupSummary> {
    // The input is named explicitly, so the configured source need not exist.
    let mut config = AppConfig::load(APP_NAME, args.config.as_deref())?;
    config.apply_env()?;
    config.apply_args(args);
    let gateway_config = GatewayConfig::new(input)
        .with_identity_column(column.unwrap_or(&config.source.identity_column))
        .with_delimiter(config.source.delimiter.unwrap_or(b','))
        .with_infer_schema_length(config.source.infer_schema_length);
    Ok(dedup_file(&gateway_config, output)?)
}

fn run(args: &Args) -> Result<()> {
    match args.command.clone().unwrap_or(Command::Metadata) {
        Command::Metadata => {
            let (_, gateway) = open_gateway(args)?;
            print_json(&gateway.get_metadata())
        }
        Command::Rows {
            page,
            page_size,
            search,
            sort_by,
            sort_dir,
        } => {
            let (settings, gateway) = open_gateway(args)?;
            let request = PageRequest {
                page: Some(page),
                page_size,
                search,
                sort_by,
                sort_dir: Some(sort_dir),
            };
            let rows = request.fetch(&gateway, &settings.page_limits())?;
            print_json(&rows)
        }
        Command::Serve => {
            let (settings, gateway) = open_gateway(args)?;
            info!(source = %settings.csv_display_name(), "serving requests on stdin");
            let stdin = io::stdin();
            let stdout = io::stdout();
            serve(&gateway, &settings, stdin.lock(), stdout.lock())?;
            Ok(())
        }
        Command::Dedup {
            input,
            output,
            column,
        } => {
            let summary = run_dedup(args, &input, &output, column.as_deref())?;
            print_json(&summary)
        }
    }
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        let path = manager.write_default_config(args.force)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(Some(()));
    }
    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();
    color_eyre::install()?;
    init_logging(args.debug);

    let result = handle_early_exit_flags(&args).and_then(|done| match done {
        Some(()) => Ok(()),
        None => run(&args),
    });
    if let Err(e) = result {
        eprintln!("Error: {}", user_message_from_report(&e));
        std::process::exit(1);
    }
    Ok(())
}
