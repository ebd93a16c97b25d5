//! micropp - compile and deploy C++ to microcontrollers

use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

use micropp::{
    config::{configure_sdk, configure_toolchain, Args, Command, CompileArgs, ConfigArgs},
    BoardRegistry, Config, MicroToolHandler, Pipeline, PipelineRequest, ToolchainConfig,
};

type CliResult = Result<bool, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    debug!("micropp v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, config: Config) -> CliResult {
    match &args.command {
        Command::ListBoards => list_boards(&config),
        Command::AddBoard { json_file } => {
            BoardRegistry::from_config(&config).add_board(json_file)?;
            Ok(true)
        }
        Command::Config(config_args) => configure(&config, config_args),
        Command::Compile(compile_args) => compile(&config, compile_args).await,
        Command::Init => init(&config),
        Command::Serve => serve(config).await,
    }
}

fn list_boards(config: &Config) -> CliResult {
    let boards_dir = config.boards_dir();
    if !boards_dir.exists() {
        info!("No boards directory found. Creating one...");
        std::fs::create_dir_all(&boards_dir)?;
        return Ok(false);
    }

    let boards = BoardRegistry::from_config(config).list_boards()?;
    if boards.is_empty() {
        info!("No boards found. Use 'add-board' to add a new board.");
        return Ok(false);
    }

    println!("Available boards:");
    for board in &boards {
        println!("{}", board.render());
    }
    Ok(true)
}

fn configure(config: &Config, args: &ConfigArgs) -> CliResult {
    if args.show {
        let table = ToolchainConfig::load_or_create(&config.config_file())?;
        println!("Current Configuration:");
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(true);
    }

    match (&args.toolchain, &args.sdk, &args.path) {
        (Some(toolchain), _, Some(path)) => {
            configure_toolchain(config, toolchain, path)?;
            Ok(true)
        }
        (None, Some(sdk), Some(path)) => {
            configure_sdk(config, sdk, path)?;
            Ok(true)
        }
        _ => {
            error!("Invalid configuration command. Use --show, --toolchain <id> --path <path> or --sdk <id> --path <path>");
            Ok(false)
        }
    }
}

async fn compile(config: &Config, args: &CompileArgs) -> CliResult {
    let table = ToolchainConfig::load_or_create(&config.config_file())?;
    let registry = BoardRegistry::from_config(config);
    let pipeline = Pipeline::new(config, &registry, &table);

    let request = PipelineRequest {
        source: args.source.clone(),
        board: args.board.clone(),
        address: args.address.clone(),
        verbose: args.verbose,
        compile_only: args.compile_only,
    };
    let report = pipeline.run(&request).await;

    if report.is_success() {
        println!("{}", report.summary());
        Ok(true)
    } else {
        eprintln!("ERROR: {}", report.summary());
        Ok(false)
    }
}

fn init(config: &Config) -> CliResult {
    std::fs::create_dir_all(&config.home)?;
    ToolchainConfig::load_or_create(&config.config_file())?;

    let installed = BoardRegistry::from_config(config).install_builtin()?;
    info!(
        "Initialized {} ({} board definitions written)",
        config.home.display(),
        installed.len()
    );
    Ok(true)
}

async fn serve(config: Config) -> CliResult {
    info!("Starting micropp MCP Server v{}", env!("CARGO_PKG_VERSION"));

    let service = MicroToolHandler::new(config)
        .serve(stdio()).await.inspect_err(|e| {
            error!("Serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(true)
}

/// `compile -v` raises the default level to debug
fn effective_log_level(args: &Args) -> &str {
    match &args.command {
        Command::Compile(compile) if compile.verbose && args.log_level == "info" => "debug",
        _ => args.log_level.as_str(),
    }
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let level = effective_log_level(args);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    debug!("Logging initialized with level: {}", level);
    Ok(())
}
