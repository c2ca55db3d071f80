//! yatra -- SmartYatra session client.
//!
//! Command-line front end for the session layer: log in, inspect the stored
//! session and issue guarded requests against the backend.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use yatra_session::config::Config;
use yatra_session::routes::initial_route;
use yatra_session::{ApiRequest, Credentials, Registration, YatraClient};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Status,
    Login { email: String, password: String },
    Register { registration: Registration },
    Logout,
    Profile,
    Get { path: String },
}

struct CliArgs {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> CliArgs {
    match parse_args_from(std::env::args().skip(1)) {
        Ok(Some(cli)) => cli,
        Ok(None) => std::process::exit(0),
        Err(msg) => {
            eprintln!("Error: {msg}");
            eprintln!("Run with --help for usage information.");
            std::process::exit(1);
        }
    }
}

/// `Ok(None)` when help or version was printed.
fn parse_args_from(args: impl IntoIterator<Item = String>) -> Result<Option<CliArgs>, String> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config requires a path argument")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-V" => {
                println!("yatra {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            other if other.starts_with('-') => return Err(format!("Unknown argument: {other}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().unwrap_or_else(|| "status".to_string());
    let rest: Vec<String> = positional.collect();

    let command = match (name.as_str(), rest.as_slice()) {
        ("status", []) => Command::Status,
        ("login", [email, password]) => Command::Login {
            email: email.clone(),
            password: password.clone(),
        },
        ("register", [email, first, last, phone, password]) => Command::Register {
            registration: Registration::new(
                email.as_str(),
                first.as_str(),
                last.as_str(),
                phone.as_str(),
                password.as_str(),
            ),
        },
        ("logout", []) => Command::Logout,
        ("profile", []) => Command::Profile,
        ("get", [path]) => Command::Get { path: path.clone() },
        ("status" | "login" | "register" | "logout" | "profile" | "get", _) => {
            return Err(format!("Wrong number of arguments for `{name}`"));
        }
        (other, _) => return Err(format!("Unknown command: {other}")),
    };

    Ok(Some(CliArgs {
        config_path,
        command,
    }))
}

fn print_usage() {
    println!(
        "\
yatra {version} -- SmartYatra session client

USAGE:
    yatra [OPTIONS] [COMMAND]

COMMANDS:
    status                                      Show the stored session [default]
    login <EMAIL> <PASSWORD>                    Log in and store the session
    register <EMAIL> <FIRST> <LAST> <PHONE> <PASSWORD>
                                                Create an account, then log in
    logout                                      Forget the stored session
    profile                                     Show the account profile
    get <PATH>                                  Guarded GET relative to the API base URL

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: <config dir>/yatra/config.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    YATRA_CONFIG           Alternative to --config flag
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = parse_args();

    // --config wins; YATRA_CONFIG is the alternative.
    let config_path = cli
        .config_path
        .or_else(|| std::env::var("YATRA_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(Config::default_path);

    let config = Config::load(&config_path)?;
    init_tracing(&config);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "Starting yatra"
    );

    let client = YatraClient::from_config(&config)?;
    run(&client, &config, cli.command).await
}

/// Execute one command against `client`.
///
/// `logout` never reads the store first, so it also clears a session file
/// that no longer holds a full pair.
async fn run(client: &YatraClient, config: &Config, command: Command) -> anyhow::Result<()> {
    let state = if command == Command::Logout {
        None
    } else {
        match client.initialize().await {
            Ok(state) => Some(state),
            Err(e) if e.is_storage() => {
                tracing::warn!(error = %e, "Stored session is unreadable");
                None
            }
            Err(e) => return Err(e.into()),
        }
    };

    match command {
        Command::Logout => {
            client.sign_out().await?;
            println!("Logged out.");
        }
        Command::Status => {
            match state {
                Some(state) => {
                    println!("state:    {state}");
                    println!("start at: {}", initial_route(state));
                }
                None => {
                    println!("state:    unreadable");
                    println!("hint:     run `yatra logout` to reset the stored session");
                }
            }
            println!("api:      {}", config.api.base_url);
            println!("storage:  {} ({})", config.storage.backend, config.storage.path.display());
            let mut overrides: Vec<_> = config.env_overrides.all().iter().collect();
            overrides.sort();
            for (key, var) in overrides {
                println!("override: {key} <- {var}");
            }
        }
        // A new login overwrites whatever the store held.
        Command::Login { email, password } => {
            client.sign_in(Credentials::new(email, password)).await?;
            println!("Logged in.");
        }
        Command::Register { registration } => {
            client.register(registration).await?;
            println!("Account created and logged in.");
        }
        Command::Profile | Command::Get { .. } if state.is_none() => {
            anyhow::bail!("stored session is unreadable; run `yatra logout` and log in again");
        }
        Command::Profile => {
            let profile = client.fetch_profile().await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Get { path } => {
            let response = client.request(&ApiRequest::get(path)).await?;
            println!("HTTP {}", response.status);
            println!("{}", serde_json::to_string_pretty(&response.data)?);
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        // Set this crate to the configured level, dependencies to warn
        EnvFilter::new(format!("yatra={level},yatra_session={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
