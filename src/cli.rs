use bookhaven_notify::config::{AppConfig, ConfigError, FileConfig};
use bookhaven_notify::console::run_console;
use bookhaven_notify::surface::Bounds;
use bookhaven_notify::types::{Identity, Session};
use bookhaven_notify::LiveApp;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::warn;

const TERMINAL: Bounds = Bounds {
    x: 0,
    y: 0,
    width: 80,
    height: 24,
};

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Run(Invocation),
    Exit(i32),
}

pub(crate) struct Invocation {
    pub(crate) command: Command,
    pub(crate) config: AppConfig,
    pub(crate) log_level: String,
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    RunOutcome::Run(Invocation {
        command: cli.command.unwrap_or(Command::Watch),
        config,
        log_level: cli.log_level,
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "bookhaven-notify",
    version,
    about = "Live BookHaven notifications in the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Optional TOML file; flags and environment variables override it.
    #[arg(long, global = true, env = "BOOKHAVEN_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "BOOKHAVEN_API_URL")]
    api_url: Option<String>,
    #[arg(long, global = true, env = "BOOKHAVEN_PUSH_URL")]
    push_url: Option<String>,
    #[arg(long, global = true, env = "BOOKHAVEN_CREDENTIAL_FILE")]
    credential_file: Option<PathBuf>,
    #[arg(long, global = true, env = "BOOKHAVEN_ROLE_CLAIM")]
    role_claim: Option<String>,
    #[arg(long, global = true, env = "BOOKHAVEN_UTC_OFFSET")]
    utc_offset: Option<String>,
    #[arg(long, global = true, env = "BOOKHAVEN_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Store a sign-in token for later runs.
    Login(LoginArgs),
    Logout,
    Whoami,
    /// Print the unread backlog once.
    List,
    /// Follow live notifications; the default.
    Watch,
}

#[derive(Args, Debug)]
pub(crate) struct LoginArgs {
    #[arg(long, env = "BOOKHAVEN_TOKEN")]
    token: String,
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let file = match cli.config.as_deref() {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = FileConfig {
        api_url: cli.api_url.clone(),
        push_url: cli.push_url.clone(),
        credential_file: cli.credential_file.clone(),
        role_claim: cli.role_claim.clone(),
        utc_offset: cli.utc_offset.clone(),
        auth_key: cli.auth_key.clone(),
    };
    file.merge(overrides).resolve(credential_file_in(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    ))
}

fn credential_file_in(config_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let config_home = config_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            home.filter(|dir| !dir.is_empty())
                .map(|dir| PathBuf::from(dir).join(".config"))
        });
    match config_home {
        Some(dir) => dir.join("bookhaven").join("credential"),
        None => PathBuf::from(".bookhaven-credential"),
    }
}

pub(crate) async fn execute(invocation: Invocation) -> i32 {
    let app = match LiveApp::from_config(&invocation.config) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };

    match invocation.command {
        Command::Login(args) => run_login(&app, &args.token),
        Command::Logout => {
            app.sessions().logout();
            println!("signed out");
            0
        }
        Command::Whoami => match app.sessions().restore() {
            Some(identity) => {
                println!("{}", describe(&identity));
                0
            }
            None => {
                println!("not signed in");
                1
            }
        },
        Command::List => run_list(&app).await,
        Command::Watch => run_watch(app).await,
    }
}

fn run_login(app: &LiveApp, token: &str) -> i32 {
    match app.sessions().login(token) {
        Some(identity) => {
            println!("signed in as {}", describe(&identity));
            0
        }
        None => {
            eprintln!("error: the token was rejected");
            1
        }
    }
}

fn restored_session(app: &LiveApp) -> Option<Session> {
    app.sessions().restore();
    let session = app.sessions().session();
    if session.is_none() {
        eprintln!("not signed in; run `bookhaven-notify login --token <token>` first");
    }
    session
}

async fn run_list(app: &LiveApp) -> i32 {
    let Some(session) = restored_session(app) else {
        return 1;
    };
    let store = app.store();
    let loaded = store.load_backlog(&session).await;
    store.toggle_display();

    match app.surface(TERMINAL).render() {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    }
    match loaded {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

async fn run_watch(app: LiveApp) -> i32 {
    if restored_session(&app).is_none() {
        return 1;
    }
    let follower = app.spawn_session_follower();
    let mut surface = app.surface(TERMINAL);
    let changes = app.store().subscribe();
    let input = BufReader::new(tokio::io::stdin());

    let result = tokio::select! {
        result = run_console(&mut surface, changes, input, tokio::io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    drop(surface);
    drop(app);
    if let Err(err) = follower.await {
        warn!(error = %err, "session follower did not shut down cleanly");
    }

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: console failed: {err}");
            1
        }
    }
}

fn describe(identity: &Identity) -> String {
    if identity.roles.is_empty() {
        return format!("{} (no roles)", identity.email);
    }
    let roles: Vec<&str> = identity.roles.iter().map(String::as_str).collect();
    format!("{} ({})", identity.email, roles.join(", "))
}
