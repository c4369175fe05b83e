//! CLI interface for rchat - Rocket.Chat from the terminal.

use std::env;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use chrono::{DateTime, Local, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use rchat_core::paths::write_default_config;
use rchat_core::rocket::{HttpMethod, ROUTES, StoredToken, find_route};
use rchat_core::{
    APP_NAME, AppConfig, AppPaths, ChannelCache, ChannelType, CredentialSource, Credentials,
    Message, Room, Session, SessionBuilder, TokenStorage, User, default_cache_dir,
    generate_example_config, generate_schema,
};
use serde::Serialize;
use serde_json::Value;

const REPO_URL: &str = "https://github.com/byteowlz/rchat";

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Info => rt.block_on(handle_info(&ctx)),
        Command::Whoami => rt.block_on(handle_whoami(&ctx)),
        Command::Configure { command } => handle_configure(&ctx, command),
        Command::Ls { command } => match command {
            LsCommand::Channels(cmd) => rt.block_on(handle_channels(&ctx, cmd)),
            LsCommand::Users(cmd) => rt.block_on(handle_users(&ctx, cmd)),
        },
        Command::Send { room, text } => rt.block_on(handle_send(&ctx, &room, &text.join(" "))),
        Command::Dm { username, text } => {
            rt.block_on(handle_dm(&ctx, &username, &text.join(" ")))
        }
        Command::Watch { room, interval } => rt.block_on(handle_watch(&ctx, &room, interval)),
        Command::Auth { subcommand } => rt.block_on(handle_auth(&ctx, subcommand)),
        Command::Routes => handle_routes(&ctx),
        Command::Call(cmd) => rt.block_on(handle_call(&ctx, cmd)),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "rchat",
    author,
    version,
    about = "Rocket.Chat from the terminal",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

/// Common CLI options shared across all subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Reduce output to only errors.
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long, global = true)]
    pub trace: bool,
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    pub color: ColorOption,
    /// Do not change anything on disk.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Assume "yes" for interactive prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the server and client versions.
    Info,
    /// Show the logged-in user.
    Whoami,
    /// Configure the server domain or the login credentials.
    Configure {
        #[command(subcommand)]
        command: ConfigureCommand,
    },
    /// List channels or users.
    Ls {
        #[command(subcommand)]
        command: LsCommand,
    },
    /// Post a message to a channel or private group.
    Send {
        /// Room name (a leading '#' is ignored).
        room: String,
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Send a direct message.
    Dm {
        /// Recipient username (a leading '@' is ignored).
        username: String,
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Print unread messages of a room as they arrive. Ctrl-C exits.
    Watch {
        /// Room name (a leading '#' is ignored).
        room: String,
        /// Seconds between polls. Defaults to unread.poll_interval.
        #[arg(long, value_name = "SECONDS")]
        interval: Option<u64>,
    },
    /// Manage the session token.
    Auth {
        #[command(subcommand)]
        subcommand: AuthSubcommand,
    },
    /// List the API routes known to the client.
    Routes,
    /// Call an API route directly.
    Call(CallCommand),
    /// Create config directories and default files.
    Init(InitCommand),
    /// Inspect and manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigureCommand {
    /// Point rchat at a server.
    Domain {
        /// Server URL, e.g. https://chat.example.com.
        domain: String,
        /// Skip TLS certificate verification.
        #[arg(long = "no-verify")]
        no_verify: bool,
    },
    /// Store the username and password used to log in.
    Password {
        /// Rocket.Chat username.
        #[arg(long)]
        username: String,
        /// Password. Read from stdin when not given.
        #[arg(long, env = "RCHAT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum LsCommand {
    /// List public channels, optionally with their messages.
    Channels(ChannelsCommand),
    /// List users.
    Users(UsersCommand),
}

#[derive(Debug, Clone, Args)]
struct ChannelsCommand {
    /// Channel names. All channels when empty.
    names: Vec<String>,
    /// Show recent messages.
    #[arg(long, conflicts_with_all = ["last", "unread"])]
    recent: bool,
    /// Show the most recent message.
    #[arg(long, conflicts_with = "unread")]
    last: bool,
    /// Show messages since the last check.
    #[arg(long)]
    unread: bool,
}

#[derive(Debug, Clone, Copy, Args)]
struct UsersCommand {
    /// Show presence status.
    #[arg(long)]
    status: bool,
    /// Show display name.
    #[arg(long)]
    name: bool,
    /// Show user ID.
    #[arg(long)]
    id: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum AuthSubcommand {
    /// Show who rchat logs in as and whether a token is stored.
    Status,
    /// Log in and store the session token.
    Login,
    /// Log out and invalidate the stored token.
    Logout,
}

#[derive(Debug, Clone, Args)]
struct CallCommand {
    /// Route name, e.g. channels.info or rooms.history.
    route: String,
    /// HTTP method. Defaults to the route's first method.
    #[arg(short = 'X', long)]
    method: Option<String>,
    /// URL argument as key=value (repeatable).
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    args: Vec<(String, String)>,
    /// Query parameter as key=value (repeatable).
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
    /// JSON request body.
    #[arg(short = 'd', long, value_name = "JSON")]
    data: Option<String>,
}

#[derive(Debug, Clone, Copy, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists.
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration.
    Show,
    /// Print the resolved config file path.
    Path,
    /// Print all resolved paths.
    Paths,
    /// Print the JSON schema.
    Schema,
    /// Print a commented example configuration.
    Example,
    /// Regenerate the default configuration file.
    Reset,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths, common.dry_run)?;
        let paths = paths.apply_overrides(&config)?;
        let ctx = Self {
            common,
            paths,
            config,
        };
        ctx.ensure_directories()?;
        Ok(ctx)
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        if self.use_color(io::stderr().is_terminal()) {
            builder.write_style(if self.force_color() {
                WriteStyle::Always
            } else {
                WriteStyle::Auto
            });
        } else {
            builder.write_style(WriteStyle::Never);
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self.config.logging.level.as_filter(),
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn force_color(&self) -> bool {
        matches!(self.common.color, ColorOption::Always) || env::var_os("FORCE_COLOR").is_some()
    }

    fn use_color(&self, is_terminal: bool) -> bool {
        let force = self.force_color();
        !(self.common.no_color
            || matches!(self.common.color, ColorOption::Never)
            || env::var_os("NO_COLOR").is_some()
            || (!force && !is_terminal))
    }

    fn color_stdout(&self) -> bool {
        self.use_color(io::stdout().is_terminal())
    }

    fn ensure_directories(&self) -> Result<()> {
        if self.common.dry_run {
            self.paths.log_dry_run();
            return Ok(());
        }
        self.paths.ensure_directories()
    }

    fn session(&self) -> Result<Session> {
        let session = SessionBuilder::from_config(&self.config, &self.paths).build()?;
        Ok(session)
    }

    fn channel_cache(&self) -> ChannelCache {
        ChannelCache::new(self.paths.channel_dir())
    }

    fn default_watermark(&self) -> Result<DateTime<Utc>> {
        self.config.unread.default_watermark_at(Utc::now())
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("serializing output to JSON")?
        );
        Ok(())
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn handle_info(ctx: &RuntimeContext) -> Result<()> {
    let session = ctx.session()?;
    let info = session.info().await?;
    if ctx.common.json {
        return ctx.print_json(&info);
    }
    println!(
        "Server API Version: {}",
        info.version.as_deref().unwrap_or("unknown")
    );
    println!("Client API Version: {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

async fn handle_whoami(ctx: &RuntimeContext) -> Result<()> {
    let me = ctx.session()?.me().await?;
    if ctx.common.json {
        return ctx.print_json(&me);
    }
    println!("{}", me.username);
    Ok(())
}

fn handle_configure(ctx: &RuntimeContext, command: ConfigureCommand) -> Result<()> {
    match command {
        ConfigureCommand::Domain { domain, no_verify } => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would set server {domain} in {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            if no_verify {
                log::warn!("TLS certificate verification disabled for {domain}");
            }
            AppConfig::set_server(&ctx.paths.config_file, &domain, !no_verify)?;
            println!("Server set to {domain}.");
            Ok(())
        }
        ConfigureCommand::Password { username, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let credentials = Credentials::new(username, password).validate()?;
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would write credentials for {} to {}",
                    credentials.user,
                    ctx.paths.creds_file.display()
                );
                return Ok(());
            }
            credentials.write_file(&ctx.paths.creds_file)?;
            println!(
                "Stored credentials for {} in {}.",
                credentials.user,
                ctx.paths.creds_file.display()
            );
            Ok(())
        }
    }
}

fn read_password() -> Result<String> {
    if io::stdin().is_terminal() {
        eprint!("Password: ");
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(anyhow!("no password given (use --password, RCHAT_PASSWORD or stdin)"));
    }
    Ok(password)
}

#[derive(Debug, Serialize)]
struct ChannelListing {
    #[serde(flatten)]
    room: Room,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<Message>>,
}

async fn handle_channels(ctx: &RuntimeContext, cmd: ChannelsCommand) -> Result<()> {
    let session = ctx.session()?;
    let rooms: Vec<Room> = if cmd.names.is_empty() {
        session.rooms(ChannelType::Channels).await?.to_vec()
    } else {
        let mut rooms = Vec::with_capacity(cmd.names.len());
        for name in &cmd.names {
            rooms.push(session.find_room(name).await?);
        }
        rooms
    };

    let cache = ctx.channel_cache();
    let watermark = ctx.default_watermark()?;
    let mut listings = Vec::with_capacity(rooms.len());
    for room in rooms {
        let query = room.messages();
        let messages = if cmd.recent {
            Some(query.recent(&session).await?)
        } else if cmd.last {
            Some(query.last(&session).await?.into_iter().collect())
        } else if cmd.unread {
            Some(query.unread(&session, &cache, watermark).await?)
        } else {
            None
        };
        listings.push(ChannelListing { room, messages });
    }

    if ctx.common.json {
        return ctx.print_json(&listings);
    }
    for listing in &listings {
        println!("{}", listing.room.display_name());
        for message in listing.messages.iter().flatten() {
            println!("  {}", format_message(message));
        }
    }
    Ok(())
}

async fn handle_users(ctx: &RuntimeContext, cmd: UsersCommand) -> Result<()> {
    let users = ctx.session()?.users().await?;
    if ctx.common.json {
        return ctx.print_json(&users);
    }
    let color = ctx.color_stdout();
    let width = users
        .iter()
        .map(|u| visible_len(&u.username))
        .max()
        .unwrap_or(0);
    for user in &users {
        let mut line = pad(&user.username, width);
        if cmd.status {
            let status = user.status.as_deref().unwrap_or("unknown");
            line.push_str("  ");
            line.push_str(&paint(&pad(status, 7), status_color(status), color));
        }
        if cmd.name {
            line.push_str("  ");
            line.push_str(user.name.as_deref().unwrap_or(""));
        }
        if cmd.id {
            line.push_str("  ");
            line.push_str(&paint(&user.id, "2", color));
        }
        println!("{}", line.trim_end());
    }
    Ok(())
}

async fn handle_send(ctx: &RuntimeContext, room: &str, text: &str) -> Result<()> {
    let session = ctx.session()?;
    let room = session.find_room(room).await?;
    let message = session.send(&room, text).await?;
    if ctx.common.json {
        return ctx.print_json(&message);
    }
    println!("{}", format_message(&message));
    Ok(())
}

async fn handle_dm(ctx: &RuntimeContext, username: &str, text: &str) -> Result<()> {
    let session = ctx.session()?;
    let room = session
        .direct_room(&User::with_username(username.trim_start_matches('@')))
        .await?;
    let message = session.send(&room, text).await?;
    if ctx.common.json {
        return ctx.print_json(&message);
    }
    println!("{}", format_message(&message));
    Ok(())
}

async fn handle_watch(ctx: &RuntimeContext, room: &str, interval: Option<u64>) -> Result<()> {
    let session = ctx.session()?;
    let room = session.find_room(room).await?;
    let cache = ctx.channel_cache();
    let watermark = ctx.default_watermark()?;
    let period = Duration::from_secs(interval.unwrap_or(ctx.config.unread.poll_interval).max(1));
    let me = session.me().await?;
    log::info!(
        "watching {} every {}s as {}",
        room.display_name(),
        period.as_secs(),
        me.username
    );

    loop {
        match room.messages().unread(&session, &cache, watermark).await {
            Ok(messages) => {
                for message in messages.iter().filter(|m| !me.wrote(m)) {
                    if ctx.common.json {
                        println!(
                            "{}",
                            serde_json::to_string(message).context("serializing message")?
                        );
                    } else {
                        println!("{}", format_message(message));
                    }
                }
            }
            Err(e) => log::warn!("polling {}: {e}", room.display_name()),
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted, stopping watch");
                return Ok(());
            }
            () = tokio::time::sleep(period) => {}
        }
    }
}

async fn handle_auth(ctx: &RuntimeContext, cmd: AuthSubcommand) -> Result<()> {
    match cmd {
        AuthSubcommand::Status => {
            let source = CredentialSource::from_config(&ctx.config.auth, &ctx.paths);
            println!("Server:      {}", ctx.config.server.domain);
            println!("Credentials: {source}");
            let credentials = match source.resolve() {
                Ok(credentials) => credentials,
                Err(e) => {
                    println!("Not configured: {e}");
                    return Ok(());
                }
            };
            println!("User:        {}", credentials.user);
            if !ctx.config.auth.store_token {
                println!("Token:       not stored (auth.store_token = false)");
                return Ok(());
            }
            let storage = TokenStorage::new(ctx.paths.token_dir());
            let state = match storage.read(&credentials.user) {
                StoredToken::Token(_) => "stored",
                StoredToken::Tombstone => "logged out",
                StoredToken::Absent => "none",
            };
            println!("Token:       {state} ({})", storage.path_for(&credentials.user).display());
            Ok(())
        }
        AuthSubcommand::Login => {
            let session = ctx.session()?;
            session.authenticate().await?;
            let me = session.me().await?;
            println!("Logged in as {}.", me.username);
            Ok(())
        }
        AuthSubcommand::Logout => {
            ctx.session()?.logout().await?;
            println!("Logged out.");
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct RouteListing {
    name: &'static str,
    methods: Vec<String>,
    path: &'static str,
    url_args: Vec<&'static str>,
    params: Vec<&'static str>,
    authenticated: bool,
}

fn handle_routes(ctx: &RuntimeContext) -> Result<()> {
    let listings: Vec<RouteListing> = ROUTES
        .iter()
        .map(|route| RouteListing {
            name: route.name,
            methods: route.methods.iter().map(ToString::to_string).collect(),
            path: route.path,
            url_args: route.url_args.iter().map(|p| p.name).collect(),
            params: route.params.iter().map(|p| p.name).collect(),
            authenticated: route.authenticated,
        })
        .collect();

    if ctx.common.json {
        return ctx.print_json(&listings);
    }
    let width = listings.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let color = ctx.color_stdout();
    for route in &listings {
        let methods = route.methods.join(",");
        let lock = if route.authenticated { "" } else { "  (public)" };
        println!(
            "{:<width$}  {methods:<11} {}{}",
            route.name,
            route.path,
            paint(lock, "2", color)
        );
    }
    Ok(())
}

async fn handle_call(ctx: &RuntimeContext, cmd: CallCommand) -> Result<()> {
    let route = find_route(&cmd.route)
        .ok_or_else(|| anyhow!("unknown route '{}' (see 'rchat routes')", cmd.route))?;
    let mut request = route.request();
    if let Some(method) = &cmd.method {
        request = request.method(method.parse::<HttpMethod>()?);
    }
    for (name, value) in cmd.args {
        request = request.url_arg(name, value);
    }
    request = request.params(cmd.params);
    if let Some(data) = &cmd.data {
        let body: Value = serde_json::from_str(data).context("parsing --data as JSON")?;
        request = request.body(body);
    }

    let response = ctx.session()?.dispatch(request).await?;
    ctx.print_json(&response)
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }
    if ctx.common.dry_run {
        log::info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }
    write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                ctx.print_json(&ctx.config)
            } else {
                println!("{:#?}", ctx.config);
                Ok(())
            }
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Paths => {
            let cache_dir = default_cache_dir()?;
            if ctx.common.json {
                let paths = serde_json::json!({
                    "config": ctx.paths.config_file,
                    "creds": ctx.paths.creds_file,
                    "data": ctx.paths.data_dir,
                    "state": ctx.paths.state_dir,
                    "tokens": ctx.paths.token_dir(),
                    "channels": ctx.paths.channel_dir(),
                    "cache": cache_dir,
                });
                ctx.print_json(&paths)
            } else {
                println!("config:   {}", ctx.paths.config_file.display());
                println!("creds:    {}", ctx.paths.creds_file.display());
                println!("data:     {}", ctx.paths.data_dir.display());
                println!("state:    {}", ctx.paths.state_dir.display());
                println!("tokens:   {}", ctx.paths.token_dir().display());
                println!("channels: {}", ctx.paths.channel_dir().display());
                println!("cache:    {}", cache_dir.display());
                Ok(())
            }
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Example => {
            print!("{}", generate_example_config(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

// ─── Formatting helpers ──────────────────────────────────────────────

/// `time|author: text`, truncated to the terminal width.
fn format_message(message: &Message) -> String {
    let line = format!(
        "{}|{}: {}",
        format_time(&message.ts),
        message.author(),
        message.msg.replace('\n', " ")
    );
    truncate(&line, term_width().saturating_sub(2))
}

/// Local time as "2023-01-05 14:35".
fn format_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// ANSI colour for a presence status.
fn status_color(status: &str) -> &'static str {
    match status {
        "online" => "32",
        "offline" => "31",
        _ => "33",
    }
}

fn paint(s: &str, code: &str, enabled: bool) -> String {
    if enabled && !s.is_empty() {
        format!("\x1b[{code}m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

/// Terminal width, clamped to a reasonable range.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map_or(80, |(w, _)| usize::from(w.0))
        .clamp(40, 200)
}

/// Pad to `width` display columns.
fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(visible_len(s));
    format!("{s}{:fill$}", "")
}

fn truncate(s: &str, max: usize) -> String {
    if visible_len(s) <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut len = 0;
    for ch in s.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if len + w + 3 > max {
            break;
        }
        out.push(ch);
        len += w;
    }
    out.push_str("...");
    out
}

/// Visible length of a string (ignoring ANSI escape sequences).
fn visible_len(s: &str) -> usize {
    let mut len = 0;
    let mut in_escape = false;
    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            len += unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        }
    }
    len
}
