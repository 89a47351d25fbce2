use clap::{Parser, Subcommand};
use nexuschat::controller::ChatController;
use nexuschat::llm::Assistant;
use nexuschat::model::{Contact, Message, MessageKind, User, ASSISTANT_EMAIL};
use nexuschat::store::Store;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nexuschat")]
#[command(about = "NexusChat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config, and the data directory.
    Init {
        /// Config file path (default: NEXUSCHAT_CONFIG_PATH or ~/.nexuschat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Log in (no verification) and remember the session.
    Login {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
        email: String,
        /// Display name
        name: String,
    },

    /// Forget the current session.
    Logout {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Show the logged-in user.
    Whoami {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// List contacts for the logged-in user, most recent first.
    Contacts {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print the conversation with a contact.
    History {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Contact email
        with: String,
    },

    /// Send one message; waits for the reply when sending to the assistant.
    Send {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Recipient email (use the assistant's email to talk to the AI)
        to: String,
        /// Message text, or an image URL with --image
        message: String,
        #[arg(long)]
        image: bool,
    },

    /// Interactive chat (type /help for commands).
    Chat {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let res = match cli.command {
        Some(Commands::Version) => {
            println!("nexuschat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init { config }) => run_init(config),
        Some(Commands::Login { config, email, name }) => run_login(config, email, name),
        Some(Commands::Logout { config }) => run_logout(config),
        Some(Commands::Whoami { config }) => run_whoami(config),
        Some(Commands::Contacts { config }) => run_contacts(config),
        Some(Commands::History { config, with }) => run_history(config, with),
        Some(Commands::Send {
            config,
            to,
            message,
            image,
        }) => run_send(config, to, message, image).await,
        Some(Commands::Chat { config }) => run_chat(config).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = res {
        log::error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

/// Load config, open the store, and restore any persisted session.
fn open_controller(config_path: Option<PathBuf>) -> anyhow::Result<ChatController> {
    let (config, path) = nexuschat::config::load_config(config_path)?;
    let data_dir = nexuschat::config::resolve_data_dir(&config, &path);
    log::debug!("using data directory {}", data_dir.display());
    let store = Store::open(&data_dir)?;
    let assistant = Assistant::from_config(&config);
    let mut controller = ChatController::new(store, Arc::new(assistant));
    controller.restore()?;
    Ok(controller)
}

fn require_login(c: &ChatController) -> anyhow::Result<()> {
    if c.current_user().is_none() {
        anyhow::bail!("not logged in; run `nexuschat login <email> <name>` first");
    }
    Ok(())
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(nexuschat::config::default_config_path);
    let data_dir = nexuschat::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", path.display());
    println!("data directory: {}", data_dir.display());
    Ok(())
}

fn run_login(config_path: Option<PathBuf>, email: String, name: String) -> anyhow::Result<()> {
    let mut c = open_controller(config_path)?;
    c.login(User::with_default_avatar(email, name))?;
    print_contacts(c.contacts());
    Ok(())
}

fn run_logout(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut c = open_controller(config_path)?;
    c.logout()?;
    println!("logged out");
    Ok(())
}

fn run_whoami(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let c = open_controller(config_path)?;
    match c.current_user() {
        Some(u) => println!("{} <{}>", u.name, u.email),
        None => println!("not logged in"),
    }
    Ok(())
}

fn run_contacts(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let c = open_controller(config_path)?;
    require_login(&c)?;
    print_contacts(c.contacts());
    Ok(())
}

fn run_history(config_path: Option<PathBuf>, with: String) -> anyhow::Result<()> {
    let mut c = open_controller(config_path)?;
    require_login(&c)?;
    c.select_contact(&with)?;
    print_transcript(&c);
    Ok(())
}

async fn run_send(
    config_path: Option<PathBuf>,
    to: String,
    message: String,
    image: bool,
) -> anyhow::Result<()> {
    let mut c = open_controller(config_path)?;
    require_login(&c)?;
    c.select_contact(&to)?;
    let kind = if image {
        MessageKind::Image
    } else {
        MessageKind::Text
    };
    if let Some(reply) = c.send_and_reply(&message, kind).await? {
        print_message(&c, &reply);
    }
    Ok(())
}

fn prompt(stdout: &mut io::Stdout, label: &str) -> io::Result<()> {
    write!(stdout, "{}", label)?;
    stdout.flush()
}

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut c = open_controller(config_path)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    if c.current_user().is_none() {
        println!("not logged in; use /login <email> <name>");
    } else {
        print_contacts(c.contacts());
    }
    print_help();

    loop {
        let label = match c.active_contact_info() {
            Some(contact) => format!("[{}] > ", contact.name),
            None => "> ".to_string(),
        };
        prompt(&mut stdout, &label)?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };
        let res: anyhow::Result<()> = match cmd {
            "/exit" | "/quit" => break,
            "/help" => {
                print_help();
                Ok(())
            }
            "/login" => match rest.split_once(char::is_whitespace) {
                Some((email, name)) => c
                    .login(User::with_default_avatar(email, name.trim()))
                    .map(|_| print_contacts(c.contacts()))
                    .map_err(Into::into),
                None => Err(anyhow::anyhow!("usage: /login <email> <name>")),
            },
            "/logout" => c.logout().map_err(Into::into),
            "/whoami" => {
                match c.current_user() {
                    Some(u) => println!("{} <{}>", u.name, u.email),
                    None => println!("not logged in"),
                }
                Ok(())
            }
            "/contacts" => c
                .refresh_contacts()
                .map(|_| print_contacts(c.contacts()))
                .map_err(Into::into),
            "/open" => c
                .select_contact(rest)
                .map(|_| print_transcript(&c))
                .map_err(Into::into),
            "/ai" => c
                .select_contact(ASSISTANT_EMAIL)
                .map(|_| print_transcript(&c))
                .map_err(Into::into),
            "/add" => match rest.split_once(char::is_whitespace) {
                Some((email, name)) => c.add_contact(email, name).map_err(Into::into),
                None => Err(anyhow::anyhow!("usage: /add <email> <name>")),
            },
            "/back" => {
                c.clear_active_contact();
                Ok(())
            }
            "/history" => {
                print_transcript(&c);
                Ok(())
            }
            "/image" => send(&mut c, rest, MessageKind::Image).await,
            _ if cmd.starts_with('/') => Err(anyhow::anyhow!("unknown command {}", cmd)),
            _ => send(&mut c, input, MessageKind::Text).await,
        };
        if let Err(e) = res {
            eprintln!("error: {:#}", e);
        }
    }

    Ok(())
}

async fn send(c: &mut ChatController, text: &str, kind: MessageKind) -> anyhow::Result<()> {
    if c.active_contact() == Some(ASSISTANT_EMAIL) {
        println!("(assistant is thinking...)");
    }
    if let Some(reply) = c.send_and_reply(text, kind).await? {
        print_message(c, &reply);
    }
    Ok(())
}

fn print_help() {
    println!(
        "commands: /login <email> <name>, /logout, /whoami, /contacts, /open <email>, /ai, \
         /add <email> <name>, /back, /history, /image <url>, /help, /exit"
    );
}

fn format_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_default()
}

fn print_contacts(contacts: &[Contact]) {
    for contact in contacts {
        let marker = if contact.is_assistant { "*" } else { " " };
        let preview = contact
            .last_message
            .as_ref()
            .map(|m| match m.kind {
                MessageKind::Image => format!("[image] ({})", format_time(m.timestamp)),
                MessageKind::Text => format!("{} ({})", m.content, format_time(m.timestamp)),
            })
            .unwrap_or_default();
        println!("{} {} <{}> {}", marker, contact.name, contact.email, preview);
    }
}

fn print_message(c: &ChatController, m: &Message) {
    let mine = c.current_user().is_some_and(|u| u.email == m.sender_email);
    let who = if mine { "me" } else { m.sender_email.as_str() };
    let body = match m.kind {
        MessageKind::Image => format!("[image] {}", m.content),
        MessageKind::Text => m.content.clone(),
    };
    println!("{} {}: {}", format_time(m.timestamp), who, body);
}

fn print_transcript(c: &ChatController) {
    if c.transcript().is_empty() {
        println!("(no messages yet)");
    }
    for m in c.transcript() {
        print_message(c, m);
    }
}
