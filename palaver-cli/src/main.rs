//! CLI entry point for palaver
//!
//! A thin presentation surface: it only raises events into the session
//! manager and renders the state it reads back.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Input, Password, Select};
use palaver_core::config::{Config, ConfigLoader};
use palaver_core::logging::init_logging;
use palaver_core::model::{Message, Role};
use palaver_providers::MistralClient;
use palaver_session::{CredentialMode, SessionManager};
use palaver_store::{ConversationStore, CredentialStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(name = "palaver")]
#[command(about = "A terminal chat client with persistent per-user history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };

    match cli.command {
        Commands::Init => init_config(&loader),
        Commands::Chat => chat(&loader).await,
    }
}

fn init_config(loader: &ConfigLoader) -> Result<()> {
    loader.save(&Config::default())?;
    println!(
        "Wrote {}",
        loader.config_dir().join("config.json").display()
    );
    Ok(())
}

async fn chat(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let _log_guard = init_logging(&config.logging);

    let pool = palaver_store::connect(&config.storage.database_path).await?;
    let provider = Arc::new(MistralClient::from_config(&config.provider));
    let mut manager = SessionManager::new(
        CredentialStore::new(pool.clone()),
        ConversationStore::new(pool),
        provider,
    );

    println!(
        "{}",
        style(format!("Model: {}", manager.gateway_model())).dim()
    );

    loop {
        if !sign_in(&mut manager).await? {
            return Ok(());
        }
        // false from the repl means /logout; anything else ends the program.
        if !repl(&mut manager).await? {
            return Ok(());
        }
    }
}

/// Returns false when the user chooses to quit instead of signing in
async fn sign_in(manager: &mut SessionManager) -> Result<bool> {
    while !manager.is_authenticated() {
        let choice = Select::new()
            .with_prompt("Welcome to palaver")
            .items(&["Login", "Signup", "Quit"])
            .default(0)
            .interact()?;
        let mode = match choice {
            0 => CredentialMode::Login,
            1 => CredentialMode::Signup,
            _ => return Ok(false),
        };

        let username: String = Input::new().with_prompt("Username").interact_text()?;
        let password = Password::new().with_prompt("Password").interact()?;

        match manager.submit_credentials(&username, &password, mode).await {
            Ok(()) if mode == CredentialMode::Signup => {
                println!("{}", style("Signup successful, please log in.").green());
            }
            Ok(()) => {
                println!("{}", style(format!("Welcome, {username}!")).green());
            }
            Err(e) => {
                println!("{}", style(e.to_string()).red());
            }
        }
    }

    render_transcript(manager.messages());
    Ok(true)
}

/// Returns false on /quit, true on /logout
async fn repl(manager: &mut SessionManager) -> Result<bool> {
    print_help();
    loop {
        let line: String = Input::new()
            .with_prompt(style("you").cyan().to_string())
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" => return Ok(false),
            "/logout" => {
                manager.logout();
                return Ok(true);
            }
            "/new" => {
                manager.start_new_conversation();
                println!("{}", style("Started a new conversation.").dim());
            }
            "/list" => render_index(manager),
            "/clear" => {
                if let Err(e) = manager.clear_all_history().await {
                    report(&e.to_string());
                } else {
                    println!("{}", style("All history cleared.").dim());
                }
            }
            "/help" => print_help(),
            _ if line.starts_with("/load ") || line.starts_with("/delete ") => {
                handle_indexed_command(manager, line).await;
            }
            _ if line.starts_with('/') => {
                println!("{}", style("Unknown command; try /help.").dim());
            }
            text => {
                if let Err(e) = manager.send_message(text).await {
                    error!(error = %e, "send failed");
                    report(&e.to_string());
                    continue;
                }
                if let Some(reply) = manager.messages().last() {
                    render_message(reply);
                }
            }
        }
    }
}

async fn handle_indexed_command(manager: &mut SessionManager, line: &str) {
    let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
    let Ok(index) = arg.trim().parse::<usize>() else {
        println!("{}", style("Expected a conversation number; see /list.").dim());
        return;
    };
    let Some(id) = manager
        .conversation_summaries()
        .get(index.wrapping_sub(1))
        .map(|s| s.id)
    else {
        println!("{}", style("No such conversation; see /list.").dim());
        return;
    };

    let result = match command {
        "/load" => manager.select_conversation(id).await,
        _ => manager.delete_conversation(id).await,
    };
    match result {
        Ok(()) if command == "/load" => render_transcript(manager.messages()),
        Ok(()) => println!("{}", style("Conversation deleted.").dim()),
        Err(e) => report(&e.to_string()),
    }
}

fn render_index(manager: &SessionManager) {
    let summaries = manager.conversation_summaries();
    if summaries.is_empty() {
        println!("{}", style("No conversations yet.").dim());
        return;
    }
    for (i, summary) in summaries.iter().enumerate() {
        let marker = if Some(summary.id) == manager.active_conversation() {
            "*"
        } else {
            " "
        };
        println!(
            "{marker}{} {} {}",
            style(format!("[{}]", i + 1)).cyan(),
            summary.title,
            style(summary.created_at.format("%Y-%m-%d %H:%M").to_string()).dim(),
        );
    }
}

fn render_transcript(messages: &[Message]) {
    for message in messages {
        render_message(message);
    }
}

fn render_message(message: &Message) {
    let name = match message.role {
        Role::User => style("you").cyan(),
        Role::Assistant => style("assistant").magenta(),
    };
    println!("{name}: {}", message.content);
}

fn report(error: &str) {
    println!("{}", style(error).red());
}

fn print_help() {
    println!(
        "{}",
        style("Commands: /new /list /load <n> /delete <n> /clear /logout /quit /help").dim()
    );
}
