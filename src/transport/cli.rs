//! CLI transport for direct terminal interaction

use anyhow::Result;
use colored::Colorize;
use crossterm::{
    cursor::MoveToColumn,
    execute,
    terminal::{Clear, ClearType},
    tty::IsTty,
};
use std::io::{self, Stdout, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::backend::{ChatBackend, HttpBackend, SessionId, SessionSummary};
use crate::config::Config;
use crate::core::history;
use crate::core::{Entry, EntryKind, EntryRef, Role};
use crate::speech::CommandSpeech;
use crate::ui_backend::{ChatController, SubmitOutcome, UiSurface};

const USER_LABEL: &str = "you>";
const ASSISTANT_LABEL: &str = "companion>";

/// Renders the transcript as scrolling terminal output
///
/// Chunks are printed as they arrive; the thinking line is redrawn in place
/// when stdout is a terminal.
pub struct TerminalSurface {
    out: Stdout,
    tty: bool,
    thinking: Option<EntryRef>,
    streaming: Option<EntryRef>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        let out = io::stdout();
        let tty = out.is_tty();
        Self {
            out,
            tty,
            thinking: None,
            streaming: None,
        }
    }

    fn erase_line(&mut self) {
        if self.tty {
            execute!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        }
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl UiSurface for TerminalSurface {
    fn entry_appended(&mut self, entry: &Entry) {
        match entry.kind() {
            EntryKind::Message(Role::User) => {
                // Echo only when the input was not typed here
                if !self.tty {
                    println!("{} {}", USER_LABEL.bold().green(), entry.text());
                }
            }
            EntryKind::Message(Role::Assistant) => {
                print!("{} {}", ASSISTANT_LABEL.bold().cyan(), entry.text());
                self.streaming = Some(entry.id());
            }
            EntryKind::Thinking => {
                if self.tty {
                    print!("{}", entry.text().dimmed());
                    self.thinking = Some(entry.id());
                }
            }
        }
        self.out.flush().ok();
    }

    fn entry_updated(&mut self, id: EntryRef, text: &str, delta: &str) {
        if self.streaming == Some(id) {
            print!("{}", delta);
        } else if self.thinking == Some(id) {
            self.erase_line();
            print!("{}", text.dimmed());
        }
        self.out.flush().ok();
    }

    fn entry_closed(&mut self, id: EntryRef) {
        if self.streaming == Some(id) {
            println!();
            self.streaming = None;
        }
    }

    fn entry_removed(&mut self, id: EntryRef) {
        if self.thinking == Some(id) {
            self.erase_line();
            self.thinking = None;
            self.out.flush().ok();
        }
    }

    fn cleared(&mut self) {
        if self.streaming.take().is_some() {
            println!();
        }
        self.thinking = None;
        println!("{}", "--- new conversation ---".dimmed());
    }

    fn affordances_changed(&mut self, locked: bool) {
        if !locked {
            show_prompt();
        }
    }

    fn layout_expanded(&mut self) {
        println!();
    }
}

fn show_prompt() {
    print!("> ");
    io::stdout().flush().ok();
}

fn print_error(err: impl std::fmt::Display) {
    eprintln!("{} {}", "Error:".red().bold(), err);
}

/// One line of chat input
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Prompt(&'a str),
    NewChat,
    Sessions,
    Load(&'a str),
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Prompt(line);
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("new"), None) => Input::NewChat,
        (Some("sessions"), None) => Input::Sessions,
        (Some("load"), Some(id)) => Input::Load(id),
        (Some("clear"), None) => Input::Clear,
        (Some("help"), None) => Input::Help,
        (Some("quit" | "exit"), None) => Input::Quit,
        _ => Input::Unknown(trimmed),
    }
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}        start a new conversation", "/new".green());
    println!("  {}   list stored conversations", "/sessions".green());
    println!("  {}  continue a stored conversation", "/load <id>".green());
    println!("  {}      delete every stored conversation", "/clear".green());
    println!("  {}       leave", "/quit".green());
}

fn format_session_row(summary: &SessionSummary) -> String {
    format!("{}  {}", summary.display_date(), summary.id)
}

fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("{}", "No stored conversations.".dimmed());
        return;
    }
    for summary in sessions {
        println!("  {}", format_session_row(summary));
    }
}

fn connect(config: &Config) -> Result<Arc<dyn ChatBackend>> {
    let backend = HttpBackend::new(&config.backend)?;
    tracing::debug!("Using backend {}", backend.base_url());
    Ok(Arc::new(backend))
}

/// Run interactive chat mode
pub async fn run_chat(config: &Config, speak: bool) -> Result<()> {
    let backend = connect(config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut controller =
        ChatController::new(backend, config, Box::new(TerminalSurface::new()), tx);

    let mut speech_config = config.speech.clone();
    speech_config.enabled |= speak;
    if let Some(speech) = CommandSpeech::from_config(&speech_config) {
        controller = controller.with_speech(Arc::new(speech));
    }

    let interactive = io::stdin().is_tty();
    println!("{}", "=== Companion Chat ===".bold().cyan());
    println!("Backend: {}", config.backend.base_url);
    println!("Type {} for commands\n", "/help".green());

    if let Err(e) = controller.start().await {
        // Not fatal: the first prompt retries
        print_error(e);
    }
    show_prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        // Piped input waits for each reply instead of being rejected
        let accept_input = stdin_open && (interactive || !controller.is_exchange_in_flight());

        tokio::select! {
            line = lines.next_line(), if accept_input => {
                let Some(line) = line? else {
                    stdin_open = false;
                    if !controller.is_exchange_in_flight() {
                        break;
                    }
                    continue;
                };
                if !handle_line(&mut controller, &line).await {
                    break;
                }
            }
            Some(event) = rx.recv() => {
                controller.handle_event(event);
                if !stdin_open && !controller.is_exchange_in_flight() {
                    break;
                }
            }
        }
    }

    println!();
    println!("Goodbye!");
    Ok(())
}

/// Apply one input line; returns `false` to leave
async fn handle_line(controller: &mut ChatController, line: &str) -> bool {
    match parse_input(line) {
        Input::Quit => return false,
        Input::Prompt(text) => match controller.submit(text).await {
            Ok(SubmitOutcome::Started(_)) => {}
            Ok(SubmitOutcome::Busy) => {
                println!(
                    "{}",
                    "Still answering; wait for the reply to finish.".yellow()
                );
            }
            Ok(SubmitOutcome::Ignored) => show_prompt(),
            Err(e) => {
                print_error(e);
                show_prompt();
            }
        },
        Input::NewChat => {
            if let Err(e) = controller.new_chat().await {
                print_error(e);
            }
            show_prompt();
        }
        Input::Sessions => {
            match controller.list_sessions().await {
                Ok(sessions) => print_sessions(&sessions),
                Err(e) => print_error(e),
            }
            show_prompt();
        }
        Input::Load(id) => {
            match controller.load_session(SessionId::new(id)).await {
                Ok(0) => println!("{}", "Conversation is empty.".dimmed()),
                Ok(_) => {}
                Err(e) => print_error(e),
            }
            show_prompt();
        }
        Input::Clear => {
            match controller.clear_history().await {
                Ok(_) => println!("{}", "All conversations deleted.".yellow()),
                Err(e) => print_error(e),
            }
            show_prompt();
        }
        Input::Help => {
            print_help();
            show_prompt();
        }
        Input::Unknown(command) => {
            println!("Unknown command: {}", command);
            print_help();
            show_prompt();
        }
    }
    true
}

/// Print the stored conversations
pub async fn run_sessions(config: &Config) -> Result<()> {
    let backend = connect(config)?;
    let sessions = history::list_sessions(backend.as_ref()).await?;
    print_sessions(&sessions);
    Ok(())
}

/// Print one stored conversation in replay order
pub async fn run_history(config: &Config, id: &str) -> Result<()> {
    let backend = connect(config)?;
    let stored = history::fetch_history(backend.as_ref(), &SessionId::new(id)).await?;

    let entries = history::replay_order(&stored);
    if entries.is_empty() {
        println!("{}", "Conversation is empty.".dimmed());
    }
    for (role, text) in entries {
        match role {
            Role::User => println!("{} {}", USER_LABEL.bold().green(), text),
            Role::Assistant => println!("{} {}", ASSISTANT_LABEL.bold().cyan(), text),
        }
    }
    Ok(())
}

/// Delete every stored conversation
pub async fn run_clear(config: &Config) -> Result<()> {
    let backend = connect(config)?;
    backend.clear_sessions().await?;
    println!("{} All conversations deleted.", "✓".green());
    Ok(())
}
