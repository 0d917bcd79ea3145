mod terminal;

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;

use chat_api::ChatApiClient;
use clap::Parser;
use ragchat::render::prewarm_code_highlighting;
use ragchat::{logging, ChatController, EnvConfig, SessionStatus};

use crate::terminal::{print_block, ProgressLine, StdoutPanel, TerminalList};

/// Send a message to the chat server and print the rendered answer as HTML.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(name = "ragchat")]
#[command(version)]
struct Args {
    /// Print the greeting and knowledge areas instead of sending a message
    #[arg(long)]
    areas: bool,

    /// Also print the retrieved passages backing the answer
    #[arg(long)]
    sources: bool,

    /// Do not draw live progress on stderr
    #[arg(short, long)]
    quiet: bool,

    /// Message to send; read from stdin when omitted
    message: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(2);
        }
    };
    logging::init(config.log_filter.as_deref());

    let client = match ChatApiClient::new(config.api_config()) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "failed to build chat client");
            return ExitCode::from(2);
        }
    };
    let controller = Arc::new(ChatController::new(client, config.pipeline()));

    if args.areas {
        let mut list = TerminalList::echoing();
        let mut sidebar = StdoutPanel;
        return if controller.load_knowledge_areas(&mut list, &mut sidebar).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let message = match read_message(&args.message) {
        Ok(message) => message,
        Err(error) => {
            eprintln!("failed to read message from stdin: {error}");
            return ExitCode::from(2);
        }
    };

    let _ = std::thread::Builder::new()
        .name("code-highlight-prewarm".to_string())
        .spawn(prewarm_code_highlighting);

    let cancel_on_interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                controller.cancel_active();
            }
        })
    };

    let progress = !args.quiet && io::stderr().is_terminal();
    let mut list = TerminalList::new(progress, config.cursor.clone());
    let mut control = ProgressLine::new(progress);
    let result = controller.send(&message, &mut list, &mut control).await;
    cancel_on_interrupt.abort();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(error) => {
            eprintln!("ragchat: {error}");
            return ExitCode::from(2);
        }
    };

    print_block(outcome.message.html());
    if args.sources {
        if let Some(view) = &outcome.sources {
            view.open(&mut StdoutPanel);
        }
    }

    match outcome.status() {
        SessionStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn read_message(words: &[String]) -> io::Result<String> {
    if !words.is_empty() {
        return Ok(words.join(" "));
    }
    let mut message = String::new();
    io::stdin().read_to_string(&mut message)?;
    Ok(message)
}
