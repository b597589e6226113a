//! Visitor console. Reads lines from stdin as one visitor, prints the bot's
//! replies to stdout.
//!
//! Lines starting with `/` are commands:
//!
//! ```text
//! /handover   ask for a human agent
//! /summary    print the agent handoff digest
//! /close      close the session and exit
//! ```
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), stdin closes or
//! the session is closed.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::livechat::LiveChat;
use crate::session::VisitorInfo;

enum Input<'a> {
    Message(&'a str),
    Handover,
    Summary,
    Close,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line {
        "/handover" => Input::Handover,
        "/summary" => Input::Summary,
        "/close" => Input::Close,
        cmd if cmd.starts_with('/') => Input::Unknown(cmd),
        text => Input::Message(text),
    }
}

pub async fn run(chat: &LiveChat, visitor: VisitorInfo, shutdown: CancellationToken) -> Result<(), AppError> {
    let session = chat.open_session(visitor).await?;
    info!(session_id = %session.id, status = %session.status, "console session open");
    println!("─────────────────────────────────");
    println!(" Live chat console  (Ctrl-C to quit)");
    println!(" /handover  /summary  /close");
    println!("─────────────────────────────────");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => line,
        };

        let input = match line {
            Err(e) => {
                warn!("console read error: {e}");
                break;
            }
            Ok(None) => {
                info!("console stdin closed");
                break;
            }
            Ok(Some(input)) => input,
        };
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        debug!(input, "console received line");

        match parse_input(input) {
            Input::Message(text) => {
                let response = chat.handle_visitor_message(&session.id, text, &shutdown).await?;
                if !response.reply.is_empty() {
                    println!("{}", response.reply);
                }
                if response.suggest_handover {
                    println!("[ketik /handover untuk bicara dengan admin]");
                }
            }
            Input::Handover => {
                let agent_online = chat.sessions.request_handover(&session.id).await?;
                if agent_online {
                    println!("[menunggu admin bergabung]");
                } else {
                    println!("[belum ada admin online, mohon tunggu]");
                }
            }
            Input::Summary => {
                println!("{}", chat.sessions.summarize(&session.id).await?);
            }
            Input::Close => {
                chat.sessions.close_session(&session.id).await?;
                println!("[sesi ditutup]");
                break;
            }
            Input::Unknown(cmd) => println!("unknown command: {cmd}"),
        }
    }

    Ok(())
}
