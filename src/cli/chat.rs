use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::{ChatSession, ChatTarget, Role, SessionState};
use crate::core::AppConfig;

#[derive(Debug, PartialEq)]
enum Input<'a> {
    Message(&'a str),
    Reset,
    Switch(ChatTarget),
    Token(&'a str),
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line);
    };
    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("reset"), None) => Input::Reset,
        (Some("global"), None) => Input::Switch(ChatTarget::Global),
        (Some("article"), Some(id)) => match id.parse::<i64>() {
            Ok(id) => Input::Switch(ChatTarget::Article(id)),
            Err(_) => Input::Unknown(line),
        },
        (Some("token"), Some(token)) if parts.next().is_none() => Input::Token(token),
        _ => Input::Unknown(line),
    }
}

fn prompt(target: ChatTarget) -> String {
    match target {
        ChatTarget::Global => "global >>> ".to_string(),
        ChatTarget::Article(id) => format!("article {} >>> ", id),
    }
}

/// Turns successive snapshots into the text to print, so the reply
/// appears as it streams.
#[derive(Default)]
struct ReplyPrinter {
    printed: String,
}

impl ReplyPrinter {
    fn next_output(&mut self, state: &SessionState) -> Option<String> {
        let reply = state
            .messages
            .last()
            .filter(|m| m.role == Role::Assistant)?;
        let out = match reply.content.strip_prefix(self.printed.as_str()) {
            Some(rest) if rest.is_empty() => return None,
            Some(rest) => rest.to_string(),
            // The reply was replaced, e.g. by an error message
            None => format!("\n{}", reply.content),
        };
        self.printed = reply.content.clone();
        Some(out)
    }

    fn render(&mut self, state: &SessionState) {
        if let Some(out) = self.next_output(state) {
            print!("{}", out);
            let _ = io::stdout().flush();
        }
    }
}

async fn stream_turn(session: &Arc<ChatSession>, content: &str, target: ChatTarget) {
    let mut rx = session.subscribe();
    rx.borrow_and_update();

    let mut send = tokio::spawn({
        let session = session.clone();
        let content = content.to_string();
        async move { session.send_message(&content, target).await }
    });

    let mut printer = ReplyPrinter::default();
    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            changed = rx.changed() => match changed {
                Ok(()) => {
                    let state = rx.borrow_and_update().clone();
                    printer.render(&state);
                }
                Err(_) => break (&mut send).await,
            },
            _ = tokio::signal::ctrl_c() => {
                session.reset_chat();
                println!("\n(interrupted, chat reset)");
            }
        }
    };
    printer.render(&session.state());
    println!();

    match result {
        Ok(Err(err)) if err.is_unauthorized() => {
            println!("Your token was rejected. Run `hnchat login` and update HNCHAT_TOKEN.");
        }
        Ok(_) => {}
        Err(err) => tracing::error!("Chat task failed: {}", err),
    }
}

pub async fn run(config: AppConfig, article: Option<i64>) -> Result<()> {
    let session = Arc::new(ChatSession::from_config(&config)?);
    let mut target = article.map(ChatTarget::Article).unwrap_or_default();
    let mut rl = DefaultEditor::new()?;

    if config.token.is_none() {
        println!("No token configured. Run `hnchat login` and set HNCHAT_TOKEN to chat.");
    }
    println!("Commands: /reset, /global, /article <id>, /token <token>. Ctrl-D to quit.");

    loop {
        let readline = rl.readline(&prompt(target));
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // Keep tokens out of the line history
                if !line.starts_with("/token") {
                    let _ = rl.add_history_entry(line);
                }

                match parse_input(line) {
                    Input::Message(content) => stream_turn(&session, content, target).await,
                    Input::Reset => {
                        session.reset_chat();
                        println!("(chat reset)");
                    }
                    Input::Switch(next) => {
                        if next != target {
                            target = next;
                            session.reset_chat();
                        }
                    }
                    Input::Token(token) => {
                        session.set_token(Some(token.to_string()));
                        println!("(token updated)");
                    }
                    Input::Unknown(cmd) => println!("Unknown command: {}", cmd),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
