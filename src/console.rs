use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use crate::config::APP_NAME;
use crate::models::{Role, SessionCollection};
use crate::services::export::export_to_markdown;
use crate::services::{Orchestrator, RejectReason, SubmitOutcome};

const HELP: &str = "\
Commands:
  /new                  start a new chat
  /list                 list chats (* marks the active one)
  /select <n|id>        switch to a chat
  /rename <n|id> <title>
  /delete <n|id>
  /export               print the active chat as Markdown
  /help
  /quit
Anything else is sent to the assistant.";

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleMsg {
    NewChat,
    ListChats,
    SelectChat(String),
    RenameChat(String, String),
    DeleteChat(String),
    Export,
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

pub fn parse_line(line: &str) -> Option<ConsoleMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Some(ConsoleMsg::Send(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    let msg = match (name, rest) {
        ("new", _) => ConsoleMsg::NewChat,
        ("list", _) => ConsoleMsg::ListChats,
        ("export", _) => ConsoleMsg::Export,
        ("help", _) => ConsoleMsg::Help,
        ("quit" | "exit", _) => ConsoleMsg::Quit,
        ("select", target) if !target.is_empty() => ConsoleMsg::SelectChat(target.to_string()),
        ("delete", target) if !target.is_empty() => ConsoleMsg::DeleteChat(target.to_string()),
        ("rename", args) => match args
            .split_once(char::is_whitespace)
            .map(|(target, title)| (target, title.trim()))
        {
            Some((target, title)) if !title.is_empty() => {
                ConsoleMsg::RenameChat(target.to_string(), title.to_string())
            }
            _ => ConsoleMsg::Invalid("usage: /rename <n|id> <title>".to_string()),
        },
        _ => ConsoleMsg::Invalid(format!("unknown command /{}, try /help", name)),
    };
    Some(msg)
}

/// Map a 1-based list position or a literal id to a conversation id.
pub fn resolve_target(collection: &SessionCollection, target: &str) -> Option<String> {
    if let Ok(n) = target.parse::<usize>() {
        if let Some(conv) = n.checked_sub(1).and_then(|i| collection.conversations.get(i)) {
            return Some(conv.id.clone());
        }
    }
    collection.find(target).map(|c| c.id.clone())
}

pub struct Console {
    orchestrator: Arc<Orchestrator>,
    pending: JoinSet<()>,
}

impl Console {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            pending: JoinSet::new(),
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!("{}: type /help for commands", APP_NAME);
        self.list_chats();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(msg) = parse_line(&line) else {
                continue;
            };
            if msg == ConsoleMsg::Quit {
                break;
            }
            self.update(msg);
        }

        // Let replies that are still on their way land in history before exit.
        self.drain_pending().await;
        Ok(())
    }

    async fn drain_pending(&mut self) {
        while let Some(result) = self.pending.join_next().await {
            if let Err(e) = result {
                tracing::error!("Submission task failed: {}", e);
            }
        }
    }

    fn update(&mut self, msg: ConsoleMsg) {
        let session = self.orchestrator.session().clone();
        match msg {
            ConsoleMsg::NewChat => {
                let mut store = session.lock();
                let id = store.create_conversation();
                if let Some(conversation) = store.conversation(&id) {
                    println!("Started {}", conversation.title);
                }
            }
            ConsoleMsg::ListChats => self.list_chats(),
            ConsoleMsg::SelectChat(target) => {
                let mut store = session.lock();
                match resolve_target(store.collection(), &target) {
                    Some(id) => {
                        store.select_conversation(&id);
                        for message in store.active_messages() {
                            print_message(message.role, &message.text);
                        }
                    }
                    None => println!("No chat matches {}", target),
                }
            }
            ConsoleMsg::RenameChat(target, title) => {
                let mut store = session.lock();
                match resolve_target(store.collection(), &target) {
                    Some(id) => {
                        store.rename_conversation(&id, &title);
                    }
                    None => println!("No chat matches {}", target),
                }
            }
            ConsoleMsg::DeleteChat(target) => {
                let mut store = session.lock();
                match resolve_target(store.collection(), &target) {
                    Some(id) => {
                        store.delete_conversation(&id);
                    }
                    None => println!("No chat matches {}", target),
                }
            }
            ConsoleMsg::Export => {
                let store = session.lock();
                match store.collection().active() {
                    Some(conversation) => println!("{}", export_to_markdown(conversation)),
                    None => println!("No active chat"),
                }
            }
            ConsoleMsg::Help => println!("{}", HELP),
            ConsoleMsg::Invalid(reason) => println!("{}", reason),
            ConsoleMsg::Send(text) => self.send(text),
            ConsoleMsg::Quit => {}
        }
    }

    fn send(&mut self, text: String) {
        if self.orchestrator.is_busy() {
            println!("Still waiting for the previous reply");
            return;
        }

        {
            let mut store = self.orchestrator.session().lock();
            if store.active_id().is_none() {
                store.create_conversation();
            }
        }

        let orchestrator = self.orchestrator.clone();
        self.pending.spawn(async move {
            match orchestrator.submit(&text).await {
                SubmitOutcome::Replied { conversation_id }
                | SubmitOutcome::Failed {
                    conversation_id, ..
                } => {
                    let store = orchestrator.session().lock();
                    if let Some(last) = store
                        .conversation(&conversation_id)
                        .and_then(|c| c.messages.last())
                    {
                        print_message(last.role, &last.text);
                    }
                }
                SubmitOutcome::Rejected(RejectReason::Busy) => {
                    println!("Still waiting for the previous reply")
                }
                SubmitOutcome::Rejected(reason) => {
                    tracing::debug!("Submission rejected: {:?}", reason)
                }
            }
        });
    }

    fn list_chats(&self) {
        let session = self.orchestrator.session().lock();
        if session.conversations().is_empty() {
            println!("No chats yet, type a message or /new to start one");
            return;
        }
        for (i, conv) in session.conversations().iter().enumerate() {
            let marker = if session.active_id() == Some(conv.id.as_str()) {
                '*'
            } else {
                ' '
            };
            println!(
                "{} {:>2}. {} ({} messages)",
                marker,
                i + 1,
                conv.title,
                conv.messages.len()
            );
        }
    }
}

fn print_message(role: Role, text: &str) {
    println!("[{}] {}", role.display_name(), text);
}
