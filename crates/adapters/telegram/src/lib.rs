//! Telegram user-session adapter (grammers).
//!
//! Owns everything about the network session: connecting, the interactive login that creates
//! the session file, listing dialogs, and turning new-message updates into [`InboundEvent`]s
//! pushed to the relay over an mpsc channel. The relay never sees grammers types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use grammers_client::types::{Chat, Message};
use grammers_client::{
    Client, Config as ClientConfig, FixedReconnect, InitParams, ReconnectionPolicy, SignInError,
    Update,
};
use grammers_session::Session;
use lib::config::TelegramSettings;
use lib::discover::DialogSummary;
use lib::event::{ConversationKind, InboundEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Channels and supergroups are addressed as `-(CHANNEL_ID_OFFSET + id)`.
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Reconnect policy for dropped connections. grammers defaults to never reconnecting.
static RECONNECT_POLICY: FixedReconnect = FixedReconnect {
    attempts: 20,
    delay: Duration::from_secs(5),
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session file {path}: {source}")]
    SessionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("connecting to telegram: {0}")]
    Connect(String),
    #[error("session is not authorized; run `tg-relay login` first")]
    NotAuthorized,
    #[error("login failed: {0}")]
    Login(String),
    #[error("reading login input: {0}")]
    Prompt(#[from] std::io::Error),
    #[error("telegram request failed: {0}")]
    Request(String),
}

/// Connected Telegram client plus the path its session is persisted to.
#[derive(Clone)]
pub struct TelegramSession {
    client: Client,
    session_path: PathBuf,
}

impl TelegramSession {
    /// Load (or create) the session file and connect. Does not require the session to be authorized.
    pub async fn connect(settings: &TelegramSettings) -> Result<Self, SessionError> {
        let session_path = settings.session_path.clone();
        if let Some(dir) = session_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|source| SessionError::SessionFile {
                    path: session_path.clone(),
                    source,
                })?;
                log::info!("created session directory {}", dir.display());
            }
        }
        let session =
            Session::load_file_or_create(&session_path).map_err(|source| SessionError::SessionFile {
                path: session_path.clone(),
                source,
            })?;
        log::info!("session storage: {}", session_path.display());
        log::info!("connecting to telegram as {}", settings.phone);

        let client = Client::connect(ClientConfig {
            session,
            api_id: settings.api_id,
            api_hash: settings.api_hash.clone(),
            params: init_params(),
        })
        .await
        .map_err(|e| SessionError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            session_path,
        })
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    pub async fn is_authorized(&self) -> Result<bool, SessionError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))
    }

    /// Fail with [`SessionError::NotAuthorized`] unless a previous login was saved.
    pub async fn require_authorized(&self) -> Result<(), SessionError> {
        if self.is_authorized().await? {
            Ok(())
        } else {
            Err(SessionError::NotAuthorized)
        }
    }

    /// Persist the session so later runs reconnect without logging in.
    pub fn save(&self) -> Result<(), SessionError> {
        self.client
            .session()
            .save_to_file(&self.session_path)
            .map_err(|source| SessionError::SessionFile {
                path: self.session_path.clone(),
                source,
            })
    }

    /// Interactive login: request a code for `phone`, ask for it (and the 2FA password when the
    /// account has one) through `prompt`, then save the session file.
    pub async fn login_interactive<P>(&self, phone: &str, mut prompt: P) -> Result<(), SessionError>
    where
        P: FnMut(&str) -> std::io::Result<String>,
    {
        if self.is_authorized().await? {
            log::info!("session already authorized");
            return Ok(());
        }
        let token = self
            .client
            .request_login_code(phone)
            .await
            .map_err(|e| SessionError::Login(e.to_string()))?;
        let code = prompt("Enter the code you received: ")?;
        match self.client.sign_in(&token, code.trim()).await {
            Ok(_) => {}
            Err(SignInError::PasswordRequired(password_token)) => {
                let question = match password_token.hint() {
                    Some(hint) => format!("Enter your 2FA password (hint: {}): ", hint),
                    None => "Enter your 2FA password: ".to_string(),
                };
                let password = prompt(&question)?;
                self.client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(|e| SessionError::Login(e.to_string()))?;
            }
            Err(e) => return Err(SessionError::Login(e.to_string())),
        }
        self.save()?;
        log::info!("signed in; session saved to {}", self.session_path.display());
        Ok(())
    }

    /// All dialogs of the account, in the order the server returns them.
    pub async fn list_dialogs(&self) -> Result<Vec<DialogSummary>, SessionError> {
        let mut dialogs = self.client.iter_dialogs();
        let mut out = Vec::new();
        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?
        {
            let chat = dialog.chat();
            let kind = chat_kind(chat);
            out.push(DialogSummary {
                name: chat.name().to_string(),
                id: marked_id(kind, chat.id(), is_supergroup(chat)),
                kind,
            });
        }
        Ok(out)
    }

    /// Spawn the update loop. Each incoming new message is sent to `inbound_tx` in arrival order.
    /// The task ends when the receiver is dropped or the update stream fails.
    pub fn start_inbound(
        &self,
        inbound_tx: mpsc::Sender<InboundEvent>,
    ) -> JoinHandle<Result<(), SessionError>> {
        let client = self.client.clone();
        log::info!("telegram session: listening for new messages");
        tokio::spawn(async move { run_update_loop(client, inbound_tx).await })
    }
}

fn init_params() -> InitParams {
    InitParams {
        reconnection_policy: reconnect_policy(),
        ..InitParams::default()
    }
}

fn reconnect_policy() -> &'static dyn ReconnectionPolicy {
    &RECONNECT_POLICY
}

async fn run_update_loop(
    client: Client,
    inbound_tx: mpsc::Sender<InboundEvent>,
) -> Result<(), SessionError> {
    loop {
        let update = client
            .next_update()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        let Update::NewMessage(message) = update else {
            continue;
        };
        if message.outgoing() {
            continue;
        }
        let event = inbound_event(&message);
        if inbound_tx.send(event).await.is_err() {
            log::debug!("telegram: inbound channel closed, stopping update loop");
            return Ok(());
        }
    }
}

fn inbound_event(message: &Message) -> InboundEvent {
    let chat = message.chat();
    let kind = chat_kind(&chat);
    let sender_id = message.sender().map(|sender| {
        let sender_kind = chat_kind(&sender);
        marked_id(sender_kind, sender.id(), is_supergroup(&sender))
    });
    let text = message.text();
    InboundEvent {
        chat_id: marked_id(kind, chat.id(), is_supergroup(&chat)),
        sender_id,
        text: if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        },
        date: message.date(),
        kind,
        message_id: message.id(),
        reply_to_msg_id: message.reply_to_message_id(),
    }
}

fn chat_kind(chat: &Chat) -> ConversationKind {
    match chat {
        Chat::User(_) => ConversationKind::Direct,
        Chat::Group(_) => ConversationKind::Group,
        Chat::Channel(_) => ConversationKind::Channel,
    }
}

fn is_supergroup(chat: &Chat) -> bool {
    match chat {
        Chat::Group(group) => group.is_megagroup(),
        _ => false,
    }
}

/// Network-style "marked" id: users as-is, basic groups negated, channels and supergroups
/// as `-100…id`.
pub fn marked_id(kind: ConversationKind, raw_id: i64, supergroup: bool) -> i64 {
    match kind {
        ConversationKind::Direct => raw_id,
        ConversationKind::Group if !supergroup => -raw_id,
        ConversationKind::Group | ConversationKind::Channel => -(CHANNEL_ID_OFFSET + raw_id),
    }
}
