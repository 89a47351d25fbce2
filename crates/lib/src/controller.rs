//! Application controller: login/logout, contact selection, sending, and assistant replies.
//!
//! All session state lives in [`ChatController`] and is mutated one operation at a time.
//! Sending to the assistant is split in two phases so the caller can show a "thinking" state:
//! [`ChatController::send_message`] persists the user's message and hands back a
//! [`ReplyTicket`]; [`ChatController::complete_reply`] applies whatever the responder produced.
//! A reply is always persisted, but it is appended to the visible transcript only while the
//! addressed viewer is logged in with the assistant conversation open.

use std::sync::Arc;

use crate::llm::{ChatTurn, LlmError, Responder};
use crate::model::{Contact, Message, MessageKind, User, ASSISTANT_EMAIL};
use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("no conversation selected")]
    NoActiveContact,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// An outstanding assistant reply: the history to send and who it is addressed to.
#[derive(Debug, Clone)]
pub struct ReplyTicket {
    request_id: u64,
    viewer: String,
    history: Vec<ChatTurn>,
}

impl ReplyTicket {
    /// Full visible conversation including the message just sent (last element).
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Email of the user the reply is addressed to.
    pub fn viewer(&self) -> &str {
        &self.viewer
    }
}

pub struct ChatController {
    store: Store,
    responder: Arc<dyn Responder>,
    session: Option<User>,
    contacts: Vec<Contact>,
    active_contact: Option<String>,
    transcript: Vec<Message>,
    next_request: u64,
    pending_request: Option<u64>,
}

fn required(field: &str, value: &str) -> Result<String, ControllerError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ControllerError::InvalidInput(format!("{} is required", field)));
    }
    Ok(v.to_string())
}

impl ChatController {
    pub fn new(store: Store, responder: Arc<dyn Responder>) -> Self {
        Self {
            store,
            responder,
            session: None,
            contacts: Vec::new(),
            active_contact: None,
            transcript: Vec::new(),
            next_request: 0,
            pending_request: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref()
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn active_contact(&self) -> Option<&str> {
        self.active_contact.as_deref()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn is_assistant_reply_pending(&self) -> bool {
        self.pending_request.is_some()
    }

    fn viewer_email(&self) -> Result<String, ControllerError> {
        self.session
            .as_ref()
            .map(|u| u.email.clone())
            .ok_or(ControllerError::NotLoggedIn)
    }

    fn navigate(&mut self, active: Option<String>, transcript: Vec<Message>) {
        self.active_contact = active;
        self.transcript = transcript;
    }

    /// Log back in as the persisted session user, if any. A persisted session with a blank
    /// email or name is discarded and the controller stays logged out.
    pub fn restore(&mut self) -> Result<Option<&User>, ControllerError> {
        let Some(user) = self.store.current_user()? else {
            return Ok(None);
        };
        log::debug!("controller: restoring session for {}", user.email);
        match self.login(user) {
            Ok(()) => Ok(self.session.as_ref()),
            Err(ControllerError::InvalidInput(reason)) => {
                log::warn!("controller: discarding persisted session: {}", reason);
                self.store.set_current_user(None)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Persist the session (creating or overwriting the user record) and load contacts.
    pub fn login(&mut self, user: User) -> Result<(), ControllerError> {
        let user = User {
            email: required("email", &user.email)?,
            name: required("name", &user.name)?,
            avatar: user.avatar,
        };
        self.store.set_current_user(Some(&user))?;
        log::info!("controller: logged in as {}", user.email);
        self.session = Some(user);
        self.pending_request = None;
        self.navigate(None, Vec::new());
        self.refresh_contacts()
    }

    /// Clear the session and drop all in-memory conversation state.
    pub fn logout(&mut self) -> Result<(), ControllerError> {
        self.store.set_current_user(None)?;
        if let Some(u) = self.session.take() {
            log::info!("controller: logged out {}", u.email);
        }
        self.contacts.clear();
        self.pending_request = None;
        self.navigate(None, Vec::new());
        Ok(())
    }

    /// Recompute the contact list from the store.
    pub fn refresh_contacts(&mut self) -> Result<(), ControllerError> {
        let viewer = self.viewer_email()?;
        self.contacts = self.store.contacts_for_user(&viewer)?;
        Ok(())
    }

    /// Open the conversation with `email` and load its history.
    pub fn select_contact(&mut self, email: &str) -> Result<(), ControllerError> {
        let viewer = self.viewer_email()?;
        let email = required("email", email)?;
        let transcript = self.store.conversation(&viewer, &email)?;
        self.navigate(Some(email), transcript);
        Ok(())
    }

    /// Leave the current conversation (back to the contact list).
    pub fn clear_active_contact(&mut self) {
        self.navigate(None, Vec::new());
    }

    /// Register `email` if unknown, open an empty conversation with it, and show it in the
    /// contact list immediately. The provisional entry is replaced on the next refresh.
    pub fn add_contact(&mut self, email: &str, name: &str) -> Result<(), ControllerError> {
        self.viewer_email()?;
        let email = required("email", email)?;
        let name = required("name", name)?;
        if self.store.user(&email)?.is_none() {
            self.store.save_user(&User::new(email.clone(), name.clone()))?;
            log::info!("controller: added contact {}", email);
        }
        if !self.contacts.iter().any(|c| c.email == email) {
            self.contacts.insert(0, Contact::empty(email.clone(), name));
        }
        self.navigate(Some(email), Vec::new());
        Ok(())
    }

    /// Header record for the open conversation: the listed contact, else the directory
    /// entry, else a placeholder named after the email.
    pub fn active_contact_info(&self) -> Option<Contact> {
        let email = self.active_contact.as_deref()?;
        if let Some(c) = self.contacts.iter().find(|c| c.email == email) {
            return Some(c.clone());
        }
        match self.store.user(email) {
            Ok(Some(u)) => Some(Contact::empty(u.email, u.name)),
            Ok(None) => Some(Contact::empty(email, email)),
            Err(e) => {
                log::warn!("controller: looking up {}: {}", email, e);
                Some(Contact::empty(email, email))
            }
        }
    }

    /// Send `text` to the active contact. Blank text is ignored (`Ok(None)`).
    ///
    /// When the active contact is the assistant, the returned ticket must be completed with
    /// [`ChatController::complete_reply`]; until then the reply-pending flag is set.
    pub fn send_message(
        &mut self,
        text: &str,
        kind: MessageKind,
    ) -> Result<Option<ReplyTicket>, ControllerError> {
        let viewer = self.viewer_email()?;
        let to = self
            .active_contact
            .clone()
            .ok_or(ControllerError::NoActiveContact)?;
        let content = text.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let message = Message::new(viewer.clone(), to.clone(), content, kind);
        self.store.save_message(&message)?;
        self.transcript.push(message);
        self.refresh_contacts()?;

        if to != ASSISTANT_EMAIL {
            return Ok(None);
        }

        let history = self
            .transcript
            .iter()
            .map(|m| {
                if m.sender_email == viewer {
                    ChatTurn::user(m.content.clone())
                } else {
                    ChatTurn::model(m.content.clone())
                }
            })
            .collect();
        self.next_request += 1;
        let request_id = self.next_request;
        self.pending_request = Some(request_id);
        log::debug!("controller: assistant reply {} pending", request_id);
        Ok(Some(ReplyTicket {
            request_id,
            viewer,
            history,
        }))
    }

    /// Apply the outcome of an assistant request. Failures are logged and leave the
    /// transcript unchanged. Returns the persisted reply, if any.
    pub fn complete_reply(
        &mut self,
        ticket: ReplyTicket,
        result: Result<String, LlmError>,
    ) -> Option<Message> {
        if self.pending_request == Some(ticket.request_id) {
            self.pending_request = None;
        }
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                log::error!("controller: assistant reply {} failed: {}", ticket.request_id, e);
                return None;
            }
        };

        let reply = Message::new(ASSISTANT_EMAIL, ticket.viewer.clone(), text, MessageKind::Text);
        if let Err(e) = self.store.save_message(&reply) {
            log::error!("controller: saving assistant reply: {}", e);
            return None;
        }

        let same_viewer = self
            .session
            .as_ref()
            .is_some_and(|u| u.email == ticket.viewer);
        if same_viewer && self.active_contact.as_deref() == Some(ASSISTANT_EMAIL) {
            self.transcript.push(reply.clone());
        } else {
            log::debug!(
                "controller: reply {} arrived outside the assistant conversation, not shown",
                ticket.request_id
            );
        }
        if same_viewer {
            if let Err(e) = self.refresh_contacts() {
                log::warn!("controller: refreshing contacts: {}", e);
            }
        }
        Some(reply)
    }

    /// Send and, for the assistant, wait for and apply its reply. Returns the reply message.
    pub async fn send_and_reply(
        &mut self,
        text: &str,
        kind: MessageKind,
    ) -> Result<Option<Message>, ControllerError> {
        let Some(ticket) = self.send_message(text, kind)? else {
            return Ok(None);
        };
        let responder = Arc::clone(&self.responder);
        let result = responder.respond(ticket.history()).await;
        Ok(self.complete_reply(ticket, result))
    }
}
