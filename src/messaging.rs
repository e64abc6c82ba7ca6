//! Doctor/patient messaging: threads, sending, read receipts.

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository as repo;
use crate::db::DatabaseError;
use crate::models::enums::UserRole;
use crate::models::{Attachment, Conversation, ConversationSummary, Message};
use crate::policy::{authorize, Action, Actor};
use crate::realtime::{ChangeEvent, ChangeHub, Resource};

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Conversation not found")]
    NotFound,

    #[error("User not found")]
    CounterpartNotFound,

    #[error("You are not part of this conversation")]
    Forbidden,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Open (or find) the thread between the actor and a counterpart. Threads
/// always pair one doctor with one patient, whichever side asks first. A
/// brand new thread is announced on the change feed; reopening is silent.
pub fn open_conversation(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    counterpart_id: &Uuid,
) -> Result<Conversation, MessagingError> {
    let counterpart =
        repo::get_profile(conn, counterpart_id)?.ok_or(MessagingError::CounterpartNotFound)?;

    let action = Action::OpenConversationWith {
        counterpart_role: counterpart.role,
    };
    if !authorize(actor, &action).allowed {
        return Err(MessagingError::Forbidden);
    }

    let (doctor_id, patient_id) = match actor.role {
        UserRole::Doctor => (actor.id, *counterpart_id),
        _ => (*counterpart_id, actor.id),
    };
    let (conv, created) =
        repo::get_or_create_conversation(conn, &doctor_id, &patient_id, repo::now_utc())?;
    if created {
        hub.publish(&ChangeEvent::insert(
            Resource::Conversations,
            conv.id,
            serde_json::to_value(&conv).unwrap_or_default(),
        ));
    }
    Ok(conv)
}

/// The actor's inbox, newest activity first.
pub fn inbox(conn: &Connection, actor: &Actor) -> Result<Vec<ConversationSummary>, MessagingError> {
    Ok(repo::list_conversations_for_user(conn, &actor.id)?)
}

pub fn unread_total(conn: &Connection, actor: &Actor) -> Result<i64, MessagingError> {
    Ok(repo::total_unread_for_user(conn, &actor.id)?)
}

/// Fetch one thread, participants only.
pub fn thread(
    conn: &Connection,
    actor: &Actor,
    conversation_id: &Uuid,
) -> Result<Conversation, MessagingError> {
    load_for_participant(conn, actor, conversation_id)
}

pub fn messages(
    conn: &Connection,
    actor: &Actor,
    conversation_id: &Uuid,
) -> Result<Vec<Message>, MessagingError> {
    let conv = load_for_participant(conn, actor, conversation_id)?;
    Ok(repo::list_messages(conn, &conv.id)?)
}

/// Send into a thread the actor belongs to. The row insert and the activity
/// cursor bump commit together.
pub fn send_message(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    conversation_id: &Uuid,
    text: &str,
    attachment: Option<Attachment>,
) -> Result<Message, MessagingError> {
    let conv = load_for_participant(conn, actor, conversation_id)?;

    let text = text.trim();
    let message_text = if text.is_empty() {
        match attachment {
            // Attachment-only messages get placeholder text.
            Some(_) => "Sent an attachment".to_string(),
            None => return Err(MessagingError::EmptyMessage),
        }
    } else {
        text.to_string()
    };

    let receiver_id = if conv.doctor_id == actor.id {
        conv.patient_id
    } else {
        conv.doctor_id
    };

    let now = repo::now_utc();
    let message = Message {
        id: Uuid::new_v4(),
        conversation_id: conv.id,
        sender_id: actor.id,
        receiver_id,
        message_text,
        attachment,
        is_read: false,
        created_at: now,
    };

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    repo::insert_message(&tx, &message)?;
    repo::touch_conversation(&tx, &conv.id, now)?;
    tx.commit().map_err(DatabaseError::from)?;

    hub.publish(&ChangeEvent::insert(
        Resource::Messages,
        message.id,
        serde_json::to_value(&message).unwrap_or_default(),
    ));
    Ok(message)
}

/// Mark everything addressed to the actor in this thread as read. Publishes
/// a read-receipt change so the counterpart's inbox can refresh.
pub fn mark_read(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    conversation_id: &Uuid,
) -> Result<usize, MessagingError> {
    let conv = load_for_participant(conn, actor, conversation_id)?;

    let affected = repo::mark_messages_read(conn, &conv.id, &actor.id)?;
    if affected > 0 {
        // Participant ids ride along so the counterpart's feed predicate
        // matches the receipt.
        hub.publish(&ChangeEvent::update(
            Resource::Messages,
            conv.id,
            serde_json::json!({
                "conversation_id": conv.id,
                "doctor_id": conv.doctor_id,
                "patient_id": conv.patient_id,
                "reader_id": actor.id,
                "read_count": affected,
            }),
        ));
    }
    Ok(affected)
}

fn load_for_participant(
    conn: &Connection,
    actor: &Actor,
    conversation_id: &Uuid,
) -> Result<Conversation, MessagingError> {
    let conv = repo::get_conversation(conn, conversation_id)?.ok_or(MessagingError::NotFound)?;
    let action = Action::UseConversation {
        doctor_id: conv.doctor_id,
        patient_id: conv.patient_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(MessagingError::Forbidden);
    }
    Ok(conv)
}
