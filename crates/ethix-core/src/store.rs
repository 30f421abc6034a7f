//! Append-only, in-memory chat history

use thiserror::Error;
use uuid::Uuid;

use crate::state::ChatTurn;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("turn {0} is already in the conversation")]
pub struct DuplicateTurnId(pub Uuid);

/// Ordered sequence of turns. Insertion order is both the display order
/// and the context order sent to the completion endpoint.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    turns: Vec<ChatTurn>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ChatTurn) -> Result<(), DuplicateTurnId> {
        if self.turns.iter().any(|t| t.id == turn.id) {
            return Err(DuplicateTurnId(turn.id));
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn all(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut store = MessageStore::new();
        store.append(ChatTurn::user("one")).unwrap();
        store.append(ChatTurn::assistant("two")).unwrap();
        store.append(ChatTurn::user("three")).unwrap();

        let contents: Vec<&str> = store.all().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(store.last().map(|t| t.role), Some(ChatRole::User));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut store = MessageStore::new();
        let turn = ChatTurn::user("hi");
        store.append(turn.clone()).unwrap();

        let err = store.append(turn.clone()).unwrap_err();
        assert_eq!(err, DuplicateTurnId(turn.id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_store() {
        let store = MessageStore::new();
        assert!(store.is_empty());
        assert!(store.last().is_none());
    }
}
