use crate::store::{Document, DocumentChange};

/// A write to one child profile: the document before and after the write.
/// `before` is `None` on creation, `after` is `None` on deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChange {
    pub child_id: String,
    pub before: Option<Document>,
    pub after: Option<Document>,
}

impl ProfileChange {
    pub fn created(child_id: &str, after: Document) -> Self {
        Self {
            child_id: child_id.to_string(),
            before: None,
            after: Some(after),
        }
    }

    pub fn updated(child_id: &str, before: Document, after: Document) -> Self {
        Self {
            child_id: child_id.to_string(),
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn deleted(child_id: &str, before: Document) -> Self {
        Self {
            child_id: child_id.to_string(),
            before: Some(before),
            after: None,
        }
    }
}

impl From<DocumentChange> for ProfileChange {
    fn from(change: DocumentChange) -> Self {
        Self {
            child_id: change.id,
            before: change.before,
            after: change.after,
        }
    }
}
