#![forbid(unsafe_code)]

//! Invocation log shared by every definition in a document.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One invoked reaction, identified by the element's label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Upgrade(String),
    Connected(String),
    Disconnected(String),
    AttributeChanged {
        label: String,
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

fn quoted(value: Option<&str>) -> String {
    value.map_or_else(|| "null".to_string(), |v| format!("{v:?}"))
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade(label) => write!(f, "Upgrade({label})"),
            Self::Connected(label) => write!(f, "Connected({label})"),
            Self::Disconnected(label) => write!(f, "Disconnected({label})"),
            Self::AttributeChanged {
                label,
                name,
                old_value,
                new_value,
            } => write!(
                f,
                "AttributeChanged({label},{name:?},{},{})",
                quoted(old_value.as_deref()),
                quoted(new_value.as_deref())
            ),
        }
    }
}

/// Shared, append-only record of invoked reactions.
///
/// Cloning a `ReactionLog` creates a new handle to the **same** log.
#[derive(Debug, Clone, Default)]
pub struct ReactionLog {
    entries: Rc<RefCell<Vec<LogEntry>>>,
}

impl ReactionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: LogEntry) {
        self.entries.borrow_mut().push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Entries in their display form, e.g. `Connected(e2)`.
    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        self.entries.borrow().iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Remove and return everything logged so far.
    pub fn take(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_null_for_absent_values() {
        let entry = LogEntry::AttributeChanged {
            label: "e1".into(),
            name: "class".into(),
            old_value: None,
            new_value: Some("b".into()),
        };
        assert_eq!(entry.to_string(), r#"AttributeChanged(e1,"class",null,"b")"#);
    }

    #[test]
    fn clones_share_entries() {
        let log = ReactionLog::new();
        let other = log.clone();
        log.push(LogEntry::Connected("e2".into()));
        assert_eq!(other.rendered(), vec!["Connected(e2)"]);
        assert_eq!(log.entries(), vec![LogEntry::Connected("e2".into())]);
        assert_eq!(log.len(), 1);
        assert_eq!(other.take().len(), 1);
        assert!(log.is_empty());
        assert!(log.entries().is_empty());
    }
}
