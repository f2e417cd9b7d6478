#![forbid(unsafe_code)]

//! Tag-keyed registry of element definitions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use ce_reactions::{AttributeName, ReactionDefinition, ReactionError};

use crate::dom::{Element, ElementState};
use crate::log::LogEntry;

type Hook = Box<dyn Fn(&Rc<Element>) -> Result<(), ReactionError>>;
type AttributeHook =
    Box<dyn Fn(&Rc<Element>, &AttributeName, Option<&str>, Option<&str>) -> Result<(), ReactionError>>;

/// Whether `name` may be used as a custom element tag: starts with an ASCII
/// lowercase letter, contains a hyphen, and has no uppercase letters.
#[must_use]
pub fn is_valid_custom_element_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name.contains('-')
        && !name.chars().any(|c| c.is_ascii_uppercase())
}

/// Behaviour for one custom element tag.
///
/// Every invocation is appended to the owning document's log before the
/// user hook runs.
pub struct ElementDefinition {
    tag: String,
    observed: AHashSet<String>,
    upgrade: Option<Hook>,
    connected: Option<Hook>,
    disconnected: Option<Hook>,
    attribute_changed: Option<AttributeHook>,
}

impl fmt::Debug for ElementDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementDefinition")
            .field("tag", &self.tag)
            .field("observed", &self.observed)
            .finish_non_exhaustive()
    }
}

impl ElementDefinition {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            observed: AHashSet::new(),
            upgrade: None,
            connected: None,
            disconnected: None,
            attribute_changed: None,
        }
    }

    /// Add an observed attribute (by local name).
    #[must_use]
    pub fn observe(mut self, local_name: impl Into<String>) -> Self {
        self.observed.insert(local_name.into());
        self
    }

    #[must_use]
    pub fn on_upgrade(
        mut self,
        hook: impl Fn(&Rc<Element>) -> Result<(), ReactionError> + 'static,
    ) -> Self {
        self.upgrade = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_connected(
        mut self,
        hook: impl Fn(&Rc<Element>) -> Result<(), ReactionError> + 'static,
    ) -> Self {
        self.connected = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_disconnected(
        mut self,
        hook: impl Fn(&Rc<Element>) -> Result<(), ReactionError> + 'static,
    ) -> Self {
        self.disconnected = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_attribute_changed(
        mut self,
        hook: impl Fn(&Rc<Element>, &AttributeName, Option<&str>, Option<&str>) -> Result<(), ReactionError>
        + 'static,
    ) -> Self {
        self.attribute_changed = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn log(target: &Rc<Element>, entry: LogEntry) {
        if let Some(doc) = target.owner_document() {
            doc.log().push(entry);
        }
    }

    fn run(hook: Option<&Hook>, target: &Rc<Element>) -> Result<(), ReactionError> {
        hook.map_or(Ok(()), |hook| hook(target))
    }
}

impl ReactionDefinition<Element> for ElementDefinition {
    fn observes_attribute(&self, local_name: &str) -> bool {
        self.observed.contains(local_name)
    }

    fn upgrade(&self, target: &Rc<Element>) -> Result<(), ReactionError> {
        if target.state() != ElementState::Undefined {
            return Ok(());
        }
        Self::log(target, LogEntry::Upgrade(target.label().to_string()));
        if let Err(err) = Self::run(self.upgrade.as_ref(), target) {
            target.set_state(ElementState::Failed);
            return Err(err);
        }
        target.set_state(ElementState::Custom);

        // Existing observed attributes and the connected state are replayed
        // as reactions into the frame being drained.
        if let Some(doc) = target.owner_document() {
            let stack = doc.stack();
            for (name, value) in target.attributes() {
                stack.enqueue_attribute_changed_if_needed(target, &name, None, Some(&value));
            }
            if target.is_connected() {
                stack.enqueue_connected_if_needed(target);
            }
        }
        Ok(())
    }

    fn connected(&self, target: &Rc<Element>) -> Result<(), ReactionError> {
        Self::log(target, LogEntry::Connected(target.label().to_string()));
        Self::run(self.connected.as_ref(), target)
    }

    fn disconnected(&self, target: &Rc<Element>) -> Result<(), ReactionError> {
        Self::log(target, LogEntry::Disconnected(target.label().to_string()));
        Self::run(self.disconnected.as_ref(), target)
    }

    fn attribute_changed(
        &self,
        target: &Rc<Element>,
        name: &AttributeName,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Result<(), ReactionError> {
        Self::log(
            target,
            LogEntry::AttributeChanged {
                label: target.label().to_string(),
                name: name.to_string(),
                old_value: old_value.map(str::to_owned),
                new_value: new_value.map(str::to_owned),
            },
        );
        match &self.attribute_changed {
            Some(hook) => hook(target, name, old_value, new_value),
            None => Ok(()),
        }
    }
}

/// Maps tags to definitions. Definitions cannot be replaced once added.
#[derive(Debug, Default)]
pub struct Registry {
    definitions: RefCell<AHashMap<String, Rc<ElementDefinition>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lookup(&self, tag: &str) -> Option<Rc<ElementDefinition>> {
        self.definitions.borrow().get(tag).cloned()
    }

    #[must_use]
    pub fn is_defined(&self, tag: &str) -> bool {
        self.definitions.borrow().contains_key(tag)
    }

    /// Insert `definition`; returns `None` if its tag is already taken.
    pub(crate) fn insert(&self, definition: ElementDefinition) -> Option<Rc<ElementDefinition>> {
        let mut definitions = self.definitions.borrow_mut();
        if definitions.contains_key(definition.tag()) {
            return None;
        }
        let definition = Rc::new(definition);
        definitions.insert(definition.tag().to_string(), Rc::clone(&definition));
        Some(definition)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.borrow().is_empty()
    }
}
