#![forbid(unsafe_code)]

//! Minimal document tree with reaction-triggering mutation algorithms.
//!
//! Every public mutation on [`Document`] opens a
//! [`ReactionScope`](ce_reactions::ReactionScope) for its duration, so
//! reactions it triggers run right after it returns and never in the middle
//! of the tree update. Mutations performed from inside a reaction callback
//! open their own nested scope.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ce_reactions::{AttributeName, ProcessingStack, ReactionTarget};
use thiserror::Error;

use crate::log::ReactionLog;
use crate::registry::{ElementDefinition, Registry, is_valid_custom_element_name};

/// Errors from tree mutation and registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("cannot insert {child} under {parent}: would create a cycle")]
    HierarchyRequest { parent: String, child: String },

    #[error("{child} is not a child of {parent}")]
    NotFound { parent: String, child: String },

    #[error("{0:?} is not a valid custom element name")]
    InvalidName(String),

    #[error("{0:?} is already defined")]
    AlreadyDefined(String),
}

/// Custom element state of an [`Element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementState {
    /// No definition has run for this element yet.
    #[default]
    Undefined,
    /// Upgraded; lifecycle callbacks are delivered.
    Custom,
    /// The upgrade hook failed.
    Failed,
}

/// A node in the tree.
pub struct Element {
    tag: String,
    label: String,
    document: Weak<DocumentInner>,
    attributes: RefCell<Vec<(AttributeName, String)>>,
    children: RefCell<Vec<Rc<Element>>>,
    parent: RefCell<Weak<Element>>,
    connected: Cell<bool>,
    state: Cell<ElementState>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("label", &self.label)
            .field("connected", &self.connected.get())
            .field("state", &self.state.get())
            .finish()
    }
}

impl Element {
    fn new(tag: &str, label: String, document: Weak<DocumentInner>) -> Self {
        Self {
            tag: tag.to_string(),
            label,
            document,
            attributes: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            connected: Cell::new(false),
            state: Cell::new(ElementState::Undefined),
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Sequential label (`e1`, `e2`, ...) used in the reaction log.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    #[must_use]
    pub fn state(&self) -> ElementState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: ElementState) {
        self.state.set(state);
    }

    #[must_use]
    pub fn owner_document(&self) -> Option<Document> {
        self.document.upgrade().map(|inner| Document { inner })
    }

    #[must_use]
    pub fn parent(&self) -> Option<Rc<Element>> {
        self.parent.borrow().upgrade()
    }

    #[must_use]
    pub fn children(&self) -> Vec<Rc<Element>> {
        self.children.borrow().clone()
    }

    #[must_use]
    pub fn attribute(&self, local_name: &str) -> Option<String> {
        self.attributes
            .borrow()
            .iter()
            .find(|(name, _)| name.namespace.is_none() && name.local_name == local_name)
            .map(|(_, value)| value.clone())
    }

    /// Snapshot of all attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(AttributeName, String)> {
        self.attributes.borrow().clone()
    }

    /// `self` followed by all descendants, in tree order.
    fn inclusive_descendants(self: &Rc<Self>) -> Vec<Rc<Element>> {
        let mut out = Vec::new();
        let mut pending = vec![Rc::clone(self)];
        while let Some(node) = pending.pop() {
            pending.extend(node.children.borrow().iter().rev().cloned());
            out.push(node);
        }
        out
    }

    fn is_inclusive_ancestor_of(self: &Rc<Self>, other: &Rc<Element>) -> bool {
        let mut cursor = Some(Rc::clone(other));
        while let Some(node) = cursor {
            if Rc::ptr_eq(&node, self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }
}

/// Only upgraded elements participate in lifecycle reactions.
impl ReactionTarget for Element {
    type Definition = ElementDefinition;

    fn reaction_definition(&self) -> Option<Rc<ElementDefinition>> {
        if self.state.get() != ElementState::Custom {
            return None;
        }
        self.owner_document()?.registry().lookup(&self.tag)
    }
}

struct DocumentInner {
    root: Rc<Element>,
    registry: Registry,
    stack: ProcessingStack,
    log: ReactionLog,
    next_label: Cell<u32>,
}

/// Handle to a document. Cloning shares the same document.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("definitions", &self.inner.registry.len())
            .field("logged", &self.inner.log.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document scheduling reactions on this thread's stack.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stack(ProcessingStack::current())
    }

    /// Create a document scheduling reactions on `stack`.
    #[must_use]
    pub fn with_stack(stack: ProcessingStack) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let root = Rc::new(Element::new("html", "root".to_string(), weak.clone()));
            root.connected.set(true);
            DocumentInner {
                root,
                registry: Registry::new(),
                stack,
                log: ReactionLog::new(),
                next_label: Cell::new(1),
            }
        });
        Self { inner }
    }

    /// The always-connected root element.
    #[must_use]
    pub fn root(&self) -> Rc<Element> {
        Rc::clone(&self.inner.root)
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[must_use]
    pub fn stack(&self) -> &ProcessingStack {
        &self.inner.stack
    }

    #[must_use]
    pub fn log(&self) -> &ReactionLog {
        &self.inner.log
    }

    /// Create a detached element. Defined tags get an upgrade reaction.
    pub fn create_element(&self, tag: &str) -> Rc<Element> {
        let _scope = self.inner.stack.scope();
        let n = self.inner.next_label.get();
        self.inner.next_label.set(n + 1);
        let element = Rc::new(Element::new(
            tag,
            format!("e{n}"),
            Rc::downgrade(&self.inner),
        ));
        if let Some(definition) = self.inner.registry.lookup(tag) {
            self.inner.stack.enqueue_upgrade_with(&element, definition);
        }
        element
    }

    /// Register a definition and schedule upgrades for matching connected
    /// elements, in tree order.
    pub fn define(&self, definition: ElementDefinition) -> Result<Rc<ElementDefinition>, DomError> {
        let _scope = self.inner.stack.scope();
        let tag = definition.tag().to_string();
        if !is_valid_custom_element_name(&tag) {
            return Err(DomError::InvalidName(tag));
        }
        let definition = self
            .inner
            .registry
            .insert(definition)
            .ok_or_else(|| DomError::AlreadyDefined(tag.clone()))?;

        let candidates: Vec<_> = self
            .inner
            .root
            .inclusive_descendants()
            .into_iter()
            .filter(|el| el.tag == tag && el.state() == ElementState::Undefined)
            .collect();
        tracing::debug!(message = "harness.define", tag = %tag, upgrades = candidates.len());
        for element in &candidates {
            self.inner
                .stack
                .enqueue_upgrade_with(element, Rc::clone(&definition));
        }
        Ok(definition)
    }

    /// Append `child` as the last child of `parent`, removing it from its
    /// current parent first.
    pub fn append_child(&self, parent: &Rc<Element>, child: &Rc<Element>) -> Result<(), DomError> {
        let _scope = self.inner.stack.scope();
        if child.is_inclusive_ancestor_of(parent) {
            return Err(DomError::HierarchyRequest {
                parent: parent.label.clone(),
                child: child.label.clone(),
            });
        }
        if let Some(old_parent) = child.parent() {
            self.detach(&old_parent, child);
        }
        parent.children.borrow_mut().push(Rc::clone(child));
        *child.parent.borrow_mut() = Rc::downgrade(parent);

        if parent.is_connected() {
            for node in child.inclusive_descendants() {
                node.connected.set(true);
                match node.state() {
                    ElementState::Custom => self.inner.stack.enqueue_connected_if_needed(&node),
                    // The upgrade replays the connected callback itself.
                    ElementState::Undefined => {
                        if let Some(definition) = self.inner.registry.lookup(&node.tag) {
                            self.inner.stack.enqueue_upgrade_with(&node, definition);
                        }
                    }
                    ElementState::Failed => {}
                }
            }
        }
        Ok(())
    }

    /// Remove `child` from `parent`.
    pub fn remove_child(&self, parent: &Rc<Element>, child: &Rc<Element>) -> Result<(), DomError> {
        let _scope = self.inner.stack.scope();
        let is_child = child
            .parent()
            .is_some_and(|current| Rc::ptr_eq(&current, parent));
        if !is_child {
            return Err(DomError::NotFound {
                parent: parent.label.clone(),
                child: child.label.clone(),
            });
        }
        self.detach(parent, child);
        Ok(())
    }

    fn detach(&self, parent: &Rc<Element>, child: &Rc<Element>) {
        parent
            .children
            .borrow_mut()
            .retain(|node| !Rc::ptr_eq(node, child));
        *child.parent.borrow_mut() = Weak::new();

        if child.is_connected() {
            for node in child.inclusive_descendants() {
                node.connected.set(false);
                self.inner.stack.enqueue_disconnected_if_needed(&node);
            }
        }
    }

    /// Set an attribute in the null namespace.
    pub fn set_attribute(&self, element: &Rc<Element>, local_name: &str, value: &str) {
        let _scope = self.inner.stack.scope();
        let name = AttributeName::local(local_name);
        let old = {
            let mut attributes = element.attributes.borrow_mut();
            match attributes.iter_mut().find(|(n, _)| *n == name) {
                Some((_, slot)) => Some(std::mem::replace(slot, value.to_string())),
                None => {
                    attributes.push((name.clone(), value.to_string()));
                    None
                }
            }
        };
        self.inner.stack.enqueue_attribute_changed_if_needed(
            element,
            &name,
            old.as_deref(),
            Some(value),
        );
    }

    /// Remove an attribute in the null namespace; returns its old value.
    pub fn remove_attribute(&self, element: &Rc<Element>, local_name: &str) -> Option<String> {
        let _scope = self.inner.stack.scope();
        let name = AttributeName::local(local_name);
        let old = {
            let mut attributes = element.attributes.borrow_mut();
            let pos = attributes.iter().position(|(n, _)| *n == name)?;
            attributes.remove(pos).1
        };
        self.inner
            .stack
            .enqueue_attribute_changed_if_needed(element, &name, Some(&old), None);
        Some(old)
    }
}
