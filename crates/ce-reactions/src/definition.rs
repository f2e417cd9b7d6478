#![forbid(unsafe_code)]

//! Seams to the element tree and its definition registry.

use std::rc::Rc;

use crate::error::Result;
use crate::record::AttributeName;

/// Behaviour attached to a reaction-capable element kind.
///
/// Only [`upgrade`](Self::upgrade) is required. The remaining callbacks
/// default to doing nothing, and by default no attribute is observed.
pub trait ReactionDefinition<E: ?Sized> {
    /// Whether an attribute-changed reaction should be scheduled for
    /// `local_name`.
    fn observes_attribute(&self, local_name: &str) -> bool {
        let _ = local_name;
        false
    }

    fn upgrade(&self, target: &Rc<E>) -> Result<()>;

    fn connected(&self, target: &Rc<E>) -> Result<()> {
        let _ = target;
        Ok(())
    }

    fn disconnected(&self, target: &Rc<E>) -> Result<()> {
        let _ = target;
        Ok(())
    }

    fn attribute_changed(
        &self,
        target: &Rc<E>,
        name: &AttributeName,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Result<()> {
        let _ = (target, name, old_value, new_value);
        Ok(())
    }
}

/// An object that may participate in the reaction protocol.
pub trait ReactionTarget: 'static {
    type Definition: ReactionDefinition<Self> + 'static;

    /// Look up this object's definition, or `None` if it is not
    /// reaction-capable.
    fn reaction_definition(&self) -> Option<Rc<Self::Definition>>;
}
