#![forbid(unsafe_code)]

//! Reference element tree for exercising `ce-reactions` end to end.
//!
//! Provides a minimal document model whose mutation algorithms each run
//! inside a [`ReactionScope`](ce_reactions::ReactionScope), a tag-keyed
//! definition registry, and a [`ReactionLog`] recording every callback the
//! scheduler invokes.
//!
//! ```
//! use ce_reactions_harness::{Document, ElementDefinition};
//!
//! let doc = Document::new();
//! doc.define(ElementDefinition::new("x-card").observe("class")).unwrap();
//! let card = doc.create_element("x-card");
//! doc.append_child(&doc.root(), &card).unwrap();
//! doc.set_attribute(&card, "class", "wide");
//!
//! assert_eq!(
//!     doc.log().rendered(),
//!     vec![
//!         "Upgrade(e1)".to_string(),
//!         "Connected(e1)".to_string(),
//!         r#"AttributeChanged(e1,"class",null,"wide")"#.to_string(),
//!     ]
//! );
//! ```

pub mod dom;
pub mod log;
pub mod registry;

pub use dom::{Document, DomError, Element, ElementState};
pub use log::{LogEntry, ReactionLog};
pub use registry::{ElementDefinition, Registry, is_valid_custom_element_name};
