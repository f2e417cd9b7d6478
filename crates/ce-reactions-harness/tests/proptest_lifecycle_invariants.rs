//! Property-based lifecycle invariants over random tree mutations.
//!
//! 1. Connected/disconnected callbacks for an element strictly alternate,
//!    starting with connected
//! 2. After every mutation, an element is connected iff it has seen one
//!    more connected than disconnected callback
//! 3. The processing stack is empty between mutations

use std::collections::HashMap;
use std::rc::Rc;

use ce_reactions::ProcessingStack;
use ce_reactions_harness::{Document, Element, ElementDefinition, LogEntry};
use proptest::prelude::*;

const CUSTOM: usize = 6;
const PLAIN: usize = 2;

#[derive(Debug, Clone)]
enum Mutation {
    /// Append element `child` under `parent` (`None` = document root).
    Append { child: usize, parent: Option<usize> },
    /// Remove element from its parent, if it has one.
    Remove(usize),
}

fn arb_mutation() -> impl Strategy<Value = Mutation> {
    let n = CUSTOM + PLAIN;
    prop_oneof![
        3 => (0..n, proptest::option::of(0..n))
            .prop_map(|(child, parent)| Mutation::Append { child, parent }),
        1 => (0..n).prop_map(Mutation::Remove),
    ]
}

fn build() -> (Document, Vec<Rc<Element>>) {
    let doc = Document::with_stack(ProcessingStack::new());
    doc.define(ElementDefinition::new("x-node")).expect("define");
    let mut elements: Vec<_> = (0..CUSTOM).map(|_| doc.create_element("x-node")).collect();
    elements.extend((0..PLAIN).map(|_| doc.create_element("div")));
    doc.log().take();
    (doc, elements)
}

fn apply(doc: &Document, elements: &[Rc<Element>], mutation: &Mutation) {
    match mutation {
        Mutation::Append { child, parent } => {
            let parent = parent.map_or_else(|| doc.root(), |p| Rc::clone(&elements[p]));
            // Cycles are rejected; that is fine here.
            let _ = doc.append_child(&parent, &elements[*child]);
        }
        Mutation::Remove(idx) => {
            if let Some(parent) = elements[*idx].parent() {
                doc.remove_child(&parent, &elements[*idx]).expect("remove from parent");
            }
        }
    }
}

proptest! {
    #[test]
    fn lifecycle_callbacks_track_connectedness(
        mutations in proptest::collection::vec(arb_mutation(), 0..40)
    ) {
        let (doc, elements) = build();
        let mut balance: HashMap<String, i32> = HashMap::new();

        for mutation in &mutations {
            apply(&doc, &elements, mutation);
            prop_assert_eq!(doc.stack().depth(), 0);

            for entry in doc.log().take() {
                match entry {
                    LogEntry::Connected(label) => {
                        let slot = balance.entry(label).or_default();
                        prop_assert_eq!(*slot, 0, "connected twice without disconnect");
                        *slot = 1;
                    }
                    LogEntry::Disconnected(label) => {
                        let slot = balance.entry(label).or_default();
                        prop_assert_eq!(*slot, 1, "disconnected while not connected");
                        *slot = 0;
                    }
                    other => prop_assert!(false, "unexpected reaction {}", other),
                }
            }

            for element in elements.iter().take(CUSTOM) {
                let expected = i32::from(element.is_connected());
                let seen = balance.get(element.label()).copied().unwrap_or(0);
                prop_assert_eq!(seen, expected, "{} out of sync", element.label());
            }
        }
    }
}
