//! End-to-end reaction ordering through the reference document.

use std::cell::RefCell;
use std::rc::Rc;

use ce_reactions::{MissingFramePolicy, ProcessingStack, ReactionConfig, ReactionError, ReactionKind};
use ce_reactions_harness::{Document, Element, ElementDefinition, ElementState};

// ── Helpers ──────────────────────────────────────────────────────────

fn document() -> Document {
    Document::with_stack(ProcessingStack::new())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn append(doc: &Document, parent: &Rc<Element>, child: &Rc<Element>) {
    doc.append_child(parent, child).expect("append");
}

// ═════════════════════════════════════════════════════════════════════════
// Lifecycle ordering
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn connect_and_disconnect_follow_tree_order() {
    let doc = document();
    doc.define(ElementDefinition::new("x-a")).unwrap();
    let a = doc.create_element("x-a");
    let b = doc.create_element("x-a");
    let c = doc.create_element("div");
    let d = doc.create_element("x-a");
    assert_eq!(
        doc.log().rendered(),
        strings(&["Upgrade(e1)", "Upgrade(e2)", "Upgrade(e4)"])
    );
    doc.log().take();

    append(&doc, &a, &b);
    append(&doc, &c, &d);
    append(&doc, &a, &c);
    assert!(doc.log().is_empty());

    append(&doc, &doc.root(), &a);
    assert_eq!(
        doc.log().rendered(),
        strings(&["Connected(e1)", "Connected(e2)", "Connected(e4)"])
    );
    doc.log().take();

    doc.remove_child(&doc.root(), &a).unwrap();
    assert_eq!(
        doc.log().rendered(),
        strings(&["Disconnected(e1)", "Disconnected(e2)", "Disconnected(e4)"])
    );
    assert!(!d.is_connected());
}

#[test]
fn moving_a_connected_element_disconnects_then_connects() {
    let doc = document();
    doc.define(ElementDefinition::new("x-a")).unwrap();
    let holder1 = doc.create_element("div");
    let holder2 = doc.create_element("div");
    append(&doc, &doc.root(), &holder1);
    append(&doc, &doc.root(), &holder2);
    let a = doc.create_element("x-a");
    append(&doc, &holder1, &a);
    doc.log().take();

    append(&doc, &holder2, &a);
    assert_eq!(
        doc.log().rendered(),
        strings(&["Disconnected(e3)", "Connected(e3)"])
    );
}

#[test]
fn define_upgrades_connected_elements_in_tree_order() {
    let doc = document();
    let first = doc.create_element("x-w");
    let second = doc.create_element("x-w");
    append(&doc, &doc.root(), &first);
    append(&doc, &doc.root(), &second);
    doc.set_attribute(&first, "class", "x");
    assert!(doc.log().is_empty());

    doc.define(ElementDefinition::new("x-w").observe("class")).unwrap();

    // Upgrades run as one pass; the reactions each upgrade replays land in
    // the same frame and run in the following pass.
    assert_eq!(
        doc.log().rendered(),
        strings(&[
            "Upgrade(e1)",
            "Upgrade(e2)",
            r#"AttributeChanged(e1,"class",null,"x")"#,
            "Connected(e1)",
            "Connected(e2)",
        ])
    );
    assert_eq!(second.state(), ElementState::Custom);
}

#[test]
fn connecting_an_undefined_element_upgrades_it() {
    let doc = document();
    let late = doc.create_element("x-late");
    doc.define(ElementDefinition::new("x-late")).unwrap();
    assert_eq!(late.state(), ElementState::Undefined);

    append(&doc, &doc.root(), &late);
    assert_eq!(
        doc.log().rendered(),
        strings(&["Upgrade(e1)", "Connected(e1)"])
    );
}

// ═════════════════════════════════════════════════════════════════════════
// Reentrancy
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn mutation_inside_callback_drains_before_siblings() {
    let doc = document();
    doc.define(
        ElementDefinition::new("x-a")
            .observe("seen")
            .on_connected(|el| {
                let doc = el.owner_document().expect("document");
                doc.set_attribute(el, "seen", "yes");
                Ok(())
            }),
    )
    .unwrap();
    let fragment = doc.create_element("div");
    let a = doc.create_element("x-a");
    let b = doc.create_element("x-a");
    append(&doc, &fragment, &a);
    append(&doc, &fragment, &b);
    doc.log().take();

    append(&doc, &doc.root(), &fragment);
    assert_eq!(
        doc.log().rendered(),
        strings(&[
            "Connected(e2)",
            r#"AttributeChanged(e2,"seen",null,"yes")"#,
            "Connected(e3)",
            r#"AttributeChanged(e3,"seen",null,"yes")"#,
        ])
    );
    assert_eq!(doc.stack().depth(), 0);
}

#[test]
fn upgrade_hook_that_inserts_another_element() {
    let doc = document();
    doc.define(ElementDefinition::new("x-child")).unwrap();
    let child = doc.create_element("x-child");
    let slot = Rc::new(RefCell::new(Some(Rc::clone(&child))));
    {
        let slot = Rc::clone(&slot);
        doc.define(
            ElementDefinition::new("x-parent")
                .observe("class")
                .on_upgrade(move |el| {
                    let doc = el.owner_document().expect("document");
                    if let Some(child) = slot.borrow_mut().take() {
                        doc.append_child(&doc.root(), &child)
                            .map_err(ReactionError::other)?;
                    }
                    Ok(())
                }),
        )
        .unwrap();
    }
    doc.log().take();

    let stack = doc.stack().clone();
    stack.run(|| {
        let parent = doc.create_element("x-parent");
        doc.set_attribute(&parent, "class", "b");
    });

    assert_eq!(
        doc.log().rendered(),
        strings(&[
            "Upgrade(e2)",
            "Connected(e1)",
            r#"AttributeChanged(e2,"class",null,"b")"#,
        ])
    );
}

// ═════════════════════════════════════════════════════════════════════════
// Filtering and failures
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn only_observed_attributes_reach_the_definition() {
    let doc = document();
    doc.define(ElementDefinition::new("x-a").observe("class")).unwrap();
    let a = doc.create_element("x-a");
    doc.log().take();

    doc.set_attribute(&a, "style", "color: red");
    doc.set_attribute(&a, "class", "a");
    doc.set_attribute(&a, "class", "b");
    doc.remove_attribute(&a, "class");
    doc.remove_attribute(&a, "style");

    assert_eq!(
        doc.log().rendered(),
        strings(&[
            r#"AttributeChanged(e1,"class",null,"a")"#,
            r#"AttributeChanged(e1,"class","a","b")"#,
            r#"AttributeChanged(e1,"class","b",null)"#,
        ])
    );
}

#[test]
fn plain_elements_never_produce_reactions() {
    let doc = document();
    let div = doc.create_element("div");
    append(&doc, &doc.root(), &div);
    doc.set_attribute(&div, "class", "a");
    doc.remove_child(&doc.root(), &div).unwrap();
    assert!(doc.log().is_empty());
}

#[test]
fn failing_callback_does_not_block_siblings() {
    let doc = document();
    doc.define(
        ElementDefinition::new("x-bad")
            .on_connected(|_| Err(ReactionError::callback(ReactionKind::Connected, "boom"))),
    )
    .unwrap();
    doc.define(ElementDefinition::new("x-good")).unwrap();
    let fragment = doc.create_element("div");
    let bad = doc.create_element("x-bad");
    let good = doc.create_element("x-good");
    append(&doc, &fragment, &bad);
    append(&doc, &fragment, &good);
    doc.log().take();

    append(&doc, &doc.root(), &fragment);
    assert_eq!(
        doc.log().rendered(),
        strings(&["Connected(e2)", "Connected(e3)"])
    );
}

#[test]
fn failed_upgrade_stops_lifecycle_callbacks() {
    let doc = document();
    doc.define(
        ElementDefinition::new("x-broken")
            .on_upgrade(|el| Err(ReactionError::upgrade(el.tag(), "constructor threw"))),
    )
    .unwrap();
    let broken = doc.create_element("x-broken");
    assert_eq!(broken.state(), ElementState::Failed);

    append(&doc, &doc.root(), &broken);
    assert_eq!(doc.log().rendered(), strings(&["Upgrade(e1)"]));
}

#[test]
fn enqueue_outside_any_algorithm_is_dropped() {
    let stack = ProcessingStack::with_config(
        ReactionConfig::new().with_missing_frame(MissingFramePolicy::Ignore),
    );
    let doc = Document::with_stack(stack.clone());
    doc.define(ElementDefinition::new("x-a")).unwrap();
    let a = doc.create_element("x-a");
    doc.log().take();

    stack.enqueue_connected_if_needed(&a);
    stack.enqueue_disconnected_if_needed(&a);
    stack.run(|| {});
    assert!(doc.log().is_empty());
}

#[test]
fn documents_default_to_the_thread_stack() {
    let doc = Document::new();
    assert!(doc.stack().ptr_eq(&ProcessingStack::current()));
}
