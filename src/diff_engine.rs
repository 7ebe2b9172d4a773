//! Core diffing engine: identity matching, keyed child lists with LIS-minimised
//! moves, and the end-of-cycle removal sweep.
//!
//! The previous registry is only read. Every visited node is registered into a
//! fresh registry, which the caller commits together with the patch list.
use crate::errors::ReconcilerError;
use crate::fingerprint::{changed_keys, fingerprint};
use crate::html_generator::{StubRegistry, StubRequest};
use crate::props::{PropValue, Props};
use crate::registry::NodeRegistry;
use crate::types::*;
use crate::widget::Widget;
use phf::phf_map;
use std::collections::{HashMap, HashSet};

// Props naming a callback -> event they route
static CALLBACK_PROPS: phf::Map<&'static str, &'static str> = phf_map! {
    "onPressedName" => "onPressed",
    "onTapName" => "onTap",
    "onItemTapName" => "onItemTap",
    "onChangedName" => "onChanged",
    "onSubmittedName" => "onSubmitted",
};

pub(crate) struct DiffEngine<'a> {
    old_tree: &'a NodeRegistry,
    ids: &'a mut IdGenerator,
    stubs: &'a StubRegistry,
    strict_identities: bool,
    new_tree: NodeRegistry,
    result: ReconciliationResult,
    /// Old target ids already removed by a type-change replace.
    replaced: HashSet<TargetId>,
}

impl<'a> DiffEngine<'a> {
    pub fn new(
        old_tree: &'a NodeRegistry,
        ids: &'a mut IdGenerator,
        stubs: &'a StubRegistry,
        strict_identities: bool,
    ) -> Self {
        DiffEngine {
            old_tree,
            ids,
            stubs,
            strict_identities,
            new_tree: NodeRegistry::new(),
            result: ReconciliationResult::default(),
            replaced: HashSet::new(),
        }
    }

    /// Diffs `root` against the previous registry and sweeps whatever was not
    /// carried over. Nothing observable happens until the caller commits.
    pub fn reconcile(
        mut self,
        root: Option<&dyn Widget>,
        parent_id: &TargetId,
    ) -> Result<(ReconciliationResult, NodeRegistry), ReconcilerError> {
        if let Some(root) = root {
            self.diff_node(root, parent_id, None)?;
        }
        self.sweep_removed();

        log::debug!(
            "DiffEngine: {} patches ({} insert, {} update, {} move, {} remove), {} nodes registered",
            self.result.patches.len(),
            self.result.count(PatchAction::Insert),
            self.result.count(PatchAction::Update),
            self.result.count(PatchAction::Move),
            self.result.count(PatchAction::Remove),
            self.new_tree.len()
        );
        Ok((self.result, self.new_tree))
    }

    fn diff_node(
        &mut self,
        widget: &dyn Widget,
        parent_id: &TargetId,
        before_id: Option<&TargetId>,
    ) -> Result<(), ReconcilerError> {
        let identity = widget.identity();
        let old_tree = self.old_tree;

        match old_tree.get(&identity) {
            None => self.insert_node(widget, identity, parent_id, before_id),
            Some(old) if old.widget_type != widget.widget_type() => {
                // A type change is never an update
                log::debug!(
                    "DiffEngine: {} changed type {} -> {}, replacing {}",
                    identity,
                    old.widget_type,
                    widget.widget_type(),
                    old.target_id
                );
                self.result.patches.push(Patch::remove(old.target_id.clone()));
                self.replaced.insert(old.target_id.clone());
                self.insert_node(widget, identity, parent_id, before_id)
            }
            Some(old) => self.update_node(old, widget, identity, parent_id, before_id),
        }
    }

    fn update_node(
        &mut self,
        old: &'a RenderedNode,
        widget: &dyn Widget,
        identity: Identity,
        parent_id: &TargetId,
        before_id: Option<&TargetId>,
    ) -> Result<(), ReconcilerError> {
        let props = widget.render_props();
        let props_fingerprint = fingerprint(&props);
        self.collect_details(widget, &props, &old.target_id);

        // Only a root reconciled under a different parent gets here with a new parent
        if &old.parent_target_id != parent_id {
            self.result
                .patches
                .push(Patch::moved(old.target_id.clone(), parent_id, before_id));
        }

        if props_fingerprint != old.fingerprint {
            let changed = changed_keys(&old.props, &props);
            self.result
                .patches
                .push(Patch::update(old.target_id.clone(), &props, changed));
        }

        let children = widget.children();
        self.register(
            RenderedNode {
                identity,
                target_id: old.target_id.clone(),
                widget_type: widget.widget_type().to_string(),
                props,
                fingerprint: props_fingerprint,
                parent_target_id: parent_id.clone(),
                children: children.iter().map(|c| c.identity()).collect(),
            },
            parent_id,
        )?;

        // Own props never cover descendants: always walk the children
        self.reconcile_children(&old.children, &children, &old.target_id)
    }

    fn insert_node(
        &mut self,
        widget: &dyn Widget,
        identity: Identity,
        parent_id: &TargetId,
        before_id: Option<&TargetId>,
    ) -> Result<(), ReconcilerError> {
        let target_id = self.ids.next_id();
        let props = widget.render_props();
        let required_classes = widget.required_css_classes();
        self.collect_details(widget, &props, &target_id);

        let stub = self.stubs.render(&StubRequest {
            widget_type: widget.widget_type(),
            target_id: &target_id,
            props: &props,
            required_classes: &required_classes,
        });
        self.result.patches.push(Patch::insert(
            target_id.clone(),
            stub,
            parent_id,
            &props,
            before_id,
        ));

        let children = widget.children();
        self.register(
            RenderedNode {
                identity,
                target_id: target_id.clone(),
                widget_type: widget.widget_type().to_string(),
                fingerprint: fingerprint(&props),
                props,
                parent_target_id: parent_id.clone(),
                children: children.iter().map(|c| c.identity()).collect(),
            },
            parent_id,
        )?;

        // Children of a new node are plain appends under its fresh id
        for child in children {
            self.insert_node(child, child.identity(), &target_id, None)?;
        }
        Ok(())
    }

    fn reconcile_children(
        &mut self,
        old_children: &'a [Identity],
        children: &[&dyn Widget],
        parent_id: &'a TargetId,
    ) -> Result<(), ReconcilerError> {
        if old_children.is_empty() && children.is_empty() {
            return Ok(());
        }
        let old_tree = self.old_tree;

        let old_key_to_idx: HashMap<&Identity, usize> = old_children
            .iter()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();
        let identities: Vec<Identity> = children.iter().map(|c| c.identity()).collect();

        // Reusable: was a child of this parent and kept its type
        let reusable: Vec<Option<(usize, &'a RenderedNode)>> = children
            .iter()
            .zip(&identities)
            .map(|(child, identity)| {
                let old_idx = *old_key_to_idx.get(identity)?;
                let old = old_tree.get(identity)?;
                (old.widget_type == child.widget_type()).then_some((old_idx, old))
            })
            .collect();

        let mut sequence_for_lis = Vec::new();
        let mut sequence_positions = Vec::new();
        for (pos, entry) in reusable.iter().enumerate() {
            if let Some((old_idx, _)) = entry {
                sequence_for_lis.push(*old_idx);
                sequence_positions.push(pos);
            }
        }

        let mut stable = vec![false; children.len()];
        let lis = longest_increasing_subsequence(&sequence_for_lis);
        for seq_pos in &lis {
            stable[sequence_positions[*seq_pos]] = true;
        }

        // Anchor: nearest following sibling that keeps its place
        let mut anchors: Vec<Option<&'a TargetId>> = vec![None; children.len()];
        let mut next_stable: Option<&'a TargetId> = None;
        for pos in (0..children.len()).rev() {
            anchors[pos] = next_stable;
            if stable[pos] {
                next_stable = reusable[pos].map(|(_, old)| &old.target_id);
            }
        }

        log::debug!(
            "DiffEngine: children of {}: {} old, {} new, {} reused, {} moved",
            parent_id,
            old_children.len(),
            children.len(),
            sequence_for_lis.len(),
            sequence_for_lis.len() - lis.len()
        );

        for (pos, child) in children.iter().enumerate() {
            let before_id = anchors[pos];
            match reusable[pos] {
                Some((_, old)) if !stable[pos] => {
                    self.result
                        .patches
                        .push(Patch::moved(old.target_id.clone(), parent_id, before_id));
                    self.diff_node(*child, parent_id, before_id)?;
                }
                Some(_) => self.diff_node(*child, parent_id, before_id)?,
                // Same identity, different type: replaced in place
                None if old_key_to_idx.contains_key(&identities[pos]) => {
                    self.diff_node(*child, parent_id, before_id)?
                }
                None => self.insert_node(*child, identities[pos].clone(), parent_id, before_id)?,
            }
        }
        Ok(())
    }

    fn register(&mut self, node: RenderedNode, parent_id: &TargetId) -> Result<(), ReconcilerError> {
        let identity = node.identity.clone();
        if let Some(previous) = self.new_tree.register(node) {
            if self.strict_identities {
                return Err(ReconcilerError::DuplicateIdentity {
                    identity,
                    parent_id: parent_id.clone(),
                });
            }
            log::error!(
                "DiffEngine: identity {} bound twice in one cycle (was {}), last binding wins",
                identity,
                previous.target_id
            );
        }
        Ok(())
    }

    /// Aggregates style class identifiers and callback names for the hooks.
    fn collect_details(&mut self, widget: &dyn Widget, props: &Props, target_id: &TargetId) {
        let required = widget.required_css_classes();
        let from_prop = props
            .get("css_class")
            .and_then(PropValue::as_str)
            .into_iter()
            .flat_map(str::split_whitespace);

        for css_class in from_prop.chain(required.iter().map(String::as_str)) {
            if !css_class.is_empty() && !self.result.active_css_classes.contains_key(css_class) {
                self.result
                    .active_css_classes
                    .insert(css_class.to_string(), widget.widget_type().to_string());
            }
        }

        for (prop_name, value) in props {
            let Some(event) = CALLBACK_PROPS.get(prop_name.as_str()) else {
                continue;
            };
            if let Some(callback) = value.as_str().filter(|name| !name.is_empty()) {
                self.result.registered_callbacks.insert(
                    callback.to_string(),
                    CallbackBinding {
                        target_id: target_id.clone(),
                        event: event.to_string(),
                    },
                );
            }
        }
    }

    /// One REMOVE per previous node that was not carried over under the same
    /// target id. REMOVE is deep, so nodes whose parent is gone are skipped.
    fn sweep_removed(&mut self) {
        let old_tree = self.old_tree;
        let new_tree = &self.new_tree;

        let gone: HashSet<&TargetId> = old_tree
            .iter()
            .filter(|old| {
                new_tree
                    .get(&old.identity)
                    .is_none_or(|new| new.target_id != old.target_id)
            })
            .map(|old| &old.target_id)
            .collect();
        if gone.is_empty() {
            return;
        }

        // Under a gone parent: detached by that parent's REMOVE or one above it
        let removals: Vec<TargetId> = old_tree
            .iter()
            .filter(|old| gone.contains(&old.target_id))
            .filter(|old| !self.replaced.contains(&old.target_id))
            .filter(|old| !gone.contains(&old.parent_target_id))
            .map(|old| old.target_id.clone())
            .collect();

        for target_id in removals {
            self.result.patches.push(Patch::remove(target_id));
        }
    }
}

/// Positions into `seq` of a longest strictly increasing subsequence, ascending.
/// O(n log n).
///
/// Built right to left keeping, per length, the run with the largest head, so
/// on ties the run starting earliest wins: for `[1, 0]` the element at
/// position 0 stays and the one that moved to the back is reported.
pub(crate) fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    if seq.is_empty() {
        return Vec::new();
    }

    // heads[k]: start of the best run of length k + 1; head values strictly decrease with k
    let mut heads: Vec<usize> = Vec::new();
    let mut successors = vec![usize::MAX; seq.len()];

    for i in (0..seq.len()).rev() {
        let value = seq[i];
        let k = heads.partition_point(|&p| seq[p] > value);
        if k > 0 {
            successors[i] = heads[k - 1];
        }
        if k == heads.len() {
            heads.push(i);
        } else {
            heads[k] = i;
        }
    }

    let mut lis = Vec::with_capacity(heads.len());
    let mut k = heads[heads.len() - 1];
    loop {
        lis.push(k);
        if successors[k] == usize::MAX {
            break;
        }
        k = successors[k];
    }
    lis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetNode;
    use proptest::prelude::*;

    fn run(
        old: &NodeRegistry,
        ids: &mut IdGenerator,
        root: Option<&WidgetNode>,
    ) -> (ReconciliationResult, NodeRegistry) {
        let stubs = StubRegistry::html();
        DiffEngine::new(old, ids, &stubs, true)
            .reconcile(root.map(|r| r as &dyn Widget), &TargetId::from("root-container"))
            .unwrap()
    }

    #[test]
    fn lis_examples() {
        assert_eq!(longest_increasing_subsequence(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2]), vec![0, 1, 2]);
        assert_eq!(longest_increasing_subsequence(&[1, 2, 3, 0]), vec![0, 1, 2]);
        assert_eq!(longest_increasing_subsequence(&[1, 0]), vec![0]);
        assert_eq!(longest_increasing_subsequence(&[3, 0, 2, 1]).len(), 2);
    }

    #[test]
    fn insert_emits_parent_before_children() {
        let mut ids = IdGenerator::new("fw_id_");
        let tree = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Text", "a").prop("data", "A"))
            .child(WidgetNode::keyed("Text", "b").prop("data", "B"));
        let (result, registry) = run(&NodeRegistry::new(), &mut ids, Some(&tree));

        let targets: Vec<_> = result.patches.iter().map(|p| p.target_id.as_str()).collect();
        assert_eq!(targets, vec!["fw_id_1", "fw_id_2", "fw_id_3"]);
        assert_eq!(result.patches[0].parent_id(), Some("root-container"));
        assert_eq!(result.patches[1].parent_id(), Some("fw_id_1"));
        assert_eq!(result.patches[2].before_id(), None);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.get(&Identity::key("col")).unwrap().children,
            vec![Identity::key("a"), Identity::key("b")]
        );
    }

    #[test]
    fn inserted_child_anchors_on_next_stable_sibling() {
        let mut ids = IdGenerator::new("fw_id_");
        let first = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Text", "a"))
            .child(WidgetNode::keyed("Text", "c"));
        let (_, registry) = run(&NodeRegistry::new(), &mut ids, Some(&first));
        let c_target = registry.get(&Identity::key("c")).unwrap().target_id.clone();

        let second = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Text", "a"))
            .child(WidgetNode::keyed("Text", "b"))
            .child(WidgetNode::keyed("Text", "c"));
        let (result, registry) = run(&registry, &mut ids, Some(&second));

        assert_eq!(result.patches.len(), 1);
        let insert = &result.patches[0];
        assert_eq!(insert.action, PatchAction::Insert);
        assert_eq!(insert.before_id(), Some(c_target.as_str()));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn reorder_moves_only_out_of_order_children() {
        let mut ids = IdGenerator::new("fw_id_");
        let build = |order: &[&str]| {
            WidgetNode::keyed("Column", "col").with_children(
                order.iter().map(|k| WidgetNode::keyed("Text", *k).prop("data", *k)),
            )
        };
        let (_, registry) = run(&NodeRegistry::new(), &mut ids, Some(&build(&["a", "b", "c", "d"])));
        let target = |k: &str| registry.get(&Identity::key(k)).unwrap().target_id.clone();

        let (result, _) = run(&registry, &mut ids, Some(&build(&["b", "c", "d", "a"])));
        assert_eq!(result.patches.len(), 1);
        let mv = &result.patches[0];
        assert_eq!(mv.action, PatchAction::Move);
        assert_eq!(mv.target_id, target("a"));
        assert_eq!(mv.parent_id(), Some(target("col").as_str()));
        assert_eq!(mv.before_id(), None);
    }

    #[test]
    fn moved_child_with_new_props_gets_move_and_update() {
        let mut ids = IdGenerator::new("fw_id_");
        let (_, registry) = run(
            &NodeRegistry::new(),
            &mut ids,
            Some(&WidgetNode::keyed("Row", "r").with_children([
                WidgetNode::keyed("Text", "x").prop("data", "1"),
                WidgetNode::keyed("Text", "y"),
            ])),
        );
        let (result, _) = run(
            &registry,
            &mut ids,
            Some(&WidgetNode::keyed("Row", "r").with_children([
                WidgetNode::keyed("Text", "y"),
                WidgetNode::keyed("Text", "x").prop("data", "2"),
            ])),
        );
        let actions: Vec<_> = result.patches.iter().map(|p| p.action).collect();
        assert_eq!(actions, vec![PatchAction::Move, PatchAction::Update]);
        assert_eq!(result.patches[1].data["changed"], serde_json::json!(["data"]));
    }

    #[test]
    fn removed_subtree_gets_a_single_remove() {
        let mut ids = IdGenerator::new("fw_id_");
        let tree = WidgetNode::keyed("Column", "col").child(
            WidgetNode::keyed("Row", "row")
                .child(WidgetNode::keyed("Text", "t1"))
                .child(WidgetNode::keyed("Text", "t2")),
        );
        let (_, registry) = run(&NodeRegistry::new(), &mut ids, Some(&tree));
        let row_target = registry.get(&Identity::key("row")).unwrap().target_id.clone();

        let (result, registry) = run(&registry, &mut ids, Some(&WidgetNode::keyed("Column", "col")));
        assert_eq!(result.patches, vec![Patch::remove(row_target)]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reparented_child_is_reinserted_and_old_element_removed() {
        let mut ids = IdGenerator::new("fw_id_");
        let first = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Row", "left").child(WidgetNode::keyed("Text", "item")))
            .child(WidgetNode::keyed("Row", "right"));
        let (_, registry) = run(&NodeRegistry::new(), &mut ids, Some(&first));
        let old_item = registry.get(&Identity::key("item")).unwrap().target_id.clone();
        let right = registry.get(&Identity::key("right")).unwrap().target_id.clone();

        let second = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Row", "left"))
            .child(WidgetNode::keyed("Row", "right").child(WidgetNode::keyed("Text", "item")));
        let (result, registry) = run(&registry, &mut ids, Some(&second));

        assert_eq!(result.patches.len(), 2);
        assert_eq!(result.patches[0].action, PatchAction::Insert);
        assert_eq!(result.patches[0].parent_id(), Some(right.as_str()));
        assert_eq!(result.patches[1], Patch::remove(old_item.clone()));
        assert_ne!(registry.get(&Identity::key("item")).unwrap().target_id, old_item);
    }

    #[test]
    fn type_change_below_root_removes_once() {
        let mut ids = IdGenerator::new("fw_id_");
        let first = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Row", "slot").child(WidgetNode::keyed("Text", "inner")));
        let (_, registry) = run(&NodeRegistry::new(), &mut ids, Some(&first));
        let slot = registry.get(&Identity::key("slot")).unwrap().target_id.clone();

        let second = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Stack", "slot").child(WidgetNode::keyed("Text", "inner")));
        let (result, _) = run(&registry, &mut ids, Some(&second));

        let actions: Vec<_> = result.patches.iter().map(|p| p.action).collect();
        assert_eq!(
            actions,
            vec![PatchAction::Remove, PatchAction::Insert, PatchAction::Insert]
        );
        assert_eq!(result.patches[0].target_id, slot);
    }

    #[test]
    fn duplicate_siblings_fail_in_strict_mode() {
        let mut ids = IdGenerator::new("fw_id_");
        let stubs = StubRegistry::new();
        let tree = WidgetNode::keyed("Column", "col")
            .child(WidgetNode::keyed("Text", "dup"))
            .child(WidgetNode::keyed("Text", "dup"));
        let old = NodeRegistry::new();
        let err = DiffEngine::new(&old, &mut ids, &stubs, true)
            .reconcile(Some(&tree as &dyn Widget), &TargetId::from("root"))
            .unwrap_err();
        assert!(matches!(err, ReconcilerError::DuplicateIdentity { .. }));

        let (result, registry) = DiffEngine::new(&old, &mut ids, &stubs, false)
            .reconcile(Some(&tree as &dyn Widget), &TargetId::from("root"))
            .unwrap();
        assert_eq!(result.count(PatchAction::Insert), 3);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn details_collect_classes_and_callbacks() {
        let mut ids = IdGenerator::new("fw_id_");
        let tree = WidgetNode::keyed("TextButton", "btn")
            .prop("css_class", "btn primary")
            .prop("onPressedName", "save_clicked")
            .css_class("ripple");
        let (result, _) = run(&NodeRegistry::new(), &mut ids, Some(&tree));

        let classes: Vec<_> = result.active_css_classes.keys().cloned().collect();
        assert_eq!(classes, vec!["btn", "primary", "ripple"]);
        let binding = &result.registered_callbacks["save_clicked"];
        assert_eq!(binding.event, "onPressed");
        assert_eq!(binding.target_id.as_str(), "fw_id_1");
    }

    #[test]
    fn promoted_root_drops_its_former_children() {
        let mut ids = IdGenerator::new("fw_id_");
        let first = WidgetNode::keyed("Column", "a")
            .child(WidgetNode::keyed("Row", "b").child(WidgetNode::keyed("Text", "c")));
        let (inserted, registry) = run(&NodeRegistry::new(), &mut ids, Some(&first));
        let target = |k: &str| registry.get(&Identity::key(k)).unwrap().target_id.clone();
        let (a, b, c) = (target("a"), target("b"), target("c"));

        let (result, next) = run(&registry, &mut ids, Some(&WidgetNode::keyed("Row", "b")));
        assert_eq!(
            result.patches,
            vec![
                Patch::moved(b.clone(), &TargetId::from("root-container"), None),
                Patch::remove(a),
                Patch::remove(c),
            ]
        );

        let mut dom = SimulatedDom::new("root-container");
        for patch in inserted.patches.iter().chain(&result.patches) {
            dom.apply(patch);
        }
        assert_dom_matches(&dom, &next);
        assert!(dom.children[b.as_str()].is_empty());
    }

    /// Patch consumer model: INSERT/MOVE attach before `before_id`, REMOVE is deep.
    struct SimulatedDom {
        children: HashMap<String, Vec<String>>,
        parent: HashMap<String, String>,
        container: String,
    }

    impl SimulatedDom {
        fn new(container: &str) -> Self {
            let mut children = HashMap::new();
            children.insert(container.to_string(), Vec::new());
            SimulatedDom {
                children,
                parent: HashMap::new(),
                container: container.to_string(),
            }
        }

        fn attach(&mut self, id: &str, parent: &str, before: Option<&str>) {
            let siblings = self
                .children
                .get_mut(parent)
                .unwrap_or_else(|| panic!("{id} attached to unknown parent {parent}"));
            let pos = match before {
                Some(anchor) => siblings
                    .iter()
                    .position(|s| s == anchor)
                    .unwrap_or_else(|| panic!("anchor {anchor} is not a child of {parent}")),
                None => siblings.len(),
            };
            siblings.insert(pos, id.to_string());
            self.parent.insert(id.to_string(), parent.to_string());
        }

        fn detach(&mut self, id: &str) {
            let parent = self
                .parent
                .remove(id)
                .unwrap_or_else(|| panic!("{id} is not attached"));
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|s| s != id);
            }
        }

        fn drop_subtree(&mut self, id: &str) {
            for child in self.children.remove(id).unwrap_or_default() {
                self.parent.remove(&child);
                self.drop_subtree(&child);
            }
        }

        fn apply(&mut self, patch: &Patch) {
            let id = patch.target_id.as_str();
            match patch.action {
                PatchAction::Insert => {
                    assert!(!self.children.contains_key(id), "{id} inserted twice");
                    self.children.insert(id.to_string(), Vec::new());
                    self.attach(id, patch.parent_id().unwrap(), patch.before_id());
                }
                PatchAction::Move => {
                    self.detach(id);
                    self.attach(id, patch.parent_id().unwrap(), patch.before_id());
                }
                PatchAction::Remove => {
                    self.detach(id);
                    self.drop_subtree(id);
                }
                PatchAction::Update => {
                    assert!(self.children.contains_key(id), "update of unknown {id}");
                }
            }
        }
    }

    fn assert_dom_matches(dom: &SimulatedDom, registry: &NodeRegistry) {
        let roots: Vec<String> = registry
            .iter()
            .filter(|n| n.parent_target_id.as_str() == dom.container)
            .map(|n| n.target_id.to_string())
            .collect();
        assert_eq!(dom.children[&dom.container], roots);

        for node in registry.iter() {
            let expected: Vec<String> = node
                .children
                .iter()
                .map(|id| registry.get(id).unwrap().target_id.to_string())
                .collect();
            assert_eq!(dom.children[node.target_id.as_str()], expected, "children of {}", node.identity);
        }
        // Container plus one entry per live node: nothing stale left behind
        assert_eq!(dom.children.len(), registry.len() + 1);
    }

    /// Random keyed tree over keys 0..8: node `i` takes key `order[i]` and
    /// hangs under node `parents[i] % i`, so the root key varies between cycles.
    #[derive(Debug, Clone)]
    struct TreeShape {
        order: Vec<usize>,
        len: usize,
        parents: Vec<u16>,
        row_types: Vec<bool>,
    }

    fn tree_shape() -> impl Strategy<Value = TreeShape> {
        (
            Just((0..8usize).collect::<Vec<_>>()).prop_shuffle(),
            1..=8usize,
            proptest::collection::vec(any::<u16>(), 8),
            proptest::collection::vec(any::<bool>(), 8),
        )
            .prop_map(|(order, len, parents, row_types)| TreeShape {
                order,
                len,
                parents,
                row_types,
            })
    }

    fn build_tree(shape: &TreeShape) -> WidgetNode {
        fn build(shape: &TreeShape, i: usize) -> WidgetNode {
            let key = shape.order[i];
            let widget_type = if shape.row_types[key] { "Row" } else { "Column" };
            let children = (i + 1..shape.len)
                .filter(|&j| shape.parents[j] as usize % j == i)
                .map(|j| build(shape, j));
            WidgetNode::keyed(widget_type, key)
                .prop("slot", i as i64)
                .with_children(children)
        }
        build(shape, 0)
    }

    fn is_strictly_increasing_positions(seq: &[usize], lis: &[usize]) -> bool {
        lis.windows(2).all(|w| w[0] < w[1] && seq[w[0]] < seq[w[1]])
    }

    fn brute_force_lis_len(seq: &[usize]) -> usize {
        let mut best = vec![1usize; seq.len()];
        for i in 0..seq.len() {
            for j in 0..i {
                if seq[j] < seq[i] {
                    best[i] = best[i].max(best[j] + 1);
                }
            }
        }
        best.into_iter().max().unwrap_or(0)
    }

    proptest! {
        #[test]
        fn lis_is_valid_and_maximal(perm in Just((0..24usize).collect::<Vec<_>>()).prop_shuffle()) {
            let lis = longest_increasing_subsequence(&perm);
            prop_assert!(is_strictly_increasing_positions(&perm, &lis));
            prop_assert_eq!(lis.len(), brute_force_lis_len(&perm));
        }

        #[test]
        fn any_reorder_needs_len_minus_lis_moves(perm in Just((0..10usize).collect::<Vec<_>>()).prop_shuffle()) {
            let mut ids = IdGenerator::new("fw_id_");
            let build = |order: &[usize]| {
                WidgetNode::keyed("Column", "col")
                    .with_children(order.iter().map(|k| WidgetNode::keyed("Text", *k)))
            };
            let initial: Vec<usize> = (0..10).collect();
            let (_, registry) = run(&NodeRegistry::new(), &mut ids, Some(&build(&initial)));
            let (result, next) = run(&registry, &mut ids, Some(&build(&perm)));

            prop_assert_eq!(result.patches.len(), perm.len() - brute_force_lis_len(&perm));
            prop_assert!(result.patches.iter().all(|p| p.action == PatchAction::Move));
            prop_assert_eq!(next.len(), registry.len());
        }

        #[test]
        fn applied_patches_reproduce_committed_tree(
            cycles in proptest::collection::vec(proptest::option::of(tree_shape()), 1..7),
        ) {
            let mut ids = IdGenerator::new("fw_id_");
            let mut registry = NodeRegistry::new();
            let mut dom = SimulatedDom::new("root-container");

            for shape in &cycles {
                let tree = shape.as_ref().map(build_tree);
                let (result, next) = run(&registry, &mut ids, tree.as_ref());
                for patch in &result.patches {
                    dom.apply(patch);
                }
                assert_dom_matches(&dom, &next);
                registry = next;
            }
        }
    }
}
