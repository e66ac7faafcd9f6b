//! # Hierarchy Store
//!
//! The tree of browsing contexts a session has created.
//!
//! All nodes are owned by value in one arena (`BTreeMap<FrameId, Frame>`).
//! Parents hold their children by `FrameId` in two slot maps (contained
//! iframes and spawned popups); every node carries exactly one [`Relation`]
//! back to its parent. Processors only ever see handles, so removing a
//! subtree cannot leave a dangling reference behind.
//!
//! Reports about a child may arrive before the report about its parent, so
//! [`Hierarchy::upsert`] creates missing ancestors as empty placeholders and
//! later reports fill them in place without disturbing their children.

use crate::FrameId;
use crate::address::{Address, SlotKind, Step};
use std::collections::BTreeMap;

// =============================================================================
// NODE
// =============================================================================

/// Tagged back-reference from a node to its parent.
///
/// A node is contained by an iframe parent, opened by an opener, or is the
/// root; never more than one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Root,
    Container { parent: FrameId, slot: u32 },
    Opener { parent: FrameId, slot: u32 },
}

impl Relation {
    /// Parent handle and the step that leads from it to this node.
    #[must_use]
    pub fn parent_step(&self) -> Option<(FrameId, Step)> {
        match *self {
            Relation::Root => None,
            Relation::Container { parent, slot } => Some((parent, Step::frame(slot))),
            Relation::Opener { parent, slot } => Some((parent, Step::popup(slot))),
        }
    }

    fn for_step(parent: FrameId, step: Step) -> Self {
        match step.kind {
            SlotKind::Frame => Relation::Container {
                parent,
                slot: step.slot,
            },
            SlotKind::Popup => Relation::Opener {
                parent,
                slot: step.slot,
            },
        }
    }
}

/// One browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub href: Option<String>,
    pub html: Option<String>,
    /// Set once the window was closed. Closed popups keep their slot.
    pub closed: bool,
    /// Set once the opener reported `window.open` for this popup.
    pub opened: bool,
    relation: Relation,
    frames: BTreeMap<u32, FrameId>,
    popups: BTreeMap<u32, FrameId>,
}

impl Frame {
    fn empty(relation: Relation) -> Self {
        Self {
            href: None,
            html: None,
            closed: false,
            opened: false,
            relation,
            frames: BTreeMap::new(),
            popups: BTreeMap::new(),
        }
    }

    /// Back-reference to the parent.
    #[must_use]
    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// Contained iframes by slot index.
    #[must_use]
    pub fn frames(&self) -> &BTreeMap<u32, FrameId> {
        &self.frames
    }

    /// Spawned popups by slot index, closed ones included.
    #[must_use]
    pub fn popups(&self) -> &BTreeMap<u32, FrameId> {
        &self.popups
    }

    fn slots(&self, kind: SlotKind) -> &BTreeMap<u32, FrameId> {
        match kind {
            SlotKind::Frame => &self.frames,
            SlotKind::Popup => &self.popups,
        }
    }

    fn slots_mut(&mut self, kind: SlotKind) -> &mut BTreeMap<u32, FrameId> {
        match kind {
            SlotKind::Frame => &mut self.frames,
            SlotKind::Popup => &mut self.popups,
        }
    }
}

/// Descriptive fields observed for a context.
///
/// Applying an update copies both fields verbatim onto the node; identity,
/// relation, children and the `closed` flag are never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    pub href: Option<String>,
    pub html: Option<String>,
}

impl FrameUpdate {
    #[must_use]
    pub fn with_href(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            html: None,
        }
    }

    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    fn apply(self, frame: &mut Frame) {
        frame.href = self.href;
        frame.html = self.html;
    }
}

// =============================================================================
// HIERARCHY
// =============================================================================

/// The browsing-context tree of one session.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    nodes: BTreeMap<FrameId, Frame>,
    top: Option<FrameId>,
    next_frame_id: u64,
}

impl Hierarchy {
    /// Create an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the root context, if any report created it yet.
    #[must_use]
    pub fn top(&self) -> Option<FrameId> {
        self.top
    }

    /// Look up a node by handle.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.nodes.get(&id)
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // =========================================================================
    // ADDRESS RESOLVER
    // =========================================================================

    /// Walk `address` from the root.
    ///
    /// Returns `None` when the root is absent or any slot along the way is
    /// empty. Never mutates.
    #[must_use]
    pub fn resolve(&self, address: &Address) -> Option<FrameId> {
        let mut current = self.top?;
        for step in address.steps() {
            current = self.child(current, *step)?;
        }
        Some(current)
    }

    /// Resolve and borrow in one go.
    #[must_use]
    pub fn get(&self, address: &Address) -> Option<&Frame> {
        self.resolve(address).and_then(|id| self.frame(id))
    }

    fn child(&self, parent: FrameId, step: Step) -> Option<FrameId> {
        self.nodes
            .get(&parent)?
            .slots(step.kind)
            .get(&step.slot)
            .copied()
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Insert or merge the context at `address`.
    ///
    /// An existing node keeps its identity and subtree and receives the
    /// update's descriptive fields. Otherwise every missing ancestor is
    /// created as an empty placeholder with the relation its segment implies,
    /// and the final node is populated from `update`.
    pub fn upsert(&mut self, address: &Address, update: FrameUpdate) -> FrameId {
        let id = self.ensure(address);
        if let Some(frame) = self.nodes.get_mut(&id) {
            update.apply(frame);
        }
        id
    }

    /// Make sure a node exists at `address` without touching an existing one.
    pub fn ensure(&mut self, address: &Address) -> FrameId {
        let mut current = match self.top {
            Some(top) => top,
            None => {
                if !address.is_top() {
                    tracing::debug!(address = %address, "creating intermediate top frame");
                }
                let top = self.allocate(Frame::empty(Relation::Root));
                self.top = Some(top);
                top
            }
        };

        for (depth, step) in address.steps().iter().enumerate() {
            current = match self.child(current, *step) {
                Some(existing) => existing,
                None => {
                    if depth + 1 < address.depth() {
                        tracing::debug!(
                            address = %address,
                            segment = %step,
                            "creating intermediate {}",
                            match step.kind {
                                SlotKind::Frame => "iframe",
                                SlotKind::Popup => "popup",
                            }
                        );
                    }
                    self.attach(current, *step)
                }
            };
        }

        current
    }

    /// Remove the context at `address` together with everything it owns.
    ///
    /// Removing `top` drops the whole tree. Returns `false` (and logs the
    /// first segment that failed to resolve) when there was nothing to
    /// remove; this is an expected anomaly for duplicate or out-of-order
    /// removals.
    pub fn remove(&mut self, address: &Address) -> bool {
        let Some(top) = self.top else {
            tracing::warn!(address = %address, segment = "top", "cannot remove frame: no top frame");
            return false;
        };

        let Some((last, ancestors)) = address.steps().split_last() else {
            self.nodes.clear();
            self.top = None;
            return true;
        };

        let mut current = top;
        for step in ancestors {
            match self.child(current, *step) {
                Some(next) => current = next,
                None => {
                    tracing::warn!(
                        address = %address,
                        segment = %step,
                        "cannot remove frame: ancestor segment does not resolve"
                    );
                    return false;
                }
            }
        }

        let detached = self
            .nodes
            .get_mut(&current)
            .and_then(|parent| parent.slots_mut(last.kind).remove(&last.slot));

        match detached {
            Some(root) => {
                self.drop_subtree(root);
                true
            }
            None => {
                tracing::warn!(
                    address = %address,
                    segment = %last,
                    "cannot remove frame: slot is empty"
                );
                false
            }
        }
    }

    /// Record that the opener reported opening the window at `address`.
    /// Returns `false` when the address does not resolve.
    pub fn mark_opened(&mut self, address: &Address) -> bool {
        let Some(id) = self.resolve(address) else {
            return false;
        };
        if let Some(frame) = self.nodes.get_mut(&id) {
            frame.opened = true;
        }
        true
    }

    /// Flag the context at `address` as closed. Returns whether it exists.
    pub fn mark_closed(&mut self, address: &Address) -> bool {
        let Some(id) = self.resolve(address) else {
            tracing::warn!(address = %address, "cannot mark frame closed: address does not resolve");
            return false;
        };
        if let Some(frame) = self.nodes.get_mut(&id) {
            frame.closed = true;
        }
        true
    }

    fn allocate(&mut self, frame: Frame) -> FrameId {
        let id = FrameId(self.next_frame_id);
        self.next_frame_id = self.next_frame_id.saturating_add(1);
        self.nodes.insert(id, frame);
        id
    }

    fn attach(&mut self, parent: FrameId, step: Step) -> FrameId {
        let id = self.allocate(Frame::empty(Relation::for_step(parent, step)));
        if let Some(frame) = self.nodes.get_mut(&parent) {
            frame.slots_mut(step.kind).insert(step.slot, id);
        }
        id
    }

    fn drop_subtree(&mut self, root: FrameId) {
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if let Some(frame) = self.nodes.remove(&id) {
                pending.extend(frame.frames.values().copied());
                pending.extend(frame.popups.values().copied());
            }
        }
    }

    // =========================================================================
    // PATH RECONSTRUCTION & RENDERING
    // =========================================================================

    /// Compute the canonical address of a node from its back-references.
    #[must_use]
    pub fn canonical_address(&self, id: FrameId) -> Option<Address> {
        let mut steps = Vec::new();
        let mut current = id;
        loop {
            let frame = self.nodes.get(&current)?;
            match frame.relation.parent_step() {
                Some((parent, step)) => {
                    steps.push(step);
                    current = parent;
                }
                None => break,
            }
        }
        if Some(current) != self.top {
            return None;
        }
        steps.reverse();
        Some(Address::from_steps(steps))
    }

    /// Every node with its canonical address, root first, iframes before
    /// popups, ascending slot order.
    #[must_use]
    pub fn frames_in_order(&self) -> Vec<(Address, FrameId)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let Some(top) = self.top else {
            return out;
        };

        let mut pending = vec![(Address::top(), top)];
        while let Some((address, id)) = pending.pop() {
            let Some(frame) = self.nodes.get(&id) else {
                continue;
            };
            // Reverse push so the stack pops in document order.
            for (slot, child) in frame.popups.iter().rev() {
                pending.push((address.child(Step::popup(*slot)), *child));
            }
            for (slot, child) in frame.frames.iter().rev() {
                pending.push((address.child(Step::frame(*slot)), *child));
            }
            out.push((address, id));
        }
        out
    }

    /// Human-readable tree. Closed popups and their subtrees are omitted.
    #[must_use]
    pub fn render(&self) -> String {
        let Some(top) = self.top else {
            return String::new();
        };
        let mut out = String::from("top");
        self.render_children(top, 1, &mut out);
        out
    }

    fn render_children(&self, id: FrameId, indent: usize, out: &mut String) {
        let Some(frame) = self.nodes.get(&id) else {
            return;
        };
        for (slot, child) in &frame.frames {
            out.push('\n');
            out.push_str(&"\t".repeat(indent));
            out.push_str(&format!("-> {}", Step::frame(*slot)));
            self.render_children(*child, indent + 1, out);
        }
        for (slot, child) in &frame.popups {
            if self.nodes.get(child).is_some_and(|popup| popup.closed) {
                continue;
            }
            out.push('\n');
            out.push_str(&"\t".repeat(indent));
            out.push_str(&format!("-> {}", Step::popup(*slot)));
            self.render_children(*child, indent + 1, out);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
