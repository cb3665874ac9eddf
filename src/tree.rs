//! The form-definition tree the translation model synchronizes against.
//!
//! The tree is a collaborator, not part of the translation model proper:
//! it owns the question nodes ("mugs") and the per-node itext slots, and
//! the sync algorithms rediscover item liveness by walking it. Nodes live
//! in an arena and are addressed by index, the usual shape for a tree
//! whose nodes need to be reached both parent-to-child and child-to-parent.

use crate::model::ItextRef;

/// Index of a mug within its owning [`FormTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MugId(usize);

/// The four itext-valued property slots a mug can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItextSlot {
    Label,
    Hint,
    Help,
    ConstraintMsg,
}

impl ItextSlot {
    pub const ALL: [ItextSlot; 4] = [
        ItextSlot::Label,
        ItextSlot::Hint,
        ItextSlot::Help,
        ItextSlot::ConstraintMsg,
    ];

    /// Property name as the form builder spells it.
    pub fn property_name(self) -> &'static str {
        match self {
            ItextSlot::Label => "labelItext",
            ItextSlot::Hint => "hintItext",
            ItextSlot::Help => "helpItext",
            ItextSlot::ConstraintMsg => "constraintMsgItext",
        }
    }

    /// Short name used as the suffix of derived item ids,
    /// e.g. `question1-label`.
    pub fn suffix(self) -> &'static str {
        match self {
            ItextSlot::Label => "label",
            ItextSlot::Hint => "hint",
            ItextSlot::Help => "help",
            ItextSlot::ConstraintMsg => "constraintMsg",
        }
    }

    fn index(self) -> usize {
        match self {
            ItextSlot::Label => 0,
            ItextSlot::Hint => 1,
            ItextSlot::Help => 2,
            ItextSlot::ConstraintMsg => 3,
        }
    }
}

/// Whether a mug may carry a given itext slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Optional,
    NotAllowed,
}

/// Structural kind flags for a mug, fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MugOptions {
    /// Bind-only node with no control element (e.g. hidden value): no
    /// visible text at all, but constraint messages still apply.
    pub is_data_only: bool,
    /// Control-only node with no bind (groups, repeats, choices):
    /// no constraint message.
    pub is_control_only: bool,
    /// Group whose children's paths begin with its own path; rename
    /// rewriting treats its path as a prefix rather than a whole segment.
    pub is_special_group: bool,
    /// Select choice: labelled, but not a data node and not addressable
    /// by path.
    pub is_choice: bool,
}

#[derive(Debug)]
pub struct Mug {
    node_id: String,
    options: MugOptions,
    parent: Option<MugId>,
    children: Vec<MugId>,
    itext: [Option<ItextRef>; 4],
}

impl Mug {
    fn new(node_id: &str, options: MugOptions, parent: Option<MugId>) -> Self {
        Mug {
            node_id: node_id.to_string(),
            options,
            parent,
            children: Vec::new(),
            itext: [None, None, None, None],
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn set_node_id(&mut self, node_id: &str) {
        self.node_id = node_id.to_string();
    }

    pub fn options(&self) -> MugOptions {
        self.options
    }

    pub fn parent(&self) -> Option<MugId> {
        self.parent
    }

    pub fn itext(&self, slot: ItextSlot) -> Option<&ItextRef> {
        self.itext[slot.index()].as_ref()
    }

    /// Occupied slots in declaration order.
    pub fn itext_slots(&self) -> impl Iterator<Item = (ItextSlot, &ItextRef)> {
        ItextSlot::ALL
            .into_iter()
            .filter_map(|slot| self.itext(slot).map(|item| (slot, item)))
    }

    /// Store (or clear) an itext reference. The replaced item, if any,
    /// loses one reference; the stored item's count was minted by whoever
    /// produced the reference, so it is not touched here.
    pub fn set_itext(&mut self, slot: ItextSlot, item: Option<ItextRef>) {
        if let Some(old) = self.itext[slot.index()].take() {
            let mut old = old.borrow_mut();
            old.ref_count = old.ref_count.saturating_sub(1);
        }
        self.itext[slot.index()] = item;
    }

    /// Capability query: which slots this kind of node may carry.
    pub fn presence(&self, slot: ItextSlot) -> Presence {
        let disallowed = match slot {
            ItextSlot::Label => self.options.is_data_only,
            ItextSlot::Hint | ItextSlot::Help => {
                self.options.is_data_only || self.options.is_choice
            }
            ItextSlot::ConstraintMsg => self.options.is_control_only || self.options.is_choice,
        };
        if disallowed {
            Presence::NotAllowed
        } else {
            Presence::Optional
        }
    }
}

/// Arena of mugs under a single data root (e.g. `data` in `/data/q1`).
/// The root itself is not a mug and is never visited by walks.
#[derive(Debug)]
pub struct FormTree {
    root_name: String,
    mugs: Vec<Mug>,
    roots: Vec<MugId>,
}

impl FormTree {
    pub fn new(root_name: &str) -> Self {
        FormTree {
            root_name: root_name.to_string(),
            mugs: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn add_mug(&mut self, parent: Option<MugId>, node_id: &str, options: MugOptions) -> MugId {
        let id = MugId(self.mugs.len());
        self.mugs.push(Mug::new(node_id, options, parent));
        match parent {
            Some(p) => self.mugs[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn add_question(&mut self, parent: Option<MugId>, node_id: &str) -> MugId {
        self.add_mug(parent, node_id, MugOptions::default())
    }

    pub fn add_group(&mut self, parent: Option<MugId>, node_id: &str) -> MugId {
        self.add_mug(
            parent,
            node_id,
            MugOptions {
                is_control_only: true,
                ..MugOptions::default()
            },
        )
    }

    pub fn add_special_group(&mut self, parent: Option<MugId>, node_id: &str) -> MugId {
        self.add_mug(
            parent,
            node_id,
            MugOptions {
                is_control_only: true,
                is_special_group: true,
                ..MugOptions::default()
            },
        )
    }

    pub fn add_data_node(&mut self, parent: Option<MugId>, node_id: &str) -> MugId {
        self.add_mug(
            parent,
            node_id,
            MugOptions {
                is_data_only: true,
                ..MugOptions::default()
            },
        )
    }

    pub fn add_choice(&mut self, parent: MugId, node_id: &str) -> MugId {
        self.add_mug(
            Some(parent),
            node_id,
            MugOptions {
                is_control_only: true,
                is_choice: true,
                ..MugOptions::default()
            },
        )
    }

    pub fn mug(&self, id: MugId) -> &Mug {
        &self.mugs[id.0]
    }

    pub fn mug_mut(&mut self, id: MugId) -> &mut Mug {
        &mut self.mugs[id.0]
    }

    /// Depth-first preorder over every mug, root excluded.
    pub fn walk_order(&self) -> Vec<MugId> {
        let mut order = Vec::with_capacity(self.mugs.len());
        let mut stack: Vec<MugId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.mugs[id.0].children.iter().rev());
        }
        order
    }

    /// Path segments from the root (exclusive) down to the mug,
    /// skipping choice nodes, which are not data nodes.
    fn segments(&self, id: MugId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let mug = &self.mugs[current.0];
            if !mug.options.is_choice {
                segments.push(mug.node_id.as_str());
            }
            cursor = mug.parent;
        }
        segments.reverse();
        segments
    }

    /// Absolute data path including the root, e.g. `/data/group1/q1`.
    /// `None` for choice nodes, which have no path of their own.
    pub fn absolute_path(&self, id: MugId) -> Option<String> {
        if self.mugs[id.0].options.is_choice {
            return None;
        }
        Some(format!("/{}/{}", self.root_name, self.segments(id).join("/")))
    }

    /// Path without the leading root, e.g. `group1/q1`; the shape itext
    /// ids are derived from. `None` for choice nodes.
    pub fn path_no_root(&self, id: MugId) -> Option<String> {
        if self.mugs[id.0].options.is_choice {
            return None;
        }
        Some(self.segments(id).join("/"))
    }
}
