//! The enumeration tree: a rooted tree of LP subproblems over a shared
//! master set, with a single live LP mirror.
//!
//! Each node is either active (a leaf that may be modified and solved) or
//! inactive (an interior node storing five patch lists that transform its
//! parent's problem into its own). At most one node is *current*: its rows,
//! columns, bounds, objective and basis statuses are materialised in the
//! LP mirror and pushed into the LP engine. Reviving a node computes the
//! symmetric difference between the mirror contents and the target node
//! along the root path and applies it incrementally, so switching between
//! nearby subproblems is cheap.

use crate::constants::{BasisStatus, Bounds, SolveOutcome};
use crate::engine::{LpEngine, SimplexControl};
use crate::master::{Col, Item, ItemFilter, ItemHook, Mark, MasterSet, Row};
use crate::Result;
use std::sync::atomic::{AtomicU32, Ordering};

/// Handle to a subproblem node of a [`Tree`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

/// State of a subproblem node.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NodeState {
    /// A leaf that may be modified while current, and solved.
    Active,
    /// An interior node with the given number of children. Its problem is
    /// stored as patch lists relative to its parent.
    Inactive {
        children: u32,
    },
}

/// Runs just before a node is destroyed.
pub trait NodeHook {
    fn on_delete(&mut self, node: NodeId, link: u64, active: bool);
}

impl<F: FnMut(NodeId, u64, bool)> NodeHook for F {
    fn on_delete(&mut self, node: NodeId, link: u64, active: bool) {
        self(node, link, active)
    }
}

/// What a node-deleting operation destroyed: master items that fell out of
/// use (each with its application link), and the nodes themselves. The
/// caller does its own bookkeeping from this; nothing here borrows the
/// tree.
#[derive(Debug, Default)]
pub struct Removal {
    /// Master items deleted from the master set, with their links.
    pub items: Vec<(Item, u64)>,
    /// Deleted nodes with their links; the flag is set if the node was
    /// still active.
    pub nodes: Vec<(NodeId, u64, bool)>,
}

impl Removal {
    fn merge(&mut self, other: Removal) {
        self.items.extend(other.items);
        self.nodes.extend(other.nodes);
    }
}

/// Per-tree configuration.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Run expensive structural self-checks.
    pub debug: bool,
    /// Copy master item names into the LP engine.
    pub use_names: bool,
    /// Adding more than this many rows at once rebuilds the constraint
    /// matrix wholesale instead of row by row.
    pub max_new_rows: usize,
    /// Column counterpart of `max_new_rows`.
    pub max_new_cols: usize,
}

impl Default for TreeConfig {
    fn default() -> TreeConfig {
        TreeConfig {
            debug: cfg!(debug_assertions),
            use_names: true,
            max_new_rows: 200,
            max_new_cols: 200,
        }
    }
}

/// The five patch lists describing how to turn the parent problem into
/// this node's problem: items to remove, items to add, then local bound,
/// objective-coefficient and basis-status overrides. A `None` item in the
/// objective list patches the constant term.
#[derive(Debug, Default)]
struct Patches {
    del: Vec<Item>,
    add: Vec<Item>,
    bounds: Vec<(Item, Bounds)>,
    obj: Vec<(Option<Item>, f64)>,
    stat: Vec<(Item, BasisStatus)>,
}

#[derive(Debug)]
struct NodeData {
    up: Option<NodeId>,
    level: u32,
    state: NodeState,
    m: usize,
    n: usize,
    link: u64,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    alive: bool,
    patches: Patches,
}

#[derive(Debug, Copy, Clone)]
struct Attr {
    bounds: Bounds,
    obj: f64,
    stat: BasisStatus,
}

static NEXT_TREE_ID: AtomicU32 = AtomicU32::new(0);

/// An implicit enumeration tree together with its master set and LP
/// engine.
pub struct Tree<E: LpEngine> {
    pub(crate) master: MasterSet,
    nodes: Vec<NodeData>,
    size: usize,
    root: Option<NodeId>,
    last: Option<NodeId>,
    current: Option<NodeId>,
    node_hook: Option<Box<dyn NodeHook>>,
    config: TreeConfig,
    // LP mirror: the materialised state of the current subproblem (or
    // stale leftovers of the previous one, which revive exploits)
    mrows: Vec<Option<Row>>,
    mcols: Vec<Option<Col>>,
    row_attr: Vec<Attr>,
    col_attr: Vec<Attr>,
    obj_c0: f64,
    row_marks: Vec<bool>,
    col_marks: Vec<bool>,
    lp: E,
}

impl<E: LpEngine> Tree<E> {
    /// Create an empty tree around the given LP engine. The engine must be
    /// empty; its name and optimisation direction may already be set.
    pub fn new(lp: E, config: TreeConfig) -> Tree<E> {
        assert!(lp.num_rows() == 0 && lp.num_cols() == 0,
            "Tree::new: LP engine is not empty");
        Tree {
            master: MasterSet::new(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)),
            nodes: Vec::new(),
            size: 0,
            root: None,
            last: None,
            current: None,
            node_hook: None,
            config,
            mrows: Vec::new(),
            mcols: Vec::new(),
            row_attr: Vec::new(),
            col_attr: Vec::new(),
            obj_c0: 0.0,
            row_marks: Vec::new(),
            col_marks: Vec::new(),
            lp,
        }
    }

    /// Read access to the LP engine. The engine must not be mutated from
    /// outside the tree; all modifications of the current subproblem go
    /// through the tree's own interface.
    pub fn lp(&self) -> &E {
        &self.lp
    }

    pub(crate) fn lp_mut(&mut self) -> &mut E {
        &mut self.lp
    }

    // ---------------------------------------------------------------
    // master set

    /// Append a new master row with the given default attributes and
    /// constraint coefficients. The new row does not enter any existing
    /// subproblem.
    pub fn add_master_row(
        &mut self,
        name: Option<&str>,
        bounds: Bounds,
        obj: f64,
        coefs: &[(Col, f64)],
    ) -> Row {
        self.master.add_row(name, bounds, obj, coefs)
    }

    /// Append a new master column; symmetric to
    /// [`add_master_row`](Tree::add_master_row).
    pub fn add_master_col(
        &mut self,
        name: Option<&str>,
        bounds: Bounds,
        obj: f64,
        coefs: &[(Row, f64)],
    ) -> Col {
        self.master.add_col(name, bounds, obj, coefs)
    }

    /// The chronologically next live master row, starting from the first
    /// when `prev` is `None`.
    pub fn next_master_row(&self, prev: Option<Row>) -> Option<Row> {
        self.master.next_row(prev)
    }

    /// The chronologically next live master column.
    pub fn next_master_col(&self, prev: Option<Col>) -> Option<Col> {
        self.master.next_col(prev)
    }

    /// Number of live master rows.
    pub fn num_master_rows(&self) -> usize {
        self.master.num_live_rows()
    }

    /// Number of live master columns.
    pub fn num_master_cols(&self) -> usize {
        self.master.num_live_cols()
    }

    /// Store application-specific information on a master item.
    pub fn set_item_link(&mut self, item: Item, link: u64) {
        self.master.set_link(item, link);
    }

    /// Retrieve application-specific information from a master item.
    pub fn item_link(&self, item: Item) -> u64 {
        self.master.link(item)
    }

    /// Default attributes of a master item.
    pub fn master_bounds(&self, item: Item) -> Bounds {
        self.master.bounds(item)
    }

    /// Default objective coefficient of a master item.
    pub fn master_obj(&self, item: Item) -> f64 {
        self.master.obj(item)
    }

    /// Delete a master row. Fails with [`Error::InUse`](crate::Error::InUse)
    /// while any subproblem references it.
    pub fn del_master_row(&mut self, row: Row) -> Result<()> {
        let current = self.current.is_some();
        let old = self.master.del_item(Item::Row(row), current)?;
        if let Some(ord) = old {
            debug_assert!(!current);
            self.mrows[ord] = None;
        }
        Ok(())
    }

    /// Delete a master column; symmetric to
    /// [`del_master_row`](Tree::del_master_row).
    pub fn del_master_col(&mut self, col: Col) -> Result<()> {
        let current = self.current.is_some();
        let old = self.master.del_item(Item::Col(col), current)?;
        if let Some(ord) = old {
            debug_assert!(!current);
            self.mcols[ord] = None;
        }
        Ok(())
    }

    /// Physically reclaim tombstoned master items. Runs automatically when
    /// tombstones exceed a tenth of the master set; calling it explicitly
    /// is allowed but never required.
    pub fn clean_master_set(&mut self) {
        self.master.clean();
    }

    /// Install the item filter consulted when an item's reference count
    /// reaches zero. Without a filter such items are deleted.
    pub fn set_item_filter(&mut self, filter: Option<Box<dyn ItemFilter>>) {
        self.master.filter = filter;
    }

    /// Install the hook that runs just before a master item is destroyed.
    pub fn set_item_hook(&mut self, hook: Option<Box<dyn ItemHook>>) {
        self.master.hook = hook;
    }

    /// Install the hook that runs just before a node is destroyed.
    pub fn set_node_hook(&mut self, hook: Option<Box<dyn NodeHook>>) {
        self.node_hook = hook;
    }

    // ---------------------------------------------------------------
    // node bookkeeping

    fn node(&self, id: NodeId, routine: &str) -> &NodeData {
        let data = &self.nodes[id.0 as usize];
        if !data.alive {
            panic!("{}: node {:?} has been deleted", routine, id);
        }
        data
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The root node, if one has been created.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The current node, if any.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// Depth level of a node; the root has level 0.
    pub fn node_level(&self, node: NodeId) -> u32 {
        self.node(node, "node_level").level
    }

    /// State of a node.
    pub fn node_state(&self, node: NodeId) -> NodeState {
        self.node(node, "node_state").state
    }

    /// Parent of a node, or `None` for the root.
    pub fn node_parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node, "node_parent").up
    }

    /// The chronologically next node; with `None`, the first (the root).
    pub fn next_node(&self, node: Option<NodeId>) -> Option<NodeId> {
        match node {
            None => self.root,
            Some(n) => self.node(n, "next_node").next,
        }
    }

    /// The chronologically previous node; with `None`, the last.
    pub fn prev_node(&self, node: Option<NodeId>) -> Option<NodeId> {
        match node {
            None => self.last,
            Some(n) => self.node(n, "prev_node").prev,
        }
    }

    /// Store application-specific information on a node.
    pub fn set_node_link(&mut self, node: NodeId, link: u64) {
        self.node(node, "set_node_link");
        self.nodes[node.0 as usize].link = link;
    }

    /// Retrieve application-specific information from a node.
    pub fn node_link(&self, node: NodeId) -> u64 {
        self.node(node, "node_link").link
    }

    /// Create a new active node attached to `parent`, or the root if
    /// `parent` is `None`. The new node inherits its parent's problem; the
    /// root starts from the empty problem. An active parent becomes
    /// inactive.
    pub fn create_node(&mut self, parent: Option<NodeId>) -> NodeId {
        if parent.is_none() && self.root.is_some() {
            panic!("create_node: root node already exists");
        }
        if let Some(p) = parent {
            self.node(p, "create_node");
            if self.nodes[p.0 as usize].state == NodeState::Active {
                // an active current parent must have its modifications
                // saved before it freezes
                if self.current == Some(p) {
                    self.make_patch_lists();
                }
                self.nodes[p.0 as usize].state = NodeState::Inactive { children: 0 };
            }
        }
        let id = NodeId(self.nodes.len() as u32);
        let (level, m, n) = match parent {
            None => (0, 0, 0),
            Some(p) => {
                let pd = &self.nodes[p.0 as usize];
                (pd.level + 1, pd.m, pd.n)
            }
        };
        self.nodes.push(NodeData {
            up: parent,
            level,
            state: NodeState::Active,
            m,
            n,
            link: 0,
            prev: self.last,
            next: None,
            alive: true,
            patches: Patches::default(),
        });
        self.size += 1;
        match self.last {
            None => self.root = Some(id),
            Some(prev) => self.nodes[prev.0 as usize].next = Some(id),
        }
        self.last = Some(id);
        if let Some(p) = parent {
            match &mut self.nodes[p.0 as usize].state {
                NodeState::Inactive { children } => *children += 1,
                NodeState::Active => unreachable!(),
            }
        }
        id
    }

    fn children(&self, node: NodeId) -> u32 {
        match self.nodes[node.0 as usize].state {
            NodeState::Active => 0,
            NodeState::Inactive { children } => children,
        }
    }

    /// The path from the root down to `node`, inclusive.
    fn path_to(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.nodes[node.0 as usize].level as usize + 1);
        let mut cur = Some(node);
        while let Some(n) = cur {
            path.push(n);
            cur = self.nodes[n.0 as usize].up;
        }
        path.reverse();
        path
    }

    fn item_at(&self, k: usize) -> Item {
        let m = self.mrows.len();
        if k < m {
            Item::Row(self.mrows[k].expect("mirror hole"))
        } else {
            Item::Col(self.mcols[k - m].expect("mirror hole"))
        }
    }

    /// Combined mirror index of a bound item: rows first, then columns.
    fn combined_index(&self, item: Item) -> Option<usize> {
        let bind = self.master.bind(item)?;
        Some(match item {
            Item::Row(_) => bind,
            Item::Col(_) => self.mrows.len() + bind,
        })
    }

    /// Status a master item receives when it enters a subproblem: rows
    /// come in basic, columns non-basic at the bound closer to zero.
    pub fn default_status(&self, item: Item) -> BasisStatus {
        match item {
            Item::Row(_) => BasisStatus::Basic,
            Item::Col(_) => match self.master.bounds(item) {
                Bounds::Free => BasisStatus::NonbasicFree,
                Bounds::Lower(_) => BasisStatus::NonbasicLower,
                Bounds::Upper(_) => BasisStatus::NonbasicUpper,
                Bounds::Double(lb, ub) => {
                    if lb.abs() <= ub.abs() {
                        BasisStatus::NonbasicLower
                    } else {
                        BasisStatus::NonbasicUpper
                    }
                }
                Bounds::Fixed(_) => BasisStatus::NonbasicFixed,
            },
        }
    }

    fn default_attr(&self, item: Item) -> Attr {
        Attr {
            bounds: self.master.bounds(item),
            obj: self.master.obj(item),
            stat: self.default_status(item),
        }
    }

    // ---------------------------------------------------------------
    // demotion: materialise the current node's state as patch lists

    /// Record the delta between the current (active) node and its parent
    /// into the node's patch lists. The mirror is the authoritative state
    /// of the node when this runs.
    fn make_patch_lists(&mut self) {
        let curr = self.current.expect("make_patch_lists: no current node");
        let cd = &self.nodes[curr.0 as usize];
        assert_eq!(cd.state, NodeState::Active);
        debug_assert!(cd.patches.del.is_empty() && cd.patches.add.is_empty());
        debug_assert!(cd.patches.bounds.is_empty());
        debug_assert!(cd.patches.obj.is_empty() && cd.patches.stat.is_empty());
        let m = self.mrows.len();
        let n = self.mcols.len();
        assert_eq!(cd.m, m);
        assert_eq!(cd.n, n);
        let path = self.path_to(curr);
        let ancestors = &path[..path.len() - 1];

        // mark the items present in the parent problem
        for &nd in ancestors {
            for t in 0..self.nodes[nd.0 as usize].patches.del.len() {
                let item = self.nodes[nd.0 as usize].patches.del[t];
                debug_assert_eq!(self.master.mark(item), Mark::Set);
                self.master.set_mark(item, Mark::None);
            }
            for t in 0..self.nodes[nd.0 as usize].patches.add.len() {
                let item = self.nodes[nd.0 as usize].patches.add[t];
                debug_assert_eq!(self.master.mark(item), Mark::None);
                self.master.set_mark(item, Mark::Set);
            }
        }
        // items of the current problem missing in the parent go to the
        // add list; shared items are unmarked so that the still-marked
        // remainder is exactly "parent minus current"
        let mut add_list = Vec::new();
        for k in 0..m + n {
            let item = self.item_at(k);
            if self.master.mark(item) == Mark::None {
                add_list.push(item);
                self.master.inc_count(item);
            } else {
                self.master.set_mark(item, Mark::None);
            }
        }
        let mut del_list = Vec::new();
        for &nd in ancestors {
            for t in 0..self.nodes[nd.0 as usize].patches.add.len() {
                let item = self.nodes[nd.0 as usize].patches.add[t];
                if self.master.mark(item) == Mark::Set {
                    del_list.push(item);
                    self.master.set_mark(item, Mark::None);
                }
            }
        }

        // effective parent bounds per current ordinal: deleting and
        // re-adding higher up resets to defaults, later patches override
        // earlier ones
        let mut temp: Vec<Option<Bounds>> = vec![None; m + n];
        for &nd in ancestors {
            for t in 0..self.nodes[nd.0 as usize].patches.del.len() {
                let item = self.nodes[nd.0 as usize].patches.del[t];
                if let Some(k) = self.combined_index(item) {
                    temp[k] = None;
                }
            }
            for t in 0..self.nodes[nd.0 as usize].patches.bounds.len() {
                let (item, b) = self.nodes[nd.0 as usize].patches.bounds[t];
                if let Some(k) = self.combined_index(item) {
                    temp[k] = Some(b);
                }
            }
        }
        let mut bounds_list = Vec::new();
        for k in 0..m + n {
            let item = self.item_at(k);
            let parent = temp[k].unwrap_or_else(|| self.master.bounds(item));
            let here = self.attr_at(k).bounds;
            if here != parent {
                bounds_list.push((item, here));
            }
        }

        // objective coefficients, including the constant term
        let mut temp: Vec<Option<f64>> = vec![None; m + n];
        let mut temp_c0: Option<f64> = None;
        for &nd in ancestors {
            for t in 0..self.nodes[nd.0 as usize].patches.del.len() {
                let item = self.nodes[nd.0 as usize].patches.del[t];
                if let Some(k) = self.combined_index(item) {
                    temp[k] = None;
                }
            }
            for t in 0..self.nodes[nd.0 as usize].patches.obj.len() {
                let (item, c) = self.nodes[nd.0 as usize].patches.obj[t];
                match item {
                    None => temp_c0 = Some(c),
                    Some(item) => {
                        if let Some(k) = self.combined_index(item) {
                            temp[k] = Some(c);
                        }
                    }
                }
            }
        }
        let mut obj_list = Vec::new();
        let parent_c0 = temp_c0.unwrap_or(0.0);
        if self.obj_c0 != parent_c0 {
            obj_list.push((None, self.obj_c0));
        }
        for k in 0..m + n {
            let item = self.item_at(k);
            let parent = temp[k].unwrap_or_else(|| self.master.obj(item));
            let here = self.attr_at(k).obj;
            if here != parent {
                obj_list.push((Some(item), here));
            }
        }

        // basis statuses
        let mut temp: Vec<Option<BasisStatus>> = vec![None; m + n];
        for &nd in ancestors {
            for t in 0..self.nodes[nd.0 as usize].patches.del.len() {
                let item = self.nodes[nd.0 as usize].patches.del[t];
                if let Some(k) = self.combined_index(item) {
                    temp[k] = None;
                }
            }
            for t in 0..self.nodes[nd.0 as usize].patches.stat.len() {
                let (item, s) = self.nodes[nd.0 as usize].patches.stat[t];
                if let Some(k) = self.combined_index(item) {
                    temp[k] = Some(s);
                }
            }
        }
        let mut stat_list = Vec::new();
        for k in 0..m + n {
            let item = self.item_at(k);
            let parent = temp[k].unwrap_or_else(|| self.default_status(item));
            let here = self.attr_at(k).stat;
            if here != parent {
                stat_list.push((item, here));
            }
        }

        let patches = &mut self.nodes[curr.0 as usize].patches;
        patches.add = add_list;
        patches.del = del_list;
        patches.bounds = bounds_list;
        patches.obj = obj_list;
        patches.stat = stat_list;
    }

    fn attr_at(&self, k: usize) -> Attr {
        let m = self.mrows.len();
        if k < m {
            self.row_attr[k]
        } else {
            self.col_attr[k - m]
        }
    }

    /// Drop a node's patch lists, releasing the add-list references.
    fn free_patches(&mut self, node: NodeId) {
        let patches = std::mem::take(&mut self.nodes[node.0 as usize].patches);
        for item in patches.add {
            self.master.dec_count(item);
        }
    }

    // ---------------------------------------------------------------
    // revive

    /// Make `node` the current subproblem, materialising its state in the
    /// LP mirror. With `None`, just demote the current node; the mirror
    /// keeps its contents, which makes a following revive of a nearby node
    /// cheap. Reviving the node that is already current does nothing.
    pub fn revive(&mut self, node: Option<NodeId>) {
        if self.current == node {
            return;
        }
        if let Some(cur) = self.current {
            if self.nodes[cur.0 as usize].state == NodeState::Active {
                self.make_patch_lists();
            }
            self.current = None;
        }
        let target = match node {
            None => return,
            Some(t) => t,
        };
        self.node(target, "revive");
        self.current = Some(target);
        let path = self.path_to(target);

        // annotate every master item with its fate: Stale items are in
        // the mirror but not the target, Keep items are in both, Fresh
        // items must be added
        for ord in 0..self.mrows.len() {
            if let Some(r) = self.mrows[ord] {
                debug_assert_eq!(self.master.bind(Item::Row(r)), Some(ord));
                self.master.set_mark(Item::Row(r), Mark::Stale);
            }
        }
        for ord in 0..self.mcols.len() {
            if let Some(c) = self.mcols[ord] {
                debug_assert_eq!(self.master.bind(Item::Col(c)), Some(ord));
                self.master.set_mark(Item::Col(c), Mark::Stale);
            }
        }
        for &nd in &path {
            for t in 0..self.nodes[nd.0 as usize].patches.del.len() {
                let item = self.nodes[nd.0 as usize].patches.del[t];
                match self.master.mark(item) {
                    Mark::Fresh => self.master.set_mark(item, Mark::None),
                    Mark::Keep => self.master.set_mark(item, Mark::Stale),
                    mark => panic!("revive: unexpected mark {:?} in del list", mark),
                }
            }
            for t in 0..self.nodes[nd.0 as usize].patches.add.len() {
                let item = self.nodes[nd.0 as usize].patches.add[t];
                match self.master.mark(item) {
                    Mark::None => self.master.set_mark(item, Mark::Fresh),
                    Mark::Stale => self.master.set_mark(item, Mark::Keep),
                    mark => panic!("revive: unexpected mark {:?} in add list", mark),
                }
            }
        }

        // drop the rows and columns that have no place in the target (and
        // any unbound holes left by master deletions), compacting the
        // mirror in place
        let mut del_r = vec![false; self.mrows.len()];
        let mut kept_rows = Vec::with_capacity(self.mrows.len());
        for ord in 0..self.mrows.len() {
            match self.mrows[ord] {
                Some(r) if self.master.mark(Item::Row(r)) == Mark::Keep => {
                    self.master.set_mark(Item::Row(r), Mark::None);
                    self.master.set_bind(Item::Row(r), Some(kept_rows.len()));
                    kept_rows.push(Some(r));
                }
                Some(r) => {
                    debug_assert_eq!(self.master.mark(Item::Row(r)), Mark::Stale);
                    self.master.set_mark(Item::Row(r), Mark::None);
                    self.master.set_bind(Item::Row(r), None);
                    del_r[ord] = true;
                }
                None => del_r[ord] = true,
            }
        }
        let mut del_c = vec![false; self.mcols.len()];
        let mut kept_cols = Vec::with_capacity(self.mcols.len());
        for ord in 0..self.mcols.len() {
            match self.mcols[ord] {
                Some(c) if self.master.mark(Item::Col(c)) == Mark::Keep => {
                    self.master.set_mark(Item::Col(c), Mark::None);
                    self.master.set_bind(Item::Col(c), Some(kept_cols.len()));
                    kept_cols.push(Some(c));
                }
                Some(c) => {
                    debug_assert_eq!(self.master.mark(Item::Col(c)), Mark::Stale);
                    self.master.set_mark(Item::Col(c), Mark::None);
                    self.master.set_bind(Item::Col(c), None);
                    del_c[ord] = true;
                }
                None => del_c[ord] = true,
            }
        }
        if del_r.iter().any(|&d| d) {
            self.lp.del_rows(&del_r);
        }
        if del_c.iter().any(|&d| d) {
            self.lp.del_cols(&del_c);
        }
        self.mrows = kept_rows;
        self.mcols = kept_cols;
        assert_eq!(self.lp.num_rows(), self.mrows.len());
        assert_eq!(self.lp.num_cols(), self.mcols.len());

        // append the fresh items in path order and bind them
        let mut fresh_rows = Vec::new();
        let mut fresh_cols = Vec::new();
        for &nd in &path {
            for t in 0..self.nodes[nd.0 as usize].patches.add.len() {
                let item = self.nodes[nd.0 as usize].patches.add[t];
                if self.master.mark(item) == Mark::Fresh {
                    self.master.set_mark(item, Mark::None);
                    match item {
                        Item::Row(r) => fresh_rows.push(r),
                        Item::Col(c) => fresh_cols.push(c),
                    }
                }
            }
        }
        let nrs = fresh_rows.len();
        let ncs = fresh_cols.len();
        if nrs > 0 {
            self.lp.add_rows(nrs);
            for r in fresh_rows {
                let ord = self.mrows.len();
                self.master.set_bind(Item::Row(r), Some(ord));
                self.mrows.push(Some(r));
                if self.config.use_names {
                    if let Some(name) = self.master.name_of(Item::Row(r)) {
                        let name = name.to_owned();
                        self.lp.set_row_name(ord, Some(&name));
                    }
                }
            }
        }
        if ncs > 0 {
            self.lp.add_cols(ncs);
            for c in fresh_cols {
                let ord = self.mcols.len();
                self.master.set_bind(Item::Col(c), Some(ord));
                self.mcols.push(Some(c));
                if self.config.use_names {
                    if let Some(name) = self.master.name_of(Item::Col(c)) {
                        let name = name.to_owned();
                        self.lp.set_col_name(ord, Some(&name));
                    }
                }
            }
        }
        let m = self.mrows.len();
        let n = self.mcols.len();
        assert_eq!(self.lp.num_rows(), m);
        assert_eq!(self.lp.num_cols(), n);
        assert_eq!(self.nodes[target.0 as usize].m, m);
        assert_eq!(self.nodes[target.0 as usize].n, n);
        if self.config.debug {
            self.check_bindings();
        }

        // initialise every attribute from the master defaults, then walk
        // the path applying each level's patches over the previous one
        self.obj_c0 = 0.0;
        let mut row_attr = Vec::with_capacity(m);
        for i in 0..m {
            row_attr.push(self.default_attr(Item::Row(self.mrows[i].unwrap())));
        }
        self.row_attr = row_attr;
        let mut col_attr = Vec::with_capacity(n);
        for j in 0..n {
            col_attr.push(self.default_attr(Item::Col(self.mcols[j].unwrap())));
        }
        self.col_attr = col_attr;
        for &nd in &path {
            for t in 0..self.nodes[nd.0 as usize].patches.del.len() {
                // deleted at this level and re-added above: back to the
                // master defaults, as if entering for the first time
                let item = self.nodes[nd.0 as usize].patches.del[t];
                if self.master.bind(item).is_some() {
                    let attr = self.default_attr(item);
                    self.set_attr(item, attr);
                }
            }
            for t in 0..self.nodes[nd.0 as usize].patches.bounds.len() {
                let (item, b) = self.nodes[nd.0 as usize].patches.bounds[t];
                if self.master.bind(item).is_some() {
                    let mut attr = self.get_attr(item);
                    attr.bounds = b;
                    self.set_attr(item, attr);
                }
            }
            for t in 0..self.nodes[nd.0 as usize].patches.obj.len() {
                let (item, c) = self.nodes[nd.0 as usize].patches.obj[t];
                match item {
                    None => self.obj_c0 = c,
                    Some(item) => {
                        if self.master.bind(item).is_some() {
                            let mut attr = self.get_attr(item);
                            attr.obj = c;
                            self.set_attr(item, attr);
                        }
                    }
                }
            }
            for t in 0..self.nodes[nd.0 as usize].patches.stat.len() {
                let (item, s) = self.nodes[nd.0 as usize].patches.stat[t];
                if self.master.bind(item).is_some() {
                    let mut attr = self.get_attr(item);
                    attr.stat = s;
                    self.set_attr(item, attr);
                }
            }
        }
        // the node is active again; its patch lists have served their
        // purpose
        if self.nodes[target.0 as usize].state == NodeState::Active {
            self.free_patches(target);
        }

        // push the materialised attributes into the LP engine
        self.lp.set_obj_const(self.obj_c0);
        for i in 0..m {
            let attr = self.row_attr[i];
            self.lp.set_row_bounds(i, attr.bounds);
            self.lp.set_row_obj(i, attr.obj);
            self.lp.set_row_stat(i, attr.stat);
        }
        for j in 0..n {
            let attr = self.col_attr[j];
            self.lp.set_col_bounds(j, attr.bounds);
            self.lp.set_col_obj(j, attr.obj);
            self.lp.set_col_stat(j, attr.stat);
        }

        // the freshly appended rows and columns are still empty in the
        // engine's matrix; on filling the rows, coefficients of the new
        // columns are skipped since the column pass enters them
        if nrs <= self.config.max_new_rows && ncs <= self.config.max_new_cols {
            for i in m - nrs..m {
                let row = self.mrows[i].unwrap();
                let coefs: Vec<(usize, f64)> = self
                    .master
                    .row_cells(row)
                    .into_iter()
                    .filter_map(|(c, v)| {
                        self.master
                            .bind(Item::Col(c))
                            .filter(|&j| j < n - ncs)
                            .map(|j| (j, v))
                    })
                    .collect();
                self.lp.set_mat_row(i, &coefs);
            }
            for j in n - ncs..n {
                let col = self.mcols[j].unwrap();
                let coefs: Vec<(usize, f64)> = self
                    .master
                    .col_cells(col)
                    .into_iter()
                    .filter_map(|(r, v)| self.master.bind(Item::Row(r)).map(|i| (i, v)))
                    .collect();
                self.lp.set_mat_col(j, &coefs);
            }
        } else {
            self.load_matrix();
        }
        self.row_marks = vec![false; m];
        self.col_marks = vec![false; n];
    }

    fn get_attr(&self, item: Item) -> Attr {
        match item {
            Item::Row(_) => self.row_attr[self.master.bind(item).unwrap()],
            Item::Col(_) => self.col_attr[self.master.bind(item).unwrap()],
        }
    }

    fn set_attr(&mut self, item: Item, attr: Attr) {
        let bind = self.master.bind(item).unwrap();
        match item {
            Item::Row(_) => self.row_attr[bind] = attr,
            Item::Col(_) => self.col_attr[bind] = attr,
        }
    }

    /// Rebuild the engine's constraint matrix from scratch, row-wise.
    fn load_matrix(&mut self) {
        self.lp.clear_mat();
        for i in 0..self.mrows.len() {
            let row = self.mrows[i].expect("mirror hole");
            let coefs: Vec<(usize, f64)> = self
                .master
                .row_cells(row)
                .into_iter()
                .filter_map(|(c, v)| self.master.bind(Item::Col(c)).map(|j| (j, v)))
                .collect();
            self.lp.set_mat_row(i, &coefs);
        }
    }

    fn check_bindings(&self) {
        for i in 0..self.mrows.len() {
            let r = self.mrows[i].expect("mirror hole");
            assert_eq!(self.master.bind(Item::Row(r)), Some(i));
        }
        for j in 0..self.mcols.len() {
            let c = self.mcols[j].expect("mirror hole");
            assert_eq!(self.master.bind(Item::Col(c)), Some(j));
        }
    }

    // ---------------------------------------------------------------
    // modifying the current node

    fn current_active(&self, routine: &str) -> NodeId {
        let curr = match self.current {
            Some(c) => c,
            None => panic!("{}: no current subproblem", routine),
        };
        if self.nodes[curr.0 as usize].state != NodeState::Active {
            panic!("{}: attempt to modify an inactive subproblem", routine);
        }
        curr
    }

    /// Include master rows in the current (active) subproblem. Each row
    /// enters with its default attributes; none may already be present.
    pub fn add_rows(&mut self, rows: &[Row]) {
        let curr = self.current_active("add_rows");
        assert!(!rows.is_empty(), "add_rows: empty row list");
        for &r in rows {
            self.master.check_row(r, "add_rows");
            if self.master.bind(Item::Row(r)).is_some() {
                panic!("add_rows: master row {:?} already included", r);
            }
        }
        let nrs = rows.len();
        self.lp.add_rows(nrs);
        for &r in rows {
            let ord = self.mrows.len();
            self.master.set_bind(Item::Row(r), Some(ord));
            self.mrows.push(Some(r));
            let attr = self.default_attr(Item::Row(r));
            self.row_attr.push(attr);
            if self.config.use_names {
                if let Some(name) = self.master.name_of(Item::Row(r)) {
                    let name = name.to_owned();
                    self.lp.set_row_name(ord, Some(&name));
                }
            }
            self.lp.set_row_bounds(ord, attr.bounds);
            self.lp.set_row_obj(ord, attr.obj);
            self.lp.set_row_stat(ord, attr.stat);
        }
        let m = self.mrows.len();
        self.nodes[curr.0 as usize].m = m;
        self.row_marks.resize(m, false);
        if nrs <= self.config.max_new_rows {
            for i in m - nrs..m {
                let row = self.mrows[i].unwrap();
                let coefs: Vec<(usize, f64)> = self
                    .master
                    .row_cells(row)
                    .into_iter()
                    .filter_map(|(c, v)| self.master.bind(Item::Col(c)).map(|j| (j, v)))
                    .collect();
                self.lp.set_mat_row(i, &coefs);
            }
        } else {
            self.load_matrix();
        }
    }

    /// Include master columns in the current (active) subproblem;
    /// symmetric to [`add_rows`](Tree::add_rows).
    pub fn add_cols(&mut self, cols: &[Col]) {
        let curr = self.current_active("add_cols");
        assert!(!cols.is_empty(), "add_cols: empty column list");
        for &c in cols {
            self.master.check_col(c, "add_cols");
            if self.master.bind(Item::Col(c)).is_some() {
                panic!("add_cols: master column {:?} already included", c);
            }
        }
        let ncs = cols.len();
        self.lp.add_cols(ncs);
        for &c in cols {
            let ord = self.mcols.len();
            self.master.set_bind(Item::Col(c), Some(ord));
            self.mcols.push(Some(c));
            let attr = self.default_attr(Item::Col(c));
            self.col_attr.push(attr);
            if self.config.use_names {
                if let Some(name) = self.master.name_of(Item::Col(c)) {
                    let name = name.to_owned();
                    self.lp.set_col_name(ord, Some(&name));
                }
            }
            self.lp.set_col_bounds(ord, attr.bounds);
            self.lp.set_col_obj(ord, attr.obj);
            self.lp.set_col_stat(ord, attr.stat);
        }
        let n = self.mcols.len();
        self.nodes[curr.0 as usize].n = n;
        self.col_marks.resize(n, false);
        if ncs <= self.config.max_new_cols {
            for j in n - ncs..n {
                let col = self.mcols[j].unwrap();
                let coefs: Vec<(usize, f64)> = self
                    .master
                    .col_cells(col)
                    .into_iter()
                    .filter_map(|(r, v)| self.master.bind(Item::Row(r)).map(|i| (i, v)))
                    .collect();
                self.lp.set_mat_col(j, &coefs);
            }
        } else {
            self.load_matrix();
        }
    }

    /// Flag the row at ordinal `i` for removal by
    /// [`del_items`](Tree::del_items).
    pub fn mark_row(&mut self, i: usize, marked: bool) {
        self.current_active("mark_row");
        self.row_marks[i] = marked;
    }

    /// Flag the column at ordinal `j` for removal by
    /// [`del_items`](Tree::del_items).
    pub fn mark_col(&mut self, j: usize, marked: bool) {
        self.current_active("mark_col");
        self.col_marks[j] = marked;
    }

    /// Remove every marked row and column from the current (active)
    /// subproblem. An item left unreferenced by the removal is offered to
    /// the item filter, which decides whether the master item dies too.
    pub fn del_items(&mut self) -> Removal {
        let curr = self.current_active("del_items");
        let mut removal = Removal::default();
        let del_r = std::mem::take(&mut self.row_marks);
        let mut kept_rows = Vec::with_capacity(self.mrows.len());
        let mut kept_attr = Vec::with_capacity(self.row_attr.len());
        for ord in 0..self.mrows.len() {
            let r = self.mrows[ord].expect("mirror hole");
            if del_r[ord] {
                self.master.set_bind(Item::Row(r), None);
                if self.master.count(Item::Row(r)) == 0
                    && !self.master.filter_keeps(Item::Row(r))
                {
                    let link = self.master.link(Item::Row(r));
                    self.master.del_item(Item::Row(r), true).expect("unreferenced");
                    removal.items.push((Item::Row(r), link));
                }
            } else {
                self.master.set_bind(Item::Row(r), Some(kept_rows.len()));
                kept_rows.push(Some(r));
                kept_attr.push(self.row_attr[ord]);
            }
        }
        self.mrows = kept_rows;
        self.row_attr = kept_attr;
        let del_c = std::mem::take(&mut self.col_marks);
        let mut kept_cols = Vec::with_capacity(self.mcols.len());
        let mut kept_attr = Vec::with_capacity(self.col_attr.len());
        for ord in 0..self.mcols.len() {
            let c = self.mcols[ord].expect("mirror hole");
            if del_c[ord] {
                self.master.set_bind(Item::Col(c), None);
                if self.master.count(Item::Col(c)) == 0
                    && !self.master.filter_keeps(Item::Col(c))
                {
                    let link = self.master.link(Item::Col(c));
                    self.master.del_item(Item::Col(c), true).expect("unreferenced");
                    removal.items.push((Item::Col(c), link));
                }
            } else {
                self.master.set_bind(Item::Col(c), Some(kept_cols.len()));
                kept_cols.push(Some(c));
                kept_attr.push(self.col_attr[ord]);
            }
        }
        self.mcols = kept_cols;
        self.col_attr = kept_attr;
        if del_r.iter().any(|&d| d) {
            self.lp.del_rows(&del_r);
        }
        if del_c.iter().any(|&d| d) {
            self.lp.del_cols(&del_c);
        }
        let m = self.mrows.len();
        let n = self.mcols.len();
        self.nodes[curr.0 as usize].m = m;
        self.nodes[curr.0 as usize].n = n;
        self.row_marks = vec![false; m];
        self.col_marks = vec![false; n];
        removal
    }

    // ---------------------------------------------------------------
    // node deletion

    /// Delete a node, which must have no children. Master items referenced
    /// only by this node are offered to the item filter and possibly
    /// deleted along with it.
    pub fn delete_node(&mut self, node: NodeId) -> Removal {
        self.node(node, "delete_node");
        if self.children(node) > 0 {
            panic!("delete_node: node {:?} still has child nodes", node);
        }
        let mut removal = Removal::default();
        let link = self.nodes[node.0 as usize].link;
        let active = self.nodes[node.0 as usize].state == NodeState::Active;
        {
            let hook = &mut self.node_hook;
            if let Some(hook) = hook.as_mut() {
                hook.on_delete(node, link, active);
            }
        }
        if self.current == Some(node) {
            self.revive(None);
        }
        // master items referenced only from here die with the node,
        // unless the filter keeps them
        let add = self.nodes[node.0 as usize].patches.add.clone();
        let mut consumed = Vec::new();
        for item in add {
            if self.master.count(item) == 1 && !self.master.filter_keeps(item) {
                self.master.dec_count(item);
                let item_link = self.master.link(item);
                let old = self
                    .master
                    .del_item(item, self.current.is_some())
                    .expect("unreferenced");
                if let Some(ord) = old {
                    match item {
                        Item::Row(_) => self.mrows[ord] = None,
                        Item::Col(_) => self.mcols[ord] = None,
                    }
                }
                removal.items.push((item, item_link));
                consumed.push(item);
            }
        }
        self.nodes[node.0 as usize]
            .patches
            .add
            .retain(|i| !consumed.contains(i));
        self.free_patches(node);
        if let Some(up) = self.nodes[node.0 as usize].up {
            match &mut self.nodes[up.0 as usize].state {
                NodeState::Inactive { children } => {
                    debug_assert!(*children > 0);
                    *children -= 1;
                }
                NodeState::Active => unreachable!(),
            }
        }
        // unlink from the chronological list
        let (prev, next) = {
            let d = &self.nodes[node.0 as usize];
            (d.prev, d.next)
        };
        match prev {
            None => self.root = next,
            Some(p) => self.nodes[p.0 as usize].next = next,
        }
        match next {
            None => self.last = prev,
            Some(nx) => self.nodes[nx.0 as usize].prev = prev,
        }
        debug_assert!(self.size > 0);
        self.size -= 1;
        self.nodes[node.0 as usize].alive = false;
        removal.nodes.push((node, link, active));
        removal
    }

    /// Delete a childless node and then every ancestor below the root
    /// that is left without children.
    pub fn prune_branch(&mut self, node: NodeId) -> Removal {
        self.node(node, "prune_branch");
        if self.children(node) > 0 {
            panic!("prune_branch: node {:?} still has child nodes", node);
        }
        let mut up = self.nodes[node.0 as usize].up;
        let mut removal = self.delete_node(node);
        while let Some(nd) = up {
            if self.children(nd) > 0 || self.nodes[nd.0 as usize].up.is_none() {
                break;
            }
            up = self.nodes[nd.0 as usize].up;
            removal.merge(self.delete_node(nd));
        }
        removal
    }

    // ---------------------------------------------------------------
    // the current subproblem

    fn require_current(&self, routine: &str) {
        if self.current.is_none() {
            panic!("{}: no current subproblem", routine);
        }
    }

    /// Number of rows in the current subproblem.
    pub fn num_rows(&self) -> usize {
        self.require_current("num_rows");
        self.mrows.len()
    }

    /// Number of columns in the current subproblem.
    pub fn num_cols(&self) -> usize {
        self.require_current("num_cols");
        self.mcols.len()
    }

    /// The master row at ordinal `i` of the current subproblem. Ordinals
    /// are assigned at revive time and are not stable across revives.
    pub fn ith_row(&self, i: usize) -> Row {
        self.require_current("ith_row");
        self.mrows[i].expect("mirror hole")
    }

    /// The master column at ordinal `j` of the current subproblem.
    pub fn jth_col(&self, j: usize) -> Col {
        self.require_current("jth_col");
        self.mcols[j].expect("mirror hole")
    }

    /// Ordinal of a master row within the current subproblem, or `None`
    /// if the row is not part of it.
    pub fn row_bind(&self, row: Row) -> Option<usize> {
        self.require_current("row_bind");
        self.master.check_row(row, "row_bind");
        self.master.bind(Item::Row(row))
    }

    /// Ordinal of a master column within the current subproblem.
    pub fn col_bind(&self, col: Col) -> Option<usize> {
        self.require_current("col_bind");
        self.master.check_col(col, "col_bind");
        self.master.bind(Item::Col(col))
    }

    fn bound_row(&self, row: Row, routine: &str) -> usize {
        self.require_current(routine);
        self.master.check_row(row, routine);
        match self.master.bind(Item::Row(row)) {
            Some(i) => i,
            None => panic!("{}: master row {:?} missing in the current subproblem", routine, row),
        }
    }

    fn bound_col(&self, col: Col, routine: &str) -> usize {
        self.require_current(routine);
        self.master.check_col(col, routine);
        match self.master.bind(Item::Col(col)) {
            Some(j) => j,
            None => panic!("{}: master column {:?} missing in the current subproblem", routine, col),
        }
    }

    /// Local type and bounds of a row in the current subproblem.
    pub fn row_bounds(&self, row: Row) -> Bounds {
        let i = self.bound_row(row, "row_bounds");
        self.row_attr[i].bounds
    }

    /// Local type and bounds of a column in the current subproblem.
    pub fn col_bounds(&self, col: Col) -> Bounds {
        let j = self.bound_col(col, "col_bounds");
        self.col_attr[j].bounds
    }

    /// Status, primal value and reduced cost of a row in the basic
    /// solution of the current subproblem.
    pub fn row_info(&self, row: Row) -> (BasisStatus, f64, f64) {
        let i = self.bound_row(row, "row_info");
        self.lp.row_info(i)
    }

    /// Status, primal value and reduced cost of a column.
    pub fn col_info(&self, col: Col) -> (BasisStatus, f64, f64) {
        let j = self.bound_col(col, "col_info");
        self.lp.col_info(j)
    }

    /// Reduced cost of any master column. A column present in the current
    /// subproblem reports the engine's value; a missing column's reduced
    /// cost is computed from the simplex multipliers of the rows it
    /// intersects. A missing row is treated as basic with zero dual, which
    /// requires its objective coefficient to be zero; a row that violates
    /// this invariant makes locally priced columns meaningless, so the
    /// call panics.
    pub fn eval_red_cost(&self, col: Col) -> f64 {
        self.eval_red_cost_with(col, self.master.obj(Item::Col(col)))
    }

    pub(crate) fn eval_red_cost_with(&self, col: Col, coef: f64) -> f64 {
        self.require_current("eval_red_cost");
        self.master.check_col(col, "eval_red_cost");
        if let Some(j) = self.master.bind(Item::Col(col)) {
            return self.lp.col_info(j).2;
        }
        let mut dj = coef;
        for (row, val) in self.master.col_cells(col) {
            match self.master.bind(Item::Row(row)) {
                Some(i) => {
                    let (_, _, dx) = self.lp.row_info(i);
                    let pi = self.lp.row_obj(i) - dx;
                    dj += pi * val;
                }
                None => {
                    let pi = self.master.obj(Item::Row(row));
                    if pi != 0.0 {
                        panic!(
                            "eval_red_cost: row {:?} is missing in the current subproblem \
                             but carries objective coefficient {}",
                            row, pi
                        );
                    }
                }
            }
        }
        dj
    }

    /// Locally override the type and bounds of a row of the current
    /// (active) subproblem.
    pub fn set_row_bounds(&mut self, row: Row, bounds: Bounds) {
        self.current_active("set_row_bounds");
        let i = self.bound_row(row, "set_row_bounds");
        bounds.validate("set_row_bounds");
        self.row_attr[i].bounds = bounds;
        if self.row_attr[i].stat != BasisStatus::Basic {
            self.row_attr[i].stat = self.row_attr[i].stat.normalized_for(bounds);
        }
        self.lp.set_row_bounds(i, bounds);
        self.lp.set_row_stat(i, self.row_attr[i].stat);
    }

    /// Locally override the type and bounds of a column.
    pub fn set_col_bounds(&mut self, col: Col, bounds: Bounds) {
        self.current_active("set_col_bounds");
        let j = self.bound_col(col, "set_col_bounds");
        bounds.validate("set_col_bounds");
        self.col_attr[j].bounds = bounds;
        if self.col_attr[j].stat != BasisStatus::Basic {
            self.col_attr[j].stat = self.col_attr[j].stat.normalized_for(bounds);
        }
        self.lp.set_col_bounds(j, bounds);
        self.lp.set_col_stat(j, self.col_attr[j].stat);
    }

    /// Set the objective constant term of the current (active) subproblem.
    pub fn set_obj_const(&mut self, c0: f64) {
        self.current_active("set_obj_const");
        self.obj_c0 = c0;
        self.lp.set_obj_const(c0);
    }

    /// Set the basis status of a row of the current (active) subproblem.
    /// A status that is illegal for the row's bound type degrades to the
    /// legal one.
    pub fn set_row_stat(&mut self, row: Row, stat: BasisStatus) {
        self.current_active("set_row_stat");
        let i = self.bound_row(row, "set_row_stat");
        let stat = stat.normalized_for(self.row_attr[i].bounds);
        self.row_attr[i].stat = stat;
        self.lp.set_row_stat(i, stat);
    }

    /// Set the basis status of a column; illegal statuses degrade.
    pub fn set_col_stat(&mut self, col: Col, stat: BasisStatus) {
        self.current_active("set_col_stat");
        let j = self.bound_col(col, "set_col_stat");
        let stat = stat.normalized_for(self.col_attr[j].bounds);
        self.col_attr[j].stat = stat;
        self.lp.set_col_stat(j, stat);
    }

    /// Push the current subproblem's objective back into the engine,
    /// undoing a temporary override such as the auxiliary infeasibility
    /// objective used by feasibility recovery.
    pub(crate) fn restore_objective(&mut self) {
        self.require_current("restore_objective");
        self.lp.set_obj_const(self.obj_c0);
        for i in 0..self.mrows.len() {
            self.lp.set_row_obj(i, self.row_attr[i].obj);
        }
        for j in 0..self.mcols.len() {
            self.lp.set_col_obj(j, self.col_attr[j].obj);
        }
    }

    /// Solve the current subproblem with the tree's LP engine and copy
    /// the resulting basis statuses back into the mirror.
    pub fn solve_node(&mut self, ctl: &SimplexControl) -> Result<SolveOutcome> {
        self.require_current("solve_node");
        let out = self.lp.simplex(ctl)?;
        for i in 0..self.mrows.len() {
            self.row_attr[i].stat = self.lp.row_info(i).0;
        }
        for j in 0..self.mcols.len() {
            self.col_attr[j].stat = self.lp.col_info(j).0;
        }
        Ok(out)
    }

    /// Reference count of a master item, for consistency checks.
    #[cfg(test)]
    pub(crate) fn item_count(&self, item: Item) -> i32 {
        self.master.count(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{LpStatus, ObjDir};
    use crate::engine::{RatioDir, VarRef};
    use crate::Error;

    fn retain_kept<T>(v: &mut Vec<T>, delete: &[bool]) {
        let mut i = 0;
        v.retain(|_| {
            let keep = !delete[i];
            i += 1;
            keep
        });
    }

    /// A recording LP engine: stores everything it is told and solves
    /// nothing. Good enough to observe what the revive machinery does.
    #[derive(Default)]
    struct MockLp {
        dir: Option<ObjDir>,
        c0: f64,
        row_bounds: Vec<Bounds>,
        col_bounds: Vec<Bounds>,
        row_obj: Vec<f64>,
        col_obj: Vec<f64>,
        row_stat: Vec<BasisStatus>,
        col_stat: Vec<BasisStatus>,
        row_names: Vec<Option<String>>,
        col_names: Vec<Option<String>>,
        mat: Vec<Vec<(usize, f64)>>,
    }

    impl MockLp {
        fn sorted_row(&self, i: usize) -> Vec<(usize, f64)> {
            let mut r = self.mat[i].clone();
            r.sort_by_key(|&(j, _)| j);
            r
        }
    }

    impl LpEngine for MockLp {
        fn set_name(&mut self, _name: Option<&str>) {}
        fn set_dir(&mut self, dir: ObjDir) {
            self.dir = Some(dir);
        }
        fn dir(&self) -> ObjDir {
            self.dir.unwrap_or(ObjDir::Minimize)
        }
        fn num_rows(&self) -> usize {
            self.row_bounds.len()
        }
        fn num_cols(&self) -> usize {
            self.col_bounds.len()
        }
        fn add_rows(&mut self, n: usize) {
            for _ in 0..n {
                self.row_bounds.push(Bounds::Free);
                self.row_obj.push(0.0);
                self.row_stat.push(BasisStatus::Basic);
                self.row_names.push(None);
                self.mat.push(Vec::new());
            }
        }
        fn add_cols(&mut self, n: usize) {
            for _ in 0..n {
                self.col_bounds.push(Bounds::Fixed(0.0));
                self.col_obj.push(0.0);
                self.col_stat.push(BasisStatus::NonbasicFixed);
                self.col_names.push(None);
            }
        }
        fn del_rows(&mut self, delete: &[bool]) {
            retain_kept(&mut self.row_bounds, delete);
            retain_kept(&mut self.row_obj, delete);
            retain_kept(&mut self.row_stat, delete);
            retain_kept(&mut self.row_names, delete);
            retain_kept(&mut self.mat, delete);
        }
        fn del_cols(&mut self, delete: &[bool]) {
            let mut remap = vec![None; delete.len()];
            let mut next = 0;
            for (j, &d) in delete.iter().enumerate() {
                if !d {
                    remap[j] = Some(next);
                    next += 1;
                }
            }
            retain_kept(&mut self.col_bounds, delete);
            retain_kept(&mut self.col_obj, delete);
            retain_kept(&mut self.col_stat, delete);
            retain_kept(&mut self.col_names, delete);
            for row in self.mat.iter_mut() {
                row.retain(|&(j, _)| remap[j].is_some());
                for cell in row.iter_mut() {
                    cell.0 = remap[cell.0].unwrap();
                }
            }
        }
        fn set_row_name(&mut self, i: usize, name: Option<&str>) {
            self.row_names[i] = name.map(str::to_owned);
        }
        fn set_col_name(&mut self, j: usize, name: Option<&str>) {
            self.col_names[j] = name.map(str::to_owned);
        }
        fn set_row_bounds(&mut self, i: usize, bounds: Bounds) {
            self.row_bounds[i] = bounds;
        }
        fn set_col_bounds(&mut self, j: usize, bounds: Bounds) {
            self.col_bounds[j] = bounds;
        }
        fn row_bounds(&self, i: usize) -> Bounds {
            self.row_bounds[i]
        }
        fn col_bounds(&self, j: usize) -> Bounds {
            self.col_bounds[j]
        }
        fn set_obj_const(&mut self, c0: f64) {
            self.c0 = c0;
        }
        fn obj_const(&self) -> f64 {
            self.c0
        }
        fn set_row_obj(&mut self, i: usize, coef: f64) {
            self.row_obj[i] = coef;
        }
        fn set_col_obj(&mut self, j: usize, coef: f64) {
            self.col_obj[j] = coef;
        }
        fn row_obj(&self, i: usize) -> f64 {
            self.row_obj[i]
        }
        fn col_obj(&self, j: usize) -> f64 {
            self.col_obj[j]
        }
        fn set_row_stat(&mut self, i: usize, stat: BasisStatus) {
            self.row_stat[i] = stat.normalized_for(self.row_bounds[i]);
        }
        fn set_col_stat(&mut self, j: usize, stat: BasisStatus) {
            self.col_stat[j] = stat.normalized_for(self.col_bounds[j]);
        }
        fn set_mat_row(&mut self, i: usize, coefs: &[(usize, f64)]) {
            self.mat[i] = coefs.to_vec();
        }
        fn set_mat_col(&mut self, j: usize, coefs: &[(usize, f64)]) {
            for row in self.mat.iter_mut() {
                row.retain(|&(jj, _)| jj != j);
            }
            for &(i, v) in coefs {
                self.mat[i].push((j, v));
            }
        }
        fn clear_mat(&mut self) {
            for row in self.mat.iter_mut() {
                row.clear();
            }
        }
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }
        fn simplex(&mut self, _ctl: &SimplexControl) -> Result<SolveOutcome> {
            unimplemented!("MockLp does not solve")
        }
        fn status(&self) -> LpStatus {
            LpStatus::Undefined
        }
        fn obj_val(&self) -> f64 {
            0.0
        }
        fn row_info(&self, i: usize) -> (BasisStatus, f64, f64) {
            (self.row_stat[i], 0.0, 0.0)
        }
        fn col_info(&self, j: usize) -> (BasisStatus, f64, f64) {
            (self.col_stat[j], 0.0, 0.0)
        }
        fn iter_count(&self) -> u64 {
            0
        }
        fn eval_tab_row(&self, _var: VarRef) -> Vec<(VarRef, f64)> {
            unimplemented!()
        }
        fn dual_ratio_test(
            &self,
            _row: &[(VarRef, f64)],
            _dir: RatioDir,
            _tol: f64,
        ) -> Option<VarRef> {
            None
        }
    }

    fn tree() -> Tree<MockLp> {
        Tree::new(MockLp::default(), TreeConfig::default())
    }

    /// Shared fixture: a root with two rows and two columns, a child that
    /// swaps a row, and a grandchild with a local bound override.
    struct Fixture {
        t: Tree<MockLp>,
        r1: Row,
        r2: Row,
        r3: Row,
        c1: Col,
        c2: Col,
        root: NodeId,
        a: NodeId,
        b: NodeId,
    }

    fn fixture() -> Fixture {
        let mut t = tree();
        let c1 = t.add_master_col(Some("c1"), Bounds::Double(0.0, 10.0), 1.0, &[]);
        let c2 = t.add_master_col(Some("c2"), Bounds::Double(0.0, 10.0), 2.0, &[]);
        let r1 = t.add_master_row(Some("r1"), Bounds::Upper(7.0), 0.0, &[(c1, 2.0), (c2, 4.0)]);
        let r2 = t.add_master_row(Some("r2"), Bounds::Upper(5.0), 0.0, &[(c1, 1.0)]);
        let r3 = t.add_master_row(Some("r3"), Bounds::Upper(3.0), 0.0, &[(c2, 1.0)]);
        let root = t.create_node(None);
        t.revive(Some(root));
        t.add_rows(&[r1, r2]);
        t.add_cols(&[c1, c2]);
        let a = t.create_node(Some(root));
        t.revive(Some(a));
        t.add_rows(&[r3]);
        let i = t.row_bind(r1).unwrap();
        t.mark_row(i, true);
        t.del_items();
        let b = t.create_node(Some(a));
        t.revive(Some(b));
        t.set_col_bounds(c1, Bounds::Double(1.0, 4.0));
        Fixture { t, r1, r2, r3, c1, c2, root, a, b }
    }

    #[test]
    fn root_materialises_in_the_mirror() {
        let mut t = tree();
        let c = t.add_master_col(Some("x"), Bounds::Double(0.0, 2.0), 3.0, &[]);
        let r = t.add_master_row(Some("cap"), Bounds::Upper(7.0), 0.0, &[(c, 2.0)]);
        let root = t.create_node(None);
        t.revive(Some(root));
        t.add_rows(&[r]);
        t.add_cols(&[c]);
        assert_eq!(t.num_rows(), 1);
        assert_eq!(t.num_cols(), 1);
        assert_eq!(t.ith_row(0), r);
        assert_eq!(t.jth_col(0), c);
        assert_eq!(t.row_bounds(r), Bounds::Upper(7.0));
        assert_eq!(t.col_bounds(c), Bounds::Double(0.0, 2.0));
        assert_eq!(t.lp().col_obj(0), 3.0);
        assert_eq!(t.lp().sorted_row(0), vec![(0, 2.0)]);
        assert_eq!(t.lp().row_names[0].as_deref(), Some("cap"));
    }

    #[test]
    fn revive_restores_each_node_exactly() {
        let mut f = fixture();
        // the grandchild is current: r1 swapped for r3, c1 tightened
        assert_eq!(f.t.row_bind(f.r1), None);
        assert!(f.t.row_bind(f.r3).is_some());
        assert_eq!(f.t.col_bounds(f.c1), Bounds::Double(1.0, 4.0));

        // back to the root: the original items with original attributes
        f.t.revive(Some(f.root));
        assert_eq!(f.t.num_rows(), 2);
        assert_eq!(f.t.num_cols(), 2);
        assert!(f.t.row_bind(f.r1).is_some());
        assert!(f.t.row_bind(f.r2).is_some());
        assert_eq!(f.t.row_bind(f.r3), None);
        assert_eq!(f.t.col_bounds(f.c1), Bounds::Double(0.0, 10.0));
        assert_eq!(f.t.row_bounds(f.r1), Bounds::Upper(7.0));
        let i = f.t.row_bind(f.r1).unwrap();
        let j1 = f.t.col_bind(f.c1).unwrap();
        let j2 = f.t.col_bind(f.c2).unwrap();
        let mut expect = vec![(j1, 2.0), (j2, 4.0)];
        expect.sort_by_key(|&(j, _)| j);
        assert_eq!(f.t.lp().sorted_row(i), expect);

        // forward again to the grandchild
        f.t.revive(Some(f.b));
        assert_eq!(f.t.row_bind(f.r1), None);
        assert!(f.t.row_bind(f.r3).is_some());
        assert_eq!(f.t.col_bounds(f.c1), Bounds::Double(1.0, 4.0));
        assert_eq!(f.t.col_bounds(f.c2), Bounds::Double(0.0, 10.0));
        let i = f.t.row_bind(f.r3).unwrap();
        let j2 = f.t.col_bind(f.c2).unwrap();
        assert_eq!(f.t.lp().sorted_row(i), vec![(j2, 1.0)]);

        // and back to the root one more time
        f.t.revive(Some(f.root));
        assert!(f.t.row_bind(f.r1).is_some());
        assert_eq!(f.t.row_bind(f.r3), None);
        assert_eq!(f.t.col_bounds(f.c1), Bounds::Double(0.0, 10.0));
    }

    #[test]
    fn demote_then_revive_is_a_noop() {
        let mut f = fixture();
        let before = (
            f.t.row_bind(f.r2),
            f.t.row_bind(f.r3),
            f.t.col_bounds(f.c1),
            f.t.col_bounds(f.c2),
            f.t.num_rows(),
            f.t.num_cols(),
        );
        f.t.revive(None);
        assert_eq!(f.t.current(), None);
        f.t.revive(Some(f.b));
        let after = (
            f.t.row_bind(f.r2),
            f.t.row_bind(f.r3),
            f.t.col_bounds(f.c1),
            f.t.col_bounds(f.c2),
            f.t.num_rows(),
            f.t.num_cols(),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn reference_counts_match_patch_lists() {
        let f = fixture();
        // root holds r1, r2, c1, c2 in its add list; a holds r3
        assert_eq!(f.t.item_count(Item::Row(f.r1)), 1);
        assert_eq!(f.t.item_count(Item::Row(f.r2)), 1);
        assert_eq!(f.t.item_count(Item::Row(f.r3)), 1);
        assert_eq!(f.t.item_count(Item::Col(f.c1)), 1);
        assert_eq!(f.t.item_count(Item::Col(f.c2)), 1);
    }

    #[test]
    fn delete_master_item_in_use_fails() {
        let mut f = fixture();
        assert_eq!(f.t.del_master_row(f.r2), Err(Error::InUse));
        assert_eq!(f.t.del_master_col(f.c1), Err(Error::InUse));
    }

    #[test]
    fn prune_branch_stops_below_the_root() {
        let mut f = fixture();
        let removal = f.t.prune_branch(f.b);
        // b goes, then a (no other children); the root survives
        let gone: Vec<NodeId> = removal.nodes.iter().map(|&(n, _, _)| n).collect();
        assert_eq!(gone, vec![f.b, f.a]);
        assert_eq!(f.t.size(), 1);
        assert_eq!(f.t.root(), Some(f.root));
        // r3 was referenced only by a; with no filter installed it died
        assert!(removal.items.iter().any(|&(i, _)| i == Item::Row(f.r3)));
    }

    #[test]
    fn delete_node_keeps_filtered_items() {
        let mut f = fixture();
        // keep every item regardless of reference count
        f.t.set_item_filter(Some(Box::new(|_: Item, _: u64| true)));
        let removal = f.t.prune_branch(f.b);
        assert!(removal.items.is_empty());
        // r3 is unreferenced but still alive in the master set
        assert_eq!(f.t.item_count(Item::Row(f.r3)), 0);
        assert_eq!(f.t.next_master_row(Some(f.r2)), Some(f.r3));
    }

    #[test]
    fn node_chronology_is_creation_order() {
        let f = fixture();
        assert_eq!(f.t.next_node(None), Some(f.root));
        assert_eq!(f.t.next_node(Some(f.root)), Some(f.a));
        assert_eq!(f.t.next_node(Some(f.a)), Some(f.b));
        assert_eq!(f.t.next_node(Some(f.b)), None);
        assert_eq!(f.t.prev_node(None), Some(f.b));
        assert_eq!(f.t.node_level(f.b), 2);
        assert_eq!(f.t.node_state(f.root), NodeState::Inactive { children: 1 });
        assert_eq!(f.t.node_state(f.b), NodeState::Active);
    }

    #[test]
    #[should_panic(expected = "already included")]
    fn double_include_is_rejected() {
        let mut f = fixture();
        // r2 is already part of the current (grandchild) problem
        let r2 = f.r2;
        f.t.add_rows(&[r2]);
    }

    #[test]
    #[should_panic(expected = "root node already exists")]
    fn second_root_is_rejected() {
        let mut f = fixture();
        f.t.create_node(None);
    }
}
