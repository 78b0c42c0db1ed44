//! The master set: every row (constraint) and column (variable) ever
//! created, shared by all subproblems of an enumeration tree.
//!
//! Master items carry immutable default attributes and the full constraint
//! matrix; a particular subproblem selects a subset of the master set and
//! may locally override bounds, objective coefficients and basis statuses.
//! Items are reference counted by the subproblem patch lists that mention
//! them and deleted lazily: deletion tombstones the item, and a sweep
//! reclaims tombstones once they exceed a tenth of the set.

use crate::constants::Bounds;
use crate::{Error, Result};
use std::fmt::Debug;

mod private_traits {
    use super::{Item, ItemData, MasterSet};
    use std::hash::Hash;

    pub trait MasterHandlePrivate: Sized + Hash + Eq + Copy {
        fn from_raw(id: u32, tree_id: u32) -> Self;
        fn raw(&self) -> u32;
        fn tree_id(&self) -> u32;
        fn arena(set: &MasterSet) -> &Vec<ItemData>;
    }
}

use private_traits::MasterHandlePrivate;

/// Handle to a master row or master column. Handles are `Copy`, cheap and
/// only valid for the tree that created them; passing one to a different
/// tree is a caller bug.
pub trait MasterHandle: MasterHandlePrivate + Debug {
    /// The handle's unique, fixed id within its tree and kind.
    fn id(&self) -> u32;
}

macro_rules! create_master_handle {
    ($t:ident, $arena:ident, $doc:literal) => {
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
        #[doc = $doc]
        pub struct $t {
            pub(crate) id: u32,
            pub(crate) tree_id: u32,
        }

        impl MasterHandlePrivate for $t {
            fn from_raw(id: u32, tree_id: u32) -> $t {
                $t { id, tree_id }
            }

            fn raw(&self) -> u32 {
                self.id
            }

            fn tree_id(&self) -> u32 {
                self.tree_id
            }

            fn arena(set: &MasterSet) -> &Vec<ItemData> {
                &set.$arena
            }
        }

        impl MasterHandle for $t {
            fn id(&self) -> u32 {
                self.id
            }
        }
    };
}

create_master_handle!(Row, rows,
    "A master row (constraint). Carries immutable default bounds; local \
     overrides live in subproblem patch lists.");
create_master_handle!(Col, cols,
    "A master column (variable). Carries immutable default bounds and \
     objective coefficient; local overrides live in subproblem patch \
     lists.");

/// A master row or column.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Item {
    Row(Row),
    Col(Col),
}

/// Decides whether a master item whose reference count reached zero should
/// be kept in the master set or deleted right away.
pub trait ItemFilter {
    /// Return `true` to keep the item, `false` to delete it.
    fn keep(&mut self, item: Item, link: u64) -> bool;
}

impl<F: FnMut(Item, u64) -> bool> ItemFilter for F {
    fn keep(&mut self, item: Item, link: u64) -> bool {
        self(item, link)
    }
}

/// Runs just before a master item is destroyed, so the embedding
/// application can release whatever it attached to the item.
pub trait ItemHook {
    fn on_delete(&mut self, item: Item, link: u64, name: Option<&str>);
}

impl<F: FnMut(Item, u64, Option<&str>)> ItemHook for F {
    fn on_delete(&mut self, item: Item, link: u64, name: Option<&str>) {
        self(item, link, name)
    }
}

/// Transient annotation used while computing the symmetric difference
/// between the LP mirror and a target subproblem, and while materialising
/// patch lists on demotion.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Mark {
    None,
    /// Present in the parent problem (demotion marker).
    Set,
    /// Bound in the mirror, not (so far) in the target subproblem.
    Stale,
    /// Bound in the mirror and present in the target subproblem.
    Keep,
    /// Absent from the mirror, present in the target subproblem.
    Fresh,
}

/// A tombstoned item awaiting the sweep.
const TOMBSTONE: i32 = -1;
/// An item that the sweep has physically reclaimed.
const SWEPT: i32 = i32::MIN;

#[derive(Debug)]
pub(crate) struct ItemData {
    name: Option<String>,
    bounds: Bounds,
    obj: f64,
    /// Head of this item's constraint-coefficient list.
    first: Option<u32>,
    /// Number of subproblem patch lists referencing this item; negative
    /// values mean the item is logically deleted.
    count: i32,
    /// Ordinal in the LP mirror, if the item is bound there.
    pub(crate) bind: Option<usize>,
    pub(crate) mark: Mark,
    link: u64,
}

impl ItemData {
    fn alive(&self) -> bool {
        self.count >= 0
    }
}

#[derive(Debug)]
struct CellData {
    row: u32,
    col: u32,
    val: f64,
    r_next: Option<u32>,
    c_next: Option<u32>,
}

/// The pool of master rows and columns plus the constraint matrix, stored
/// as index-linked arenas.
pub(crate) struct MasterSet {
    tree_id: u32,
    rows: Vec<ItemData>,
    cols: Vec<ItemData>,
    cells: Vec<CellData>,
    free_cells: Vec<u32>,
    /// Live and tombstoned row counts; swept slots are in neither.
    n_rows: usize,
    n_dead_rows: usize,
    n_cols: usize,
    n_dead_cols: usize,
    pub(crate) filter: Option<Box<dyn ItemFilter>>,
    pub(crate) hook: Option<Box<dyn ItemHook>>,
}

impl MasterSet {
    pub(crate) fn new(tree_id: u32) -> MasterSet {
        MasterSet {
            tree_id,
            rows: Vec::new(),
            cols: Vec::new(),
            cells: Vec::new(),
            free_cells: Vec::new(),
            n_rows: 0,
            n_dead_rows: 0,
            n_cols: 0,
            n_dead_cols: 0,
            filter: None,
            hook: None,
        }
    }

    pub(crate) fn num_live_rows(&self) -> usize {
        self.n_rows
    }

    pub(crate) fn num_live_cols(&self) -> usize {
        self.n_cols
    }

    /// Tombstones exceed a tenth of the master set.
    fn time_to_clean(&self) -> bool {
        let marked = self.n_dead_rows + self.n_dead_cols;
        marked > (self.n_rows + self.n_cols + marked) / 10
    }

    fn check<H: MasterHandle>(&self, h: &H, routine: &str) {
        if h.tree_id() != self.tree_id {
            panic!("{}: item {:?} belongs to a different tree", routine, h);
        }
        let data = &H::arena(self)[h.raw() as usize];
        if !data.alive() {
            panic!("{}: item {:?} has been deleted", routine, h);
        }
    }

    fn item_data(&self, item: Item) -> &ItemData {
        match item {
            Item::Row(r) => &self.rows[r.id as usize],
            Item::Col(c) => &self.cols[c.id as usize],
        }
    }

    fn item_data_mut(&mut self, item: Item) -> &mut ItemData {
        match item {
            Item::Row(r) => &mut self.rows[r.id as usize],
            Item::Col(c) => &mut self.cols[c.id as usize],
        }
    }

    fn check_name(name: &str, routine: &str) {
        if name.is_empty() || name.len() > 255 || name.chars().any(|c| c.is_control()) {
            panic!("{}: invalid name {:?}", routine, name);
        }
    }

    fn new_cell(&mut self, cell: CellData) -> u32 {
        if let Some(id) = self.free_cells.pop() {
            self.cells[id as usize] = cell;
            id
        } else {
            self.cells.push(cell);
            (self.cells.len() - 1) as u32
        }
    }

    /// Append a new master row. Every referenced column must be a live
    /// master column, coefficients must be non-zero and no column may
    /// appear twice.
    pub(crate) fn add_row(
        &mut self,
        name: Option<&str>,
        bounds: Bounds,
        obj: f64,
        coefs: &[(Col, f64)],
    ) -> Row {
        if self.time_to_clean() {
            self.clean();
        }
        if let Some(name) = name {
            Self::check_name(name, "add_master_row");
        }
        bounds.validate("add_master_row");
        let id = self.rows.len() as u32;
        self.rows.push(ItemData {
            name: name.map(str::to_owned),
            bounds,
            obj,
            first: None,
            count: 0,
            bind: None,
            mark: Mark::None,
            link: 0,
        });
        self.n_rows += 1;
        for &(col, val) in coefs {
            self.check(&col, "add_master_row");
            if val == 0.0 {
                panic!("add_master_row: zero coefficient at column {:?} not allowed", col);
            }
            let cell = CellData {
                row: id,
                col: col.id,
                val,
                r_next: self.rows[id as usize].first,
                c_next: self.cols[col.id as usize].first,
            };
            // a duplicate within this call would be the current head of
            // the column's list
            if let Some(head) = cell.c_next {
                if self.cells[head as usize].row == id {
                    panic!("add_master_row: duplicate column {:?} not allowed", col);
                }
            }
            let cid = self.new_cell(cell);
            self.rows[id as usize].first = Some(cid);
            self.cols[col.id as usize].first = Some(cid);
        }
        Row::from_raw(id, self.tree_id)
    }

    /// Append a new master column; symmetric to
    /// [`add_row`](MasterSet::add_row).
    pub(crate) fn add_col(
        &mut self,
        name: Option<&str>,
        bounds: Bounds,
        obj: f64,
        coefs: &[(Row, f64)],
    ) -> Col {
        if self.time_to_clean() {
            self.clean();
        }
        if let Some(name) = name {
            Self::check_name(name, "add_master_col");
        }
        bounds.validate("add_master_col");
        let id = self.cols.len() as u32;
        self.cols.push(ItemData {
            name: name.map(str::to_owned),
            bounds,
            obj,
            first: None,
            count: 0,
            bind: None,
            mark: Mark::None,
            link: 0,
        });
        self.n_cols += 1;
        for &(row, val) in coefs {
            self.check(&row, "add_master_col");
            if val == 0.0 {
                panic!("add_master_col: zero coefficient at row {:?} not allowed", row);
            }
            let cell = CellData {
                row: row.id,
                col: id,
                val,
                r_next: self.rows[row.id as usize].first,
                c_next: self.cols[id as usize].first,
            };
            if let Some(head) = cell.r_next {
                if self.cells[head as usize].col == id {
                    panic!("add_master_col: duplicate row {:?} not allowed", row);
                }
            }
            let cid = self.new_cell(cell);
            self.rows[row.id as usize].first = Some(cid);
            self.cols[id as usize].first = Some(cid);
        }
        Col::from_raw(id, self.tree_id)
    }

    fn next_live<H: MasterHandle>(&self, prev: Option<H>, routine: &str) -> Option<H> {
        let start = match prev {
            None => 0,
            Some(h) => {
                self.check(&h, routine);
                h.raw() as usize + 1
            }
        };
        let arena = H::arena(self);
        (start..arena.len())
            .find(|&id| arena[id].alive())
            .map(|id| H::from_raw(id as u32, self.tree_id))
    }

    /// The chronologically next live master row, or the first if `prev` is
    /// `None`.
    pub(crate) fn next_row(&self, prev: Option<Row>) -> Option<Row> {
        self.next_live(prev, "next_master_row")
    }

    /// The chronologically next live master column.
    pub(crate) fn next_col(&self, prev: Option<Col>) -> Option<Col> {
        self.next_live(prev, "next_master_col")
    }

    pub(crate) fn set_link(&mut self, item: Item, link: u64) {
        let data = self.item_data_mut(item);
        if !data.alive() {
            panic!("set_item_link: item {:?} has been deleted", item);
        }
        data.link = link;
    }

    pub(crate) fn link(&self, item: Item) -> u64 {
        let data = self.item_data(item);
        if !data.alive() {
            panic!("get_item_link: item {:?} has been deleted", item);
        }
        data.link
    }

    pub(crate) fn bounds(&self, item: Item) -> Bounds {
        self.item_data(item).bounds
    }

    pub(crate) fn obj(&self, item: Item) -> f64 {
        self.item_data(item).obj
    }

    pub(crate) fn name_of(&self, item: Item) -> Option<&str> {
        self.item_data(item).name.as_deref()
    }

    pub(crate) fn bind(&self, item: Item) -> Option<usize> {
        self.item_data(item).bind
    }

    pub(crate) fn set_bind(&mut self, item: Item, bind: Option<usize>) {
        self.item_data_mut(item).bind = bind;
    }

    pub(crate) fn mark(&self, item: Item) -> Mark {
        self.item_data(item).mark
    }

    pub(crate) fn set_mark(&mut self, item: Item, mark: Mark) {
        self.item_data_mut(item).mark = mark;
    }

    pub(crate) fn count(&self, item: Item) -> i32 {
        self.item_data(item).count
    }

    pub(crate) fn inc_count(&mut self, item: Item) {
        let data = self.item_data_mut(item);
        debug_assert!(data.count >= 0);
        data.count += 1;
    }

    pub(crate) fn dec_count(&mut self, item: Item) {
        let data = self.item_data_mut(item);
        debug_assert!(data.count > 0);
        data.count -= 1;
    }

    pub(crate) fn check_row(&self, row: Row, routine: &str) {
        self.check(&row, routine);
    }

    pub(crate) fn check_col(&self, col: Col, routine: &str) {
        self.check(&col, routine);
    }

    /// Run the item filter for an item whose reference count reached zero.
    /// Without an installed filter every such item is deleted.
    pub(crate) fn filter_keeps(&mut self, item: Item) -> bool {
        let link = self.item_data(item).link;
        match self.filter.as_mut() {
            Some(f) => f.keep(item, link),
            None => false,
        }
    }

    /// Delete a master item: run the hook, unbind, drop the name and
    /// tombstone the slot. Returns the mirror ordinal the item was bound
    /// to, if any. Fails with [`Error::InUse`] while the item is still
    /// referenced by patch lists, or bound while a current subproblem
    /// exists.
    pub(crate) fn del_item(&mut self, item: Item, current_exists: bool) -> Result<Option<usize>> {
        {
            let data = self.item_data(item);
            if !data.alive() {
                panic!("del_master_item: item {:?} has been deleted", item);
            }
            if data.count > 0 || (current_exists && data.bind.is_some()) {
                return Err(Error::InUse);
            }
        }
        // hook runs while the item is still intact
        {
            let data = match item {
                Item::Row(r) => &self.rows[r.id as usize],
                Item::Col(c) => &self.cols[c.id as usize],
            };
            let link = data.link;
            let name = data.name.clone();
            if let Some(hook) = self.hook.as_mut() {
                hook.on_delete(item, link, name.as_deref());
            }
        }
        let data = self.item_data_mut(item);
        let old_bind = data.bind.take();
        data.name = None;
        data.count = TOMBSTONE;
        match item {
            Item::Row(_) => {
                self.n_rows -= 1;
                self.n_dead_rows += 1;
            }
            Item::Col(_) => {
                self.n_cols -= 1;
                self.n_dead_cols += 1;
            }
        }
        if self.time_to_clean() {
            self.clean();
        }
        Ok(old_bind)
    }

    /// Sweep: physically reclaim every tombstoned item together with all
    /// constraint coefficients incident to it, then rebuild the column
    /// incidence lists from the surviving rows.
    pub(crate) fn clean(&mut self) {
        // rows: free tombstoned rows outright, strip cells that sit in
        // tombstoned columns from surviving rows
        for id in 0..self.rows.len() {
            if self.rows[id].count == SWEPT {
                continue;
            }
            if self.rows[id].count == TOMBSTONE {
                let mut cur = self.rows[id].first.take();
                while let Some(cid) = cur {
                    cur = self.cells[cid as usize].r_next;
                    self.free_cells.push(cid);
                }
                debug_assert!(self.rows[id].name.is_none());
                self.rows[id].count = SWEPT;
            } else {
                let mut kept = None;
                let mut cur = self.rows[id].first.take();
                while let Some(cid) = cur {
                    cur = self.cells[cid as usize].r_next;
                    let col = self.cells[cid as usize].col as usize;
                    if self.cols[col].count < 0 {
                        self.free_cells.push(cid);
                    } else {
                        self.cells[cid as usize].r_next = kept;
                        kept = Some(cid);
                    }
                }
                self.rows[id].first = kept;
            }
        }
        self.n_dead_rows = 0;
        // columns: free tombstoned ones, reset survivors' lists
        for data in self.cols.iter_mut() {
            if data.count == SWEPT {
                continue;
            }
            if data.count == TOMBSTONE {
                debug_assert!(data.name.is_none());
                data.count = SWEPT;
            }
            data.first = None;
        }
        self.n_dead_cols = 0;
        // rebuild column lists from the surviving rows
        for id in 0..self.rows.len() {
            if self.rows[id].count < 0 {
                continue;
            }
            let mut cur = self.rows[id].first;
            while let Some(cid) = cur {
                cur = self.cells[cid as usize].r_next;
                let col = self.cells[cid as usize].col as usize;
                debug_assert!(self.cols[col].count >= 0);
                self.cells[cid as usize].c_next = self.cols[col].first;
                self.cols[col].first = Some(cid);
            }
        }
    }

    /// The non-zero coefficients of a master row, as `(column, value)`
    /// pairs.
    pub(crate) fn row_cells(&self, row: Row) -> Vec<(Col, f64)> {
        let mut out = Vec::new();
        let mut cur = self.rows[row.id as usize].first;
        while let Some(cid) = cur {
            let cell = &self.cells[cid as usize];
            out.push((Col::from_raw(cell.col, self.tree_id), cell.val));
            cur = cell.r_next;
        }
        out
    }

    /// The non-zero coefficients of a master column, as `(row, value)`
    /// pairs.
    pub(crate) fn col_cells(&self, col: Col) -> Vec<(Row, f64)> {
        let mut out = Vec::new();
        let mut cur = self.cols[col.id as usize].first;
        while let Some(cid) = cur {
            let cell = &self.cells[cid as usize];
            out.push((Row::from_raw(cell.row, self.tree_id), cell.val));
            cur = cell.c_next;
        }
        out
    }

    /// Tombstones awaiting the sweep, for invariant checks.
    pub(crate) fn tombstones(&self) -> usize {
        self.n_dead_rows + self.n_dead_cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set() -> MasterSet {
        MasterSet::new(0)
    }

    #[test]
    fn add_and_iterate() {
        let mut ms = set();
        let x = ms.add_col(Some("x"), Bounds::Double(0.0, 1.0), 3.0, &[]);
        let y = ms.add_col(Some("y"), Bounds::Double(0.0, 1.0), 5.0, &[]);
        let r = ms.add_row(Some("cap"), Bounds::Upper(7.0), 0.0, &[(x, 2.0), (y, 4.0)]);
        assert_eq!(ms.next_col(None), Some(x));
        assert_eq!(ms.next_col(Some(x)), Some(y));
        assert_eq!(ms.next_col(Some(y)), None);
        assert_eq!(ms.next_row(None), Some(r));
        let mut cells = ms.row_cells(r);
        cells.sort_by_key(|(c, _)| c.id());
        assert_eq!(cells, vec![(x, 2.0), (y, 4.0)]);
        assert_eq!(ms.col_cells(x), vec![(r, 2.0)]);
    }

    #[test]
    #[should_panic(expected = "duplicate column")]
    fn duplicate_coefficient() {
        let mut ms = set();
        let x = ms.add_col(None, Bounds::Lower(0.0), 1.0, &[]);
        ms.add_row(None, Bounds::Upper(1.0), 0.0, &[(x, 1.0), (x, 2.0)]);
    }

    #[test]
    fn delete_requires_zero_count() {
        let mut ms = set();
        let x = ms.add_col(None, Bounds::Lower(0.0), 1.0, &[]);
        ms.inc_count(Item::Col(x));
        assert_eq!(ms.del_item(Item::Col(x), false), Err(Error::InUse));
        ms.dec_count(Item::Col(x));
        assert_eq!(ms.del_item(Item::Col(x), false), Ok(None));
        assert_eq!(ms.next_col(None), None);
    }

    #[test]
    fn delete_releases_name() {
        let mut ms = set();
        let x = ms.add_col(Some("x"), Bounds::Lower(0.0), 1.0, &[]);
        ms.del_item(Item::Col(x), false).unwrap();
        assert!(ms.rows.is_empty());
        assert!(ms.cols[x.id as usize].name.is_none());
    }

    #[test]
    fn clean_reclaims_incident_cells() {
        let mut ms = set();
        let x = ms.add_col(None, Bounds::Lower(0.0), 1.0, &[]);
        let y = ms.add_col(None, Bounds::Lower(0.0), 1.0, &[]);
        let r = ms.add_row(None, Bounds::Upper(4.0), 0.0, &[(x, 1.0), (y, 1.0)]);
        ms.del_item(Item::Col(y), false).unwrap();
        ms.clean();
        assert_eq!(ms.row_cells(r), vec![(x, 1.0)]);
        assert_eq!(ms.col_cells(x), vec![(r, 1.0)]);
        assert_eq!(ms.tombstones(), 0);
    }

    #[test]
    fn hook_fires_before_destruction() {
        let mut ms = set();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = seen.clone();
        ms.hook = Some(Box::new(move |item: Item, link: u64, name: Option<&str>| {
            log.borrow_mut().push((item, link, name.map(str::to_owned)));
        }));
        let x = ms.add_col(Some("x"), Bounds::Lower(0.0), 1.0, &[]);
        ms.set_link(Item::Col(x), 42);
        ms.del_item(Item::Col(x), false).unwrap();
        assert_eq!(&*seen.borrow(), &[(Item::Col(x), 42, Some("x".to_owned()))]);
    }

    #[derive(Debug, Clone)]
    enum Action {
        AddCol,
        AddRow(Vec<u8>),
        DelCol(u8),
        DelRow(u8),
        Clean,
    }

    fn action_strat(num: usize) -> impl Strategy<Value = Vec<Action>> {
        let s = prop_oneof![
            Just(Action::AddCol),
            proptest::collection::vec(any::<u8>(), 0..4).prop_map(Action::AddRow),
            any::<u8>().prop_map(Action::DelCol),
            any::<u8>().prop_map(Action::DelRow),
            Just(Action::Clean),
        ];
        proptest::collection::vec(s, ..num)
    }

    fn state_machine(actions: Vec<Action>) {
        let mut ms = set();
        let mut live_rows: Vec<Row> = Vec::new();
        let mut live_cols: Vec<Col> = Vec::new();
        for a in actions {
            match a {
                Action::AddCol => {
                    live_cols.push(ms.add_col(None, Bounds::Lower(0.0), 1.0, &[]));
                }
                Action::AddRow(refs) => {
                    let mut coefs: Vec<(Col, f64)> = Vec::new();
                    for r in refs {
                        if live_cols.is_empty() {
                            continue;
                        }
                        let c = live_cols[r as usize % live_cols.len()];
                        if !coefs.iter().any(|&(cc, _)| cc == c) {
                            coefs.push((c, 1.0));
                        }
                    }
                    live_rows.push(ms.add_row(None, Bounds::Upper(1.0), 0.0, &coefs));
                }
                Action::DelCol(i) => {
                    if !live_cols.is_empty() {
                        let c = live_cols.remove(i as usize % live_cols.len());
                        ms.del_item(Item::Col(c), false).unwrap();
                    }
                }
                Action::DelRow(i) => {
                    if !live_rows.is_empty() {
                        let r = live_rows.remove(i as usize % live_rows.len());
                        ms.del_item(Item::Row(r), false).unwrap();
                    }
                }
                Action::Clean => ms.clean(),
            }
            // the sweep keeps tombstones at or below a tenth of the set
            let alive = ms.num_live_rows() + ms.num_live_cols();
            assert!(ms.tombstones() <= (alive + ms.tombstones()) / 10);
            // iteration sees exactly the live items, in creation order
            let mut seen = Vec::new();
            let mut cur = ms.next_col(None);
            while let Some(c) = cur {
                seen.push(c);
                cur = ms.next_col(Some(c));
            }
            assert_eq!(seen, live_cols);
            let mut seen = Vec::new();
            let mut cur = ms.next_row(None);
            while let Some(r) = cur {
                seen.push(r);
                cur = ms.next_row(Some(r));
            }
            assert_eq!(seen, live_rows);
        }
    }

    proptest! {
        #[test]
        fn fuzz(actions in action_strat(60)) {
            state_machine(actions);
        }
    }

    #[test]
    fn regressions() {
        use Action::*;
        state_machine(vec![AddCol, AddRow(vec![0, 1]), DelRow(0), Clean, AddCol]);
        state_machine(vec![AddCol, AddCol, DelCol(0), AddRow(vec![0]), DelCol(0)]);
    }
}
