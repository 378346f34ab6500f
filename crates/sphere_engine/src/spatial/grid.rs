//! Uniform grid spatial partitioning
//!
//! Divides the square domain `[-half_span, half_span]` into `partitions`
//! cells per axis, stored row-major (`y * partitions + x`). Each cell owns a
//! list of [`BodyRef`]s; each body's cell and slot are recorded in per-body
//! tables so removal is a swap-remove plus one slot patch.
//!
//! Cells sit behind their own [`RwLock`] so that relocation can run from many
//! threads at once. A relocation takes the write locks of the source and
//! destination cells in ascending cell order, which keeps two relocations
//! between the same pair of cells from deadlocking.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::bodies::{BodyKind, BodyRef, BodyRegistry};
use crate::core::BoundaryMode;
use crate::foundation::math::Vec2;

const UNASSIGNED: usize = usize::MAX;

/// Neighbour offsets in scan order
const NEIGHBOUR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Flat index of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub usize);

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broken grid invariants found by [`UniformGrid::verify`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Body is not a member of any cell
    #[error("{body} is not a member of any cell")]
    Orphaned {
        /// Offending body
        body: BodyRef,
    },
    /// Body lives in a cell other than the one its position maps to
    #[error("{body} lives in cell {actual} but its position maps to cell {expected}")]
    WrongCell {
        /// Offending body
        body: BodyRef,
        /// Cell holding the body
        actual: CellId,
        /// Cell its position maps to
        expected: CellId,
    },
    /// Recorded slot does not point back at the body
    #[error("{body} records slot {slot} in cell {cell} but that slot holds {found:?}")]
    SlotMismatch {
        /// Offending body
        body: BodyRef,
        /// Recorded cell
        cell: CellId,
        /// Recorded slot
        slot: usize,
        /// What the slot actually holds
        found: Option<BodyRef>,
    },
    /// Total cell membership differs from the registry population
    #[error("grid tracks {tracked} bodies, registry holds {registered}")]
    CountMismatch {
        /// Sum of all cell lengths
        tracked: usize,
        /// Registry population
        registered: usize,
    },
}

/// Geometry of the grid: pure cell arithmetic, no membership
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    partitions: usize,
    half_span: f32,
    cell_size: f32,
    boundary: BoundaryMode,
}

impl GridLayout {
    /// Layout covering `[-half_span, half_span]` with `partitions` cells per axis
    ///
    /// A zero partition count is treated as one.
    pub fn new(partitions: usize, half_span: f32, boundary: BoundaryMode) -> Self {
        let partitions = partitions.max(1);
        Self {
            partitions,
            half_span,
            cell_size: half_span * 2.0 / partitions as f32,
            boundary,
        }
    }

    /// Cells per axis
    pub const fn partitions(&self) -> usize {
        self.partitions
    }

    /// Total number of cells
    pub const fn cell_count(&self) -> usize {
        self.partitions * self.partitions
    }

    /// Width of one cell
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Half-extent of the covered square
    pub const fn half_span(&self) -> f32 {
        self.half_span
    }

    /// Out-of-range handling
    pub const fn boundary(&self) -> BoundaryMode {
        self.boundary
    }

    /// Map a position to its cell
    ///
    /// Out-of-range coordinates are clamped to the edge cell (or wrapped,
    /// depending on the boundary mode). Never fails.
    pub fn cell_index_of(&self, position: &Vec2) -> CellId {
        let x = self.axis_index(position.x);
        let y = self.axis_index(position.y);
        CellId(y * self.partitions + x)
    }

    /// Column and row of a cell
    pub const fn coordinates(&self, cell: CellId) -> (usize, usize) {
        (cell.0 % self.partitions, cell.0 / self.partitions)
    }

    /// Cells adjacent to `cell`, up to eight, in a fixed scan order
    ///
    /// Clamped grids skip offsets that fall off the edge. Wrapping grids wrap
    /// around instead; on grids narrower than three cells a wrapped offset can
    /// land back on `cell` and is skipped.
    pub fn neighbours(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        let (x, y) = self.coordinates(cell);
        let n = self.partitions as isize;
        NEIGHBOUR_OFFSETS.iter().filter_map(move |&(dx, dy)| {
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            let (nx, ny) = match self.boundary {
                BoundaryMode::Clamp => {
                    if nx < 0 || ny < 0 || nx >= n || ny >= n {
                        return None;
                    }
                    (nx, ny)
                }
                BoundaryMode::Wrap => (nx.rem_euclid(n), ny.rem_euclid(n)),
            };
            let id = CellId(ny as usize * self.partitions + nx as usize);
            (id != cell).then_some(id)
        })
    }

    fn axis_index(&self, coord: f32) -> usize {
        let raw = ((coord + self.half_span) / self.cell_size).floor();
        let last = self.partitions - 1;
        match self.boundary {
            BoundaryMode::Clamp => {
                if raw.is_nan() || raw <= 0.0 {
                    0
                } else {
                    (raw as usize).min(last)
                }
            }
            BoundaryMode::Wrap => {
                if !raw.is_finite() {
                    return if raw > 0.0 { last } else { 0 };
                }
                (raw as i64).rem_euclid(self.partitions as i64) as usize
            }
        }
    }
}

#[derive(Debug, Default)]
struct Cell {
    members: Vec<BodyRef>,
    dirty: bool,
}

#[derive(Debug)]
struct Membership {
    cell: AtomicUsize,
    slot: AtomicUsize,
}

impl Membership {
    const fn unassigned() -> Self {
        Self {
            cell: AtomicUsize::new(UNASSIGNED),
            slot: AtomicUsize::new(UNASSIGNED),
        }
    }

    // Writers hold the write lock of the cell named here, so relaxed loads
    // and stores are ordered by the lock.
    fn get(&self) -> Option<(CellId, usize)> {
        let cell = self.cell.load(Ordering::Relaxed);
        (cell != UNASSIGNED).then(|| (CellId(cell), self.slot.load(Ordering::Relaxed)))
    }

    fn set(&self, cell: CellId, slot: usize) {
        self.cell.store(cell.0, Ordering::Relaxed);
        self.slot.store(slot, Ordering::Relaxed);
    }

    fn set_slot(&self, slot: usize) {
        self.slot.store(slot, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.set(CellId(UNASSIGNED), UNASSIGNED);
    }
}

/// Read access to one cell's members
///
/// Holds the cell's read lock; drop it before relocating anything.
pub struct CellMembers<'a> {
    guard: RwLockReadGuard<'a, Cell>,
}

impl Deref for CellMembers<'_> {
    type Target = [BodyRef];

    fn deref(&self) -> &[BodyRef] {
        &self.guard.members
    }
}

/// Uniform grid with per-cell locking
#[derive(Debug)]
pub struct UniformGrid {
    layout: GridLayout,
    cells: Vec<RwLock<Cell>>,
    moving: Vec<Membership>,
    blocking: Vec<Membership>,
}

impl UniformGrid {
    /// Empty grid able to track the given number of bodies of each kind
    pub fn new(layout: GridLayout, moving: usize, blocking: usize) -> Self {
        Self {
            cells: (0..layout.cell_count()).map(|_| RwLock::new(Cell::default())).collect(),
            moving: (0..moving).map(|_| Membership::unassigned()).collect(),
            blocking: (0..blocking).map(|_| Membership::unassigned()).collect(),
            layout,
        }
    }

    /// Grid sized for `registry` with every body already inserted
    pub fn populated(layout: GridLayout, registry: &BodyRegistry) -> Self {
        let mut grid = Self::new(
            layout,
            registry.len_of(BodyKind::Moving),
            registry.len_of(BodyKind::Blocking),
        );
        for body in registry.handles() {
            grid.insert(body, &registry.body(body).position);
        }
        grid.settle();
        grid
    }

    /// Geometry
    pub const fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Map a position to its cell
    pub fn cell_index_of(&self, position: &Vec2) -> CellId {
        self.layout.cell_index_of(position)
    }

    /// Adjacent cells in scan order
    pub fn neighbours(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.layout.neighbours(cell)
    }

    /// Number of cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Current cell and slot of `body`, if it is a member
    pub fn membership(&self, body: BodyRef) -> Option<(CellId, usize)> {
        self.membership_of(body).and_then(Membership::get)
    }

    /// Members of one cell
    ///
    /// # Panics
    /// If `cell` is out of range.
    pub fn query_cell(&self, cell: CellId) -> CellMembers<'_> {
        CellMembers {
            guard: read(&self.cells[cell.0]),
        }
    }

    /// Members of the cell containing `position`
    pub fn query_position(&self, position: &Vec2) -> CellMembers<'_> {
        self.query_cell(self.cell_index_of(position))
    }

    /// Add `body` to the cell containing `position`
    ///
    /// A body that is already a member is relocated instead. Handles outside
    /// the grid's tracking tables are ignored and `None` is returned.
    pub fn insert(&self, body: BodyRef, position: &Vec2) -> Option<CellId> {
        let membership = self.membership_of(body)?;
        if membership.get().is_some() {
            self.relocate(body, position);
            return membership.get().map(|(cell, _)| cell);
        }
        let cell = self.cell_index_of(position);
        let mut guard = write(&self.cells[cell.0]);
        push_member(&mut guard, membership, body, cell);
        Some(cell)
    }

    /// Take `body` out of its cell
    ///
    /// The last member of the cell moves into the vacated slot and has its
    /// slot patched. Returns the cell the body was in.
    pub fn remove(&self, body: BodyRef) -> Option<CellId> {
        let (cell, _) = self.membership(body)?;
        let mut guard = write(&self.cells[cell.0]);
        self.swap_remove(&mut guard, body);
        Some(cell)
    }

    /// Move `body` to the cell containing `position` if it changed cell
    ///
    /// Returns `true` when the body changed cell. Atomic with respect to
    /// every other grid operation on the two cells involved.
    pub fn relocate(&self, body: BodyRef, position: &Vec2) -> bool {
        let Some(membership) = self.membership_of(body) else {
            return false;
        };
        let to = self.cell_index_of(position);
        let Some((from, _)) = membership.get() else {
            let mut guard = write(&self.cells[to.0]);
            push_member(&mut guard, membership, body, to);
            return true;
        };
        if from == to {
            return false;
        }

        let (low, high) = if from < to { (from, to) } else { (to, from) };
        let mut low_guard = write(&self.cells[low.0]);
        let mut high_guard = write(&self.cells[high.0]);
        let (source, destination) = if from < to {
            (&mut low_guard, &mut high_guard)
        } else {
            (&mut high_guard, &mut low_guard)
        };
        self.swap_remove(source, body);
        push_member(destination, membership, body, to);
        true
    }

    /// Restore canonical member order in every cell touched since the last settle
    ///
    /// Members are sorted by handle and their slots repatched, so the order
    /// of a cell never depends on which thread relocated into it first.
    /// Returns the number of cells re-sorted.
    pub fn settle(&mut self) -> usize {
        let mut settled = 0;
        for (index, lock) in self.cells.iter_mut().enumerate() {
            let cell = lock.get_mut().unwrap_or_else(PoisonError::into_inner);
            if !cell.dirty {
                continue;
            }
            cell.members.sort_unstable();
            for (slot, &body) in cell.members.iter().enumerate() {
                let table = match body.kind {
                    BodyKind::Moving => &self.moving,
                    BodyKind::Blocking => &self.blocking,
                };
                if let Some(membership) = table.get(body.slot) {
                    membership.set(CellId(index), slot);
                }
            }
            cell.dirty = false;
            settled += 1;
        }
        settled
    }

    /// Total membership over all cells
    pub fn len(&self) -> usize {
        self.cells.iter().map(|cell| read(cell).members.len()).sum()
    }

    /// No cell has members
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check every body against its cell
    ///
    /// Each body must be in exactly the cell its position maps to, at the
    /// slot it records. Only meaningful between frames.
    pub fn verify(&self, registry: &BodyRegistry) -> Result<(), GridError> {
        let tracked = self.len();
        if tracked != registry.len() {
            return Err(GridError::CountMismatch {
                tracked,
                registered: registry.len(),
            });
        }
        for body in registry.handles() {
            let Some((cell, slot)) = self.membership(body) else {
                return Err(GridError::Orphaned { body });
            };
            let expected = self.cell_index_of(&registry.body(body).position);
            if cell != expected {
                return Err(GridError::WrongCell {
                    body,
                    actual: cell,
                    expected,
                });
            }
            let found = read(&self.cells[cell.0]).members.get(slot).copied();
            if found != Some(body) {
                return Err(GridError::SlotMismatch { body, cell, slot, found });
            }
        }
        Ok(())
    }

    fn membership_of(&self, body: BodyRef) -> Option<&Membership> {
        match body.kind {
            BodyKind::Moving => self.moving.get(body.slot),
            BodyKind::Blocking => self.blocking.get(body.slot),
        }
    }

    // Caller holds the write lock of the body's current cell.
    fn swap_remove(&self, cell: &mut Cell, body: BodyRef) {
        let Some(membership) = self.membership_of(body) else {
            return;
        };
        let Some((_, slot)) = membership.get() else {
            return;
        };
        if cell.members.get(slot) != Some(&body) {
            return;
        }
        cell.members.swap_remove(slot);
        if let Some(&moved) = cell.members.get(slot) {
            if let Some(moved_membership) = self.membership_of(moved) {
                moved_membership.set_slot(slot);
            }
        }
        cell.dirty = true;
        membership.clear();
    }
}

fn push_member(cell: &mut Cell, membership: &Membership, body: BodyRef, id: CellId) {
    cell.members.push(body);
    membership.set(id, cell.members.len() - 1);
    cell.dirty = true;
}

fn read(lock: &RwLock<Cell>) -> RwLockReadGuard<'_, Cell> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(lock: &RwLock<Cell>) -> RwLockWriteGuard<'_, Cell> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
