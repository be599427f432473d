//! Guarded grid storage.
//!
//! A [`Grid`] is one contiguous allocation holding a logical `W x H x D` box
//! of cells plus a guard margin around it. Stencil passes read neighbors at
//! fixed offset deltas and can therefore never step outside the allocation,
//! even for cells on the logical edge.
//!
//! ```text
//!   guard  logical region      guard
//!   +---+---------------------+---+
//!   | g |  (0,0) ... (W-1,0)  | g |
//!   | g |        ...          | g |
//!   | g | (0,H-1) .. (W-1,H-1)| g |
//!   +---+---------------------+---+
//! ```
//!
//! Planar grids (`depth == 1`) carry no guard along z.

use crate::error::{Result, WavesError};
use crate::partition::partition;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};

/// Logical width and height must be multiples of this block size.
pub const BLOCK_SIZE: usize = 16;

/// Guard thickness used by [`GridShape::new`] and [`GridShape::planar`].
pub const DEFAULT_GUARD: usize = 1;

/// Logical extents and guard thickness of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    /// Logical cells along x.
    pub width: usize,
    /// Logical cells along y.
    pub height: usize,
    /// Logical cells along z (1 for planar grids).
    pub depth: usize,
    /// Guard cells on each side of every stencil axis.
    pub guard: usize,
}

impl GridShape {
    /// A 3D shape with the default guard.
    pub const fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
            guard: DEFAULT_GUARD,
        }
    }

    /// A planar (2D) shape with the default guard.
    pub const fn planar(width: usize, height: usize) -> Self {
        Self::new(width, height, 1)
    }

    /// Replace the guard thickness.
    pub const fn with_guard(mut self, guard: usize) -> Self {
        self.guard = guard;
        self
    }

    /// True when the grid has a single z layer.
    #[inline]
    pub const fn is_planar(&self) -> bool {
        self.depth == 1
    }

    /// Number of stencil axes (2 or 3).
    pub const fn dimensions(&self) -> usize {
        if self.is_planar() {
            2
        } else {
            3
        }
    }

    /// Guard thickness along z (zero for planar grids).
    #[inline]
    pub const fn guard_z(&self) -> usize {
        if self.is_planar() {
            0
        } else {
            self.guard
        }
    }

    /// Number of logical cells.
    pub const fn cell_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Check the extents against the block-size rules.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(WavesError::invalid_shape(format!(
                "extents must be positive, got {}x{}x{}",
                self.width, self.height, self.depth
            )));
        }
        if self.width % BLOCK_SIZE != 0 || self.height % BLOCK_SIZE != 0 {
            return Err(WavesError::invalid_shape(format!(
                "width and height must be multiples of {BLOCK_SIZE}, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.is_planar() && self.depth % BLOCK_SIZE != 0 {
            return Err(WavesError::invalid_shape(format!(
                "depth must be 1 or a multiple of {BLOCK_SIZE}, got {}",
                self.depth
            )));
        }
        let guard2 = self.guard.checked_mul(2);
        let allocated = guard2
            .and_then(|g| (self.width + g).checked_mul(self.height + g))
            .and_then(|plane| plane.checked_mul(self.depth + 2 * self.guard_z()));
        if allocated.is_none() {
            return Err(WavesError::invalid_shape("allocation size overflows usize"));
        }
        Ok(())
    }
}

impl std::fmt::Display for GridShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_planar() {
            write!(f, "{}x{}", self.width, self.height)
        } else {
            write!(f, "{}x{}x{}", self.width, self.height, self.depth)
        }
    }
}

/// Storage strides in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strides {
    /// Step between neighbors along x (always 1).
    pub x: usize,
    /// Step between neighbors along y (allocated width).
    pub y: usize,
    /// Step between neighbors along z (allocated plane size).
    pub z: usize,
}

impl Strides {
    /// Signed offset delta for a neighbor displacement.
    #[inline]
    pub fn delta(&self, dx: isize, dy: isize, dz: isize) -> isize {
        dx * self.x as isize + dy * self.y as isize + dz * self.z as isize
    }
}

/// One logical row of a grid: `width` consecutive cells starting at
/// `offset`, which is the storage offset of logical `(0, y, z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    /// Storage offset of the first logical cell of the row.
    pub offset: usize,
    /// Logical y coordinate.
    pub y: usize,
    /// Logical z coordinate.
    pub z: usize,
}

/// The coordinate-to-offset mapping of a grid, detached from its storage.
///
/// Cheap to copy; two grids of the same shape share the same layout, which is
/// what lets a pass read one generation and write another at equal offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    shape: GridShape,
    strides: Strides,
    len: usize,
}

impl Layout {
    fn new(shape: GridShape) -> Self {
        let alloc_width = shape.width + 2 * shape.guard;
        let alloc_height = shape.height + 2 * shape.guard;
        let alloc_depth = shape.depth + 2 * shape.guard_z();
        let strides = Strides {
            x: 1,
            y: alloc_width,
            z: alloc_width * alloc_height,
        };
        Self {
            shape,
            strides,
            len: strides.z * alloc_depth,
        }
    }

    /// Logical shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Storage strides.
    #[inline]
    pub fn strides(&self) -> Strides {
        self.strides
    }

    /// Total number of storage slots, guards included.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no storage is allocated (never for a validated shape).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `(x, y, z)` lies inside the guarded range.
    pub fn contains(&self, x: isize, y: isize, z: isize) -> bool {
        let g = self.shape.guard as isize;
        let gz = self.shape.guard_z() as isize;
        (-g..self.shape.width as isize + g).contains(&x)
            && (-g..self.shape.height as isize + g).contains(&y)
            && (-gz..self.shape.depth as isize + gz).contains(&z)
    }

    /// Storage offset of a guarded coordinate.
    ///
    /// Valid inputs are `[-guard, extent + guard)` per axis. Anything else is
    /// a programming error, caught by a debug assertion.
    #[inline(always)]
    pub fn offset_for(&self, x: isize, y: isize, z: isize) -> usize {
        debug_assert!(
            self.contains(x, y, z),
            "({x}, {y}, {z}) outside guarded {} grid",
            self.shape
        );
        let g = self.shape.guard as isize;
        let gz = self.shape.guard_z() as isize;
        (z + gz) as usize * self.strides.z + (y + g) as usize * self.strides.y + (x + g) as usize
    }

    /// Storage offset of logical `(0, y, z)`.
    #[inline]
    pub fn row_offset(&self, y: usize, z: usize) -> usize {
        (z + self.shape.guard_z()) * self.strides.z
            + (y + self.shape.guard) * self.strides.y
            + self.shape.guard
    }

    /// Extent of the axis passes are split along: z for volumes, y for
    /// planar grids.
    #[inline]
    pub fn outer_extent(&self) -> usize {
        if self.shape.is_planar() {
            self.shape.height
        } else {
            self.shape.depth
        }
    }

    /// Storage range covered by a range of outer-axis indices, including the
    /// guard cells that sit inside those rows/planes.
    pub fn outer_offsets(&self, outer: Range<usize>) -> Range<usize> {
        let (origin, stride) = if self.shape.is_planar() {
            (self.shape.guard * self.strides.y, self.strides.y)
        } else {
            (self.shape.guard_z() * self.strides.z, self.strides.z)
        };
        origin + outer.start * stride..origin + outer.end * stride
    }

    /// Logical rows inside a range of outer-axis indices, in storage order.
    pub fn rows(self, outer: Range<usize>) -> impl Iterator<Item = Row> {
        let planar = self.shape.is_planar();
        let inner = if planar { 1 } else { self.shape.height };
        outer.flat_map(move |o| {
            (0..inner).map(move |i| {
                let (y, z) = if planar { (o, 0) } else { (i, o) };
                Row {
                    offset: self.row_offset(y, z),
                    y,
                    z,
                }
            })
        })
    }
}

/// Fixed-size 2D/3D storage with guard cells.
///
/// The mapping from coordinates to offsets is fixed for the grid's lifetime:
///
/// ```text
/// offset(x, y, z) = ((z + gz) * alloc_height + (y + g)) * alloc_width + (x + g)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    layout: Layout,
    data: Vec<T>,
}

impl<T: Copy> Grid<T> {
    /// Allocate a grid with every slot (guards included) set to `fill`.
    pub fn new(shape: GridShape, fill: T) -> Result<Self> {
        shape.validate()?;
        let layout = Layout::new(shape);
        Ok(Self {
            data: vec![fill; layout.len()],
            layout,
        })
    }

    /// Write `value` into every storage slot, guards included.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Grid<T> {
    /// Coordinate mapping of this grid.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Logical shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.layout.shape
    }

    /// Logical width.
    #[inline]
    pub fn width(&self) -> usize {
        self.layout.shape.width
    }

    /// Logical height.
    #[inline]
    pub fn height(&self) -> usize {
        self.layout.shape.height
    }

    /// Logical depth.
    #[inline]
    pub fn depth(&self) -> usize {
        self.layout.shape.depth
    }

    /// Guard thickness.
    #[inline]
    pub fn guard(&self) -> usize {
        self.layout.shape.guard
    }

    /// Storage strides, for neighbor deltas.
    #[inline]
    pub fn strides(&self) -> Strides {
        self.layout.strides
    }

    /// Number of storage slots, guards included.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the grid holds no storage.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// See [`Layout::offset_for`].
    #[inline(always)]
    pub fn offset_for(&self, x: isize, y: isize, z: isize) -> usize {
        self.layout.offset_for(x, y, z)
    }

    /// Cell at a guarded coordinate.
    #[inline]
    pub fn at(&self, x: isize, y: isize, z: isize) -> &T {
        &self.data[self.layout.offset_for(x, y, z)]
    }

    /// Mutable cell at a guarded coordinate.
    #[inline]
    pub fn at_mut(&mut self, x: isize, y: isize, z: isize) -> &mut T {
        let offset = self.layout.offset_for(x, y, z);
        &mut self.data[offset]
    }

    /// Raw storage, guards included.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable raw storage, guards included.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over the logical cells in storage order.
    pub fn logical(&self) -> impl Iterator<Item = &T> + '_ {
        let width = self.width();
        self.layout
            .rows(0..self.layout.outer_extent())
            .flat_map(move |row| self.data[row.offset..row.offset + width].iter())
    }

    /// Whether `other` has the same shape and therefore the same offsets.
    pub fn same_layout<U>(&self, other: &Grid<U>) -> bool {
        self.layout == other.layout
    }

    /// Split the storage into `parts` disjoint mutable slabs along the outer
    /// axis, using the same rule as [`partition`].
    ///
    /// Slab `i` covers the logical outer range `partition(outer_extent, i,
    /// parts)` together with the x (and y) guards inside it. Guard rows and
    /// planes before the first and after the last logical index belong to no
    /// slab.
    pub fn split_outer_mut(&mut self, parts: usize) -> Vec<OuterSlab<'_, T>> {
        let layout = self.layout;
        let extent = layout.outer_extent();
        let mut slabs = Vec::with_capacity(parts);
        let mut rest: &mut [T] = &mut self.data;
        let mut consumed = 0;

        for index in 0..parts {
            let outer = partition(extent, index, parts);
            let span = layout.outer_offsets(outer.clone());
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(span.start - consumed);
            let (cells, tail) = tail.split_at_mut(span.len());
            rest = tail;
            consumed = span.end;
            slabs.push(OuterSlab {
                layout,
                outer,
                base: span.start,
                cells,
            });
        }
        slabs
    }
}

impl<T: Send> Grid<T> {
    /// A shared view from which each worker claims its own slab by index,
    /// with the same split as [`split_outer_mut`](Self::split_outer_mut) but
    /// without collecting the slabs first.
    pub fn outer_slabs(&mut self, parts: usize) -> OuterSlabs<'_, T> {
        OuterSlabs {
            layout: self.layout,
            parts: parts.max(1),
            base: self.data.as_mut_ptr(),
            _grid: PhantomData,
        }
    }
}

impl<T: bytemuck::Pod> Grid<T> {
    /// Raw bytes of the storage, for zero-copy hand-off to a renderer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

impl<T> Index<usize> for Grid<T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, offset: usize) -> &T {
        &self.data[offset]
    }
}

impl<T> IndexMut<usize> for Grid<T> {
    #[inline(always)]
    fn index_mut(&mut self, offset: usize) -> &mut T {
        &mut self.data[offset]
    }
}

/// A mutable band of a grid's storage along the outer axis.
///
/// Produced by [`Grid::split_outer_mut`]; slabs never overlap, so each one can
/// be handed to a different worker. Offsets are the grid's absolute offsets.
#[derive(Debug)]
pub struct OuterSlab<'a, T> {
    layout: Layout,
    outer: Range<usize>,
    base: usize,
    cells: &'a mut [T],
}

impl<'a, T> OuterSlab<'a, T> {
    /// Layout of the owning grid.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Logical outer-axis indices covered by this slab.
    #[inline]
    pub fn outer(&self) -> Range<usize> {
        self.outer.clone()
    }

    /// Absolute storage range covered by this slab.
    #[inline]
    pub fn span(&self) -> Range<usize> {
        self.base..self.base + self.cells.len()
    }

    /// Whether the slab holds no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at an absolute offset inside the slab.
    #[inline(always)]
    pub fn get(&self, offset: usize) -> &T {
        &self.cells[offset - self.base]
    }

    /// Mutable cell at an absolute offset inside the slab.
    #[inline(always)]
    pub fn get_mut(&mut self, offset: usize) -> &mut T {
        &mut self.cells[offset - self.base]
    }

    /// The logical cells of one row of this slab.
    #[inline]
    pub fn row_mut(&mut self, row: Row) -> &mut [T] {
        let start = row.offset - self.base;
        &mut self.cells[start..start + self.layout.shape.width]
    }
}

/// Outer-axis slabs of one grid, claimed by index from inside a pool task.
///
/// Holds the grid's mutable borrow for its whole lifetime; slab `i` covers
/// `partition(outer_extent, i, parts)`.
#[derive(Debug)]
pub struct OuterSlabs<'a, T> {
    layout: Layout,
    parts: usize,
    base: *mut T,
    _grid: PhantomData<&'a mut [T]>,
}

// SAFETY: the view only ever yields `&mut` access to disjoint ranges (see
// `claim`), so sharing it between threads is sharing `&mut [T]` pieces.
unsafe impl<T: Send> Send for OuterSlabs<'_, T> {}
unsafe impl<T: Send> Sync for OuterSlabs<'_, T> {}

impl<T> OuterSlabs<'_, T> {
    /// Number of slabs.
    #[inline]
    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Slab number `index`.
    ///
    /// # Safety
    ///
    /// At most one slab per index may be alive at any time. A worker pool
    /// task that claims only its own worker index satisfies this.
    ///
    /// # Panics
    ///
    /// If `index >= parts`.
    pub unsafe fn claim(&self, index: usize) -> OuterSlab<'_, T> {
        assert!(index < self.parts, "slab {index} out of {}", self.parts);
        let outer = partition(self.layout.outer_extent(), index, self.parts);
        let span = self.layout.outer_offsets(outer.clone());
        // SAFETY: `span` lies inside the allocation and differs for every
        // index; the caller guarantees no other live slab uses this index.
        let cells = std::slice::from_raw_parts_mut(self.base.add(span.start), span.len());
        OuterSlab {
            layout: self.layout,
            outer,
            base: span.start,
            cells,
        }
    }
}
