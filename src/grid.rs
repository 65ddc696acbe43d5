//! Virtualized movie grid engine.
//!
//! Lays out the filtered movie list into a row-major grid sized from the
//! viewport, computes which rows intersect the visible area, and keeps a map
//! of lazily-created render handles so cells leaving the viewport are
//! detached but never rebuilt. The layout math is independent of any
//! rendering target; the target is plugged in through [`CellFactory`].

use std::collections::{HashMap, HashSet};

use crate::models::MovieId;

/// Cells aim for this width; actual width stretches to fill the row.
pub const TARGET_CELL_WIDTH: f64 = 160.0;
/// Poster aspect ratio: height = width * 1.5.
pub const CELL_ASPECT_RATIO: f64 = 1.5;

/// The visible area the grid is laid out against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_top: f64,
    pub header_height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_top: 0.0,
            header_height: 0.0,
        }
    }

    pub fn with_scroll(mut self, scroll_top: f64) -> Self {
        self.scroll_top = scroll_top;
        self
    }

    pub fn with_header(mut self, header_height: f64) -> Self {
        self.header_height = header_height;
        self
    }
}

/// One positioned cell. Ephemeral: recomputed on every layout pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub movie: MovieId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A computed grid layout for one filtered list and viewport width.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub per_row: usize,
    pub cell_width: f64,
    pub cell_height: f64,
    /// Full content height, including the header, so the scroll container
    /// reflects the true size even though only visible rows are realized.
    pub content_height: f64,
    cells: Vec<GridCell>,
}

impl GridLayout {
    /// Lay out the filtered movies left-to-right, top-to-bottom.
    ///
    /// `y` is measured from the top of the grid (below the header).
    pub fn compute(movies: &[MovieId], viewport: &Viewport) -> Self {
        let per_row = ((viewport.width / TARGET_CELL_WIDTH) as usize).max(1);
        let cell_width = viewport.width / per_row as f64;
        let cell_height = cell_width * CELL_ASPECT_RATIO;

        let cells = movies
            .iter()
            .enumerate()
            .map(|(index, &movie)| GridCell {
                movie,
                x: (index % per_row) as f64 * cell_width,
                y: (index / per_row) as f64 * cell_height,
                width: cell_width,
                height: cell_height,
            })
            .collect::<Vec<_>>();

        let rows = movies.len().div_ceil(per_row);
        Self {
            per_row,
            cell_width,
            cell_height,
            content_height: rows as f64 * cell_height + viewport.header_height,
            cells,
        }
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn row_count(&self) -> usize {
        self.cells.len().div_ceil(self.per_row)
    }

    /// A row is in viewport iff it overlaps the window below the header.
    fn row_visible(&self, y: f64, viewport: &Viewport) -> bool {
        let top = viewport.scroll_top + viewport.header_height;
        y + self.cell_height >= top && y < top + viewport.height
    }

    /// Cells belonging to rows intersecting the viewport.
    pub fn visible_cells<'a>(
        &'a self,
        viewport: &'a Viewport,
    ) -> impl Iterator<Item = &'a GridCell> {
        self.cells
            .iter()
            .filter(move |cell| self.row_visible(cell.y, viewport))
    }
}

/// Creates render handles for cells the first time they become visible.
pub trait CellFactory {
    type Handle;

    fn create(&mut self, movie: MovieId) -> Self::Handle;
}

/// Result of one layout pass.
#[derive(Debug)]
pub struct LayoutPass {
    /// Cells that entered the viewport this pass.
    pub attached: Vec<MovieId>,
    /// Cells that left the viewport this pass.
    pub detached: Vec<MovieId>,
    pub filtered_count: usize,
    pub no_results: bool,
    pub content_height: f64,
}

/// Owns the current layout and the per-movie render handles.
pub struct GridEngine<F: CellFactory> {
    factory: F,
    handles: HashMap<MovieId, F::Handle>,
    attached: HashSet<MovieId>,
    layout: GridLayout,
}

impl<F: CellFactory> GridEngine<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            handles: HashMap::new(),
            attached: HashSet::new(),
            layout: GridLayout::compute(&[], &Viewport::new(TARGET_CELL_WIDTH, 0.0)),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// The render handle for a movie, if it has ever been visible.
    pub fn handle(&self, movie: MovieId) -> Option<&F::Handle> {
        self.handles.get(&movie)
    }

    /// Movies currently attached to the rendering target.
    pub fn attached(&self) -> &HashSet<MovieId> {
        &self.attached
    }

    /// Recompute positions and visibility for the filtered list.
    ///
    /// Handles are created lazily the first time a movie becomes visible and
    /// reused afterwards; leaving the viewport only detaches them.
    pub fn relayout(&mut self, filtered: &[MovieId], viewport: &Viewport) -> LayoutPass {
        self.layout = GridLayout::compute(filtered, viewport);

        let visible: HashSet<MovieId> = self
            .layout
            .visible_cells(viewport)
            .map(|cell| cell.movie)
            .collect();

        let factory = &mut self.factory;
        let handles = &mut self.handles;
        let mut pass_attached = Vec::new();
        for &movie in filtered {
            if visible.contains(&movie) && !self.attached.contains(&movie) {
                handles.entry(movie).or_insert_with(|| factory.create(movie));
                pass_attached.push(movie);
            }
        }

        let mut pass_detached: Vec<MovieId> = self
            .attached
            .iter()
            .copied()
            .filter(|movie| !visible.contains(movie))
            .collect();
        pass_detached.sort();

        self.attached = visible;

        LayoutPass {
            attached: pass_attached,
            detached: pass_detached,
            filtered_count: filtered.len(),
            no_results: filtered.is_empty(),
            content_height: self.layout.content_height,
        }
    }
}
