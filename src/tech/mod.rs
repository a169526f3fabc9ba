//! Technology plugin interface.
//!
//! A [`LaygoTech`] implementation owns all process-specific geometry:
//! the vertical stack-up solvers and the primitive via/wire drawing
//! routines. Everything above this trait is process-independent.

use layout21::raw::{Int, Rect};
use layout21::utils::Ptr;

use crate::block::GateAlign;
use crate::config::TechConfig;
use crate::draw::Sketch;
use crate::geometry::Span;
use crate::row::{ConnYLoc, RowOptions, RowYLoc};
use crate::LaygoResult;

pub mod planar;

pub trait LaygoTech {
    /// The technology configuration backing this plugin.
    fn config(&self) -> Ptr<TechConfig>;

    /// Solves the vertical floorplan of a row of transistors (or taps,
    /// when `is_sub` is set) of width `w`.
    fn row_yloc_info(
        &self,
        lch: Int,
        w: Int,
        is_sub: bool,
        opts: &RowOptions,
    ) -> LaygoResult<RowYLoc>;

    /// Vertical extents of the gate and drain/source wires serving a
    /// diffusion region at `od_y`.
    fn conn_yloc_info(&self, lch: Int, od_y: Span, is_sub: bool) -> LaygoResult<ConnYLoc>;

    /// Vertical extent of a block's diffusion, given the row's
    /// diffusion interval. `top_align` pins the diffusion to the top
    /// of the row interval instead of the bottom.
    fn blk_od_y(&self, lch: Int, w: Int, row_od_y: Span, top_align: bool) -> LaygoResult<Span>;

    /// Draws gate vias and returns the vertical gate wires.
    fn draw_g_connection(
        &self,
        sketch: &mut Sketch,
        lch: Int,
        od_y: Span,
        align: GateAlign,
        num_fg: usize,
    ) -> LaygoResult<Vec<Rect>>;

    /// Draws drain/source via stacks on the given source/drain columns
    /// and returns the vertical wires.
    fn draw_ds_connection(
        &self,
        sketch: &mut Sketch,
        lch: Int,
        od_y: Span,
        columns: &[usize],
    ) -> LaygoResult<Vec<Rect>>;

    /// Draws substrate tap contacts and returns the supply wires.
    fn draw_sub_connection(
        &self,
        sketch: &mut Sketch,
        lch: Int,
        od_y: Span,
        is_sub_row: bool,
    ) -> LaygoResult<Vec<Rect>>;
}
