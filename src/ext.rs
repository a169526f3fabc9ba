//! Extension-region descriptors and row-boundary merging.
//!
//! The space between two abutting transistor rows is filled by
//! extension blocks. Each row edge publishes an [`ExtInfo`] describing
//! the geometry margins left behind at that edge; aligning the bottom
//! row's top edge with the top row's bottom edge yields the finger
//! intervals the extension generator must fill.

use std::collections::BTreeMap;

use layout21::raw::Int;
use serde::{Deserialize, Serialize};

use crate::geometry::Span;
use crate::row::{Intent, MosType, OdType, PolyType};

/// Distance from a row edge to the nearest shape on one layer, along
/// with the minimum spacing that layer requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margin {
    pub margin: Int,
    pub min_spacing: Int,
}

impl Margin {
    pub fn new(margin: Int, min_spacing: Int) -> Self {
        Self { margin, min_spacing }
    }
}

/// Margins at a row edge, per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtMargins {
    pub od: Margin,
    pub po: Margin,
    pub m1: Margin,
}

/// Geometry adjacent to the left or right edge of a block, used to
/// pick boundary poly flavors and to stitch abutting cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// Flavor of the nearest diffusion, if any diffusion is drawn.
    pub od_type: Option<OdType>,
    /// Layers that must extend through the adjacent edge cell.
    pub draw_layers: Vec<String>,
    /// Vertical intervals of edge shapes, keyed by layer name.
    pub y_intv: BTreeMap<String, Span>,
}

impl EdgeInfo {
    pub fn new(od_type: Option<OdType>) -> Self {
        Self {
            od_type,
            ..Default::default()
        }
    }

    pub fn with_od_y(mut self, od_y: Span) -> Self {
        self.y_intv.insert("od".to_string(), od_y);
        self
    }
}

/// Everything an extension generator needs to know about one side of a
/// row boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtInfo {
    /// Per-layer margins at this edge.
    pub margins: ExtMargins,
    /// Height of the adjacent diffusion.
    pub od_h: Int,
    /// Minimum implant height.
    pub imp_min_h: Int,
    /// (extension type, adjacent row type).
    pub mtype: (MosType, MosType),
    /// Substrate metal height, for taps.
    pub m1_sub_h: Int,
    /// Threshold flavor of the adjacent row.
    pub thres: Intent,
    /// Poly flavor of each finger along this edge.
    pub po_types: Vec<PolyType>,
    /// Left edge geometry.
    pub edgel: EdgeInfo,
    /// Right edge geometry.
    pub edger: EdgeInfo,
}

impl ExtInfo {
    pub fn num_fingers(&self) -> usize {
        self.po_types.len()
    }

    /// Copy of this descriptor covering only the given poly fingers.
    pub fn with_po_types(&self, po_types: Vec<PolyType>) -> Self {
        Self {
            po_types,
            ..self.clone()
        }
    }

    /// Copy of this descriptor re-labeled for a different block.
    pub fn with_block_info(
        &self,
        mtype: (MosType, MosType),
        po_types: Vec<PolyType>,
        edgel: EdgeInfo,
        edger: EdgeInfo,
    ) -> Self {
        Self {
            mtype,
            po_types,
            edgel,
            edger,
            ..self.clone()
        }
    }
}

/// One entry in a row-edge sequence: either a run of empty fingers or
/// a block's extension descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtSlot {
    /// `n` fingers with no block beneath/above.
    Space(usize),
    Ext(ExtInfo),
}

impl ExtSlot {
    fn num_fingers(&self) -> usize {
        match self {
            ExtSlot::Space(n) => *n,
            ExtSlot::Ext(info) => info.num_fingers(),
        }
    }
}

/// A finger interval needing an extension block, with the descriptors
/// of the blocks below and above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtGroup {
    /// First finger of the interval.
    pub start: usize,
    /// Number of fingers.
    pub fg: usize,
    pub bot: ExtInfo,
    pub top: ExtInfo,
}

/// Aligns the bottom row's top-edge sequence with the top row's
/// bottom-edge sequence and returns the finger intervals that need
/// extension blocks.
///
/// Both sequences must cover the same total finger count, and wherever
/// one sequence carries a descriptor the other must too; a descriptor
/// facing a spacer run is a caller bug and panics.
pub fn merge_row_extensions(bot: &[ExtSlot], top: &[ExtSlot]) -> Vec<ExtGroup> {
    let total: usize = bot.iter().map(ExtSlot::num_fingers).sum();
    debug_assert_eq!(
        total,
        top.iter().map(ExtSlot::num_fingers).sum::<usize>(),
        "row edges cover different finger counts"
    );

    let mut groups = Vec::new();
    let (mut bi, mut ti) = (0usize, 0usize);
    // Start finger of the slot each cursor points at.
    let (mut boff, mut toff) = (0usize, 0usize);
    // Fingers already consumed from a spacer run.
    let (mut bspc, mut tspc) = (0usize, 0usize);
    let mut cur = 0usize;

    while bi < bot.len() && ti < top.len() {
        match (&bot[bi], &top[ti]) {
            (ExtSlot::Space(bn), ExtSlot::Space(tn)) => {
                let n = (bn - bspc).min(tn - tspc);
                cur += n;
                bspc += n;
                tspc += n;
                if bspc == *bn {
                    bi += 1;
                    boff = cur;
                    bspc = 0;
                }
                if tspc == *tn {
                    ti += 1;
                    toff = cur;
                    tspc = 0;
                }
            }
            (ExtSlot::Ext(binfo), ExtSlot::Ext(tinfo)) => {
                let bstop = boff + binfo.num_fingers();
                let tstop = toff + tinfo.num_fingers();
                let stop = bstop.min(tstop);
                groups.push(ExtGroup {
                    start: cur,
                    fg: stop - cur,
                    bot: binfo.with_po_types(binfo.po_types[cur - boff..stop - boff].to_vec()),
                    top: tinfo.with_po_types(tinfo.po_types[cur - toff..stop - toff].to_vec()),
                });
                cur = stop;
                if stop == bstop {
                    bi += 1;
                    boff = cur;
                }
                if stop == tstop {
                    ti += 1;
                    toff = cur;
                }
            }
            _ => panic!(
                "misaligned row edges at finger {}: a block faces empty space",
                cur
            ),
        }
    }
    groups
}
