//! Primitive block descriptors.
//!
//! A block occupies an integer number of source/drain columns within
//! a row: single transistors, parallel or stacked pairs, and
//! substrate taps.

use std::fmt::{self, Display};
use std::str::FromStr;

use layout21::raw::Int;
use serde::{Deserialize, Serialize};

use crate::ext::{EdgeInfo, ExtInfo};
use crate::geometry::Span;
use crate::row::{ImplantParams, LaygoRow, LayerRect, MosType, OdType, PolyType};
use crate::tech::LaygoTech;
use crate::{LaygoError, LaygoResult};

/// Which source/drain column the gate wire aligns with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateAlign {
    Drain,
    Source,
}

/// Primitive block flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Single transistor, one finger.
    Fg1(GateAlign),
    /// Two transistors in parallel: shared drain, outer sources.
    Fg2(GateAlign),
    /// Two transistors in series.
    Stack2(GateAlign),
    /// Substrate tap.
    Sub,
}

impl BlockKind {
    /// Number of gate fingers of an active block.
    pub fn num_fingers(&self) -> usize {
        match self {
            BlockKind::Fg1(_) => 1,
            _ => 2,
        }
    }

    pub fn gate_align(&self) -> Option<GateAlign> {
        match self {
            BlockKind::Fg1(a) | BlockKind::Fg2(a) | BlockKind::Stack2(a) => Some(*a),
            BlockKind::Sub => None,
        }
    }

    /// Source/drain columns carrying the drain wires.
    pub fn drain_columns(&self) -> &'static [usize] {
        match self {
            BlockKind::Fg1(_) | BlockKind::Fg2(_) => &[1],
            BlockKind::Stack2(_) => &[2],
            BlockKind::Sub => &[],
        }
    }

    /// Source/drain columns carrying the source wires.
    pub fn source_columns(&self) -> &'static [usize] {
        match self {
            BlockKind::Fg1(_) | BlockKind::Stack2(_) => &[0],
            BlockKind::Fg2(_) => &[0, 2],
            BlockKind::Sub => &[],
        }
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BlockKind::Fg1(GateAlign::Drain) => "fg1d",
            BlockKind::Fg1(GateAlign::Source) => "fg1s",
            BlockKind::Fg2(GateAlign::Drain) => "fg2d",
            BlockKind::Fg2(GateAlign::Source) => "fg2s",
            BlockKind::Stack2(GateAlign::Drain) => "stack2d",
            BlockKind::Stack2(GateAlign::Source) => "stack2s",
            BlockKind::Sub => "sub",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BlockKind {
    type Err = LaygoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fg1d" => Ok(BlockKind::Fg1(GateAlign::Drain)),
            "fg1s" => Ok(BlockKind::Fg1(GateAlign::Source)),
            "fg2d" => Ok(BlockKind::Fg2(GateAlign::Drain)),
            "fg2s" => Ok(BlockKind::Fg2(GateAlign::Source)),
            "stack2d" => Ok(BlockKind::Stack2(GateAlign::Drain)),
            "stack2s" => Ok(BlockKind::Stack2(GateAlign::Source)),
            "sub" => Ok(BlockKind::Sub),
            other => Err(LaygoError::BadBlockKind(other.to_string())),
        }
    }
}

/// One diffusion strip within a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdRowInfo {
    /// Diffusion extent in source/drain column units.
    pub od_x: (usize, usize),
    pub od_y: Span,
    /// (diffusion flavor, tap flavor of the row).
    pub od_type: (OdType, MosType),
    pub po_y: Span,
}

/// Geometry of a placed block, everything the emitter needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockLayout {
    pub is_sub_row: bool,
    pub blk_type: OdType,
    pub lch: Int,
    /// Width in source/drain columns.
    pub fg: usize,
    pub arr_y: Span,
    pub draw_od: bool,
    pub sd_pitch: Int,
    pub row_info_list: Vec<OdRowInfo>,
    /// Diffusion interval plus the two tap wire intervals.
    pub sub_y_list: [Span; 3],
    pub lay_rects: Vec<LayerRect>,
    pub sub_type: MosType,
    pub imp_params: Vec<ImplantParams>,
    pub dnw_mode: bool,
}

/// A placed primitive block with its boundary metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaygoBlock {
    pub kind: BlockKind,
    pub layout: BlockLayout,
    pub ext_top: ExtInfo,
    pub ext_bot: ExtInfo,
    pub left_edge: EdgeInfo,
    pub right_edge: EdgeInfo,
}

impl LaygoBlock {
    /// Places a primitive block of the given kind and width into a
    /// row.
    pub fn build<T: LaygoTech>(
        tech: &T,
        kind: BlockKind,
        w: Int,
        row: &LaygoRow,
    ) -> LaygoResult<Self> {
        let row_type = row.params.mos_type;
        let sub_type = row_type.sub_type();
        let threshold = &row.params.threshold;
        let opts = &row.params.options;
        let is_sub_row = row_type.is_substrate();

        let config = tech.config();
        let config = config.read().unwrap();
        let mos = config.mos_config(row.params.lch)?;
        let sd_pitch = mos.sd_pitch;
        let imp_od_ency = mos.imp_od_ency;
        let sub_columns = mos.sub_columns;
        drop(config);

        let top_align = opts.imp_min_g && kind == BlockKind::Sub;
        let od_y = tech.blk_od_y(row.params.lch, w, row.od_y, top_align)?;

        let mut po_y = row.po_y;
        let mut lay_rects = row.lay_rects.clone();
        let edge_y = EdgeInfo::default().with_od_y(od_y);

        let (mtype, od_type, fg, od_intv, edge, po_types): (
            (MosType, MosType),
            OdType,
            usize,
            (usize, usize),
            EdgeInfo,
            Vec<PolyType>,
        ) = match kind {
            BlockKind::Fg1(_) => (
                (row_type, row_type),
                OdType::Mos,
                1,
                (0, 1),
                EdgeInfo {
                    od_type: Some(OdType::Mos),
                    ..edge_y.clone()
                },
                vec![PolyType::Gate],
            ),
            BlockKind::Fg2(_) | BlockKind::Stack2(_) => (
                (row_type, row_type),
                OdType::Mos,
                2,
                (0, 2),
                EdgeInfo {
                    od_type: Some(OdType::Mos),
                    ..edge_y.clone()
                },
                vec![PolyType::Gate; 2],
            ),
            BlockKind::Sub if is_sub_row => {
                // Taps carry no poly.
                po_y = Span::from_point(0);
                (
                    (sub_type, row_type),
                    OdType::Sub,
                    2,
                    (0, 2),
                    EdgeInfo {
                        od_type: Some(OdType::Sub),
                        ..edge_y.clone()
                    },
                    vec![PolyType::Sub; 2],
                )
            }
            BlockKind::Sub => {
                // The finger budget must fit two dummy and two edge
                // fingers around the tap poly run.
                if sub_columns < 4 {
                    return Err(LaygoError::TooFewSubColumns(sub_columns));
                }
                po_y = Span::from_point(0);
                // A tap embedded in a transistor row carves the row's
                // implants into a tap region and a leftover region.
                let imp_y = od_y.expand_all(imp_od_ency);
                let arr = row.arr_y;
                let (row_y, sub_y) = if opts.imp_min_g {
                    let row_yt = imp_y.start().max(arr.start());
                    (
                        Span::new(arr.start(), row_yt),
                        Span::new(row_yt, arr.stop()),
                    )
                } else if opts.imp_min_d {
                    let sub_yt = imp_y.stop().min(arr.stop());
                    (
                        Span::new(sub_yt, arr.stop()),
                        Span::new(arr.start(), sub_yt),
                    )
                } else {
                    (Span::from_point(arr.start()), arr)
                };

                let config = tech.config();
                let config = config.read().unwrap();
                lay_rects = config
                    .mos_layer_names(sub_type, threshold)?
                    .into_iter()
                    .map(|layer| LayerRect { layer, y: sub_y })
                    .collect();
                if row_y.length() > 0 {
                    lay_rects.extend(
                        config
                            .mos_layer_names(row_type, threshold)?
                            .into_iter()
                            .map(|layer| LayerRect { layer, y: row_y }),
                    );
                }
                drop(config);

                let fg = sub_columns;
                let mut po_types = vec![PolyType::Dummy, PolyType::EdgeSub];
                po_types.extend(vec![PolyType::Sub; fg - 4]);
                po_types.extend([PolyType::EdgeSub, PolyType::Dummy]);
                (
                    (sub_type, row_type),
                    OdType::Sub,
                    fg,
                    (2, fg - 2),
                    EdgeInfo {
                        od_type: None,
                        ..edge_y.clone()
                    },
                    po_types,
                )
            }
        };

        let ext_top = row
            .ext_top
            .with_block_info(mtype, po_types.clone(), edge.clone(), edge.clone());
        let ext_bot = row
            .ext_bot
            .with_block_info(mtype, po_types, edge.clone(), edge.clone());

        let layout = BlockLayout {
            is_sub_row,
            blk_type: if is_sub_row { OdType::Sub } else { OdType::Mos },
            lch: row.params.lch,
            fg,
            arr_y: row.arr_y,
            draw_od: true,
            sd_pitch,
            row_info_list: vec![OdRowInfo {
                od_x: od_intv,
                od_y,
                od_type: (od_type, sub_type),
                po_y,
            }],
            sub_y_list: [od_y, row.ds_conn_y, row.ds_conn_y],
            lay_rects,
            sub_type,
            imp_params: row.imp_params.clone(),
            dnw_mode: opts.dnw_mode,
        };

        Ok(Self {
            kind,
            layout,
            ext_top,
            ext_bot,
            left_edge: edge.clone(),
            right_edge: edge,
        })
    }

    /// Block width, in layout units.
    pub fn width(&self) -> Int {
        self.layout.fg as Int * self.layout.sd_pitch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{RowParams, RowYLoc};
    use crate::tech::planar::PlanarTech;

    fn nch_row(tech: &PlanarTech) -> LaygoRow {
        let params = RowParams::builder()
            .lch(16)
            .w_max(160)
            .w_sub(160)
            .mos_type(MosType::Nch)
            .build()
            .unwrap();
        LaygoRow::build(tech, &params).unwrap()
    }

    fn ptap_row(tech: &PlanarTech) -> LaygoRow {
        let params = RowParams::builder()
            .lch(16)
            .w_max(160)
            .w_sub(160)
            .mos_type(MosType::Ptap)
            .build()
            .unwrap();
        LaygoRow::build(tech, &params).unwrap()
    }

    #[test]
    fn test_block_kind_strings() {
        for s in ["fg1d", "fg1s", "fg2d", "fg2s", "stack2d", "stack2s", "sub"] {
            let kind: BlockKind = s.parse().unwrap();
            assert_eq!(kind.to_string(), s);
        }
        assert!(matches!(
            "fg3d".parse::<BlockKind>(),
            Err(LaygoError::BadBlockKind(_))
        ));
    }

    #[test]
    fn test_block_columns() {
        let fg2 = BlockKind::Fg2(GateAlign::Drain);
        assert_eq!(fg2.drain_columns(), &[1]);
        assert_eq!(fg2.source_columns(), &[0, 2]);
        let stack2 = BlockKind::Stack2(GateAlign::Source);
        assert_eq!(stack2.drain_columns(), &[2]);
        assert_eq!(stack2.source_columns(), &[0]);
        let fg1 = BlockKind::Fg1(GateAlign::Drain);
        assert_eq!(fg1.drain_columns(), &[1]);
        assert_eq!(fg1.source_columns(), &[0]);
    }

    #[test]
    fn test_fg2_block() {
        let tech = PlanarTech::builtin().unwrap();
        let row = nch_row(&tech);
        let blk =
            LaygoBlock::build(&tech, BlockKind::Fg2(GateAlign::Drain), 160, &row).unwrap();
        assert_eq!(blk.layout.fg, 2);
        assert!(!blk.layout.is_sub_row);
        assert_eq!(blk.layout.row_info_list[0].od_x, (0, 2));
        assert_eq!(blk.layout.row_info_list[0].od_y, row.od_y);
        assert_eq!(blk.ext_top.po_types, vec![PolyType::Gate; 2]);
        assert_eq!(blk.left_edge.od_type, Some(OdType::Mos));
        assert_eq!(blk.width(), 180);
    }

    #[test]
    fn test_fg1_narrow_block() {
        let tech = PlanarTech::builtin().unwrap();
        let row = nch_row(&tech);
        let blk =
            LaygoBlock::build(&tech, BlockKind::Fg1(GateAlign::Source), 120, &row).unwrap();
        assert_eq!(blk.layout.fg, 1);
        // Narrow devices keep the row's diffusion bottom.
        let od = blk.layout.row_info_list[0].od_y;
        assert_eq!(od.start(), row.od_y.start());
        assert_eq!(od.length(), 120);
        assert_eq!(blk.ext_top.po_types, vec![PolyType::Gate]);
    }

    #[test]
    fn test_sub_block_in_tap_row() {
        let tech = PlanarTech::builtin().unwrap();
        let row = ptap_row(&tech);
        let blk = LaygoBlock::build(&tech, BlockKind::Sub, 160, &row).unwrap();
        assert!(blk.layout.is_sub_row);
        assert_eq!(blk.layout.fg, 2);
        assert_eq!(blk.ext_top.po_types, vec![PolyType::Sub; 2]);
        assert_eq!(blk.left_edge.od_type, Some(OdType::Sub));
        // Tap blocks suppress poly.
        assert_eq!(blk.layout.row_info_list[0].po_y.length(), 0);
    }

    #[test]
    fn test_sub_block_in_mos_row() {
        let tech = PlanarTech::builtin().unwrap();
        let row = nch_row(&tech);
        let blk = LaygoBlock::build(&tech, BlockKind::Sub, 160, &row).unwrap();
        assert!(!blk.layout.is_sub_row);
        assert_eq!(blk.layout.fg, 6);
        assert_eq!(blk.layout.row_info_list[0].od_x, (2, 4));
        assert_eq!(blk.layout.sub_type, MosType::Ptap);
        assert_eq!(
            blk.ext_top.po_types,
            vec![
                PolyType::Dummy,
                PolyType::EdgeSub,
                PolyType::Sub,
                PolyType::Sub,
                PolyType::EdgeSub,
                PolyType::Dummy,
            ]
        );
        // The embedded tap publishes no diffusion to its neighbors.
        assert_eq!(blk.left_edge.od_type, None);
        // Tap implants replace the row implants.
        assert!(blk
            .layout
            .lay_rects
            .iter()
            .any(|r| r.layer == "psdm"));
        assert!(!blk.layout.lay_rects.iter().any(|r| r.layer == "nsdm"));
    }

    #[test]
    fn test_sub_block_too_few_columns() {
        let tech = PlanarTech::builtin().unwrap();
        let row = nch_row(&tech);
        let config = tech.config();
        {
            let mut config = config.write().unwrap();
            // A rule table too narrow to flank the tap poly run.
            let mos = config.mos.iter_mut().find(|m| m.lch == 16).unwrap();
            mos.sub_columns = 3;
        }
        let err = LaygoBlock::build(&tech, BlockKind::Sub, 160, &row).unwrap_err();
        assert!(matches!(err, LaygoError::TooFewSubColumns(3)));
    }

    #[test]
    fn test_ext_fingers_match_block_fingers() {
        let tech = PlanarTech::builtin().unwrap();
        let row = nch_row(&tech);
        for s in ["fg1d", "fg1s", "fg2d", "fg2s", "stack2d", "stack2s", "sub"] {
            let kind: BlockKind = s.parse().unwrap();
            let blk = LaygoBlock::build(&tech, kind, 160, &row).unwrap();
            assert_eq!(blk.ext_top.num_fingers(), blk.layout.fg);
            assert_eq!(blk.ext_bot.num_fingers(), blk.layout.fg);
        }
    }

    #[test]
    fn test_mismatched_ext_descriptor_relabeling() {
        let tech = PlanarTech::builtin().unwrap();
        let row = nch_row(&tech);
        let blk = LaygoBlock::build(&tech, BlockKind::Sub, 160, &row).unwrap();
        // Extension descriptors of an embedded tap carry both flavors.
        assert_eq!(blk.ext_top.mtype, (MosType::Ptap, MosType::Nch));
        assert_eq!(blk.ext_bot.mtype, blk.ext_top.mtype);
    }
}
