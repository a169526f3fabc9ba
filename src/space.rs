//! Space fillers.
//!
//! Unused columns of a row are filled with dummy poly and, when the
//! gap is wide enough, a strip of dummy diffusion. Boundary fingers
//! take a poly flavor matching whatever the neighboring block drew at
//! its edge.

use serde::{Deserialize, Serialize};

use crate::block::{BlockLayout, OdRowInfo};
use crate::ext::{EdgeInfo, ExtInfo};
use crate::geometry::div_ceil;
use crate::row::{LaygoRow, OdType, PolyType};
use crate::tech::LaygoTech;
use crate::{LaygoError, LaygoResult};

/// A space filler covering `num_blk` columns, with the edge metadata
/// of its left and right neighbors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaygoSpace {
    pub layout: BlockLayout,
    pub ext_top: ExtInfo,
    pub ext_bot: ExtInfo,
    pub left_edge: EdgeInfo,
    pub right_edge: EdgeInfo,
}

impl LaygoSpace {
    pub fn build<T: LaygoTech>(
        tech: &T,
        row: &LaygoRow,
        num_blk: usize,
        left: &EdgeInfo,
        right: &EdgeInfo,
    ) -> LaygoResult<Self> {
        let config = tech.config();
        let config = config.read().unwrap();
        let mos = config.mos_config(row.params.lch)?;
        let sd_pitch = mos.sd_pitch;
        let od_spx = mos.od_spx;
        let od_fill_w_max = mos.od_fill_w_max;
        let lch = mos.lch;
        drop(config);

        // Number of boundary columns that must stay diffusion-free on
        // each side to satisfy diffusion spacing to the neighbors.
        let od_spx_fg = (div_ceil(od_spx - sd_pitch + lch, sd_pitch) + 2) as usize;

        let area = num_blk as isize - 2 * od_spx_fg as isize;
        let (od_x, draw_od) = if area > 0 {
            if od_fill_w_max.is_some() {
                return Err(LaygoError::Unsupported(
                    "partitioned diffusion fill in space blocks",
                ));
            }
            ((od_spx_fg, num_blk - od_spx_fg), true)
        } else {
            // Placeholder interval, nothing is drawn.
            ((1, 2), false)
        };

        let po_types = space_po_types(num_blk, od_spx_fg, od_x, left, right);

        let edge = EdgeInfo::new(None).with_od_y(row.od_y);
        let ext_top = ExtInfo {
            po_types: po_types.clone(),
            edgel: edge.clone(),
            edger: edge.clone(),
            ..row.ext_top.clone()
        };
        let ext_bot = ExtInfo {
            po_types,
            edgel: edge.clone(),
            edger: edge.clone(),
            ..row.ext_bot.clone()
        };

        let is_sub_row = row.params.mos_type.is_substrate();
        let sub_type = row.params.mos_type.sub_type();
        let layout = BlockLayout {
            is_sub_row,
            blk_type: if is_sub_row { OdType::Sub } else { OdType::Mos },
            lch: row.params.lch,
            fg: num_blk,
            arr_y: row.arr_y,
            draw_od,
            sd_pitch,
            row_info_list: vec![OdRowInfo {
                od_x,
                od_y: row.od_y,
                od_type: (OdType::Dummy, sub_type),
                po_y: row.po_y,
            }],
            sub_y_list: [row.od_y, row.ds_conn_y, row.ds_conn_y],
            lay_rects: row.lay_rects.clone(),
            sub_type,
            imp_params: row.imp_params.clone(),
            dnw_mode: row.params.options.dnw_mode,
        };

        Ok(Self {
            layout,
            ext_top,
            ext_bot,
            left_edge: edge.clone(),
            right_edge: edge,
        })
    }
}

/// Classifies each poly finger of a space block.
fn space_po_types(
    num_blk: usize,
    od_spx_fg: usize,
    od_x: (usize, usize),
    left: &EdgeInfo,
    right: &EdgeInfo,
) -> Vec<PolyType> {
    let mut po_types = Vec::with_capacity(num_blk);
    for idx in 0..num_blk {
        if idx == 0 || idx == num_blk - 1 {
            let od_type = if idx == 0 { left.od_type } else { right.od_type };
            po_types.push(PolyType::edge_for(od_type));
        } else if idx < od_spx_fg || idx >= num_blk - od_spx_fg {
            po_types.push(PolyType::Dummy);
        } else if idx + 1 == od_x.1 || idx + 1 == od_x.0 {
            // Fingers at the edges of the dummy diffusion.
            po_types.push(PolyType::EdgeDummy);
        } else if od_x.0 <= idx && idx < od_x.1 {
            po_types.push(PolyType::GateDummy);
        } else {
            po_types.push(PolyType::Dummy);
        }
    }
    po_types
}
