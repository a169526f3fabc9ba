//! Transistor-row descriptors.
//!
//! A row is a horizontal strip of uniform height into which primitive
//! blocks (transistor pairs, substrate taps, space fillers) are
//! placed on a shared source/drain column grid.

use std::fmt::{self, Display};

use arcstr::ArcStr;
use layout21::raw::Int;
use serde::{Deserialize, Serialize};

use crate::ext::{EdgeInfo, ExtInfo, ExtMargins};
use crate::geometry::Span;
use crate::tech::LaygoTech;
use crate::{LaygoError, LaygoResult};

/// Transistor or tap flavor of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MosType {
    Nch,
    Pch,
    Ptap,
    Ntap,
}

impl MosType {
    pub fn is_substrate(&self) -> bool {
        matches!(self, MosType::Ptap | MosType::Ntap)
    }

    /// The tap flavor that supplies the bulk of this row.
    pub fn sub_type(&self) -> MosType {
        match self {
            MosType::Nch | MosType::Ptap => MosType::Ptap,
            MosType::Pch | MosType::Ntap => MosType::Ntap,
        }
    }

    /// Name of the supply net a tap of this flavor ties to.
    pub fn supply_name(&self) -> &'static str {
        match self.sub_type() {
            MosType::Ptap => "VSS",
            _ => "VDD",
        }
    }
}

impl Display for MosType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            MosType::Nch => "nch",
            MosType::Pch => "pch",
            MosType::Ptap => "ptap",
            MosType::Ntap => "ntap",
        };
        write!(f, "{}", s)
    }
}

/// Threshold flavor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Ultra low threshold voltage
    Ulvt,
    /// Low threshold voltage
    Lvt,
    /// Standard threshold voltage
    Svt,
    /// High threshold voltage
    Hvt,
    /// Ultra-high threshold voltage
    Uhvt,
    /// A custom threshold flavor; layers depend on the technology
    /// configuration.
    Custom(String),
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Svt
    }
}

impl Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Intent::Ulvt => write!(f, "ulvt"),
            Intent::Lvt => write!(f, "lvt"),
            Intent::Svt => write!(f, "svt"),
            Intent::Hvt => write!(f, "hvt"),
            Intent::Uhvt => write!(f, "uhvt"),
            Intent::Custom(s) => write!(f, "{}", s),
        }
    }
}

/// Flavor of a drawn diffusion region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OdType {
    /// Active transistor diffusion.
    Mos,
    /// Substrate tap diffusion.
    Sub,
    /// Electrically inert fill diffusion.
    Dummy,
}

/// Flavor of a poly finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolyType {
    /// Active transistor gate.
    Gate,
    /// Poly over a substrate tap.
    Sub,
    /// Isolated dummy poly.
    Dummy,
    /// Dummy gate over dummy diffusion.
    GateDummy,
    /// Boundary finger next to transistor diffusion.
    Edge,
    /// Boundary finger next to tap diffusion.
    EdgeSub,
    /// Boundary finger next to dummy diffusion.
    EdgeDummy,
}

impl PolyType {
    /// Boundary flavor matching a neighbor's diffusion type.
    pub fn edge_for(od_type: Option<OdType>) -> PolyType {
        match od_type {
            Some(OdType::Mos) => PolyType::Edge,
            Some(OdType::Sub) => PolyType::EdgeSub,
            Some(OdType::Dummy) => PolyType::EdgeDummy,
            None => PolyType::Dummy,
        }
    }
}

/// A fill requirement: intervals on `layer` that the filled region
/// must cover, minus any `exc_layer` blockages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillInfo {
    pub layer: String,
    pub exc_layer: Option<String>,
    pub x_intv_list: Vec<Span>,
    pub y_intv_list: Vec<Span>,
}

/// A non-diffusion layer drawn across the full width of a row or
/// block, with its vertical extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRect {
    pub layer: String,
    pub y: Span,
}

/// Implant/threshold drawing instructions for one sub-interval of a
/// row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplantParams {
    pub mos_type: MosType,
    pub threshold: Intent,
    /// Vertical extent of the implanted region.
    pub y: Span,
    /// Vertical extent used for implant-layer rectangles.
    pub imp_y: Span,
}

/// Vertical floorplan of a row, as computed by the stack-up solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowYLoc {
    /// Full row extent, `0..height`.
    pub blk: Span,
    pub po: Span,
    pub od: Span,
    pub top_margins: ExtMargins,
    pub bot_margins: ExtMargins,
    pub fill: Vec<FillInfo>,
    /// Where gate connections may land.
    pub g_conn_y: Span,
    /// Where substrate gate connections may land.
    pub gb_conn_y: Span,
    /// Where drain/source connections may land.
    pub ds_conn_y: Span,
}

/// Vertical extents of the gate and drain/source wires of one block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnYLoc {
    pub g_y: Span,
    pub d_y: Span,
}

/// Optional row behaviors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOptions {
    /// Enclose this tap row in a deep nwell ring.
    #[serde(default)]
    pub dnw_mode: bool,
    /// Quantize the row height to this pitch (in addition to the
    /// transistor pitch).
    #[serde(default = "default_blk_pitch")]
    pub blk_pitch: Int,
    /// Shrink implants away from the drain/source side of embedded
    /// taps.
    #[serde(default)]
    pub imp_min_g: bool,
    /// Shrink implants away from the gate side of embedded taps.
    #[serde(default)]
    pub imp_min_d: bool,
}

fn default_blk_pitch() -> Int {
    1
}

impl Default for RowOptions {
    fn default() -> Self {
        Self {
            dnw_mode: false,
            blk_pitch: 1,
            imp_min_g: false,
            imp_min_d: false,
        }
    }
}

impl RowOptions {
    pub fn validate(&self) -> LaygoResult<()> {
        if self.imp_min_g && self.imp_min_d {
            return Err(LaygoError::ImplantFlagConflict);
        }
        if self.blk_pitch <= 0 {
            return Err(LaygoError::BadHeight {
                what: "row pitch",
                value: self.blk_pitch,
            });
        }
        Ok(())
    }
}

/// Parameters of a transistor or tap row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
pub struct RowParams {
    /// Channel length.
    pub lch: Int,
    /// Largest transistor width the row must accommodate.
    pub w_max: Int,
    /// Width of substrate taps embedded in this row.
    pub w_sub: Int,
    pub mos_type: MosType,
    #[builder(default)]
    pub threshold: Intent,
    #[builder(default)]
    pub options: RowOptions,
}

impl RowParams {
    #[inline]
    pub fn builder() -> RowParamsBuilder {
        RowParamsBuilder::default()
    }
}

/// A fully solved row: vertical floorplan plus the extension
/// descriptors its edges publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaygoRow {
    pub name: ArcStr,
    pub params: RowParams,
    /// Full row extent.
    pub arr_y: Span,
    pub od_y: Span,
    pub po_y: Span,
    pub ext_top: ExtInfo,
    pub ext_bot: ExtInfo,
    /// Implant/threshold layers spanning the row.
    pub lay_rects: Vec<LayerRect>,
    pub imp_params: Vec<ImplantParams>,
    pub fill: Vec<FillInfo>,
    pub g_conn_y: Span,
    pub gb_conn_y: Span,
    pub ds_conn_y: Span,
}

impl LaygoRow {
    /// Solves the vertical floorplan of a row.
    pub fn build<T: LaygoTech>(tech: &T, params: &RowParams) -> LaygoResult<Self> {
        params.options.validate()?;
        let is_sub = params.mos_type.is_substrate();
        let w = if is_sub { params.w_sub } else { params.w_max };
        let yloc = tech.row_yloc_info(params.lch, w, is_sub, &params.options)?;

        let config = tech.config();
        let config = config.read().unwrap();
        let imp_min_h = config.mos_config(params.lch)?.imp_min_h;

        let layer_names = config.mos_layer_names(params.mos_type, &params.threshold)?;
        let lay_rects = layer_names
            .into_iter()
            .map(|layer| LayerRect { layer, y: yloc.blk })
            .collect::<Vec<_>>();
        drop(config);

        let od_type = if is_sub { OdType::Sub } else { OdType::Mos };
        let po_type = if is_sub { PolyType::Sub } else { PolyType::Gate };
        let edge = EdgeInfo::new(Some(od_type)).with_od_y(yloc.od);
        let mtype = (params.mos_type, params.mos_type);
        let mk_ext = |margins: ExtMargins| ExtInfo {
            margins,
            od_h: yloc.od.length(),
            imp_min_h,
            mtype,
            m1_sub_h: 0,
            thres: params.threshold.clone(),
            po_types: vec![po_type; 2],
            edgel: edge.clone(),
            edger: edge.clone(),
        };

        let imp_params = vec![ImplantParams {
            mos_type: params.mos_type,
            threshold: params.threshold.clone(),
            y: yloc.blk,
            imp_y: yloc.blk,
        }];

        let name = arcstr::format!(
            "row_{}_l{}_w{}_{}",
            params.mos_type,
            params.lch,
            w,
            params.threshold
        );

        Ok(Self {
            name,
            params: params.clone(),
            arr_y: yloc.blk,
            od_y: yloc.od,
            po_y: yloc.po,
            ext_top: mk_ext(yloc.top_margins),
            ext_bot: mk_ext(yloc.bot_margins),
            lay_rects,
            imp_params,
            fill: yloc.fill,
            g_conn_y: yloc.g_conn_y,
            gb_conn_y: yloc.gb_conn_y,
            ds_conn_y: yloc.ds_conn_y,
        })
    }

    /// Row height.
    pub fn height(&self) -> Int {
        self.arr_y.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mos_type_helpers() {
        assert!(MosType::Ptap.is_substrate());
        assert!(!MosType::Pch.is_substrate());
        assert_eq!(MosType::Nch.sub_type(), MosType::Ptap);
        assert_eq!(MosType::Pch.sub_type(), MosType::Ntap);
        assert_eq!(MosType::Nch.supply_name(), "VSS");
        assert_eq!(MosType::Ntap.supply_name(), "VDD");
    }

    #[test]
    fn test_edge_poly_flavor() {
        assert_eq!(PolyType::edge_for(Some(OdType::Mos)), PolyType::Edge);
        assert_eq!(PolyType::edge_for(Some(OdType::Sub)), PolyType::EdgeSub);
        assert_eq!(
            PolyType::edge_for(Some(OdType::Dummy)),
            PolyType::EdgeDummy
        );
        assert_eq!(PolyType::edge_for(None), PolyType::Dummy);
    }

    #[test]
    fn test_options_validation() {
        let opts = RowOptions {
            imp_min_g: true,
            imp_min_d: true,
            ..Default::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(LaygoError::ImplantFlagConflict)
        ));
        assert!(RowOptions::default().validate().is_ok());
    }

    #[test]
    fn test_row_params_builder() {
        let params = RowParams::builder()
            .lch(16)
            .w_max(160)
            .w_sub(160)
            .mos_type(MosType::Nch)
            .build()
            .unwrap();
        assert_eq!(params.threshold, Intent::Svt);
        assert_eq!(params.options.blk_pitch, 1);
    }
}
