//! Stack-up solvers and primitive drawing for planar-bulk processes.
//!
//! All Y coordinates are derived bottom-up from design rules: poly
//! spacing fixes the poly bottom, the gate contact stack fixes the
//! gate metal, and the gate-to-drain metal spacing rule fixes where
//! diffusion may start. Drain/source via counts follow from the
//! diffusion height.

use layout21::raw::{Int, Point, Rect};
use layout21::utils::Ptr;

use crate::block::GateAlign;
use crate::config::{MosConfig, TechConfig, ViaConfig};
use crate::draw::{Sketch, ViaArrayParams};
use crate::ext::{ExtMargins, Margin};
use crate::geometry::{lcm, round_down_to, round_up_to, Span};
use crate::row::{ConnYLoc, RowOptions, RowYLoc};
use crate::tech::LaygoTech;
use crate::{LaygoError, LaygoResult};

pub const PLANAR_TECH_TOML: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tech/planar/tech.toml"
));

/// Parses the built-in planar technology configuration.
pub fn planar_tech_config() -> crate::Result<TechConfig> {
    TechConfig::from_toml(PLANAR_TECH_TOML)
}

/// Planar-bulk technology plugin.
pub struct PlanarTech {
    config: Ptr<TechConfig>,
}

impl PlanarTech {
    pub fn new(config: Ptr<TechConfig>) -> Self {
        Self { config }
    }

    /// Plugin backed by the built-in planar configuration.
    pub fn builtin() -> crate::Result<Self> {
        Ok(Self::new(Ptr::new(planar_tech_config()?)))
    }

    /// Number of drain/source cuts that fit on a diffusion of height
    /// `od_h`.
    fn via_rows(via: &ViaConfig, od_h: Int) -> Int {
        (od_h - 2 * via.bot_enc_le + via.sp).div_euclid(via.h + via.sp)
    }

    fn via_arr_h(via: &ViaConfig, rows: Int) -> Int {
        rows * (via.h + via.sp) - via.sp
    }

    fn checked_via_rows(via: &ViaConfig, od_h: Int) -> LaygoResult<Int> {
        let n = Self::via_rows(via, od_h);
        if n < 1 {
            return Err(LaygoError::WidthTooSmall {
                w: od_h,
                min: 2 * via.bot_enc_le + via.h,
            });
        }
        Ok(n)
    }

    /// Vertical floorplan of a transistor row.
    fn mos_yloc_info(&self, mos: &MosConfig, w: Int) -> LaygoResult<RowYLoc> {
        if w < mos.mos_pitch {
            return Err(LaygoError::WidthTooSmall {
                w,
                min: mos.mos_pitch,
            });
        }
        // Diffusion height is the requested width quantized down to the
        // device pitch.
        let w = round_down_to(w, mos.mos_pitch);

        let m1_spy = mos.d_drc.sp_le;

        // Poly bottom sits half a poly space above the row edge, so
        // abutting rows satisfy poly spacing by construction.
        let po_yb = mos.po_spy / 2;

        // Gate contact stack fixes the gate metal top.
        let g_co_yb = po_yb + mos.g_via.bot_enc_le;
        let g_co_yt = g_co_yb + mos.g_via.h;
        let g_m1_yt = g_co_yt + mos.g_via.top_enc_le;
        let g_m1_yb = g_m1_yt - mos.g_drc.min_len;

        // Diffusion sits above the gate metal.
        let mut od_yb = g_m1_yt + mos.m1_gd_spy;
        let mut od_yt = od_yb + w;
        let od_yc = (od_yb + od_yt) / 2;

        let d_v0_n = Self::checked_via_rows(&mos.d_via, w)?;
        let d_v0_arrh = Self::via_arr_h(&mos.d_via, d_v0_n);

        let m1_h = (d_v0_arrh + 2 * mos.d_via.top_enc_le).max(mos.d_drc.min_len);
        let mut d_m1_yb = od_yc;

        // Re-check gate-to-drain metal spacing, moving diffusion up if
        // needed. Poly never moves.
        let delta = mos.m1_gd_spy - (d_m1_yb - g_m1_yt);
        if delta > 0 {
            d_m1_yb += delta;
            od_yb += delta;
            od_yt += delta;
        }
        let d_m1_yt = d_m1_yb + m1_h;

        let po_yt = od_yt + mos.po_od_exty;
        let blk_yt = po_yt + mos.po_spy.max(m1_spy) / 2;

        Ok(RowYLoc {
            blk: Span::new(0, blk_yt),
            po: Span::new(po_yb, po_yt),
            od: Span::new(od_yb, od_yt),
            top_margins: ExtMargins {
                od: Margin::new(blk_yt - od_yt, mos.od_spy),
                po: Margin::new(blk_yt - po_yt, mos.po_spy),
                m1: Margin::new(blk_yt - d_m1_yt, m1_spy),
            },
            bot_margins: ExtMargins {
                od: Margin::new(od_yb, mos.od_spy),
                po: Margin::new(po_yb, mos.po_spy),
                m1: Margin::new(g_m1_yb, m1_spy),
            },
            fill: Vec::new(),
            // Wire intervals are filled in by `row_yloc_info`.
            g_conn_y: Span::default(),
            gb_conn_y: Span::default(),
            ds_conn_y: Span::default(),
        })
    }

    /// Vertical floorplan of a substrate tap row.
    fn sub_yloc_info(&self, mos: &MosConfig, w: Int, opts: &RowOptions) -> LaygoResult<RowYLoc> {
        let od_h = w / 2 * 2;
        let mut imp_od_ency = mos.imp_od_ency;
        if opts.dnw_mode {
            imp_od_ency = imp_od_ency.max((mos.nw_dnw_ovl + mos.nw_dnw_ext - od_h) / 2);
        }

        let od_yb = imp_od_ency;
        let od_yt = od_yb + od_h;
        let mut blk_yt = od_yt + imp_od_ency;

        // Quantize the row height, then recenter the diffusion.
        let blk_pitch = lcm(opts.blk_pitch, mos.mos_pitch);
        blk_yt = round_up_to(blk_yt, blk_pitch);
        let od_yb = (blk_yt - od_h) / 2;
        let od_yt = od_yb + od_h;
        let od_yc = (od_yb + od_yt) / 2;

        let mx_spy = mos.d_drc.sp_le;
        let d_v0_n = Self::checked_via_rows(&mos.d_via, od_h)?;
        let d_v0_arrh = Self::via_arr_h(&mos.d_via, d_v0_n);
        let mx_h = mos
            .md_min_len
            .max(d_v0_arrh + 2 * mos.sub_m1_enc_le)
            .max(od_h);
        let d_mx_yb = od_yc - mx_h / 2;
        let d_mx_yt = d_mx_yb + mx_h;

        Ok(RowYLoc {
            blk: Span::new(0, blk_yt),
            // Taps carry no poly.
            po: Span::from_point(od_yb),
            od: Span::new(od_yb, od_yt),
            top_margins: ExtMargins {
                od: Margin::new(blk_yt - od_yt, mos.od_spy),
                po: Margin::new(blk_yt, mos.po_spy),
                m1: Margin::new(blk_yt - d_mx_yt, mx_spy),
            },
            bot_margins: ExtMargins {
                od: Margin::new(od_yb, mos.od_spy),
                po: Margin::new(blk_yt, mos.po_spy),
                m1: Margin::new(d_mx_yb, mx_spy),
            },
            fill: Vec::new(),
            g_conn_y: Span::default(),
            gb_conn_y: Span::default(),
            ds_conn_y: Span::default(),
        })
    }

    /// Gate via column layout for a block: (x, draw-right, draw-left)
    /// per gate wire.
    fn g_via_columns(
        sd_pitch: Int,
        align: GateAlign,
        num_fg: usize,
    ) -> Vec<(Int, bool, bool)> {
        match align {
            GateAlign::Drain => vec![(sd_pitch, num_fg > 1, true)],
            GateAlign::Source if num_fg == 1 => vec![(0, true, false)],
            GateAlign::Source => vec![(0, true, false), (2 * sd_pitch, false, true)],
        }
    }

    fn draw_g_via(
        &self,
        sketch: &mut Sketch,
        mos: &MosConfig,
        m1_yt: Int,
        cols: &[(Int, bool, bool)],
    ) -> LaygoResult<()> {
        let config = self.config.read().unwrap();
        let ml = &config.mos_layers;
        let v = &mos.g_via;
        let g_m1_h = v.h + 2 * v.top_enc_le;
        let g_m1_yb = m1_yt - g_m1_h;
        let g_m1_yc = (g_m1_yb + m1_yt) / 2;

        for &(xc, rflag, lflag) in cols {
            if rflag {
                sketch.via_array(ViaArrayParams {
                    via: v,
                    bot_layer: &ml.po,
                    top_layer: &ml.m1,
                    center: Point::new(xc + mos.sd_pitch / 2, g_m1_yc),
                    rows: 1,
                    enc1: (v.bot_enc_side, v.bot_enc_le),
                    enc2: (v.top_enc_side, v.top_enc_le),
                })?;
                sketch.rect(
                    &ml.m1,
                    None,
                    Rect {
                        p0: Point::new(xc, g_m1_yb),
                        p1: Point::new(xc + mos.sd_pitch / 2 + v.w / 2 + v.top_enc_side, m1_yt),
                    },
                )?;
            }
            if lflag {
                sketch.via_array(ViaArrayParams {
                    via: v,
                    bot_layer: &ml.po,
                    top_layer: &ml.m1,
                    center: Point::new(xc - mos.sd_pitch / 2, g_m1_yc),
                    rows: 1,
                    enc1: (v.bot_enc_side, v.bot_enc_le),
                    enc2: (v.top_enc_side, v.top_enc_le),
                })?;
                sketch.rect(
                    &ml.m1,
                    None,
                    Rect {
                        p0: Point::new(xc - mos.sd_pitch / 2 - v.w / 2 - v.top_enc_side, g_m1_yb),
                        p1: Point::new(xc, m1_yt),
                    },
                )?;
            }
        }
        Ok(())
    }

    fn draw_ds_via(
        &self,
        sketch: &mut Sketch,
        mos: &MosConfig,
        od_y: Span,
        x_list: &[Int],
    ) -> LaygoResult<()> {
        let config = self.config.read().unwrap();
        let ml = &config.mos_layers;
        let v = &mos.d_via;
        let od_h = od_y.length();
        let rows = Self::checked_via_rows(v, od_h)?;
        let encx = (mos.d_conn_w - v.w) / 2;

        for &xc in x_list {
            sketch.via_array(ViaArrayParams {
                via: v,
                bot_layer: &ml.od,
                top_layer: &ml.m1,
                center: Point::new(xc, od_y.start() + od_h / 2),
                rows,
                enc1: (encx, v.bot_enc_le),
                enc2: (encx, v.top_enc_le),
            })?;
        }
        Ok(())
    }

    /// Draws a vertical wire of width `w` centered at each `xc`.
    fn draw_wires(
        &self,
        sketch: &mut Sketch,
        x_list: &[Int],
        w: Int,
        y: Span,
    ) -> LaygoResult<Vec<Rect>> {
        let config = self.config.read().unwrap();
        let m1 = config.mos_layers.m1.clone();
        drop(config);
        let mut wires = Vec::with_capacity(x_list.len());
        for &xc in x_list {
            let rect = Rect {
                p0: Point::new(xc - w / 2, y.start()),
                p1: Point::new(xc + w / 2, y.stop()),
            };
            sketch.rect(&m1, None, rect.clone())?;
            wires.push(rect);
        }
        Ok(wires)
    }
}

impl LaygoTech for PlanarTech {
    fn config(&self) -> Ptr<TechConfig> {
        Ptr::clone(&self.config)
    }

    fn row_yloc_info(
        &self,
        lch: Int,
        w: Int,
        is_sub: bool,
        opts: &RowOptions,
    ) -> LaygoResult<RowYLoc> {
        let config = self.config.read().unwrap();
        let mos = config.mos_config(lch)?;
        let mut yloc = if is_sub {
            self.sub_yloc_info(mos, w, opts)?
        } else {
            self.mos_yloc_info(mos, w)?
        };
        drop(config);

        let conn = self.conn_yloc_info(lch, yloc.od, is_sub)?;
        yloc.g_conn_y = conn.g_y;
        yloc.gb_conn_y = conn.d_y;
        yloc.ds_conn_y = conn.d_y;
        Ok(yloc)
    }

    fn conn_yloc_info(&self, lch: Int, od_y: Span, is_sub: bool) -> LaygoResult<ConnYLoc> {
        let config = self.config.read().unwrap();
        let mos = config.mos_config(lch)?;

        if is_sub {
            return Ok(ConnYLoc {
                g_y: od_y,
                d_y: od_y,
            });
        }

        let d_m1_yb = od_y.start() - mos.d_drc.bot_ext;
        let d_m1_yt = (od_y.stop() + mos.d_drc.top_ext).max(d_m1_yb + mos.d_drc.min_len);

        let g_m1_yt = d_m1_yb - mos.m1_gd_spy;
        let g_m1_yb = g_m1_yt - mos.g_drc.min_len;

        Ok(ConnYLoc {
            g_y: Span::new(g_m1_yb, g_m1_yt),
            d_y: Span::new(d_m1_yb, d_m1_yt),
        })
    }

    fn blk_od_y(&self, lch: Int, w: Int, row_od_y: Span, top_align: bool) -> LaygoResult<Span> {
        let config = self.config.read().unwrap();
        let mos = config.mos_config(lch)?;
        let od_h = round_down_to(w, mos.mos_pitch);
        if od_h <= 0 {
            return Err(LaygoError::WidthTooSmall {
                w,
                min: mos.mos_pitch,
            });
        }
        Ok(if top_align {
            Span::with_stop_and_length(row_od_y.stop(), od_h)
        } else {
            Span::with_start_and_length(row_od_y.start(), od_h)
        })
    }

    fn draw_g_connection(
        &self,
        sketch: &mut Sketch,
        lch: Int,
        od_y: Span,
        align: GateAlign,
        num_fg: usize,
    ) -> LaygoResult<Vec<Rect>> {
        let config = self.config.read().unwrap();
        let mos = config.mos_config(lch)?.clone();
        drop(config);

        let conn = self.conn_yloc_info(lch, od_y, false)?;
        let cols = Self::g_via_columns(mos.sd_pitch, align, num_fg);
        self.draw_g_via(sketch, &mos, conn.g_y.stop(), &cols)?;

        let x_list = cols.iter().map(|&(x, _, _)| x).collect::<Vec<_>>();
        self.draw_wires(sketch, &x_list, mos.g_drc.w, conn.g_y)
    }

    fn draw_ds_connection(
        &self,
        sketch: &mut Sketch,
        lch: Int,
        od_y: Span,
        columns: &[usize],
    ) -> LaygoResult<Vec<Rect>> {
        let config = self.config.read().unwrap();
        let mos = config.mos_config(lch)?.clone();
        drop(config);

        let conn = self.conn_yloc_info(lch, od_y, false)?;
        let x_list = columns
            .iter()
            .map(|&c| c as Int * mos.sd_pitch)
            .collect::<Vec<_>>();
        self.draw_ds_via(sketch, &mos, od_y, &x_list)?;
        self.draw_wires(sketch, &x_list, mos.d_drc.w, conn.d_y)
    }

    fn draw_sub_connection(
        &self,
        sketch: &mut Sketch,
        lch: Int,
        od_y: Span,
        is_sub_row: bool,
    ) -> LaygoResult<Vec<Rect>> {
        let config = self.config.read().unwrap();
        let mos = config.mos_config(lch)?.clone();
        drop(config);

        let conn = self.conn_yloc_info(lch, od_y, is_sub_row)?;

        let (first, num_col) = if is_sub_row {
            // Tap rows always hold two-finger taps.
            (0, 2)
        } else {
            (mos.sub_port_columns[0], mos.sub_port_columns.len())
        };
        let x_list = (first..=first + num_col)
            .map(|c| c as Int * mos.sd_pitch)
            .collect::<Vec<_>>();

        self.draw_ds_via(sketch, &mos, od_y, &x_list)?;
        self.draw_wires(sketch, &x_list, mos.d_drc.w, conn.d_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech() -> PlanarTech {
        PlanarTech::builtin().expect("failed to load builtin technology")
    }

    #[test]
    fn test_mos_row_stackup() {
        let tech = tech();
        let yloc = tech
            .row_yloc_info(16, 160, false, &RowOptions::default())
            .unwrap();
        // Poly bottom is half the poly spacing rule.
        assert_eq!(yloc.po.start(), 30);
        assert_eq!(yloc.od, Span::new(162, 322));
        assert_eq!(yloc.po.stop(), 352);
        assert_eq!(yloc.blk, Span::new(0, 382));
        // Gate wires land strictly below drain/source wires.
        assert_eq!(yloc.ds_conn_y, Span::new(112, 372));
        assert_eq!(yloc.g_conn_y, Span::new(-28, 72));
        assert_eq!(yloc.gb_conn_y, yloc.ds_conn_y);
        // Bottom margins measure up to the first shape on each layer.
        assert_eq!(yloc.bot_margins.po.margin, 30);
        assert_eq!(yloc.bot_margins.od.margin, 162);
        assert_eq!(yloc.top_margins.od.margin, 382 - 322);
        assert_eq!(yloc.top_margins.po.margin, 30);
    }

    macro_rules! gate_below_drain_tests {
        ($($w:expr),* $(,)?) => {
            paste::paste! { $(
                #[test]
                fn [<test_gate_below_drain_w $w>]() {
                    let tech = tech();
                    let yloc = tech
                        .row_yloc_info(16, $w, false, &RowOptions::default())
                        .unwrap();
                    assert_eq!(yloc.od.length(), $w);
                    // Gate metal stays below drain metal by the
                    // spacing rule.
                    assert!(yloc.g_conn_y.stop() + 40 <= yloc.ds_conn_y.start());
                    // Poly bottom is width-independent.
                    assert_eq!(yloc.po.start(), 30);
                }
            )* }
        };
    }

    gate_below_drain_tests!(120, 160, 200, 240, 280);

    #[test]
    fn test_mos_row_width_too_small() {
        let tech = tech();
        let err = tech
            .row_yloc_info(16, 80, false, &RowOptions::default())
            .unwrap_err();
        assert!(matches!(err, LaygoError::WidthTooSmall { .. }));
    }

    #[test]
    fn test_mos_row_width_quantization() {
        let tech = tech();
        // Widths off the device pitch quantize down.
        let yloc = tech
            .row_yloc_info(16, 150, false, &RowOptions::default())
            .unwrap();
        assert_eq!(yloc.od.length(), 120);
        // Widths below one pitch are rejected, not clamped.
        let err = tech
            .row_yloc_info(16, 30, false, &RowOptions::default())
            .unwrap_err();
        assert!(matches!(err, LaygoError::WidthTooSmall { .. }));
    }

    #[test]
    fn test_sub_row_stackup() {
        let tech = tech();
        let yloc = tech
            .row_yloc_info(16, 160, true, &RowOptions::default())
            .unwrap();
        // Height is quantized and diffusion recentered.
        assert_eq!(yloc.blk, Span::new(0, 240));
        assert_eq!(yloc.od, Span::new(40, 200));
        // Taps carry no poly.
        assert_eq!(yloc.po.length(), 0);
        // Tap wires cover exactly the diffusion.
        assert_eq!(yloc.ds_conn_y, yloc.od);
        assert_eq!(yloc.g_conn_y, yloc.od);
        assert_eq!(yloc.top_margins.po.margin, 240);
        assert_eq!(yloc.bot_margins.m1.margin, 40);
    }

    #[test]
    fn test_sub_row_deep_nwell() {
        let tech = tech();
        let opts = RowOptions {
            dnw_mode: true,
            ..Default::default()
        };
        let yloc = tech.row_yloc_info(16, 160, true, &opts).unwrap();
        // Implant enclosure grows to cover the deep nwell overlap.
        assert_eq!(yloc.blk, Span::new(0, 320));
        assert_eq!(yloc.od, Span::new(80, 240));
    }

    #[test]
    fn test_sub_row_block_pitch() {
        let tech = tech();
        let opts = RowOptions {
            blk_pitch: 100,
            ..Default::default()
        };
        let yloc = tech.row_yloc_info(16, 160, true, &opts).unwrap();
        // Height lands on the lcm of the row pitch and device pitch.
        assert_eq!(yloc.blk.stop() % 200, 0);
        assert_eq!(yloc.od.length(), 160);
        assert_eq!(yloc.od.center(), yloc.blk.center());
    }

    #[test]
    fn test_conn_yloc() {
        let tech = tech();
        let conn = tech.conn_yloc_info(16, Span::new(162, 322), false).unwrap();
        assert_eq!(conn.d_y, Span::new(112, 372));
        assert_eq!(conn.g_y, Span::new(-28, 72));
        // Short diffusion: drain wire is stretched to its minimum
        // length instead.
        let conn = tech.conn_yloc_info(16, Span::new(0, 10), false).unwrap();
        assert_eq!(conn.d_y.length(), 110);
    }

    #[test]
    fn test_blk_od_quantization() {
        let tech = tech();
        let row_od = Span::new(162, 322);
        assert_eq!(
            tech.blk_od_y(16, 150, row_od, false).unwrap(),
            Span::new(162, 282)
        );
        assert_eq!(
            tech.blk_od_y(16, 160, row_od, true).unwrap(),
            Span::new(162, 322)
        );
        assert!(tech.blk_od_y(16, 30, row_od, false).is_err());
    }

    #[test]
    fn test_gate_via_columns() {
        // Drain-aligned gates share one wire over column 1.
        assert_eq!(
            PlanarTech::g_via_columns(90, GateAlign::Drain, 2),
            vec![(90, true, true)]
        );
        assert_eq!(
            PlanarTech::g_via_columns(90, GateAlign::Drain, 1),
            vec![(90, false, true)]
        );
        // Source-aligned two-finger devices get a wire per gate.
        assert_eq!(
            PlanarTech::g_via_columns(90, GateAlign::Source, 2),
            vec![(0, true, false), (180, false, true)]
        );
        assert_eq!(
            PlanarTech::g_via_columns(90, GateAlign::Source, 1),
            vec![(0, true, false)]
        );
    }
}
