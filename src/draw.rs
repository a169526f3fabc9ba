//! Geometry emission.
//!
//! Converts solved block descriptors into [`Cell`]s: diffusion, poly
//! fingers, implants, contact stacks, wires, and the port abstract.

use layout21::raw::{
    Abstract, AbstractPort, Cell, Element, Int, LayerKey, LayerPurpose, Layers, Layout, Point,
    Rect, Shape,
};
use layout21::utils::Ptr;

use crate::block::{BlockKind, BlockLayout, LaygoBlock};
use crate::config::ViaConfig;
use crate::row::LaygoRow;
use crate::space::LaygoSpace;
use crate::tech::LaygoTech;
use crate::{LaygoError, LaygoResult, Pdk};

/// Scratch surface the technology plugin draws on.
pub struct Sketch<'a> {
    layers: &'a Layers,
    elems: &'a mut Vec<Element>,
}

/// A via stack: a vertical column of cuts with enclosure rectangles
/// on the connected layers. Enclosures are (side, line-end) pairs.
pub struct ViaArrayParams<'a> {
    pub via: &'a ViaConfig,
    pub bot_layer: &'a str,
    pub top_layer: &'a str,
    pub center: Point,
    pub rows: Int,
    pub enc1: (Int, Int),
    pub enc2: (Int, Int),
}

impl<'a> Sketch<'a> {
    pub fn new(layers: &'a Layers, elems: &'a mut Vec<Element>) -> Self {
        Self { layers, elems }
    }

    fn layer_key(&self, name: &str) -> LaygoResult<LayerKey> {
        self.layers
            .keyname(name)
            .ok_or_else(|| LaygoError::UnknownLayer(name.to_string()))
    }

    pub fn rect(&mut self, layer: &str, net: Option<&str>, rect: Rect) -> LaygoResult<()> {
        let layer = self.layer_key(layer)?;
        self.elems.push(Element {
            net: net.map(String::from),
            layer,
            purpose: LayerPurpose::Drawing,
            inner: Shape::Rect(rect),
        });
        Ok(())
    }

    pub fn via_array(&mut self, p: ViaArrayParams) -> LaygoResult<()> {
        let v = p.via;
        let cut = self.layer_key(&v.cut_layer)?;
        let arr_h = p.rows * (v.h + v.sp) - v.sp;
        let x0 = p.center.x - v.w / 2;
        let y0 = p.center.y - arr_h / 2;

        for i in 0..p.rows {
            let yb = y0 + i * (v.h + v.sp);
            self.elems.push(Element {
                net: None,
                layer: cut,
                purpose: LayerPurpose::Drawing,
                inner: Shape::Rect(Rect {
                    p0: Point::new(x0, yb),
                    p1: Point::new(x0 + v.w, yb + v.h),
                }),
            });
        }

        for (layer, (encx, ency)) in [(p.bot_layer, p.enc1), (p.top_layer, p.enc2)] {
            let rect = Rect {
                p0: Point::new(x0 - encx, y0 - ency),
                p1: Point::new(x0 + v.w + encx, y0 + arr_h + ency),
            };
            self.rect(layer, None, rect)?;
        }
        Ok(())
    }
}

impl Pdk {
    /// Emits a primitive block as a standalone cell.
    pub fn draw_block<T: LaygoTech>(
        &self,
        tech: &T,
        row: &LaygoRow,
        block: &LaygoBlock,
    ) -> crate::Result<Ptr<Cell>> {
        let name = format!("laygo_{}_{}", block.kind, row.name);
        let layers = self.layers();
        let layers = layers.read().unwrap();

        let mut elems = Vec::new();
        let mut sketch = Sketch::new(&layers, &mut elems);
        self.draw_block_geometry(&mut sketch, &block.layout)?;

        let od_y = block.layout.row_info_list[0].od_y;
        let lch = block.layout.lch;
        let mut ports = Vec::new();
        match block.kind {
            BlockKind::Sub => {
                let wires =
                    tech.draw_sub_connection(&mut sketch, lch, od_y, block.layout.is_sub_row)?;
                let supply = block.layout.sub_type.supply_name();
                let m1 = sketch.layer_key(&self.mos_layers().m1)?;
                // The same wires serve as both source and drain rails.
                for suffix in ["", "_s", "_d"] {
                    let mut port = AbstractPort::new(format!("{}{}", supply, suffix));
                    port.shapes
                        .insert(m1, wires.iter().map(|r| Shape::Rect(r.clone())).collect());
                    ports.push(port);
                }
            }
            kind => {
                let align = kind.gate_align().ok_or(LaygoError::BadBlockKind(
                    kind.to_string(),
                ))?;
                let g_wires = tech.draw_g_connection(
                    &mut sketch,
                    lch,
                    od_y,
                    align,
                    kind.num_fingers(),
                )?;
                let d_wires =
                    tech.draw_ds_connection(&mut sketch, lch, od_y, kind.drain_columns())?;
                let s_wires =
                    tech.draw_ds_connection(&mut sketch, lch, od_y, kind.source_columns())?;
                let m1 = sketch.layer_key(&self.mos_layers().m1)?;
                for (pname, wires) in [("g", g_wires), ("d", d_wires), ("s", s_wires)] {
                    let mut port = AbstractPort::new(pname);
                    port.shapes
                        .insert(m1, wires.iter().map(|r| Shape::Rect(r.clone())).collect());
                    ports.push(port);
                    if wires.len() > 1 {
                        for (idx, wire) in wires.iter().enumerate() {
                            let mut port = AbstractPort::new(format!("{}{}", pname, idx));
                            port.shapes.insert(m1, vec![Shape::Rect(wire.clone())]);
                            ports.push(port);
                        }
                    }
                }
            }
        }
        let outline = self.block_outline(&sketch, &block.layout)?;
        drop(sketch);

        Ok(Self::assemble_cell(name, outline, ports, elems))
    }

    /// Emits a space filler as a standalone cell. Fillers draw no
    /// contacts and publish no ports.
    pub fn draw_space<T: LaygoTech>(
        &self,
        _tech: &T,
        row: &LaygoRow,
        space: &LaygoSpace,
    ) -> crate::Result<Ptr<Cell>> {
        let name = format!("laygo_space{}_{}", space.layout.fg, row.name);
        let layers = self.layers();
        let layers = layers.read().unwrap();

        let mut elems = Vec::new();
        let mut sketch = Sketch::new(&layers, &mut elems);
        self.draw_block_geometry(&mut sketch, &space.layout)?;
        let outline = self.block_outline(&sketch, &space.layout)?;
        drop(sketch);

        Ok(Self::assemble_cell(name, outline, Vec::new(), elems))
    }

    /// Diffusion, poly fingers, and blanket implant layers.
    fn draw_block_geometry(&self, sketch: &mut Sketch, layout: &BlockLayout) -> crate::Result<()> {
        let ml = self.mos_layers();
        let sd_pitch = layout.sd_pitch;
        let width = layout.fg as Int * sd_pitch;

        for info in layout.row_info_list.iter() {
            if layout.draw_od {
                let rect = Rect {
                    p0: Point::new(info.od_x.0 as Int * sd_pitch, info.od_y.start()),
                    p1: Point::new(info.od_x.1 as Int * sd_pitch, info.od_y.stop()),
                };
                sketch.rect(&ml.od, None, rect)?;
            }
            if info.po_y.length() > 0 {
                // One poly finger between each pair of adjacent
                // source/drain columns.
                for f in 0..layout.fg {
                    let xc = f as Int * sd_pitch + sd_pitch / 2;
                    let rect = Rect {
                        p0: Point::new(xc - layout.lch / 2, info.po_y.start()),
                        p1: Point::new(xc + layout.lch / 2, info.po_y.stop()),
                    };
                    sketch.rect(&ml.po, None, rect)?;
                }
            }
        }

        for lr in layout.lay_rects.iter() {
            let rect = Rect {
                p0: Point::new(0, lr.y.start()),
                p1: Point::new(width, lr.y.stop()),
            };
            sketch.rect(&lr.layer, None, rect)?;
        }
        Ok(())
    }

    fn block_outline(&self, sketch: &Sketch, layout: &BlockLayout) -> crate::Result<Element> {
        let boundary = sketch.layer_key(&self.mos_layers().boundary)?;
        let width = layout.fg as Int * layout.sd_pitch;
        Ok(Element {
            net: None,
            layer: boundary,
            purpose: LayerPurpose::Outline,
            inner: Shape::Rect(Rect {
                p0: Point::new(0, layout.arr_y.start()),
                p1: Point::new(width, layout.arr_y.stop()),
            }),
        })
    }

    fn assemble_cell(
        name: String,
        outline: Element,
        ports: Vec<AbstractPort>,
        mut elems: Vec<Element>,
    ) -> Ptr<Cell> {
        elems.push(outline.clone());
        let layout = Layout {
            name: name.clone(),
            insts: vec![],
            elems,
            annotations: vec![],
        };
        let mut abs = Abstract::new(&name, outline);
        abs.ports = ports;
        Ptr::new(Cell {
            name,
            abs: Some(abs),
            layout: Some(layout),
        })
    }

    fn mos_layers(&self) -> crate::config::MosLayerTable {
        self.config.read().unwrap().mos_layers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GateAlign;
    use crate::ext::EdgeInfo;
    use crate::tests::test_work_dir;
    use crate::row::{MosType, RowParams};
    use crate::tech::planar::PlanarTech;

    fn setup() -> (Pdk, PlanarTech, LaygoRow) {
        let pdk = Pdk::planar().expect("failed to load planar pdk");
        let tech = PlanarTech::new(pdk.config());
        let params = RowParams::builder()
            .lch(16)
            .w_max(160)
            .w_sub(160)
            .mos_type(MosType::Nch)
            .build()
            .unwrap();
        let row = LaygoRow::build(&tech, &params).unwrap();
        (pdk, tech, row)
    }

    #[test]
    fn test_draw_fg2_ports() {
        let (pdk, tech, row) = setup();
        let blk =
            LaygoBlock::build(&tech, BlockKind::Fg2(GateAlign::Drain), 160, &row).unwrap();
        let cell = pdk.draw_block(&tech, &row, &blk).unwrap();
        let cell = cell.read().unwrap();
        let abs = cell.abs.as_ref().unwrap();
        let names: Vec<&str> = abs.ports.iter().map(|p| p.net.as_str()).collect();
        // Two source wires get indexed aliases; single wires do not.
        assert!(names.contains(&"g"));
        assert!(names.contains(&"d"));
        assert!(names.contains(&"s"));
        assert!(names.contains(&"s0"));
        assert!(names.contains(&"s1"));
        assert!(!names.contains(&"d0"));
        assert!(!cell.layout.as_ref().unwrap().elems.is_empty());
    }

    #[test]
    fn test_draw_sub_supply_aliases() {
        let (pdk, tech, _) = setup();
        let params = RowParams::builder()
            .lch(16)
            .w_max(160)
            .w_sub(160)
            .mos_type(MosType::Ntap)
            .build()
            .unwrap();
        let row = LaygoRow::build(&tech, &params).unwrap();
        let blk = LaygoBlock::build(&tech, BlockKind::Sub, 160, &row).unwrap();
        let cell = pdk.draw_block(&tech, &row, &blk).unwrap();
        let cell = cell.read().unwrap();
        let abs = cell.abs.as_ref().unwrap();
        let names: Vec<&str> = abs.ports.iter().map(|p| p.net.as_str()).collect();
        assert_eq!(names, vec!["VDD", "VDD_s", "VDD_d"]);
        // All aliases carry the same wires.
        let shapes: Vec<usize> = abs
            .ports
            .iter()
            .map(|p| p.shapes.values().map(Vec::len).sum())
            .collect();
        assert_eq!(shapes, vec![3, 3, 3]);
    }

    #[test]
    fn test_draw_space_has_no_ports() {
        let (pdk, tech, row) = setup();
        let edge = EdgeInfo::new(None);
        let space = crate::space::LaygoSpace::build(&tech, &row, 6, &edge, &edge).unwrap();
        let cell = pdk.draw_space(&tech, &row, &space).unwrap();
        let cell = cell.read().unwrap();
        assert!(cell.abs.as_ref().unwrap().ports.is_empty());
        // Dummy diffusion and six poly fingers are drawn.
        let elems = &cell.layout.as_ref().unwrap().elems;
        assert!(elems.len() > 6);
    }

    #[test]
    fn test_block_to_gds() {
        let (pdk, tech, row) = setup();
        let blk =
            LaygoBlock::build(&tech, BlockKind::Stack2(GateAlign::Source), 160, &row).unwrap();
        let cell = pdk.draw_block(&tech, &row, &blk).unwrap();
        let work_dir = test_work_dir("test_block_to_gds");
        std::fs::create_dir_all(&work_dir).unwrap();
        let path = work_dir.join("stack2s.gds");
        pdk.cell_to_gds(cell, &path).unwrap();
        assert!(path.exists());
    }
}
