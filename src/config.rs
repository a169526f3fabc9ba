//! Process technology configuration.
//!
//! All transistor-row geometry is driven by per-channel-length rule
//! tables loaded from TOML. Dimensions are in layout database units.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use layout21::raw::{Int, LayerPurpose, Layers, Units};
use serde::{Deserialize, Serialize};

use crate::row::{Intent, MosType};
use crate::{LaygoError, LaygoResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechConfig {
    /// Name of the process technology.
    pub tech: String,
    /// Manufacturing grid, in database units.
    pub grid: Int,
    /// Database units.
    pub units: Units,
    /// GDS layer mapping, keyed by layer name.
    layers: HashMap<String, LayerConfig>,
    /// Names of the layers used when drawing transistor rows.
    pub mos_layers: MosLayerTable,
    /// Implant layers drawn over a row, keyed by transistor/tap type.
    implants: HashMap<String, Vec<String>>,
    /// Threshold-adjust layers, keyed by threshold flavor.
    thresholds: HashMap<String, Vec<String>>,
    /// Per-channel-length rule tables.
    pub mos: Vec<MosConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub layernum: i16,
    pub purposes: Vec<PurposeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurposeConfig {
    pub purpose: String,
    pub datatype: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosLayerTable {
    /// Diffusion.
    pub od: String,
    /// Polysilicon gate.
    pub po: String,
    /// First routing metal.
    pub m1: String,
    /// Placement boundary.
    pub boundary: String,
}

/// Geometry rules for a single channel length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosConfig {
    /// Channel length.
    pub lch: Int,
    /// Vertical quantization unit for block heights and widths.
    pub mos_pitch: Int,
    /// Source/drain column pitch.
    pub sd_pitch: Int,
    /// Minimum diffusion vertical spacing.
    pub od_spy: Int,
    /// Minimum diffusion horizontal spacing.
    pub od_spx: Int,
    /// Minimum poly vertical spacing.
    pub po_spy: Int,
    /// Poly extension past diffusion, vertically.
    pub po_od_exty: Int,
    /// Minimum spacing between gate metal and drain/source structures.
    pub m1_gd_spy: Int,
    /// Minimum drain/source metal length in substrate rows.
    pub md_min_len: Int,
    /// Implant enclosure of diffusion, vertically.
    pub imp_od_ency: Int,
    /// Minimum implant height.
    pub imp_min_h: Int,
    /// Nwell overlap of the deep nwell ring.
    pub nw_dnw_ovl: Int,
    /// Nwell extension past deep nwell.
    pub nw_dnw_ext: Int,
    /// Line-end enclosure of substrate contacts by metal.
    pub sub_m1_enc_le: Int,
    /// Width of drain/source via enclosure metal.
    pub d_conn_w: Int,
    /// Number of source/drain columns occupied by a substrate tap
    /// embedded in a transistor row.
    pub sub_columns: usize,
    /// Columns of the embedded tap that carry vertical supply wires.
    pub sub_port_columns: Vec<usize>,
    /// Maximum diffusion fill width, if the process restricts it.
    pub od_fill_w_max: Option<Int>,
    /// Gate contact rules.
    pub g_via: ViaConfig,
    /// Drain/source contact rules.
    pub d_via: ViaConfig,
    /// Gate-connection metal rules.
    pub g_drc: ConnDrcConfig,
    /// Drain/source-connection metal rules.
    pub d_drc: ConnDrcConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaConfig {
    /// Cut layer name.
    pub cut_layer: String,
    /// Cut width.
    pub w: Int,
    /// Cut height.
    pub h: Int,
    /// Minimum cut spacing.
    pub sp: Int,
    /// Line-end enclosure by the bottom layer.
    pub bot_enc_le: Int,
    /// Line-end enclosure by the top layer.
    pub top_enc_le: Int,
    /// Side enclosure by the bottom layer.
    pub bot_enc_side: Int,
    /// Side enclosure by the top layer.
    pub top_enc_side: Int,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnDrcConfig {
    /// Wire width.
    pub w: Int,
    /// Minimum wire length.
    pub min_len: Int,
    /// Minimum line-end spacing.
    pub sp_le: Int,
    /// Extension of the wire past the top of diffusion.
    #[serde(default)]
    pub top_ext: Int,
    /// Extension of the wire past the bottom of diffusion.
    #[serde(default)]
    pub bot_ext: Int,
}

impl TechConfig {
    pub fn from_toml(s: &str) -> crate::Result<Self> {
        let cfg = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Retrieves the rule table for the given channel length.
    pub fn mos_config(&self, lch: Int) -> LaygoResult<&MosConfig> {
        self.mos
            .iter()
            .find(|m| m.lch == lch)
            .ok_or(LaygoError::UnknownChannelLength(lch))
    }

    pub fn layer(&self, name: &str) -> LaygoResult<&LayerConfig> {
        self.layers
            .get(name)
            .ok_or_else(|| LaygoError::UnknownLayer(name.to_string()))
    }

    /// Implant and threshold layers drawn over a row of the given type.
    pub fn mos_layer_names(&self, mos_type: MosType, thres: &Intent) -> LaygoResult<Vec<String>> {
        let key = mos_type.to_string();
        let mut names = self
            .implants
            .get(&key)
            .ok_or(LaygoError::UnknownLayer(key))?
            .clone();
        if let Some(extra) = self.thresholds.get(&thres.to_string()) {
            names.extend(extra.iter().cloned());
        }
        Ok(names)
    }
}

/// Builds a [`Layers`] database from the technology config.
pub fn get_layers(config: &TechConfig) -> LaygoResult<Layers> {
    let mut layers = Layers::default();
    for (name, lconf) in config.layers.iter() {
        let mut layer = layout21::raw::Layer::new(lconf.layernum, name);
        for p in lconf.purposes.iter() {
            let purpose = match p.purpose.as_str() {
                "drawing" => LayerPurpose::Drawing,
                "pin" => LayerPurpose::Pin,
                "label" => LayerPurpose::Label,
                "obstruction" => LayerPurpose::Obstruction,
                "outline" => LayerPurpose::Outline,
                other => LayerPurpose::Named(other.to_string(), p.datatype),
            };
            layer = layer.add_pairs(&[(p.datatype, purpose)])?;
        }
        layers.add(layer);
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::planar::planar_tech_config;

    #[test]
    fn test_parse_planar_config() {
        let cfg = planar_tech_config().expect("failed to parse technology config");
        assert_eq!(cfg.tech, "planar");
        let mos = cfg.mos_config(16).unwrap();
        assert_eq!(mos.sd_pitch, 90);
        assert_eq!(mos.mos_pitch, 40);
        assert_eq!(mos.sub_port_columns, vec![2, 3]);
        assert!(mos.od_fill_w_max.is_none());
    }

    #[test]
    fn test_unknown_channel_length() {
        let cfg = planar_tech_config().unwrap();
        let err = cfg.mos_config(17).unwrap_err();
        assert!(matches!(err, LaygoError::UnknownChannelLength(17)));
    }

    #[test]
    fn test_mos_layer_names() {
        let cfg = planar_tech_config().unwrap();
        let names = cfg
            .mos_layer_names(MosType::Pch, &Intent::Lvt)
            .unwrap();
        assert!(names.contains(&"psdm".to_string()));
        assert!(names.contains(&"nwell".to_string()));
        assert!(names.contains(&"lvt".to_string()));
        let names = cfg.mos_layer_names(MosType::Ptap, &Intent::Svt).unwrap();
        assert_eq!(names, vec!["psdm".to_string()]);
    }

    #[test]
    fn test_get_layers() {
        let cfg = planar_tech_config().unwrap();
        let layers = get_layers(&cfg).unwrap();
        assert!(layers.keyname("m1").is_some());
        assert!(layers.keyname("od").is_some());
        assert!(layers.keyname("not_a_layer").is_none());
    }
}
