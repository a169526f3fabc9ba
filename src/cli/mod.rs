use std::fs::{canonicalize, File};
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use layout21::raw::Int;
use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, LaygoBlock};
use crate::cli::args::Args;
use crate::config::TechConfig;
use crate::ext::EdgeInfo;
use crate::paths::{out_gds, out_json};
use crate::row::{Intent, LaygoRow, MosType, RowOptions, RowParams};
use crate::space::LaygoSpace;
use crate::tech::planar::PlanarTech;
use crate::{Pdk, Result};

pub mod args;

pub const BANNER: &str = r"
 __       __   __  __  ___  ____  ___  ___
|  |     /  \ |  \/  |/ __|/ __ \|__ \|__ \
|  |__  / /\ \ \    /| |_ | |  | |  ) |  ) |
|_____|/_/  \_\|__|  \____|\____/ /____|____|

LAYGO22 v0.1
";

/// One generation run: a row plus the primitives to emit from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellConfig {
    pub name: String,
    /// Channel length, in layout units.
    pub lch: Int,
    /// Technology configuration file. Defaults to the built-in
    /// planar technology.
    #[serde(default)]
    pub tech: Option<PathBuf>,
    pub row: RowSpec,
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
    /// Widths (in columns) of space fillers to emit.
    #[serde(default)]
    pub spaces: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSpec {
    pub mos_type: MosType,
    pub w_max: Int,
    pub w_sub: Int,
    #[serde(default)]
    pub threshold: Intent,
    #[serde(default)]
    pub dnw: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    pub kind: String,
    pub w: Int,
}

pub fn parse_cell_config(path: impl AsRef<std::path::Path>) -> Result<CellConfig> {
    let contents = std::fs::read_to_string(path)?;
    let data = toml::from_str(&contents)?;
    Ok(data)
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    let config_path = canonicalize(&args.config)?;

    println!("{BANNER}");

    println!("Reading configuration file...\n");
    let config = parse_cell_config(&config_path)?;

    println!("Configuration file: {:?}", &config_path);
    println!("Row parameters:");
    println!("\tChannel length: {}", config.lch);
    println!("\tRow type: {}", config.row.mos_type);
    println!("\tMax width: {}", config.row.w_max);
    println!("\tThreshold: {}", config.row.threshold);

    let pdk = match &config.tech {
        Some(path) => Pdk::new(TechConfig::load(path)?)?,
        None => Pdk::planar()?,
    };
    let tech = PlanarTech::new(pdk.config());

    let row_params = RowParams::builder()
        .lch(config.lch)
        .w_max(config.row.w_max)
        .w_sub(config.row.w_sub)
        .mos_type(config.row.mos_type)
        .threshold(config.row.threshold.clone())
        .options(RowOptions {
            dnw_mode: config.row.dnw,
            ..Default::default()
        })
        .build()
        .map_err(|e| crate::anyhow!("invalid row parameters: {e}"))?;
    let row = LaygoRow::build(&tech, &row_params)?;
    log::info!("solved row {} (height {})", row.name, row.height());

    let work_dir = if let Some(output_dir) = args.output_dir {
        output_dir
    } else {
        PathBuf::from(&config.name)
    };
    std::fs::create_dir_all(&work_dir)?;
    let work_dir = canonicalize(work_dir)?;

    for spec in config.blocks.iter() {
        let kind: BlockKind = spec.kind.parse()?;
        let block = LaygoBlock::build(&tech, kind, spec.w, &row)?;
        let cell = pdk.draw_block(&tech, &row, &block)?;
        let cell_name = cell.read().unwrap().name.clone();
        let gds_path = out_gds(&work_dir, &cell_name);
        pdk.cell_to_gds(cell, &gds_path)?;
        println!("Wrote {:?}", gds_path);
    }

    for &fg in config.spaces.iter() {
        let edge = EdgeInfo::new(None);
        let space = LaygoSpace::build(&tech, &row, fg, &edge, &edge)?;
        let cell = pdk.draw_space(&tech, &row, &space)?;
        let cell_name = cell.read().unwrap().name.clone();
        let gds_path = out_gds(&work_dir, &cell_name);
        pdk.cell_to_gds(cell, &gds_path)?;
        println!("Wrote {:?}", gds_path);
    }

    if args.report {
        let path = out_json(&work_dir, &format!("{}_row", config.name));
        let f = File::create(&path)?;
        serde_json::to_writer_pretty(f, &row)?;
        println!("Wrote {:?}", path);
    }

    println!("{}", "DONE".green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_cell_config() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
name = "inv_row"
lch = 16
spaces = [6]

[row]
mos_type = "nch"
w_max = 160
w_sub = 160
threshold = "lvt"

[[blocks]]
kind = "fg2d"
w = 160

[[blocks]]
kind = "sub"
w = 160
"#
        )
        .unwrap();
        let config = parse_cell_config(f.path()).unwrap();
        assert_eq!(config.name, "inv_row");
        assert_eq!(config.row.mos_type, MosType::Nch);
        assert_eq!(config.row.threshold, Intent::Lvt);
        assert!(config.tech.is_none());
        assert_eq!(config.blocks.len(), 2);
        assert_eq!(config.spaces, vec![6]);
        assert!(!config.row.dnw);
    }
}
