//! Transistor-row primitive layout generators for planar processes.
//!
//! Rows of uniform height are solved from design rules, then
//! populated with primitive blocks (single transistors, parallel and
//! stacked pairs, substrate taps, space fillers) on a shared
//! source/drain column grid. Solved blocks are emitted as GDS cells.

use std::path::Path;

pub use anyhow::{anyhow, Result};
use layout21::raw::{Cell, Int, Layers, LayoutError, Library};
use layout21::utils::Ptr;

use crate::config::TechConfig;

pub mod block;
pub mod cli;
pub mod config;
pub mod draw;
pub mod ext;
pub mod geometry;
pub mod paths;
pub mod row;
pub mod space;
pub mod tech;

pub const BUILD_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/build");

#[derive(Debug, thiserror::Error)]
pub enum LaygoError {
    #[error("no rules for channel length {0}")]
    UnknownChannelLength(Int),
    #[error("device width {w} too small; minimum is {min}")]
    WidthTooSmall { w: Int, min: Int },
    #[error("invalid {what}: {value}")]
    BadHeight { what: &'static str, value: Int },
    #[error("unknown block kind: {0}")]
    BadBlockKind(String),
    #[error("imp_min_g and imp_min_d cannot both be set")]
    ImplantFlagConflict,
    #[error("substrate tap needs at least 4 columns; rules provide {0}")]
    TooFewSubColumns(usize),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("unknown layer: {0}")]
    UnknownLayer(String),
    #[error("error generating layout: {0}")]
    Layout(#[from] LayoutError),
}

pub type LaygoResult<T> = std::result::Result<T, LaygoError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pdk {
    pub config: Ptr<TechConfig>,
    pub layers: Ptr<Layers>,
}

impl Pdk {
    pub fn new(config: TechConfig) -> LaygoResult<Self> {
        let layers = Ptr::new(config::get_layers(&config)?);
        let config = Ptr::new(config);
        Ok(Self { config, layers })
    }

    /// A [`Pdk`] backed by the built-in planar technology.
    pub fn planar() -> Result<Self> {
        Ok(Self::new(tech::planar::planar_tech_config()?)?)
    }

    #[inline]
    pub fn config(&self) -> Ptr<TechConfig> {
        Ptr::clone(&self.config)
    }

    #[inline]
    pub fn layers(&self) -> Ptr<Layers> {
        Ptr::clone(&self.layers)
    }

    pub fn cell_to_gds(&self, cell: Ptr<Cell>, path: impl AsRef<Path>) -> Result<()> {
        let cell_name = {
            let cell = cell.read().unwrap();
            cell.name.to_owned()
        };
        let mut lib = Library::new(&cell_name, self.config.read().unwrap().units);
        lib.layers = self.layers();
        lib.cells.push(cell);
        let gds = lib.to_gds()?;
        gds.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use std::path::PathBuf;

    use super::BUILD_PATH;

    pub(crate) fn test_work_dir(name: &str) -> PathBuf {
        PathBuf::from(BUILD_PATH).join(name)
    }
}
