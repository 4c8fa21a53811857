//! PDB reference structures
//!
//! Positions come from the ATOM/HETATM coordinates, alignment weights from
//! the occupancy column and displacement weights from the B-factor column.

mod parser;
mod records;

pub use parser::PdbReader;
pub use records::AtomRecord;

use std::io::Read;
use std::path::Path;

use rmsd_algos::{AlignmentMethod, Rmsd};

use crate::error::IoResult;

/// Coordinates and per-atom weights of one structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbFrame {
    pub positions: Vec<[f64; 3]>,
    /// Occupancy column, used as alignment weights
    pub occupancy: Vec<f64>,
    /// B-factor column, used as displacement weights
    pub beta: Vec<f64>,
}

impl PdbFrame {
    pub fn from_records(records: &[AtomRecord]) -> Self {
        PdbFrame {
            positions: records.iter().map(|r| r.position).collect(),
            occupancy: records.iter().map(|r| r.occupancy).collect(),
            beta: records.iter().map(|r| r.b_factor).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Build a model with this frame as reference.
    ///
    /// Occupancy and B-factor are normalized; the reference centroid is
    /// taken under the occupancy weights.
    pub fn to_rmsd(&self, method: AlignmentMethod) -> IoResult<Rmsd> {
        let mut rmsd = Rmsd::new();
        rmsd.set_reference(&self.positions)?;
        rmsd.set_align(&self.occupancy, true, true)?;
        rmsd.set_displace(&self.beta, true)?;
        rmsd.set_method(method);
        Ok(rmsd)
    }

    /// [`to_rmsd`](Self::to_rmsd) with the method given by name
    pub fn to_rmsd_named(&self, method: &str) -> IoResult<Rmsd> {
        self.to_rmsd(method.parse()?)
    }
}

/// Read a PDB file from a path (plain or gzip-compressed)
pub fn read_pdb(path: &Path) -> IoResult<PdbFrame> {
    let file = crate::compress::open_file(path)?;
    let mut reader = PdbReader::new(file);
    reader.read()
}

/// Read a PDB file from a string
pub fn read_pdb_str(content: &str) -> IoResult<PdbFrame> {
    let mut reader = PdbReader::new(content.as_bytes());
    reader.read()
}

/// Read a PDB file from a reader
pub fn read_pdb_from<R: Read>(reader: R) -> IoResult<PdbFrame> {
    let mut reader = PdbReader::new(reader);
    reader.read()
}
