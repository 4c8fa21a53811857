//! Reference structure input for rmsd-algos
//!
//! Reads a PDB structure (optionally gzip-compressed) and turns it into a
//! configured [`rmsd_algos::Rmsd`] model: coordinates become the reference,
//! occupancy the alignment weights and B-factor the displacement weights.
//!
//! # Quick Start
//!
//! ```no_run
//! use rmsd_algos::AlignmentMethod;
//! use std::path::Path;
//!
//! let frame = rmsd_io::read_pdb(Path::new("reference.pdb.gz")).unwrap();
//! let rmsd = frame.to_rmsd(AlignmentMethod::Optimal).unwrap();
//! let distance = rmsd.calculate(&frame.positions, false).unwrap();
//! ```

pub mod compress;
pub mod error;
pub mod pdb;

pub use error::{IoError, IoResult};
pub use pdb::{read_pdb, read_pdb_from, read_pdb_str, PdbFrame, PdbReader};
