//! PDB record types

/// Parsed ATOM or HETATM record, reduced to what superposition needs
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    /// Coordinates (Angstroms)
    pub position: [f64; 3],
    /// Occupancy, used as alignment weight
    pub occupancy: f64,
    /// Temperature factor, used as displacement weight
    pub b_factor: f64,
}

impl Default for AtomRecord {
    fn default() -> Self {
        AtomRecord {
            position: [0.0; 3],
            occupancy: 1.0,
            b_factor: 0.0,
        }
    }
}
