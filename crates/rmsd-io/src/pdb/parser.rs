//! PDB file parser
//!
//! Reads ATOM/HETATM records from fixed-width PDB text. Numeric fields are
//! parsed with nom combinators so a malformed column is reported with its
//! line number instead of being silently zeroed.

use std::io::{BufRead, BufReader, Read};
use std::ops::Range;

use log::debug;
use nom::character::complete::space0;
use nom::combinator::all_consuming;
use nom::number::complete::double;
use nom::sequence::delimited;
use nom::IResult;

use crate::error::{IoError, IoResult};

use super::records::AtomRecord;
use super::PdbFrame;

// Fixed column positions (0-indexed, end exclusive)
const X: Range<usize> = 30..38;
const Y: Range<usize> = 38..46;
const Z: Range<usize> = 46..54;
const OCCUPANCY: Range<usize> = 54..60;
const B_FACTOR: Range<usize> = 60..66;

/// PDB file reader
pub struct PdbReader<R> {
    reader: BufReader<R>,
    line_number: usize,
}

impl<R: Read> PdbReader<R> {
    /// Create a new PDB reader
    pub fn new(reader: R) -> Self {
        PdbReader {
            reader: BufReader::new(reader),
            line_number: 0,
        }
    }

    /// Read a single line from the file
    fn read_line(&mut self) -> IoResult<Option<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                self.line_number += 1;
                Ok(Some(line))
            }
            Err(e) => Err(IoError::Io(e)),
        }
    }

    /// Read atom records up to `END`, the first `ENDMDL`, or end of input
    pub fn read_atoms(&mut self) -> IoResult<Vec<AtomRecord>> {
        let mut atoms = Vec::new();

        while let Some(line) = self.read_line()? {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            let record_type = line.get(0..6).unwrap_or(line).trim_end();
            match record_type {
                "ATOM" | "HETATM" => {
                    let record = parse_atom_record(line)
                        .map_err(|message| IoError::parse(self.line_number, message))?;
                    atoms.push(record);
                }
                "END" | "ENDMDL" => break,
                other => {
                    debug!("Skipping {} record at line {}", other, self.line_number);
                }
            }
        }

        Ok(atoms)
    }

    /// Read the first model into a frame
    pub fn read(&mut self) -> IoResult<PdbFrame> {
        let atoms = self.read_atoms()?;
        if atoms.is_empty() {
            return Err(IoError::EmptyFile);
        }
        debug!("Read {} atoms in {} lines", atoms.len(), self.line_number);
        Ok(PdbFrame::from_records(&atoms))
    }
}

/// A fixed-width field, clipped to the line; `None` when absent or blank
fn field(line: &str, columns: Range<usize>) -> Option<&str> {
    let end = columns.end.min(line.len());
    line.get(columns.start..end)
        .filter(|s| !s.trim().is_empty())
}

fn fixed_f64(input: &str) -> IResult<&str, f64> {
    all_consuming(delimited(space0, double, space0))(input)
}

fn number(line: &str, columns: Range<usize>, what: &str) -> Result<f64, String> {
    let text = field(line, columns).ok_or_else(|| format!("missing {what}"))?;
    fixed_f64(text)
        .map(|(_, value)| value)
        .map_err(|_| format!("invalid {what} '{}'", text.trim()))
}

fn optional_number(
    line: &str,
    columns: Range<usize>,
    what: &str,
    default: f64,
) -> Result<f64, String> {
    match field(line, columns.clone()) {
        Some(_) => number(line, columns, what),
        None => Ok(default),
    }
}

/// Parse an ATOM/HETATM line; occupancy defaults to 1 and B-factor to 0
fn parse_atom_record(line: &str) -> Result<AtomRecord, String> {
    let position = [
        number(line, X, "x coordinate")?,
        number(line, Y, "y coordinate")?,
        number(line, Z, "z coordinate")?,
    ];

    Ok(AtomRecord {
        position,
        occupancy: optional_number(line, OCCUPANCY, "occupancy", 1.0)?,
        b_factor: optional_number(line, B_FACTOR, "B-factor", 0.0)?,
    })
}
