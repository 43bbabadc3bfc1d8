//! Lattice lookup: element table, structure conversion and data files.
//!
//! A calculation names its lattice as one of `BCC`, `FCC`, `HCP`, `DIA`, `SC`,
//! `LQD`, or as the path of a LAMMPS data file. Named lattices take their
//! constant from the element's reference structure, scaled by the conversion
//! table; liquids are grown from the reference structure itself.

use std::path::{Path, PathBuf};
use ti_core::{Crystal, ErrorKind, LatticeKind, StructureSpec, TiResult};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LatticeError {
    #[error("Unknown element: {symbol}")]
    UnknownElement { symbol: String },

    #[error("Unsupported lattice '{lattice}': use BCC, FCC, HCP, DIA, SC, LQD or a data file")]
    Unsupported { lattice: String },

    #[error("Data file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Multi-element calculations need a data file, got '{lattice}'")]
    NeedsDataFile { lattice: String },

    #[error("Cannot read data file {path}: {reason}")]
    DataFile { path: PathBuf, reason: String },
}

impl LatticeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LatticeError::UnknownElement { .. } | LatticeError::NeedsDataFile { .. } => {
                ErrorKind::InvalidParameter
            }
            LatticeError::Unsupported { .. } => ErrorKind::UnsupportedLattice,
            LatticeError::FileNotFound { .. } => ErrorKind::FileNotFound,
            LatticeError::DataFile { .. } => ErrorKind::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementData {
    pub symbol: &'static str,
    /// Ground-state structure.
    pub structure: Crystal,
    /// [Å]
    pub lattice_constant: f64,
    /// [amu]
    pub mass: f64,
}

const fn el(symbol: &'static str, structure: Crystal, a: f64, mass: f64) -> ElementData {
    ElementData {
        symbol,
        structure,
        lattice_constant: a,
        mass,
    }
}

static ELEMENTS: &[ElementData] = &[
    el("Li", Crystal::Bcc, 3.49, 6.94),
    el("Na", Crystal::Bcc, 4.23, 22.98977),
    el("K", Crystal::Bcc, 5.23, 39.0983),
    el("V", Crystal::Bcc, 3.02, 50.9415),
    el("Cr", Crystal::Bcc, 2.88, 51.9961),
    el("Fe", Crystal::Bcc, 2.87, 55.845),
    el("Nb", Crystal::Bcc, 3.30, 92.90637),
    el("Mo", Crystal::Bcc, 3.15, 95.95),
    el("Ta", Crystal::Bcc, 3.31, 180.94788),
    el("W", Crystal::Bcc, 3.16, 183.84),
    el("Al", Crystal::Fcc, 4.05, 26.981538),
    el("Ar", Crystal::Fcc, 5.26, 39.948),
    el("Ni", Crystal::Fcc, 3.52, 58.6934),
    el("Cu", Crystal::Fcc, 3.61, 63.546),
    el("Pd", Crystal::Fcc, 3.89, 106.42),
    el("Ag", Crystal::Fcc, 4.09, 107.8682),
    el("Pt", Crystal::Fcc, 3.92, 195.084),
    el("Au", Crystal::Fcc, 4.08, 196.96657),
    el("Pb", Crystal::Fcc, 4.95, 207.2),
    el("Mg", Crystal::Hcp, 3.21, 24.305),
    el("Ti", Crystal::Hcp, 2.95, 47.867),
    el("Co", Crystal::Hcp, 2.51, 58.933194),
    el("Zn", Crystal::Hcp, 2.66, 65.38),
    el("Zr", Crystal::Hcp, 3.23, 91.224),
    el("C", Crystal::Diamond, 3.57, 12.011),
    el("Si", Crystal::Diamond, 5.43, 28.085),
    el("Ge", Crystal::Diamond, 5.66, 72.630),
    el("Po", Crystal::SimpleCubic, 3.35, 209.0),
];

pub fn element(symbol: &str) -> Option<&'static ElementData> {
    let symbol = symbol.trim();
    ELEMENTS.iter().find(|e| e.symbol.eq_ignore_ascii_case(symbol))
}

pub fn elements() -> &'static [ElementData] {
    ELEMENTS
}

// Rows: reference structure; columns: requested structure; order of Crystal::ALL.
const CONVERSION: [[f64; 5]; 5] = [
    [1.00000, 0.79370, 1.12246, 0.62996, 1.25992],
    [1.25992, 1.00000, 1.78179, 0.79370, 1.58740],
    [0.89090, 0.79370, 1.00000, 0.62996, 0.89089],
    [1.58740, 0.79370, 1.25992, 1.00000, 2.00000],
    [0.79370, 0.62996, 1.12247, 0.50000, 1.00000],
];

fn index(c: Crystal) -> usize {
    match c {
        Crystal::Bcc => 0,
        Crystal::Fcc => 1,
        Crystal::Hcp => 2,
        Crystal::Diamond => 3,
        Crystal::SimpleCubic => 4,
    }
}

/// Factor applied to the lattice constant of `reference` to build `target`.
pub fn conversion_factor(reference: Crystal, target: Crystal) -> f64 {
    CONVERSION[index(reference)][index(target)]
}

/// Resolved lattice of one calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLattice {
    pub kind: LatticeKind,
    /// [Å]; 1 for data files.
    pub lattice_constant: f64,
    /// For data files, the whole file.
    pub atoms_per_cell: usize,
    pub concentration: Vec<f64>,
}

impl PreparedLattice {
    /// Name of the lattice as written into reports (`fcc`, `diamond`, `file`).
    pub fn report_name(&self) -> String {
        match self.kind.build_crystal() {
            Some(c) => c.backend_name().to_string(),
            None => "file".to_string(),
        }
    }

    /// Box description; data files ignore `replication`.
    pub fn structure(&self, replication: [u32; 3]) -> TiResult<StructureSpec> {
        let replication = match self.kind {
            LatticeKind::File(_) => [1, 1, 1],
            _ => replication,
        };
        StructureSpec::new(
            self.kind.clone(),
            self.lattice_constant,
            self.atoms_per_cell,
            replication,
        )
    }
}

/// Resolve a calculation's lattice.
///
/// Relative data-file paths are taken from `base_dir`. An explicit
/// `lattice_constant` replaces the table value.
pub fn prepare_lattice(
    elements: &[String],
    lattice: &str,
    lattice_constant: Option<f64>,
    base_dir: &Path,
) -> Result<PreparedLattice, LatticeError> {
    let label = lattice.trim().to_ascii_uppercase();
    let named = label == "LQD" || Crystal::from_label(&label).is_some();

    if !named {
        let path = base_dir.join(lattice.trim());
        if path.is_file() {
            let (natoms, concentration) = read_data_composition(&path)?;
            return Ok(PreparedLattice {
                kind: LatticeKind::File(path),
                lattice_constant: 1.0,
                atoms_per_cell: natoms,
                concentration,
            });
        }
        let looks_like_path = lattice.contains(['/', '\\']) || Path::new(lattice).extension().is_some();
        return Err(if looks_like_path {
            LatticeError::FileNotFound { path }
        } else {
            LatticeError::Unsupported {
                lattice: lattice.to_string(),
            }
        });
    }

    if elements.len() > 1 {
        return Err(LatticeError::NeedsDataFile {
            lattice: lattice.to_string(),
        });
    }
    let symbol = elements.first().map(String::as_str).unwrap_or_default();
    let data = element(symbol).ok_or_else(|| LatticeError::UnknownElement {
        symbol: symbol.to_string(),
    })?;

    let (kind, target) = match Crystal::from_label(&label) {
        Some(c) => (LatticeKind::Crystal(c), c),
        None => (
            LatticeKind::Liquid {
                base: data.structure,
            },
            data.structure,
        ),
    };
    let a = lattice_constant
        .unwrap_or_else(|| conversion_factor(data.structure, target) * data.lattice_constant);
    Ok(PreparedLattice {
        kind,
        lattice_constant: a,
        atoms_per_cell: target.atoms_per_cell(),
        concentration: vec![1.0],
    })
}

/// Atom count and per-type mole fractions of a LAMMPS data file.
pub fn read_data_composition(path: &Path) -> Result<(usize, Vec<f64>), LatticeError> {
    let fail = |reason: String| LatticeError::DataFile {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LatticeError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            fail(e.to_string())
        }
    })?;

    let mut natoms = None;
    let mut ntypes = None;
    let mut lines = text.lines().skip(1);
    for line in lines.by_ref() {
        let body = line.split('#').next().unwrap_or_default().trim();
        if body.ends_with("atom types") {
            ntypes = body.split_whitespace().next().and_then(|t| t.parse::<usize>().ok());
        } else if body.ends_with("atoms") {
            natoms = body.split_whitespace().next().and_then(|t| t.parse::<usize>().ok());
        } else if body.starts_with("Atoms") {
            break;
        }
    }
    let natoms = natoms.ok_or_else(|| fail("missing atom count".to_string()))?;
    let ntypes = ntypes.ok_or_else(|| fail("missing atom type count".to_string()))?;
    if natoms == 0 || ntypes == 0 {
        return Err(fail("empty system".to_string()));
    }

    let mut counts = vec![0usize; ntypes];
    let mut seen = 0;
    for line in lines {
        let body = line.split('#').next().unwrap_or_default().trim();
        if body.is_empty() {
            if seen == 0 {
                continue;
            }
            break;
        }
        let atom_type = body
            .split_whitespace()
            .nth(1)
            .and_then(|t| t.parse::<usize>().ok())
            .filter(|t| (1..=ntypes).contains(t))
            .ok_or_else(|| fail(format!("bad atom line '{body}'")))?;
        counts[atom_type - 1] += 1;
        seen += 1;
    }
    if seen != natoms {
        return Err(fail(format!("header lists {natoms} atoms, found {seen}")));
    }
    let concentration = counts
        .into_iter()
        .map(|c| c as f64 / natoms as f64)
        .collect();
    Ok((natoms, concentration))
}
