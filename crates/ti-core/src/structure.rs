//! Lattice kinds and the simulation box description.

use crate::error::{TiError, TiResult};
use core::fmt;
use std::path::PathBuf;

/// Crystal structures the backend can build directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crystal {
    Bcc,
    Fcc,
    Hcp,
    Diamond,
    SimpleCubic,
}

impl Crystal {
    pub const ALL: [Crystal; 5] = [
        Crystal::Bcc,
        Crystal::Fcc,
        Crystal::Hcp,
        Crystal::Diamond,
        Crystal::SimpleCubic,
    ];

    /// Atoms in the conventional (orthogonal) cell the backend replicates.
    pub fn atoms_per_cell(self) -> usize {
        match self {
            Crystal::Bcc => 2,
            Crystal::Fcc => 4,
            Crystal::Hcp => 4,
            Crystal::Diamond => 8,
            Crystal::SimpleCubic => 1,
        }
    }

    /// Short upper-case label used in job files and reports.
    pub fn label(self) -> &'static str {
        match self {
            Crystal::Bcc => "BCC",
            Crystal::Fcc => "FCC",
            Crystal::Hcp => "HCP",
            Crystal::Diamond => "DIA",
            Crystal::SimpleCubic => "SC",
        }
    }

    /// Lattice style name understood by the MD engine.
    pub fn backend_name(self) -> &'static str {
        match self {
            Crystal::Bcc => "bcc",
            Crystal::Fcc => "fcc",
            Crystal::Hcp => "hcp",
            Crystal::Diamond => "diamond",
            Crystal::SimpleCubic => "sc",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_ascii_uppercase();
        Crystal::ALL.into_iter().find(|c| c.label() == upper)
    }
}

impl fmt::Display for Crystal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the job asked for: a crystal, a liquid grown from a crystal, or a data file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LatticeKind {
    Crystal(Crystal),
    Liquid { base: Crystal },
    File(PathBuf),
}

impl LatticeKind {
    pub fn label(&self) -> String {
        match self {
            LatticeKind::Crystal(c) => c.label().to_string(),
            LatticeKind::Liquid { .. } => "LQD".to_string(),
            LatticeKind::File(_) => "FILE".to_string(),
        }
    }

    /// Crystal actually laid down when building the box, if any.
    pub fn build_crystal(&self) -> Option<Crystal> {
        match self {
            LatticeKind::Crystal(c) | LatticeKind::Liquid { base: c } => Some(*c),
            LatticeKind::File(_) => None,
        }
    }
}

/// Periodic box to assemble: lattice, constant, basis size and replication.
///
/// `atoms_per_cell * nx * ny * nz` is the atom count. For data files the
/// whole file is one "cell", so replication is fixed to `[1, 1, 1]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructureSpec {
    lattice: LatticeKind,
    lattice_constant: f64,
    atoms_per_cell: usize,
    replication: [u32; 3],
}

impl StructureSpec {
    pub fn new(
        lattice: LatticeKind,
        lattice_constant: f64,
        atoms_per_cell: usize,
        replication: [u32; 3],
    ) -> TiResult<Self> {
        if !(lattice_constant.is_finite() && lattice_constant > 0.0) {
            return Err(TiError::InvalidArg {
                what: "lattice constant must be positive",
            });
        }
        if atoms_per_cell == 0 {
            return Err(TiError::InvalidArg {
                what: "atoms per cell must be positive",
            });
        }
        if replication.contains(&0) {
            return Err(TiError::InvalidArg {
                what: "replication counts must be positive",
            });
        }
        if matches!(lattice, LatticeKind::File(_)) && replication != [1, 1, 1] {
            return Err(TiError::InvalidArg {
                what: "data-file structures cannot be replicated",
            });
        }
        Ok(Self {
            lattice,
            lattice_constant,
            atoms_per_cell,
            replication,
        })
    }

    pub fn lattice(&self) -> &LatticeKind {
        &self.lattice
    }

    pub fn lattice_constant(&self) -> f64 {
        self.lattice_constant
    }

    pub fn atoms_per_cell(&self) -> usize {
        self.atoms_per_cell
    }

    pub fn replication(&self) -> [u32; 3] {
        self.replication
    }

    pub fn cells(&self) -> usize {
        self.replication.iter().map(|&n| n as usize).product()
    }

    pub fn natoms(&self) -> usize {
        self.atoms_per_cell * self.cells()
    }

    pub fn label(&self) -> String {
        self.lattice.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_count_is_basis_times_cells() {
        let spec = StructureSpec::new(
            LatticeKind::Liquid { base: Crystal::Fcc },
            3.61,
            Crystal::Fcc.atoms_per_cell(),
            [5, 5, 5],
        )
        .unwrap();
        assert_eq!(spec.natoms(), 500);
        assert_eq!(spec.label(), "LQD");
        assert_eq!(spec.lattice().build_crystal(), Some(Crystal::Fcc));
    }

    #[test]
    fn file_structures_are_not_replicated() {
        let err = StructureSpec::new(LatticeKind::File("conf.data".into()), 1.0, 100, [2, 1, 1]);
        assert!(err.is_err());
        let ok = StructureSpec::new(LatticeKind::File("conf.data".into()), 1.0, 100, [1, 1, 1]);
        assert_eq!(ok.unwrap().natoms(), 100);
    }

    #[test]
    fn crystal_labels_round_trip() {
        for c in Crystal::ALL {
            assert_eq!(Crystal::from_label(c.label()), Some(c));
        }
        assert_eq!(Crystal::from_label("dia"), Some(Crystal::Diamond));
        assert_eq!(Crystal::Diamond.backend_name(), "diamond");
        assert!(Crystal::from_label("LQD").is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn atom_count_matches_replication(
                idx in 0usize..5,
                a in 1.0f64..8.0,
                nx in 1u32..8,
                ny in 1u32..8,
                nz in 1u32..8,
            ) {
                let c = Crystal::ALL[idx];
                let spec = StructureSpec::new(LatticeKind::Crystal(c), a, c.atoms_per_cell(), [nx, ny, nz]).unwrap();
                prop_assert_eq!(spec.natoms(), c.atoms_per_cell() * (nx * ny * nz) as usize);
            }
        }
    }
}
