//! LAMMPS text dumps (`dump custom`) held in memory.
//!
//! Only orthogonal periodic boxes are supported; that is all the job
//! builds. Column order is taken from the `ITEM: ATOMS` header.

use crate::error::{BackendError, BackendResult};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use ti_core::Crystal;

#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub id: usize,
    pub atom_type: usize,
    pub position: Vector3<f64>,
    pub velocity: Option<Vector3<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestep: u64,
    pub lo: Vector3<f64>,
    pub hi: Vector3<f64>,
    pub atoms: Vec<AtomRecord>,
}

/// Basis of the orthogonal conventional cell, in cell fractions, and the cell aspect.
fn basis(crystal: Crystal) -> (Vec<[f64; 3]>, [f64; 3]) {
    let fcc = vec![
        [0.0, 0.0, 0.0],
        [0.5, 0.5, 0.0],
        [0.5, 0.0, 0.5],
        [0.0, 0.5, 0.5],
    ];
    match crystal {
        Crystal::SimpleCubic => (vec![[0.0, 0.0, 0.0]], [1.0, 1.0, 1.0]),
        Crystal::Bcc => (vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]], [1.0, 1.0, 1.0]),
        Crystal::Fcc => (fcc, [1.0, 1.0, 1.0]),
        Crystal::Diamond => {
            let mut b = fcc.clone();
            b.extend(fcc.iter().map(|p| [p[0] + 0.25, p[1] + 0.25, p[2] + 0.25]));
            (b, [1.0, 1.0, 1.0])
        }
        Crystal::Hcp => (
            vec![
                [0.0, 0.0, 0.0],
                [0.5, 0.5, 0.0],
                [0.5, 5.0 / 6.0, 0.5],
                [0.0, 1.0 / 3.0, 0.5],
            ],
            [1.0, 3f64.sqrt(), (8.0f64 / 3.0).sqrt()],
        ),
    }
}

impl Snapshot {
    pub fn natoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.hi - self.lo
    }

    pub fn volume(&self) -> f64 {
        self.lengths().iter().product()
    }

    pub fn density(&self) -> f64 {
        self.natoms() as f64 / self.volume()
    }

    /// Shortest periodic image of `b - a`.
    pub fn minimum_image(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
        let l = self.lengths();
        let mut d = b - a;
        for k in 0..3 {
            d[k] -= l[k] * (d[k] / l[k]).round();
        }
        d
    }

    /// Perfect crystal as the engine's `lattice` + `create_atoms` would lay it down.
    pub fn crystal(crystal: Crystal, lattice_constant: f64, replication: [u32; 3]) -> Self {
        let (sites, aspect) = basis(crystal);
        let cell = Vector3::new(aspect[0], aspect[1], aspect[2]) * lattice_constant;
        let mut atoms = Vec::with_capacity(sites.len() * replication.iter().product::<u32>() as usize);
        for ix in 0..replication[0] {
            for iy in 0..replication[1] {
                for iz in 0..replication[2] {
                    for s in &sites {
                        let frac = Vector3::new(
                            ix as f64 + s[0],
                            iy as f64 + s[1],
                            iz as f64 + s[2],
                        );
                        atoms.push(AtomRecord {
                            id: atoms.len() + 1,
                            atom_type: 1,
                            position: frac.component_mul(&cell),
                            velocity: None,
                        });
                    }
                }
            }
        }
        let hi = Vector3::new(
            cell[0] * replication[0] as f64,
            cell[1] * replication[1] as f64,
            cell[2] * replication[2] as f64,
        );
        Self {
            timestep: 0,
            lo: Vector3::zeros(),
            hi,
            atoms,
        }
    }

    /// Uniformly random positions in a cubic box at the given density.
    pub fn disordered(natoms: usize, density: f64, seed: u64) -> Self {
        let side = (natoms as f64 / density).cbrt();
        let mut rng = StdRng::seed_from_u64(seed);
        let atoms = (0..natoms)
            .map(|i| AtomRecord {
                id: i + 1,
                atom_type: 1,
                position: Vector3::new(
                    rng.gen_range(0.0..side),
                    rng.gen_range(0.0..side),
                    rng.gen_range(0.0..side),
                ),
                velocity: None,
            })
            .collect();
        Self {
            timestep: 0,
            lo: Vector3::zeros(),
            hi: Vector3::repeat(side),
            atoms,
        }
    }

    pub fn read(path: &Path) -> BackendResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::MissingOutput {
                    path: path.to_path_buf(),
                }
            } else {
                BackendError::io(path, e)
            }
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, origin: &Path) -> BackendResult<Self> {
        let err = |line: usize, reason: String| BackendError::Parse {
            path: origin.to_path_buf(),
            line,
            reason,
        };
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));
        let mut next = |what: &str| {
            lines
                .next()
                .ok_or_else(|| err(0, format!("file ends before {what}")))
        };

        let (n, l) = next("timestep header")?;
        if l != "ITEM: TIMESTEP" {
            return Err(err(n, format!("expected `ITEM: TIMESTEP`, got `{l}`")));
        }
        let (n, l) = next("timestep")?;
        let timestep: u64 = l.parse().map_err(|_| err(n, format!("bad timestep `{l}`")))?;

        let (n, l) = next("atom count header")?;
        if l != "ITEM: NUMBER OF ATOMS" {
            return Err(err(n, format!("expected `ITEM: NUMBER OF ATOMS`, got `{l}`")));
        }
        let (n, l) = next("atom count")?;
        let natoms: usize = l.parse().map_err(|_| err(n, format!("bad atom count `{l}`")))?;

        let (n, l) = next("box header")?;
        if !l.starts_with("ITEM: BOX BOUNDS") {
            return Err(err(n, format!("expected `ITEM: BOX BOUNDS`, got `{l}`")));
        }
        if l.contains("xy") {
            return Err(err(n, "triclinic boxes are not supported".to_string()));
        }
        let mut lo = Vector3::zeros();
        let mut hi = Vector3::zeros();
        for k in 0..3 {
            let (n, l) = next("box bounds")?;
            let v: Vec<f64> = l
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| err(n, format!("bad box bounds `{l}`")))?;
            if v.len() < 2 || v[1] <= v[0] {
                return Err(err(n, format!("bad box bounds `{l}`")));
            }
            lo[k] = v[0];
            hi[k] = v[1];
        }

        let (n, l) = next("atoms header")?;
        let Some(columns) = l.strip_prefix("ITEM: ATOMS") else {
            return Err(err(n, format!("expected `ITEM: ATOMS`, got `{l}`")));
        };
        let columns: Vec<&str> = columns.split_whitespace().collect();
        let col = |name: &str| columns.iter().position(|c| *c == name);
        let id_col = col("id");
        let type_col = col("type");
        let (Some(x), Some(y), Some(z)) = (col("x"), col("y"), col("z")) else {
            return Err(err(n, "atoms section lacks x y z columns".to_string()));
        };
        let vel = match (col("vx"), col("vy"), col("vz")) {
            (Some(a), Some(b), Some(c)) => Some([a, b, c]),
            _ => None,
        };

        let mut atoms = Vec::with_capacity(natoms);
        for i in 0..natoms {
            let (n, l) = next("atom records")?;
            let fields: Vec<f64> = l
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| err(n, format!("bad atom record `{l}`")))?;
            if fields.len() < columns.len() {
                return Err(err(n, format!("expected {} columns", columns.len())));
            }
            atoms.push(AtomRecord {
                id: id_col.map_or(i + 1, |c| fields[c] as usize),
                atom_type: type_col.map_or(1, |c| fields[c] as usize),
                position: Vector3::new(fields[x], fields[y], fields[z]),
                velocity: vel.map(|[a, b, c]| Vector3::new(fields[a], fields[b], fields[c])),
            });
        }
        Ok(Self {
            timestep,
            lo,
            hi,
            atoms,
        })
    }

    pub fn to_dump_string(&self) -> String {
        let with_vel = self.atoms.iter().all(|a| a.velocity.is_some()) && !self.atoms.is_empty();
        let mut out = String::new();
        let _ = writeln!(out, "ITEM: TIMESTEP\n{}", self.timestep);
        let _ = writeln!(out, "ITEM: NUMBER OF ATOMS\n{}", self.natoms());
        let _ = writeln!(out, "ITEM: BOX BOUNDS pp pp pp");
        for k in 0..3 {
            let _ = writeln!(out, "{} {}", self.lo[k], self.hi[k]);
        }
        if with_vel {
            let _ = writeln!(out, "ITEM: ATOMS id type x y z vx vy vz");
        } else {
            let _ = writeln!(out, "ITEM: ATOMS id type x y z");
        }
        for a in &self.atoms {
            let p = a.position;
            let _ = write!(out, "{} {} {} {} {}", a.id, a.atom_type, p.x, p.y, p.z);
            if let (true, Some(v)) = (with_vel, a.velocity) {
                let _ = write!(out, " {} {} {}", v.x, v.y, v.z);
            }
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path) -> BackendResult<()> {
        fs::write(path, self.to_dump_string()).map_err(|e| BackendError::io(path, e))
    }
}
