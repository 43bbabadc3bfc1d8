use std::path::PathBuf;
use ti_core::{ErrorKind, LatticeKind};
use ti_project::{prepare_lattice, read_data_composition};

const DATA: &str = "\
CuZr test configuration

4 atoms
2 atom types

0.0 3.6 xlo xhi
0.0 3.6 ylo yhi
0.0 3.6 zlo zhi

Masses

1 63.546
2 91.224

Atoms # atomic

1 1 0.0 0.0 0.0
2 1 1.8 1.8 0.0
3 2 1.8 0.0 1.8
4 1 0.0 1.8 1.8
";

fn write(name: &str, text: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ti_project_data_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn composition_from_data_file() {
    let path = write("cuzr.data", DATA);
    let (natoms, conc) = read_data_composition(&path).unwrap();
    assert_eq!(natoms, 4);
    assert_eq!(conc, vec![0.75, 0.25]);
}

#[test]
fn data_file_lattice_for_alloys() {
    let path = write("alloy.data", DATA);
    let dir = path.parent().unwrap();
    let elements = vec!["Cu".to_string(), "Zr".to_string()];
    let lattice = prepare_lattice(&elements, "alloy.data", None, dir).unwrap();
    assert!(matches!(lattice.kind, LatticeKind::File(_)));
    assert_eq!(lattice.atoms_per_cell, 4);
    assert_eq!(lattice.report_name(), "file");
    let structure = lattice.structure([5, 5, 5]).unwrap();
    assert_eq!(structure.natoms(), 4);
}

#[test]
fn truncated_data_file_is_rejected() {
    let truncated: String = DATA.lines().take(18).collect::<Vec<_>>().join("\n");
    let path = write("short.data", &truncated);
    let err = read_data_composition(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
