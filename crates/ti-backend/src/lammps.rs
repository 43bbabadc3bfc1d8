//! LAMMPS driven as a child process through its standard input.
//!
//! Commands are written line by line. After each batch the backend prints
//! a numbered marker and reads stdout until the marker comes back, so every
//! call returns only once the engine has executed it. `ERROR` lines and an
//! early end of output become `BackendError`s; nothing is retried.

use crate::commands::{EnsembleFix, PotentialSpec, ReferenceCoupling, SessionSettings};
use crate::error::{BackendError, BackendResult};
use crate::snapshot::Snapshot;
use crate::traits::SimulationBackend;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, trace, warn};
use ti_core::{LatticeKind, StructureSpec};

const TRANSCRIPT_FILE: &str = "session.in";
const LOG_FILE: &str = "log.lammps";

/// How to start the engine, e.g. `lmp` or `mpirun -np 4 lmp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LammpsLauncher {
    pub program: String,
    pub args: Vec<String>,
}

impl LammpsLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `executable` alone for one core, under `mpirun -np <cores>` otherwise.
    pub fn with_cores(executable: &str, cores: usize) -> Self {
        if cores > 1 {
            Self::new("mpirun").with_args(["-np".to_string(), cores.to_string(), executable.to_string()])
        } else {
            Self::new(executable)
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct LammpsBackend {
    launcher: LammpsLauncher,
    dir: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    transcript: Vec<String>,
    marker: u64,
    fix_serial: u64,
    potential: Option<PotentialSpec>,
}

impl LammpsBackend {
    /// Spawn the engine in `dir` (created if missing).
    pub fn start(launcher: LammpsLauncher, dir: impl Into<PathBuf>) -> BackendResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| BackendError::io(&dir, e))?;
        let mut child = Command::new(&launcher.program)
            .args(&launcher.args)
            .args(["-echo", "none", "-log", LOG_FILE])
            .current_dir(&dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                command: launcher.command_line(),
                source,
            })?;
        info!(command = %launcher.command_line(), dir = %dir.display(), "started engine");
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        Ok(Self {
            launcher,
            dir,
            child: Some(child),
            stdin,
            stdout,
            transcript: Vec::new(),
            marker: 0,
            fix_serial: 0,
            potential: None,
        })
    }

    /// Every command sent so far, in order.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn launcher(&self) -> &LammpsLauncher {
        &self.launcher
    }

    fn write_line(&mut self, line: &str) -> BackendResult<()> {
        let stdin = self.stdin.as_mut().ok_or(BackendError::State {
            what: "engine already closed",
        })?;
        writeln!(stdin, "{line}")
            .and_then(|_| stdin.flush())
            .map_err(|_| BackendError::Exited {
                status: "stdin closed".to_string(),
            })
    }

    /// Send a batch and block until the engine has executed it.
    fn send(&mut self, commands: &[String]) -> BackendResult<()> {
        for c in commands {
            debug!(command = %c, "lammps");
            self.write_line(c)?;
            self.transcript.push(c.clone());
        }
        self.marker += 1;
        let marker = format!("TI_SYNC {}", self.marker);
        self.write_line(&format!("print \"{marker}\""))?;
        let last = commands.last().cloned().unwrap_or_default();
        self.read_until(&last, |line| line == marker).map(|_| ())
    }

    /// Evaluate an engine expression, e.g. `atoms`.
    fn query(&mut self, expr: &str) -> BackendResult<f64> {
        self.write_line(&format!("print \"TI_VALUE $({expr})\""))?;
        let line = self.read_until(expr, |line| line.starts_with("TI_VALUE "))?;
        let value = line.trim_start_matches("TI_VALUE ").trim();
        value.parse().map_err(|_| BackendError::Protocol {
            what: format!("`{expr}` evaluated to `{value}`"),
        })
    }

    fn read_until(&mut self, command: &str, done: impl Fn(&str) -> bool) -> BackendResult<String> {
        let stdout = self.stdout.as_mut().ok_or(BackendError::State {
            what: "engine already closed",
        })?;
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = stdout.read_line(&mut buf).map_err(|_| BackendError::Exited {
                status: "stdout closed".to_string(),
            })?;
            if n == 0 {
                let status = self
                    .child
                    .as_mut()
                    .and_then(|c| c.wait().ok())
                    .map_or_else(|| "unknown status".to_string(), |s| s.to_string());
                return Err(BackendError::Exited { status });
            }
            let line = buf.trim();
            if line.starts_with("ERROR") {
                return Err(BackendError::CommandFailed {
                    command: command.to_string(),
                    message: line.to_string(),
                });
            }
            if line.starts_with("WARNING") {
                warn!(message = line, "lammps");
            } else {
                trace!(line, "lammps");
            }
            if done(line) {
                return Ok(line.to_string());
            }
        }
    }

    fn next_fix_id(&mut self) -> String {
        self.fix_serial += 1;
        format!("ti{}", self.fix_serial)
    }

    fn save_transcript(&self) {
        let path = self.dir.join(TRANSCRIPT_FILE);
        let mut text = self.transcript.join("\n");
        text.push('\n');
        if let Err(e) = std::fs::write(&path, text) {
            warn!(path = %path.display(), error = %e, "could not save transcript");
        }
    }
}

impl SimulationBackend for LammpsBackend {
    fn name(&self) -> &str {
        "lammps"
    }

    fn working_dir(&self) -> &Path {
        &self.dir
    }

    fn configure(&mut self, settings: &SessionSettings) -> BackendResult<()> {
        self.send(&session_commands(settings))
    }

    fn build_box(&mut self, structure: &StructureSpec, ntypes: usize) -> BackendResult<usize> {
        self.send(&box_commands(structure, ntypes))?;
        let natoms = self.query("atoms")?;
        Ok(natoms as usize)
    }

    fn set_potential(&mut self, potential: &PotentialSpec) -> BackendResult<()> {
        self.send(&potential_commands(potential))?;
        self.potential = Some(potential.clone());
        Ok(())
    }

    fn run_dynamics(&mut self, steps: u64, fixes: &[EnsembleFix]) -> BackendResult<()> {
        let mut setup = Vec::new();
        let mut teardown = Vec::new();
        for fix in fixes {
            let id = self.next_fix_id();
            let (s, t) = fix_commands(fix, &id, self.potential.as_ref())?;
            setup.extend(s);
            teardown.extend(t);
        }
        setup.push(format!("run {steps}"));
        self.send(&setup)?;
        if !teardown.is_empty() {
            self.send(&teardown)?;
        }
        Ok(())
    }

    fn dump_snapshot(&mut self, path: &Path) -> BackendResult<()> {
        self.send(&[format!(
            "write_dump all custom {} id type x y z vx vy vz modify sort id",
            path.display()
        )])
    }

    fn load_snapshot(&mut self, path: &Path) -> BackendResult<()> {
        let snapshot = Snapshot::read(&self.resolve(path))?;
        self.send(&[format!(
            "read_dump {} {} x y z vx vy vz box yes replace yes",
            path.display(),
            snapshot.timestep
        )])
    }

    fn reset(&mut self) -> BackendResult<()> {
        self.potential = None;
        self.send(&["clear".to_string()])
    }

    fn close(&mut self) -> BackendResult<()> {
        self.save_transcript();
        if self.stdin.is_some() {
            let _ = self.write_line("quit");
        }
        self.stdin = None;
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| BackendError::io(&self.dir, e))?;
        if status.success() {
            info!(dir = %self.dir.display(), "engine closed");
            Ok(())
        } else {
            Err(BackendError::Exited {
                status: status.to_string(),
            })
        }
    }
}

impl Drop for LammpsBackend {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Units, boundaries, atom style, timestep and thermo.
pub fn session_commands(settings: &SessionSettings) -> Vec<String> {
    let mut out = vec![
        "units metal".to_string(),
        "boundary p p p".to_string(),
        "atom_style atomic".to_string(),
        format!("timestep {}", settings.timestep),
    ];
    if settings.thermo_every > 0 {
        out.push(format!("thermo {}", settings.thermo_every));
    }
    out
}

pub fn box_commands(structure: &StructureSpec, ntypes: usize) -> Vec<String> {
    match structure.lattice() {
        LatticeKind::File(path) => vec![format!("read_data {}", path.display())],
        lattice => {
            let crystal = match lattice.build_crystal() {
                Some(c) => c,
                None => return Vec::new(),
            };
            let [nx, ny, nz] = structure.replication();
            vec![
                format!(
                    "lattice {} {}",
                    crystal.backend_name(),
                    structure.lattice_constant()
                ),
                format!("region box block 0 {nx} 0 {ny} 0 {nz}"),
                format!("create_box {} box", ntypes.max(1)),
                "create_atoms 1 box".to_string(),
            ]
        }
    }
}

/// `pair_coeff` arguments with the sub-style inserted after the two type columns,
/// as `hybrid/overlay` requires.
fn hybrid_pair_coeff(coeff: &str, style: &str) -> String {
    let mut words = coeff.split_whitespace();
    let types: Vec<&str> = words.by_ref().take(2).collect();
    let rest: Vec<&str> = words.collect();
    let mut out = types;
    out.push(style);
    out.extend(rest);
    out.join(" ")
}

pub fn potential_commands(potential: &PotentialSpec) -> Vec<String> {
    let style = potential.style_name();
    let mut out = Vec::new();
    match &potential.reference {
        Some(ReferenceCoupling::UhlenbeckFord {
            epsilon,
            sigma,
            cutoff,
        }) => {
            out.push(format!(
                "pair_style hybrid/overlay {} ufm {cutoff}",
                potential.pair_style
            ));
            out.push(format!(
                "pair_coeff {}",
                hybrid_pair_coeff(&potential.pair_coeff, style)
            ));
            out.push(format!("pair_coeff * * ufm {epsilon} {sigma}"));
        }
        _ => {
            out.push(format!("pair_style {}", potential.pair_style));
            out.push(format!("pair_coeff {}", potential.pair_coeff));
        }
    }
    for (i, m) in potential.masses.iter().enumerate() {
        out.push(format!("mass {} {m}", i + 1));
    }
    out.push("neigh_modify delay 0".to_string());

    match &potential.reference {
        Some(ReferenceCoupling::UhlenbeckFord { .. }) => {
            out.push(format!("compute ti_c1 all pair {style}"));
            out.push("compute ti_c2 all pair ufm".to_string());
            out.push("variable ti_dU equal (c_ti_c1-c_ti_c2)/atoms".to_string());
        }
        Some(ReferenceCoupling::EinsteinSprings { spring_constant }) => {
            out.push("fix ti_sites all store/state 0 xu yu zu".to_string());
            out.push("variable ti_dx atom xu-f_ti_sites[1]".to_string());
            out.push("variable ti_dy atom yu-f_ti_sites[2]".to_string());
            out.push("variable ti_dz atom zu-f_ti_sites[3]".to_string());
            out.push(format!(
                "variable ti_espring atom 0.5*{spring_constant}*(v_ti_dx^2+v_ti_dy^2+v_ti_dz^2)"
            ));
            out.push("compute ti_springs all reduce sum v_ti_espring".to_string());
            out.push(format!("compute ti_c1 all pair {style}"));
            out.push("variable ti_dU equal (c_ti_c1-c_ti_springs)/atoms".to_string());
        }
        Some(ReferenceCoupling::PotentialScaling) => {
            out.push("variable ti_dU equal pe/atoms".to_string());
        }
        None => {}
    }
    if potential.reference.is_some() {
        out.push("thermo_style custom step temp pe press vol v_ti_dU".to_string());
    }
    out
}

/// Commands scaling the coupled terms by `v_<id>_sys` (target) and `v_<id>_ref` (reference).
fn coupling_commands(id: &str, potential: &PotentialSpec) -> (Vec<String>, Vec<String>) {
    let style = potential.style_name();
    let mut setup = vec![format!(
        "fix {id}_a all adapt 1 pair {style} scale * * v_{id}_sys"
    )];
    let mut teardown = vec![format!("unfix {id}_a")];
    match &potential.reference {
        Some(ReferenceCoupling::UhlenbeckFord { .. }) => {
            setup.push(format!("fix {id}_b all adapt 1 pair ufm scale * * v_{id}_ref"));
            teardown.push(format!("unfix {id}_b"));
        }
        Some(ReferenceCoupling::EinsteinSprings { spring_constant }) => {
            for (axis, d) in [("x", "dx"), ("y", "dy"), ("z", "dz")] {
                setup.push(format!(
                    "variable {id}_f{axis} atom -{spring_constant}*v_{id}_ref*v_ti_{d}"
                ));
            }
            setup.push(format!("variable {id}_e atom v_{id}_ref*v_ti_espring"));
            setup.push(format!(
                "fix {id}_b all addforce v_{id}_fx v_{id}_fy v_{id}_fz energy v_{id}_e"
            ));
            teardown.push(format!("unfix {id}_b"));
        }
        Some(ReferenceCoupling::PotentialScaling) | None => {}
    }
    (setup, teardown)
}

/// Setup and teardown commands for one fix under fix-id prefix `id`.
pub fn fix_commands(
    fix: &EnsembleFix,
    id: &str,
    potential: Option<&PotentialSpec>,
) -> BackendResult<(Vec<String>, Vec<String>)> {
    let coupled = || {
        potential
            .filter(|p| p.reference.is_some())
            .ok_or(BackendError::State {
                what: "coupling fix requested without a coupled potential",
            })
    };
    let single = |cmd: String| (vec![cmd], vec![format!("unfix {id}")]);
    Ok(match fix {
        EnsembleFix::Velocity { temperature, seed } => (
            vec![format!(
                "velocity all create {temperature} {} mom yes rot yes dist gaussian",
                lammps_seed(*seed)
            )],
            Vec::new(),
        ),
        EnsembleFix::Npt {
            temperature,
            pressure,
            tdamp,
            pdamp,
        } => single(format!(
            "fix {id} all npt temp {temperature} {temperature} {tdamp} iso {pressure} {pressure} {pdamp}"
        )),
        EnsembleFix::Nph {
            pressure,
            pdamp,
            aniso,
        } => {
            let mode = if *aniso { "aniso" } else { "iso" };
            single(format!("fix {id} all nph {mode} {pressure} {pressure} {pdamp}"))
        }
        EnsembleFix::Nve => single(format!("fix {id} all nve")),
        EnsembleFix::Langevin {
            temperature,
            tdamp,
            seed,
            zero_momentum,
        } => {
            let zero = if *zero_momentum { " zero yes" } else { "" };
            single(format!(
                "fix {id} all langevin {temperature} {temperature} {tdamp} {}{zero}",
                lammps_seed(*seed)
            ))
        }
        EnsembleFix::AverageOutput { path, every, msd } => {
            let mut setup = Vec::new();
            let mut teardown = vec![format!("unfix {id}")];
            let mut fields = "$(step) $(press) $(vol) $(temp)".to_string();
            if *msd {
                setup.push(format!("compute {id}_msd all msd com yes"));
                fields.push_str(&format!(" $(c_{id}_msd[4])"));
                teardown.push(format!("uncompute {id}_msd"));
            }
            setup.push(format!(
                "fix {id} all print {every} \"{fields}\" screen no file {}",
                path.display()
            ));
            (setup, teardown)
        }
        EnsembleFix::Hold { lambda } => {
            let potential = coupled()?;
            let mut setup = vec![
                format!("variable {id}_sys equal {lambda}"),
                format!("variable {id}_ref equal {}", 1.0 - lambda),
            ];
            let (s, t) = coupling_commands(id, potential);
            setup.extend(s);
            (setup, t)
        }
        EnsembleFix::Switch {
            from,
            to,
            output,
            stride,
        } => {
            let potential = coupled()?;
            let out = output.display();
            // fix print fires on absolute steps; restart the count so samples
            // land on stride multiples of this ramp
            let mut setup = vec![
                "reset_timestep 0".to_string(),
                format!("variable {id}_sys equal ramp({from},{to})"),
                format!("variable {id}_ref equal 1.0-v_{id}_sys"),
                format!("print \"${{ti_dU}} {from}\" file {out} screen no"),
            ];
            let (s, mut t) = coupling_commands(id, potential);
            setup.extend(s);
            setup.push(format!(
                "fix {id}_p all print {stride} \"${{ti_dU}} ${{{id}_sys}}\" screen no append {out}"
            ));
            t.push(format!("unfix {id}_p"));
            (setup, t)
        }
    })
}

/// LAMMPS wants seeds in `1..=900_000_000`.
fn lammps_seed(seed: u64) -> u64 {
    seed % 900_000_000 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ti_core::Crystal;

    fn eam() -> PotentialSpec {
        PotentialSpec::new("eam/alloy", "* * Cu01.eam.alloy Cu", vec![63.546])
    }

    #[test]
    fn launcher_wraps_mpi() {
        assert_eq!(LammpsLauncher::with_cores("lmp", 1).command_line(), "lmp");
        assert_eq!(
            LammpsLauncher::with_cores("lmp_mpi", 4).command_line(),
            "mpirun -np 4 lmp_mpi"
        );
    }

    #[test]
    fn liquid_box_is_built_from_base_crystal() {
        let s = StructureSpec::new(LatticeKind::Liquid { base: Crystal::Fcc }, 3.61, 4, [5, 5, 5]).unwrap();
        let c = box_commands(&s, 1);
        assert_eq!(c[0], "lattice fcc 3.61");
        assert_eq!(c[1], "region box block 0 5 0 5 0 5");
        assert_eq!(c[3], "create_atoms 1 box");

        let s = StructureSpec::new(LatticeKind::Crystal(Crystal::Diamond), 5.43, 8, [2, 2, 2]).unwrap();
        assert_eq!(box_commands(&s, 1)[0], "lattice diamond 5.43");
    }

    #[test]
    fn data_file_box() {
        let s = StructureSpec::new(LatticeKind::File("conf.data".into()), 1.0, 256, [1, 1, 1]).unwrap();
        assert_eq!(box_commands(&s, 2), vec!["read_data conf.data".to_string()]);
    }

    #[test]
    fn uf_overlay_rewrites_pair_coeff() {
        let p = eam().with_reference(ReferenceCoupling::UhlenbeckFord {
            epsilon: 2.15,
            sigma: 1.5,
            cutoff: 7.5,
        });
        let c = potential_commands(&p);
        assert_eq!(c[0], "pair_style hybrid/overlay eam/alloy ufm 7.5");
        assert_eq!(c[1], "pair_coeff * * eam/alloy Cu01.eam.alloy Cu");
        assert_eq!(c[2], "pair_coeff * * ufm 2.15 1.5");
        assert!(c.contains(&"variable ti_dU equal (c_ti_c1-c_ti_c2)/atoms".to_string()));
    }

    #[test]
    fn plain_potential_has_no_coupling() {
        let c = potential_commands(&eam());
        assert_eq!(c[0], "pair_style eam/alloy");
        assert_eq!(c[1], "pair_coeff * * Cu01.eam.alloy Cu");
        assert!(c.iter().all(|l| !l.contains("ti_dU")));
    }

    #[test]
    fn switch_ramps_and_prints() {
        let p = eam().with_reference(ReferenceCoupling::UhlenbeckFord {
            epsilon: 2.15,
            sigma: 1.5,
            cutoff: 7.5,
        });
        let fix = EnsembleFix::Switch {
            from: 1.0,
            to: 0.0,
            output: "forward_1.dat".into(),
            stride: 10,
        };
        let (setup, teardown) = fix_commands(&fix, "ti7", Some(&p)).unwrap();
        assert_eq!(setup[0], "reset_timestep 0");
        assert_eq!(setup[1], "variable ti7_sys equal ramp(1,0)");
        assert_eq!(setup[3], "print \"${ti_dU} 1\" file forward_1.dat screen no");
        assert!(setup.contains(&"fix ti7_b all adapt 1 pair ufm scale * * v_ti7_ref".to_string()));
        assert_eq!(
            setup.last().unwrap(),
            "fix ti7_p all print 10 \"${ti_dU} ${ti7_sys}\" screen no append forward_1.dat"
        );
        assert_eq!(teardown, vec!["unfix ti7_a", "unfix ti7_b", "unfix ti7_p"]);
    }

    #[test]
    fn einstein_springs_follow_reference_weight() {
        let p = eam().with_reference(ReferenceCoupling::EinsteinSprings { spring_constant: 1.5 });
        let setup = potential_commands(&p);
        assert!(setup.contains(&"fix ti_sites all store/state 0 xu yu zu".to_string()));
        let (hold, _) = fix_commands(&EnsembleFix::Hold { lambda: 1.0 }, "ti2", Some(&p)).unwrap();
        assert_eq!(hold[1], "variable ti2_ref equal 0");
        assert!(hold.contains(&"variable ti2_fx atom -1.5*v_ti2_ref*v_ti_dx".to_string()));
    }

    #[test]
    fn coupling_without_reference_is_refused() {
        let err = fix_commands(&EnsembleFix::Hold { lambda: 1.0 }, "ti1", Some(&eam())).unwrap_err();
        assert!(matches!(err, BackendError::State { .. }));
    }

    #[test]
    fn average_output_with_msd() {
        let fix = EnsembleFix::AverageOutput {
            path: "avg.dat".into(),
            every: 10,
            msd: true,
        };
        let (setup, teardown) = fix_commands(&fix, "ti3", None).unwrap();
        assert_eq!(setup[0], "compute ti3_msd all msd com yes");
        assert_eq!(
            setup[1],
            "fix ti3 all print 10 \"$(step) $(press) $(vol) $(temp) $(c_ti3_msd[4])\" screen no file avg.dat"
        );
        assert_eq!(teardown, vec!["unfix ti3", "uncompute ti3_msd"]);
    }

    #[test]
    fn seeds_stay_in_engine_range() {
        let (v, _) = fix_commands(
            &EnsembleFix::Velocity {
                temperature: 500.0,
                seed: u64::MAX,
            },
            "ti1",
            None,
        )
        .unwrap();
        let seed: u64 = v[0].split_whitespace().nth(4).unwrap().parse().unwrap();
        assert!((1..=900_000_000).contains(&seed));
    }

    #[test]
    fn missing_executable_fails_to_spawn() {
        let dir = std::env::temp_dir().join(format!("ti_backend_spawn_{}", std::process::id()));
        let err = LammpsBackend::start(LammpsLauncher::new("definitely-not-lammps-xyz"), &dir)
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Spawn { .. }));
        assert_eq!(err.kind(), ti_core::ErrorKind::BackendExecution);
        std::fs::remove_dir_all(&dir).ok();
    }
}
