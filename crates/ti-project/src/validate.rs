//! Job file validation logic.

use crate::schema::{CalculationDef, JobFile, MdDef, ReferenceDef};
use std::collections::HashSet;
use ti_core::{ErrorKind, Phase};

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate calculation: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::DuplicateId { .. } | ValidationError::InvalidValue { .. } => {
                ErrorKind::InvalidParameter
            }
            ValidationError::Unsupported { .. } | ValidationError::UnsupportedVersion { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: impl Into<String>, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, v, "must be positive"))
    }
}

pub fn validate_job_file(job: &JobFile) -> Result<(), ValidationError> {
    if job.version == 0 || job.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: job.version,
        });
    }

    if job.element.is_empty() {
        return Err(invalid("element", "[]", "at least one element is required"));
    }
    if job.mass.len() != job.element.len() {
        return Err(invalid(
            "mass",
            format!("{:?}", job.mass),
            "one mass per element is required",
        ));
    }
    for (i, &m) in job.mass.iter().enumerate() {
        positive(format!("mass[{i}]"), m)?;
    }
    let mut symbols = HashSet::new();
    for symbol in &job.element {
        if !symbols.insert(symbol) {
            return Err(ValidationError::DuplicateId {
                id: symbol.clone(),
                context: "element".to_string(),
            });
        }
    }

    if job.calculations.is_empty() {
        return Err(invalid("calculations", "[]", "nothing to compute"));
    }
    let mut seen = HashSet::new();
    for (i, calc) in job.calculations.iter().enumerate() {
        validate_calculation(i, calc)?;
        let slug = calc.slug();
        if !seen.insert(slug.clone()) {
            return Err(ValidationError::DuplicateId {
                id: slug,
                context: "calculations".to_string(),
            });
        }
    }

    validate_md(&job.md)?;

    if job.main.nsims == 0 {
        return Err(invalid("main.nsims", 0, "at least one replicate is required"));
    }
    let threshold = job.main.melt_threshold;
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(invalid("main.melt_threshold", threshold, "must lie in (0, 1)"));
    }

    if job.backend.executable.trim().is_empty() {
        return Err(invalid("backend.executable", "\"\"", "must name a program"));
    }
    if job.backend.cores == 0 {
        return Err(invalid("backend.cores", 0, "must be at least 1"));
    }
    if !(job.backend.file_patience.is_finite() && job.backend.file_patience >= 0.0) {
        return Err(invalid(
            "backend.file_patience",
            job.backend.file_patience,
            "must be non-negative",
        ));
    }

    Ok(())
}

fn validate_calculation(i: usize, calc: &CalculationDef) -> Result<(), ValidationError> {
    let field = |name: &str| format!("calculations[{i}].{name}");

    if calc.lattice.trim().is_empty() {
        return Err(invalid(field("lattice"), "\"\"", "must name a structure or file"));
    }
    positive(field("temperature"), calc.temperature)?;
    if !calc.pressure.is_finite() {
        return Err(invalid(field("pressure"), calc.pressure, "must be finite"));
    }
    if let Some(t_high) = calc.temperature_high {
        positive(field("temperature_high"), t_high)?;
        if t_high <= calc.temperature {
            return Err(invalid(
                field("temperature_high"),
                t_high,
                "must exceed the target temperature",
            ));
        }
    }
    if let Some(t_stop) = calc.temperature_stop {
        positive(field("temperature_stop"), t_stop)?;
        if t_stop == calc.temperature {
            return Err(invalid(
                field("temperature_stop"),
                t_stop,
                "must differ from the start temperature",
            ));
        }
    }
    if calc.replication.contains(&0) {
        return Err(invalid(
            field("replication"),
            format!("{:?}", calc.replication),
            "every count must be positive",
        ));
    }
    if let Some(a) = calc.lattice_constant {
        positive(field("lattice_constant"), a)?;
    }
    match calc.reference_or_default() {
        ReferenceDef::UhlenbeckFord { p, sigma } => {
            positive(field("reference.p"), p)?;
            positive(field("reference.sigma"), sigma)?;
        }
        ReferenceDef::EinsteinCrystal if calc.phase == Phase::Liquid => {
            return Err(ValidationError::Unsupported {
                feature: field("reference"),
                reason: "an Einstein crystal cannot describe a liquid".to_string(),
            });
        }
        ReferenceDef::EinsteinCrystal => {}
    }
    Ok(())
}

fn validate_md(md: &MdDef) -> Result<(), ValidationError> {
    if md.pair_style.trim().is_empty() {
        return Err(invalid("md.pair_style", "\"\"", "must name a pair style"));
    }
    if md.pair_coeff.split_whitespace().count() < 2 {
        return Err(invalid(
            "md.pair_coeff",
            &md.pair_coeff,
            "must start with the two type selectors",
        ));
    }
    positive("md.timestep", md.timestep)?;
    positive("md.tdamp", md.tdamp)?;
    positive("md.pdamp", md.pdamp)?;
    for (name, v) in [("md.te", md.te), ("md.ts", md.ts), ("md.nsmall", md.nsmall)] {
        if v == 0 {
            return Err(invalid(name, 0, "must be at least one step"));
        }
    }
    if md.stride == 0 || md.stride > md.ts {
        return Err(invalid("md.stride", md.stride, "must lie in [1, ts]"));
    }
    if md.ts % md.stride != 0 {
        return Err(invalid("md.stride", md.stride, "must divide ts"));
    }
    if md.averaging_window == 0 {
        return Err(invalid("md.averaging_window", 0, "must be positive"));
    }
    // avg.dat is written every 10 steps
    if md.nlarge < 10 {
        return Err(invalid("md.nlarge", md.nlarge, "must cover at least 10 steps"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BackendDef, MainDef};

    fn job() -> JobFile {
        JobFile {
            version: 1,
            element: vec!["Cu".to_string()],
            mass: vec![63.546],
            calculations: vec![CalculationDef::new(Phase::Liquid, "LQD", 1600.0)],
            md: MdDef::new("eam/alloy", "* * Cu.eam.alloy Cu"),
            backend: BackendDef::default(),
            main: MainDef::default(),
        }
    }

    #[test]
    fn accepts_default_job() {
        validate_job_file(&job()).unwrap();
    }

    #[test]
    fn rejects_future_version() {
        let mut j = job();
        j.version = LATEST_VERSION + 1;
        let err = validate_job_file(&j).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedVersion { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn rejects_duplicate_calculations() {
        let mut j = job();
        j.calculations.push(j.calculations[0].clone());
        assert!(matches!(
            validate_job_file(&j),
            Err(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn rejects_low_melt_temperature() {
        let mut j = job();
        j.calculations[0].temperature_high = Some(1000.0);
        let err = validate_job_file(&j).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(err.to_string().contains("temperature_high"));
    }

    #[test]
    fn rejects_einstein_liquid() {
        let mut j = job();
        j.calculations[0].reference = Some(ReferenceDef::EinsteinCrystal);
        assert!(matches!(
            validate_job_file(&j),
            Err(ValidationError::Unsupported { .. })
        ));
    }

    #[test]
    fn rejects_bad_md_and_main_values() {
        let mut j = job();
        j.md.stride = j.md.ts + 1;
        assert!(validate_job_file(&j).is_err());

        let mut j = job();
        j.md.stride = 7;
        j.md.ts = 200;
        match validate_job_file(&j) {
            Err(ValidationError::InvalidValue { field, .. }) => assert_eq!(field, "md.stride"),
            other => panic!("unexpected {other:?}"),
        }
        j.md.stride = 8;
        assert!(validate_job_file(&j).is_ok());

        let mut j = job();
        j.main.melt_threshold = 1.0;
        assert!(validate_job_file(&j).is_err());

        let mut j = job();
        j.mass.push(1.0);
        assert!(validate_job_file(&j).is_err());

        let mut j = job();
        j.md.pair_coeff = "Cu.eam".to_string();
        assert!(validate_job_file(&j).is_err());
    }
}
