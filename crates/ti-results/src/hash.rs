//! Content-based hashing for job IDs.

use sha2::{Digest, Sha256};
use ti_project::schema::{CalculationDef, MdDef};

/// Same calculation, element set, MD settings and seed give the same id.
pub fn compute_job_id(
    element: &[String],
    calculation: &CalculationDef,
    md: &MdDef,
    seed: u64,
) -> String {
    let mut hasher = Sha256::new();

    for symbol in element {
        hasher.update(symbol.as_bytes());
        hasher.update(b"\0");
    }

    let calculation_json = serde_json::to_string(calculation).unwrap_or_default();
    hasher.update(calculation_json.as_bytes());

    let md_json = serde_json::to_string(md).unwrap_or_default();
    hasher.update(md_json.as_bytes());

    hasher.update(seed.to_le_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
