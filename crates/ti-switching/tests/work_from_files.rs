use std::fs;
use std::path::PathBuf;
use ti_switching::{
    Direction, SeriesFamily, SwitchingProtocol, SwitchingSeries, integrate_work,
};

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ti_switching_{tag}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// What the engine's print fix leaves behind: a header, the value at the
/// start of the ramp, then one line per stride.
fn engine_file(protocol: &SwitchingProtocol, direction: Direction, du: impl Fn(f64) -> f64) -> String {
    let leg = match direction {
        Direction::Forward => protocol.forward(),
        Direction::Backward => protocol.backward(),
    };
    let mut text = String::from("# Fix print output for fix f5\n");
    let mut step = 0;
    while step <= protocol.ts {
        let l = leg.lambda_at(step);
        text.push_str(&format!("{} {}\n", du(l), l));
        step += protocol.stride;
    }
    text
}

#[test]
fn replicates_read_from_disk() {
    let dir = temp_dir("files");
    let protocol = SwitchingProtocol::new(100, 1000, 10, 3).unwrap();
    for i in protocol.replicates() {
        let shift = i as f64 * 0.01;
        let fwd = engine_file(&protocol, Direction::Forward, |l| -2.0 + l - shift);
        let bwd = engine_file(&protocol, Direction::Backward, |l| -2.0 + l + shift);
        fs::write(dir.join(protocol.file_name(Direction::Forward, i)), fwd).unwrap();
        fs::write(dir.join(protocol.file_name(Direction::Backward, i)), bwd).unwrap();
    }

    let mut forward = Vec::new();
    let mut backward = Vec::new();
    for i in protocol.replicates() {
        let f = SwitchingSeries::path_in(&dir, SeriesFamily::Switching, Direction::Forward, i);
        let b = SwitchingSeries::path_in(&dir, SeriesFamily::Switching, Direction::Backward, i);
        forward.push(SwitchingSeries::read(&f, Direction::Forward, i).unwrap());
        backward.push(SwitchingSeries::read(&b, Direction::Backward, i).unwrap());
    }
    assert!(forward.iter().all(|s| s.len() == protocol.expected_samples()));

    // ∫₁⁰ (-2 + λ) dλ = 1.5 for every replicate once hysteresis cancels
    let est = integrate_work(&forward, &backward).unwrap();
    assert!((est.work - 1.5).abs() < 1e-9, "W = {}", est.work);
    assert!(est.error < 1e-9);
    assert_eq!(est.replicates.len(), 3);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_backward_file_is_a_backend_failure() {
    let dir = temp_dir("missing");
    let protocol = SwitchingProtocol::new(0, 10, 1, 1).unwrap();
    fs::write(
        dir.join(protocol.file_name(Direction::Forward, 1)),
        engine_file(&protocol, Direction::Forward, |l| l),
    )
    .unwrap();
    let path = SwitchingSeries::path_in(&dir, SeriesFamily::Switching, Direction::Backward, 1);
    let err = SwitchingSeries::read(&path, Direction::Backward, 1).unwrap_err();
    assert_eq!(err.kind().label(), "BackendExecutionError");
    fs::remove_dir_all(&dir).ok();
}
