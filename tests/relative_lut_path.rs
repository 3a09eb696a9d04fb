//! A LUT directory given relative to the caller's working directory.
//!
//! Changing directory affects the whole process, so this lives in its own
//! test binary.

#![cfg(unix)]

use std::{env, fs};

use serde_json::json;
use tabular_rt::{BuildOutcome, TabularRt, TabularRtConfig};
use tempfile::tempdir;

const SCRIPT: &str = r#"
key=$(basename "$1" .json)
test -f "$1" || exit 2
printf '1.0\n2.0\n' > "$key.rhoatm"
printf '0.9\n0.8\n' > "$key.transm"
"#;

#[test]
fn relative_lut_path_builds() {
    let cwd = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let script = tools.path().join("simulate.sh");
    fs::write(&script, SCRIPT).unwrap();
    env::set_current_dir(cwd.path()).unwrap();

    let config: TabularRtConfig = serde_json::from_value(json!({
        "lut_path": "lut",
        "lut_grid": {"H2OSTR": [0.5, 1.0]},
        "statevector": {},
        "simulator": {"program": "sh", "args": [script]},
        "coefficients": ["rhoatm", "transm"]
    }))
    .unwrap();
    let rt = TabularRt::new(&config).unwrap();
    assert!(rt.store().root().is_absolute());

    let interp = match rt.build_lut(false).unwrap() {
        BuildOutcome::Ready(interp) => interp,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(interp.interpolate(&[0.75], "rhoatm").unwrap().to_vec(), [1.0, 2.0]);

    let lut = cwd.path().join("lut");
    assert!(lut.join("H2OSTR-0.5000.rhoatm").is_file());
    assert!(lut.join("decks").join("H2OSTR-1.0000.json").is_file());
    assert!(!lut.join("lut").exists());
}
