//! End-to-end LUT builds against a stand-in simulator.
//!
//! The simulator is a small `sh` script that writes each coefficient file
//! from the key it is given and appends the key to a call log, so the tests
//! can tell how many processes actually ran.

#![cfg(unix)]

use std::{fs, path::Path};

use approx::assert_relative_eq;
use serde_json::json;
use tabular_rt::{BuildOutcome, LutError, TabularRt, TabularRtConfig};
use tempfile::tempdir;

const SCRIPT: &str = r#"
key=$(basename "$1" .json)
echo "$key" >> calls.log
value=${key#H2OSTR-}
printf '%s\n1.0\n' "$value" > "$key.rhoatm"
printf '0.9\n0.8\n' > "$key.transm"
echo scratch > "$key.tp7"
"#;

fn config(lut: &Path, tools: &Path, extra: serde_json::Value) -> TabularRtConfig {
    let script = tools.join("simulate.sh");
    fs::write(&script, SCRIPT).unwrap();

    let mut value = json!({
        "lut_path": lut,
        "wavelength_file": "wl.txt",
        "lut_grid": {"H2OSTR": [0.5, 1.0, 1.5, 2.0]},
        "statevector": {
            "H2OSTR": {
                "bounds": [0.5, 2.0],
                "scale": 0.01,
                "init": 1.0,
                "prior_mean": 1.5,
                "prior_sigma": 100.0
            }
        },
        "simulator": {"program": "sh", "args": [script]},
        "coefficients": ["rhoatm", "transm"],
        "max_workers": 2,
        "num_channels": 2
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(value).unwrap()
}

fn num_calls(lut: &Path) -> usize {
    fs::read_to_string(lut.join("calls.log"))
        .map(|log| log.lines().count())
        .unwrap_or(0)
}

#[test]
fn build_then_interpolate() {
    let lut = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let rt = TabularRt::new(&config(lut.path(), tools.path(), json!({}))).unwrap();

    let interp = match rt.build_lut(false).unwrap() {
        BuildOutcome::Ready(interp) => interp,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(num_calls(lut.path()), 4);

    for x in [0.5, 1.0, 1.5, 2.0] {
        assert!(rt.store().exists(&rt.namer().key_for(&[x])));
    }
    assert!(!lut.path().join("H2OSTR-1.0000.tp7").exists());

    let at_vertex = interp.interpolate(&[1.0], "rhoatm").unwrap();
    assert_eq!(at_vertex.to_vec(), [1.0, 1.0]);

    let between = interp.interpolate(&[0.75], "rhoatm").unwrap();
    assert!(between[0] > 0.5 && between[0] < 1.0);
    assert_relative_eq!(between[0], 0.75, epsilon = 1e-12);

    let both = interp
        .interpolate_vector(&[1.25], &["transm", "rhoatm"])
        .unwrap();
    assert_relative_eq!(both[0][1], 0.8, epsilon = 1e-12);
    assert_relative_eq!(both[1][0], 1.25, epsilon = 1e-12);
}

#[test]
fn second_build_runs_nothing() {
    let lut = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let rt = TabularRt::new(&config(lut.path(), tools.path(), json!({}))).unwrap();

    rt.build_lut(false).unwrap();
    assert_eq!(num_calls(lut.path()), 4);

    assert!(rt
        .scheduler()
        .plan(rt.grid(), rt.namer(), rt.store(), false)
        .is_empty());
    assert!(matches!(rt.build_lut(false).unwrap(), BuildOutcome::Ready(_)));
    assert_eq!(num_calls(lut.path()), 4);

    // Forcing a rebuild runs everything again
    rt.build_lut(true).unwrap();
    assert_eq!(num_calls(lut.path()), 8);
}

#[test]
fn configure_and_exit_stops_before_simulating() {
    let lut = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let rt = TabularRt::new(&config(
        lut.path(),
        tools.path(),
        json!({"configure_and_exit": true}),
    ))
    .unwrap();

    match rt.build_lut(false).unwrap() {
        BuildOutcome::Stopped { decks } => {
            assert_eq!(decks.len(), 4);
            assert!(decks.iter().all(|d| d.exists()));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(num_calls(lut.path()), 0);
}

#[test]
fn partial_store_fails_to_load() {
    let lut = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let rt = TabularRt::new(&config(
        lut.path(),
        tools.path(),
        json!({"auto_rebuild": false}),
    ))
    .unwrap();

    rt.store().write("H2OSTR-0.5000", "rhoatm", &[0.5, 1.0]).unwrap();
    rt.store().write("H2OSTR-0.5000", "transm", &[0.9, 0.8]).unwrap();

    match rt.build_lut(false) {
        Err(LutError::IncompleteLut { missing }) => {
            assert_eq!(missing, ["H2OSTR-1.0000", "H2OSTR-1.5000", "H2OSTR-2.0000"]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(num_calls(lut.path()), 0);
}

#[test]
fn channel_count_is_checked() {
    let lut = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let rt = TabularRt::new(&config(lut.path(), tools.path(), json!({"num_channels": 3})))
        .unwrap();
    assert!(matches!(
        rt.build_lut(false),
        Err(LutError::Configuration { .. })
    ));
}

#[test]
fn statevector_must_be_on_the_grid() {
    let lut = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let extra = json!({
        "statevector": {
            "AOT550": {
                "bounds": [0.0, 1.0],
                "scale": 1.0,
                "init": 0.1,
                "prior_mean": 0.1,
                "prior_sigma": 1.0
            }
        }
    });
    assert!(matches!(
        TabularRt::new(&config(lut.path(), tools.path(), extra)),
        Err(LutError::Configuration { .. })
    ));
}

#[test]
fn state_helpers() {
    let lut = tempdir().unwrap();
    let tools = tempdir().unwrap();
    let extra = json!({
        "lut_grid": {"GNDALT": [0.0, 2.0], "H2OSTR": [0.5, 1.0, 1.5, 2.0]}
    });
    let rt = TabularRt::new(&config(lut.path(), tools.path(), extra)).unwrap();

    assert_eq!(rt.statevector_indices(), [1]);
    assert_eq!(rt.lut_point(&[1.25], &[0.3, 0.0]).unwrap(), [0.3, 1.25]);
    assert_eq!(rt.summarize(&[1.25]), "Atmosphere: H2OSTR: 1.250");
    assert_eq!(rt.statevector().init(), [1.0]);
}
