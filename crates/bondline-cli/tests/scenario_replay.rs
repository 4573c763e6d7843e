//! Scenario files replayed through the library entry point

use bondline_cli::{run, Scenario};
use bondline_core::prelude::*;
use std::io::Write;
use std::path::PathBuf;

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .join(name)
}

#[test]
fn test_bundled_scenario_replays() {
    let scenario = Scenario::load(&bundled("frog_launch.toml")).unwrap();
    let report = run(&scenario).unwrap();

    let rejected: Vec<_> = report
        .steps
        .iter()
        .filter(|step| !step.ok)
        .map(|step| (step.action, step.code))
        .collect();
    assert_eq!(
        rejected,
        vec![
            ("raise_floor", Some(BondlineError::Unauthorized.code())),
            ("mint", Some(BondlineError::AlreadyPaused.code())),
        ]
    );

    let frog = report.tokens.iter().find(|t| t.symbol == "FROG").unwrap();
    assert_eq!(frog.min_reserve_ratio_bps, 6_000);
    assert!(!frog.paused);
    assert!(frog.solvent);
    assert_eq!(report.creation_fees_collected, format_units(U256::zero()));
}

#[test]
fn test_report_serializes_to_json() {
    let scenario = Scenario::load(&bundled("frog_launch.toml")).unwrap();
    let report = run(&scenario).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["tokens"].as_array().unwrap().len(), 2);
    assert_eq!(json["steps"][0]["action"], "mint");
}

#[test]
fn test_scenario_from_temp_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [registry]
        creation_fee = "0"

        [engine]
        accept_bare_deposits = true

        [[launch]]
        creator = "alice"
        name = "Tiny"
        symbol = "TINY"
        base_price = "1e12"
        payment = "1e15"

        [[step]]
        action = "deposit"
        token = "TINY"
        account = "rescuer"
        amount = "1e15"
        "#
    )
    .unwrap();

    let report = run(&Scenario::load(file.path()).unwrap()).unwrap();
    assert_eq!(report.failed_steps(), 0);
    assert_eq!(report.tokens[0].reserve, format_units(U256::from(2u64) * U256::exp10(15)));
}
