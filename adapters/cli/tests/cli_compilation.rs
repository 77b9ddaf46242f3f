use std::process::Command;

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "township"])
        .status()
        .expect("failed to invoke cargo check for the township CLI binary");

    assert!(status.success(), "cargo check --bin township should succeed");
}

#[test]
fn help_lists_the_simulation_flags() {
    let output = Command::new(env!("CARGO_BIN_EXE_township"))
        .arg("--help")
        .output()
        .expect("failed to run the township CLI");
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--ticks",
        "--seed",
        "--config",
        "--found-every",
        "--expand-every",
        "--export",
        "--import",
    ] {
        assert!(help.contains(flag), "missing {flag} in help output");
    }
}
