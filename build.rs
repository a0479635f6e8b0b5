use std::env;
use std::path::PathBuf;
use std::process::Command;

// On Windows, compile the console control helper so the library can embed it.
fn main() {
    println!("cargo:rerun-if-changed=helper/ctrl_event.rs");
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR not set"));
    let output = out_dir.join("proctl-ctrl-event.exe");
    let rustc = env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
    let target = env::var("TARGET").expect("TARGET not set");

    let status = Command::new(rustc)
        .args(["--edition", "2024", "--crate-type", "bin", "-C", "opt-level=s"])
        .args(["--target", &target])
        .arg("-o")
        .arg(&output)
        .arg("helper/ctrl_event.rs")
        .status()
        .expect("failed to run rustc for the console control helper");
    assert!(status.success(), "building the console control helper failed");
}
