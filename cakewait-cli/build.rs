use std::process::Command;

/// Stamp `cakewait --version` with the git revision it was built from.
fn main() {
    println!("cargo:rerun-if-changed=../.git/HEAD");

    let revision = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty());

    println!(
        "cargo:rustc-env=CAKEWAIT_BUILD_REV={}",
        revision.as_deref().unwrap_or("unknown")
    );
}
