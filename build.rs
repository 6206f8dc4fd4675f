use std::{env, process::Command};

/// Bake the latest release tag into the binary as `GIT_TAG`, which the API
/// reports as its version. `CABSYNC_BUILD_TAG` overrides git for packaged
/// builds made outside a checkout.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");
    println!("cargo:rerun-if-env-changed=CABSYNC_BUILD_TAG");

    if let Some(tag) = release_tag() {
        println!("cargo:rustc-env=GIT_TAG={tag}");
    }
}

fn release_tag() -> Option<String> {
    if let Ok(tag) = env::var("CABSYNC_BUILD_TAG") {
        let tag = tag.trim().to_string();
        return (!tag.is_empty()).then_some(tag);
    }

    let output = Command::new("git")
        .args(["describe", "--tags", "--abbrev=0", "--match", "v*"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let tag = String::from_utf8(output.stdout).ok()?;
    let tag = tag.trim();
    (!tag.is_empty()).then(|| tag.to_string())
}
