//! Build script for the Explorer BSP
//!
//! Records the target and profile for `config`, and enables the
//! `explorer_hw` cfg when building for the Explorer MIPS core.

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=TARGET");
    println!("cargo:rustc-check-cfg=cfg(explorer_hw)");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    if target.starts_with("mips") && !target.starts_with("mips64") {
        println!("cargo:rustc-cfg=explorer_hw");
    }

    generate_build_info(&target, &profile);
}

fn generate_build_info(target: &str, profile: &str) {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    let mut info = String::new();
    info.push_str("// Auto-generated build information\n\n");
    info.push_str(&format!("/// Target triple\npub const TARGET: &str = {:?};\n", target));
    info.push_str(&format!("/// Cargo profile\npub const PROFILE: &str = {:?};\n", profile));
    info.push_str(&format!(
        "/// `debug` feature enabled\npub const DEBUG: bool = {};\n",
        env::var_os("CARGO_FEATURE_DEBUG").is_some()
    ));
    info.push_str(&format!(
        "/// `verbose` feature enabled\npub const VERBOSE: bool = {};\n",
        env::var_os("CARGO_FEATURE_VERBOSE").is_some()
    ));

    fs::write(&dest_path, info).expect("failed to write build_info.rs");
}
