use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::PathBuf};

/// `flags.json`: constant name to value, grouped by Rust type.
#[derive(Deserialize)]
#[serde(transparent)]
struct FlagTable(BTreeMap<String, BTreeMap<String, String>>);

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let flags_path = PathBuf::from(manifest_dir).join("../../flags.json");
    let flags_str = fs::read_to_string(&flags_path).unwrap();
    let table: FlagTable = serde_json::from_str(&flags_str).unwrap();
    make_flags(&table.0);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../flags.json");
}

/// Emit one `pub const` per entry, typed by the section it was declared under.
fn make_flags(flagmap: &BTreeMap<String, BTreeMap<String, String>>) {
    let mut s = String::new();
    for (ty, flags) in flagmap {
        match ty.as_str() {
            "i32" | "u32" | "usize" | "u64" => {}
            other => panic!("Unsupported flag type '{}'.", other),
        }
        for (key, value) in flags {
            s += format!("pub const {}: {} = {};\n", key, ty, value).as_str();
        }
    }
    let out_dir = env::var("OUT_DIR").unwrap();
    let path = PathBuf::from(out_dir).join("build_flags.rs");
    fs::write(path, s).unwrap();
}
