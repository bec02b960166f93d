use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // Copy runtime assets and config next to the executable
    copy_dir_to_target("Maps");
    copy_dir_to_target("tessdata");
    copy_config();
}

/// Returns target/release (or target/debug) from OUT_DIR.
fn target_dir() -> PathBuf {
    let out_dir = env::var("OUT_DIR").unwrap();
    // OUT_DIR is something like target/release/build/map-overlay-xxx/out
    Path::new(&out_dir)
        .ancestors()
        .nth(3) // Go up 3 levels: out -> hash -> build -> release
        .expect("Could not find target directory")
        .to_path_buf()
}

/// Copies a top-level asset directory into the target directory if it exists.
fn copy_dir_to_target(name: &str) {
    let src = Path::new(name);
    if src.exists() {
        copy_dir_recursive(src, &target_dir().join(name));
        println!("cargo:rerun-if-changed={}/", name);
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let file_name = src_path.file_name().unwrap();
            let dst_path = dst.join(file_name);

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

/// Copies config.json to the target directory.
fn copy_config() {
    let config_src = Path::new("config.json");
    let config_dst = target_dir().join("config.json");

    if config_src.exists() {
        let _ = fs::copy(config_src, &config_dst);
        println!("cargo:rerun-if-changed=config.json");
    }
}
