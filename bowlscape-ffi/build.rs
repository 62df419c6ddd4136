// Build script that tries to generate a C header with `cbindgen`.
// If `cbindgen` is not available, it falls back to copying the
// checked-in `include/bowlscape.h` to $OUT_DIR.
//
// Either way, consumers can include the header from:
//   - <repo>/bowlscape-ffi/include/bowlscape.h (checked-in)
//   - $OUT_DIR/bowlscape.h

use std::{env, fs, io, path::PathBuf, process::Command};

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/bowlscape.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").map_err(io::Error::other)?);
    let out_dir = PathBuf::from(env::var("OUT_DIR").map_err(io::Error::other)?);
    let header_repo = crate_dir.join("include").join("bowlscape.h");
    let header_out = out_dir.join("bowlscape.h");

    let cbindgen_ok = Command::new("cbindgen")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success());

    if cbindgen_ok {
        let status = Command::new("cbindgen")
            .args(["--crate", "bowlscape-ffi", "--lang", "C", "--output"])
            .arg(&header_out)
            .current_dir(&crate_dir)
            .status()?;
        if status.success() {
            println!("cargo:warning=bowlscape-ffi: generated header with cbindgen -> {}", header_out.display());
            return Ok(());
        }
        println!("cargo:warning=bowlscape-ffi: cbindgen failed; using checked-in header");
    }

    fs::copy(&header_repo, &header_out)?;
    Ok(())
}
