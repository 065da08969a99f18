use std::{env, fs, path::PathBuf};

use common_build::EbpfBuild;

const EBPF_BIN: &str = "classifier-ebpf";

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let manifest_dir =
        PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let workspace_root = manifest_dir
        .parent()
        .expect("classifier lives inside the workspace")
        .to_path_buf();
    let package_dir = workspace_root.join(EBPF_BIN);

    for dir in ["classifier-ebpf/src", "classifier-common/src", "network-types/src"] {
        println!("cargo:rerun-if-changed={}", workspace_root.join(dir).display());
    }
    println!("cargo:rerun-if-env-changed=CLASSIFIER_SKIP_EBPF_BUILD");

    // The agent embeds whatever lands here; an empty object disables the
    // kernel backend at runtime instead of failing the host build.
    let dest = out_dir.join(EBPF_BIN);

    if env::var_os("CLASSIFIER_SKIP_EBPF_BUILD").is_some() {
        fs::write(&dest, b"").expect("write placeholder eBPF object");
        return;
    }
    if !EbpfBuild::linker_available() {
        println!("cargo:warning=bpf-linker not found; building without the eBPF backend");
        fs::write(&dest, b"").expect("write placeholder eBPF object");
        return;
    }

    let build = EbpfBuild {
        package_dir: &package_dir,
        bin: EBPF_BIN,
        out_dir: &out_dir,
    };
    match build.build() {
        Ok(object) => {
            fs::copy(&object, &dest).expect("copy eBPF object into OUT_DIR");
        }
        Err(e) => {
            println!("cargo:warning=eBPF object not built ({e}); only the userspace backend is available");
            fs::write(&dest, b"").expect("write placeholder eBPF object");
        }
    }
}
