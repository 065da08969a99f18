use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

use toml::Value;

mod error;

pub use error::BuildError;

/// Target triple for little-endian eBPF objects.
pub const BPF_TARGET: &str = "bpfel-unknown-none";

/// Linker the nested build needs on `PATH`.
pub const BPF_LINKER: &str = "bpf-linker";

/// Reads the `rust-toolchain.toml` file from `crate_root` and returns the
/// value of the `channel` key.
pub fn get_toolchain_channel(crate_root: &Path) -> Result<String, BuildError> {
    let toolchain_file = crate_root.join("rust-toolchain.toml");
    let content = fs::read_to_string(&toolchain_file)
        .map_err(|e| BuildError::toolchain_file_read(&toolchain_file, e))?;

    let config: Value = toml::from_str(&content)?;

    let channel = config
        .get("toolchain")
        .ok_or_else(|| BuildError::missing_field("toolchain"))?
        .get("channel")
        .ok_or_else(|| BuildError::missing_field("toolchain.channel"))?;

    match channel.as_str().map(str::trim) {
        Some(channel) if !channel.is_empty() => Ok(channel.to_string()),
        _ => Err(BuildError::InvalidToolchainChannel(channel.to_string())),
    }
}

/// A kernel-side crate to compile for [`BPF_TARGET`].
#[derive(Debug, Clone)]
pub struct EbpfBuild<'a> {
    /// Directory holding the crate's `Cargo.toml` and `rust-toolchain.toml`.
    pub package_dir: &'a Path,
    /// Binary target whose object is wanted.
    pub bin: &'a str,
    /// Scratch directory for the nested build; normally `OUT_DIR`.
    pub out_dir: &'a Path,
}

impl EbpfBuild<'_> {
    /// Whether `bpf-linker` can be found; without it the nested build cannot link.
    pub fn linker_available() -> bool {
        env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).any(|dir| dir.join(BPF_LINKER).is_file()))
            .unwrap_or(false)
    }

    /// Builds the object with the crate's pinned nightly and returns its path.
    ///
    /// The nested cargo gets its own target directory so it never contends
    /// for the outer build's lock.
    pub fn build(&self) -> Result<PathBuf, BuildError> {
        let channel = get_toolchain_channel(self.package_dir)?;
        let target_dir = self.out_dir.join("ebpf-target");

        let status = Command::new("cargo")
            .arg(format!("+{channel}"))
            .current_dir(self.package_dir)
            .env_remove("RUSTC")
            .env_remove("RUSTC_WORKSPACE_WRAPPER")
            .env_remove("RUSTFLAGS")
            .env(
                "CARGO_ENCODED_RUSTFLAGS",
                ["-Cdebuginfo=2", "-Clink-arg=--btf"].join("\x1f"),
            )
            .args(["build", "--release", "-Z", "build-std=core", "--target", BPF_TARGET])
            .args(["--bin", self.bin])
            .arg("--target-dir")
            .arg(&target_dir)
            .status()
            .map_err(|source| BuildError::CargoSpawn {
                package: self.bin.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(BuildError::CargoFailed {
                package: self.bin.to_string(),
                status,
            });
        }

        Ok(target_dir.join(BPF_TARGET).join("release").join(self.bin))
    }
}
