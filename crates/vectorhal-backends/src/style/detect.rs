//! Host CPU feature detection
//!
//! Detection runs once per process and is cached. Flag names follow the
//! spelling used by `is_x86_feature_detected!` / `is_aarch64_feature_detected!`
//! (`"avx2"`, `"avx512f"`, `"sse4.1"`, `"neon"`).

use std::sync::OnceLock;

static HOST_FLAGS: OnceLock<Vec<&'static str>> = OnceLock::new();

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
fn detect() -> Vec<&'static str> {
    use std::arch::is_x86_feature_detected;

    let mut flags = Vec::new();
    macro_rules! probe {
        ($($flag:tt),* $(,)?) => {
            $(
                if is_x86_feature_detected!($flag) {
                    flags.push($flag);
                }
            )*
        };
    }
    probe!("sse2", "sse4.1", "sse4.2", "avx", "avx2", "avx512f", "avx512bw", "avx512dq", "avx512vl");
    flags
}

#[cfg(target_arch = "aarch64")]
fn detect() -> Vec<&'static str> {
    use std::arch::is_aarch64_feature_detected;

    let mut flags = Vec::new();
    if is_aarch64_feature_detected!("neon") {
        flags.push("neon");
    }
    if is_aarch64_feature_detected!("sve") {
        flags.push("sve");
    }
    flags
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
fn detect() -> Vec<&'static str> {
    Vec::new()
}

/// CPU flags detected on the running host
pub fn host_cpu_flags() -> &'static [&'static str] {
    HOST_FLAGS.get_or_init(|| {
        let flags = detect();
        tracing::debug!(flags = ?flags, "host_cpu_flags_detected");
        flags
    })
}

/// Whether the running host reports `flag`
pub fn host_has_flag(flag: &str) -> bool {
    host_cpu_flags().contains(&flag)
}
