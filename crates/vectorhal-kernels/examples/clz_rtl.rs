//! Leading-zero count on both executors
//!
//! Runs [`LeadingZeroCount`] over `0..N` on the host (widest available
//! style) and on the accelerator (512-bit synthesized-logic style), then
//! checks that the two agree.
//!
//! ## Running
//!
//! ```bash
//! cargo run --example clz_rtl
//!
//! # Accelerator queue timings and debug logs
//! VECTORHAL_ACCEL_PROFILING=1 RUST_LOG=vectorhal_backends=debug cargo run --example clz_rtl
//!
//! # Pretend the host only has SSE4.1
//! VECTORHAL_TARGET_FLAGS=sse4.1 cargo run --example clz_rtl
//! ```

use std::error::Error;
use vectorhal_backends::{AcceleratorExecutor, ElementType, FailFast, HalConfig, HostExecutor, MemoryClass};
use vectorhal_kernels::LeadingZeroCount;
use vectorhal_tracing::{timed_block, TracingConfig};

const N: usize = 128;
const ACCEL_WIDTH_BITS: usize = 512;

fn main() -> Result<(), Box<dyn Error>> {
    vectorhal_tracing::init_global_tracing(&TracingConfig::from_env())?;

    let config = HalConfig::from_env()?;
    let host = HostExecutor::from_config(&config)?;
    let mut accel = AcceleratorExecutor::from_config(&config)?;

    println!("host styles:  {:?}", host.extension_table().available_parallelism(ElementType::U32));
    println!("accelerator:  {}", accel.descriptor().name);

    let input: Vec<u32> = (0..N as u32).collect();

    // Host
    let mut host_out = host.allocate::<u32>(N, 64)?;
    let (result, host_us) = timed_block!("host_clz", {
        host.submit_widest(&LeadingZeroCount, &mut host_out, &[&input[..]], N)
    });
    result?;

    // Accelerator
    let src = accel.allocate::<u32>(N, MemoryClass::DeviceExclusive, 64)?;
    let dst = accel.allocate::<u32>(N, MemoryClass::DeviceExclusive, 64)?;
    accel.copy(src, input.as_slice(), N)?;
    let (result, accel_us) = timed_block!("accel_clz", {
        accel.submit(&LeadingZeroCount, ACCEL_WIDTH_BITS, dst, &[src], N)
    });
    result?;
    let mut accel_out = vec![0u32; N];
    accel.copy(accel_out.as_mut_slice(), dst, N)?;

    let mismatches = host_out
        .iter()
        .zip(&accel_out)
        .filter(|(h, a)| h != a)
        .count();

    println!();
    println!("{:>6} {:>6} {:>6}", "x", "host", "accel");
    for x in [0usize, 1, 2, 3, 4, 8, 16, 32, 64, 127] {
        println!("{:>6} {:>6} {:>6}", x, host_out[x], accel_out[x]);
    }
    println!();
    println!("host {host_us}us, accelerator {accel_us}us, {mismatches} mismatches");

    for entry in accel.profile() {
        println!(
            "  {:<28} queued {:>6}us  executed {:>6}us",
            entry.label, entry.queued_us, entry.executed_us
        );
    }

    accel.deallocate(src)?;
    accel.deallocate(dst)?;
    accel.teardown().or_abort();

    if mismatches > 0 {
        return Err(format!("{mismatches} results differ between executors").into());
    }
    Ok(())
}
