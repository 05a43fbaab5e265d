//! The same kernels on the host and accelerator executors

use proptest::prelude::*;
use vectorhal_backends::{AcceleratorExecutor, BackendError, ExtensionSpec, ExtensionTable, HostExecutor, MemoryClass};
use vectorhal_kernels::{LaneAdd, LeadingZeroCount, VectorAdd};

fn host() -> HostExecutor {
    let table = ExtensionTable::new(vec![
        ExtensionSpec::new("sse", 128, &[]),
        ExtensionSpec::new("avx2", 256, &[]),
        ExtensionSpec::new("avx512", 512, &[]),
    ])
    .unwrap();
    HostExecutor::with_table(table)
}

fn clz_on_accelerator(exec: &AcceleratorExecutor, input: &[u32], width_bits: usize) -> Vec<u32> {
    let n = input.len();
    let src = exec.allocate::<u32>(n, MemoryClass::DeviceExclusive, 64).unwrap();
    let dst = exec.allocate::<u32>(n, MemoryClass::DeviceExclusive, 64).unwrap();
    exec.copy(src, input, n).unwrap();
    exec.submit(&LeadingZeroCount, width_bits, dst, &[src], n).unwrap();

    let mut out = vec![0u32; n];
    exec.copy(out.as_mut_slice(), dst, n).unwrap();
    exec.deallocate(src).unwrap();
    exec.deallocate(dst).unwrap();
    out
}

fn add_on_accelerator<T: LaneAdd>(exec: &AcceleratorExecutor, a: &[T], b: &[T], width_bits: usize) -> Vec<T> {
    let n = a.len();
    let da = exec.allocate::<T>(n, MemoryClass::DeviceExclusive, 0).unwrap();
    let db = exec.allocate::<T>(n, MemoryClass::HostVisible, 0).unwrap();
    let dc = exec.allocate::<T>(n, MemoryClass::DeviceExclusive, 0).unwrap();
    exec.copy(da, a, n).unwrap();
    exec.copy(db, b, n).unwrap();
    exec.submit(&VectorAdd::<T>::new(), width_bits, dc, &[da, db], n).unwrap();

    let mut out = a.to_vec();
    exec.copy(out.as_mut_slice(), dc, n).unwrap();
    for buffer in [da, db, dc] {
        exec.deallocate(buffer).unwrap();
    }
    out
}

#[test]
fn leading_zero_count_matches_on_both_executors() {
    let input: Vec<u32> = (0..128).collect();
    let expected: Vec<u32> = input
        .iter()
        .map(|&x| match x {
            0 => 32,
            1 => 31,
            2..=3 => 30,
            4..=7 => 29,
            8..=15 => 28,
            16..=31 => 27,
            32..=63 => 26,
            _ => 25,
        })
        .collect();

    let host = host();
    let mut host_out = vec![0u32; input.len()];
    host.submit_with_parallelism(&LeadingZeroCount, 16, &mut host_out, &[&input[..]], input.len())
        .unwrap();
    assert_eq!(host_out, expected);

    let accel = AcceleratorExecutor::emulator().unwrap();
    let accel_out = clz_on_accelerator(&accel, &input, 512);
    assert_eq!(accel_out, expected);
    assert_eq!(accel.live_allocations(), 0);
}

#[test]
fn vector_add_round_trips_for_edge_lengths() {
    let host = host();
    let accel = AcceleratorExecutor::emulator().unwrap();

    // empty, single, non-multiple of 8 lanes, exact multiple
    for n in [0usize, 1, 13, 64] {
        let a: Vec<i32> = (0..n as i32).collect();
        let b: Vec<i32> = (0..n as i32).map(|x| 1000 - x).collect();
        let expected = vec![1000i32; n];

        let mut host_out = host.allocate::<i32>(n, 32).unwrap();
        host.submit_with_parallelism(&VectorAdd::<i32>::new(), 8, &mut host_out, &[&a[..], &b[..]], n)
            .unwrap();
        assert_eq!(&host_out[..], &expected[..], "host n={n}");

        let accel_out = add_on_accelerator(&accel, &a, &b, 256);
        assert_eq!(accel_out, expected, "accelerator n={n}");
    }
}

#[test]
fn unsupported_parallelism_is_rejected_not_scalarised() {
    let host = host();
    let input = [1u32, 2, 3];
    let mut out = [0u32; 3];
    let err = host
        .submit_with_parallelism(&LeadingZeroCount, 3, &mut out, &[&input[..]], 3)
        .unwrap_err();
    assert!(matches!(err, BackendError::UnsupportedVectorLength { width_bits: 96, .. }));
    assert_eq!(out, [0, 0, 0]);
}

#[test]
fn accelerator_rejects_width_that_does_not_divide() {
    let accel = AcceleratorExecutor::emulator().unwrap();
    let buf = accel.allocate::<u32>(4, MemoryClass::DeviceExclusive, 0).unwrap();
    let out = accel.allocate::<u32>(4, MemoryClass::DeviceExclusive, 0).unwrap();
    assert!(accel.submit(&LeadingZeroCount, 100, out, &[buf], 4).is_err());
    assert!(accel.wait().is_ok());
}

#[test]
fn output_may_not_alias_an_input() {
    let accel = AcceleratorExecutor::emulator().unwrap();
    let buf = accel.allocate::<u32>(8, MemoryClass::DeviceExclusive, 0).unwrap();
    assert!(matches!(
        accel.submit(&LeadingZeroCount, 512, buf, &[buf], 8),
        Err(BackendError::AliasedBuffers(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn executors_agree_on_vector_add(pairs in prop::collection::vec((any::<u16>(), any::<u16>()), 0..200)) {
        let (a, b): (Vec<u16>, Vec<u16>) = pairs.into_iter().unzip();
        let n = a.len();

        let host = host();
        let mut host_out = vec![0u16; n];
        host.submit_widest(&VectorAdd::<u16>::new(), &mut host_out, &[&a[..], &b[..]], n).unwrap();

        let accel = AcceleratorExecutor::emulator().unwrap();
        let accel_out = add_on_accelerator(&accel, &a, &b, 512);

        prop_assert_eq!(&host_out, &accel_out);
        for i in 0..n {
            prop_assert_eq!(host_out[i], a[i].lane_add(b[i]));
        }
    }
}
