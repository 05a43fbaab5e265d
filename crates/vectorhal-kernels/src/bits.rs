//! Bit-manipulation kernels

use crate::lanes::{lane_chunks, LaneChunk};
use vectorhal_backends::{BackendError, Kernel, ProcessingStyle, Result};

/// Count leading zero bits of each `u32`
///
/// On the accelerator this is the kernel backed by the synthesized
/// leading-zero-count logic; zero maps to 32.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadingZeroCount;

#[inline]
fn clz(x: u32) -> u32 {
    x.leading_zeros()
}

impl Kernel for LeadingZeroCount {
    type Input = u32;
    type Output = u32;

    fn name(&self) -> &str {
        "leading_zero_count"
    }

    fn apply(
        &self,
        style: &ProcessingStyle,
        output: &mut [u32],
        inputs: &[&[u32]],
        element_count: usize,
    ) -> Result<()> {
        let [input] = inputs else {
            return Err(BackendError::kernel(
                self.name(),
                format!("expected 1 input, got {}", inputs.len()),
            ));
        };

        let mut vector_steps = 0usize;
        for chunk in lane_chunks(style, element_count) {
            match chunk {
                LaneChunk::Vector(range) => {
                    vector_steps += 1;
                    for (out, &x) in output[range.clone()].iter_mut().zip(&input[range]) {
                        *out = clz(x);
                    }
                }
                LaneChunk::Tail(range) => {
                    for i in range {
                        output[i] = clz(input[i]);
                    }
                }
            }
        }

        tracing::trace!(
            style = %style,
            vector_steps = vector_steps,
            elements = element_count,
            "leading_zero_count_applied"
        );
        Ok(())
    }
}
