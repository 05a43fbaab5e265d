//! Element-wise arithmetic kernels

use crate::lanes::{lane_chunks, LaneChunk};
use std::marker::PhantomData;
use vectorhal_backends::{BackendError, Element, Kernel, ProcessingStyle, Result};

/// Addition with the element type's natural overflow behaviour
///
/// Integers wrap; floats follow IEEE-754.
pub trait LaneAdd: Element {
    fn lane_add(self, rhs: Self) -> Self;
}

macro_rules! impl_lane_add_int {
    ($($t:ty),*) => {
        $(impl LaneAdd for $t {
            #[inline]
            fn lane_add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
        })*
    };
}

macro_rules! impl_lane_add_float {
    ($($t:ty),*) => {
        $(impl LaneAdd for $t {
            #[inline]
            fn lane_add(self, rhs: Self) -> Self {
                self + rhs
            }
        })*
    };
}

impl_lane_add_int!(u8, u16, u32, u64, i8, i16, i32, i64);
impl_lane_add_float!(f32, f64);

/// `output[i] = a[i] + b[i]`
///
/// Takes exactly two inputs.
#[derive(Debug)]
pub struct VectorAdd<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> VectorAdd<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for VectorAdd<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for VectorAdd<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: LaneAdd> Kernel for VectorAdd<T> {
    type Input = T;
    type Output = T;

    fn name(&self) -> &str {
        "vector_add"
    }

    fn apply(&self, style: &ProcessingStyle, output: &mut [T], inputs: &[&[T]], element_count: usize) -> Result<()> {
        let [a, b] = inputs else {
            return Err(BackendError::kernel(
                self.name(),
                format!("expected 2 inputs, got {}", inputs.len()),
            ));
        };
        let lanes = style.vector_element_count();

        for chunk in lane_chunks(style, element_count) {
            match chunk {
                LaneChunk::Vector(range) => {
                    let out = &mut output[range.clone()];
                    let (a, b) = (&a[range.clone()], &b[range]);
                    for lane in 0..lanes {
                        out[lane] = a[lane].lane_add(b[lane]);
                    }
                }
                LaneChunk::Tail(range) => {
                    for i in range {
                        output[i] = a[i].lane_add(b[i]);
                    }
                }
            }
        }
        Ok(())
    }
}
