//! Infrastructure shared by the host and accelerator backends

pub(crate) mod aligned;

pub(crate) use aligned::AlignedBlock;
