pub mod crc;
pub mod header;
pub mod identity;
pub mod mutate;

pub use header::{FitHeader, has_fit_magic};
pub use identity::DeviceIdentity;
pub use mutate::{FitError, mutate};

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
