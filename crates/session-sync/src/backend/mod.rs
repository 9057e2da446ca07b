//! Backend implementations.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "memory")]
pub use memory::MemoryBackend;

#[cfg(feature = "http")]
pub use http::HttpBackend;
