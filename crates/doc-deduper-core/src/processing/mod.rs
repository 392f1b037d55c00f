// Core modules
mod crypto_hash;
pub mod fingerprint;

// Expose cryptographic hash calculations
pub use crypto_hash::*;

// Expose text fingerprints
pub use fingerprint::Fingerprint;
