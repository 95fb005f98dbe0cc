/// Hashing primitives: one-shot SHA-256 and the windowed file hasher.
pub mod chunked;
pub mod hash;
