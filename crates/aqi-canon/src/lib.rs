pub mod canonicalizer;

pub use canonicalizer::Canonicalizer;
