//! # Transcript Post-Processing
//!
//! Text stages applied after recognition:
//! - **normalizer**: traditional→simplified script conversion (OpenCC)
//! - **corrector**: best-effort AI punctuation/grammar correction
//!
//! Both stages degrade to identity rather than failing the pipeline.

pub mod corrector;
pub mod normalizer;

pub use corrector::TextCorrector;
pub use normalizer::TextNormalizer;
