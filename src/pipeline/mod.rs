//! Pipeline stages for study-guide assembly.
//!
//! Each submodule implements exactly one transformation step. Rendering lives
//! in [`crate::render`] because it has interchangeable backends; everything
//! here is pure text processing plus page reads.
//!
//! ## Data Flow
//!
//! ```text
//! nav ──▶ flatten ──▶ normalize ──▶ assemble ──▶ (render)
//! (mkdocs.yml) (certs)  (per page)   (guide .md)
//! ```
//!
//! 1. [`nav`]       — load the requested `nav` categories and flatten them into
//!    ordered certifications with tagged-variant item parsing
//! 2. [`normalize`] — deterministic clean-up of each page's markdown
//! 3. [`assemble`]  — title block, TOC and sections of one guide
//! 4. [`anchor`]    — the shared anchor / file-name normalisation

pub mod anchor;
pub mod assemble;
pub mod nav;
pub mod normalize;
