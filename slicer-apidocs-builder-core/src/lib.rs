#![doc = "slicer-apidocs-builder-core: core logic library for slicer-apidocs-builder."]

//! This crate holds every step of the apidocs pipeline: checking out the
//! Slicer sources, building the Doxygen documentation, publishing it to the
//! hosting branch and reporting commit statuses.
//! The CLI crate only parses options and sequences these steps.

pub mod build;
pub mod contract;
pub mod github;
pub mod process;
pub mod publish;
pub mod status;
pub mod version;
