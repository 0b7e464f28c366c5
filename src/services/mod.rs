//! Business logic services

pub mod capacity;
pub mod planning;
pub mod pricing;
pub mod reference;
pub mod sequencing;
pub mod validation;
