//! Core math modules.

pub mod stable;
pub mod dirichlet;
pub mod inverse_gamma;
pub mod nig;
pub mod normal;
