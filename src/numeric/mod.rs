//! Numerical building blocks for the rating engine
//!
//! Special functions, adaptive quadrature with error estimates, and bounded
//! scalar minimisation. Everything here is pure and allocation-light so it
//! can be called from parallel workers.

pub mod optimize;
pub mod quadrature;
pub mod special;

// Re-export commonly used types
pub use optimize::{minimize_bounded, Minimum};
pub use quadrature::{
    integrate, integrate_lower_tail, integrate_real_line, Integral, QuadratureOptions,
};
pub use special::{erfc, gaussian_pdf, normal_cdf, normal_ln_pdf, normal_pdf};
