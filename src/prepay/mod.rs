//! Prepayment modelling: APEX2 multiplier tables, treasury curves, the
//! PSA-style stub hazard, and the package-level prepayment analysis report.

pub mod analysis;
pub mod apex2;
pub mod model;
pub mod treasury;

pub use apex2::{Apex2Dims, Apex2Tables, extra_principal_schedule, multiplier_dims, seasoning_ramp};
pub use model::{cpr_to_smm, stub_prepay_smm};
pub use treasury::TreasuryCurve;
