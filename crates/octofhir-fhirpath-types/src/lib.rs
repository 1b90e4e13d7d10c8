//! Type system and system value model for the FHIRPath engine
//!
//! This crate provides:
//! - The FHIRPath type lattice: system primitive types plus FHIR model types,
//!   with single-inheritance subsumption ([`TypeRegistry`])
//! - The static FHIR R4 type-descriptor table consulted by the tree builder
//!   and by reflection (`type()`, `is`, `as`, `ofType`)
//! - The runtime system values produced by evaluation ([`SystemValue`]),
//!   including partial-precision temporal values with FHIRPath comparison
//!   semantics

mod fhir_r4;
mod quantity;
mod temporal;
mod type_info;
mod type_system;
mod value;

pub use quantity::*;
pub use temporal::*;
pub use type_info::*;
pub use type_system::*;
pub use value::*;
