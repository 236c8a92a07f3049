//! Circuit representation and validation.
//!
//! This module holds the circuit after parsing. The [`Netlist`] struct keeps
//! all elements with their matrix indices, the node [`LabelResolver`] and the
//! [`MutualCouplingRegistry`] of magnetically coupled inductors.

mod coupling;
mod labels;
mod netlist;
mod validate;

pub use coupling::{mutual_inductance, Coupling, CouplingArrays, MutualCouplingRegistry, MutualTerm};
pub use labels::LabelResolver;
pub use netlist::{Netlist, NetlistElement, Signal, SignalSource, GROUND_LABEL};
pub use validate::{check_terminals, validate_netlist};
