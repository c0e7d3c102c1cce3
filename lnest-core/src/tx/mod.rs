/// Witness scripts for funding and escape outputs
pub mod script;
/// Escape and fast-escape transaction construction
#[allow(clippy::module_inception)]
pub mod tx;
