/// Key and commitment derivation
pub mod derive;
