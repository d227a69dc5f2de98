pub mod biometric;
pub mod ledger;
pub mod table;
