#[path = "property/ledger.rs"]
mod ledger;
