pub mod allocation;
pub mod award;
pub mod ledger;
pub mod output;
pub mod program;
pub mod settings;
