pub mod audit;
pub mod exit_notice;
pub mod lease_lifecycle;
pub mod ledger;
pub mod obligations;
pub mod rent_increase;
pub mod scheduler;
