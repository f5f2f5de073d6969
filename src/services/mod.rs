pub mod audit;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod deliveries;
pub mod orders;
pub mod payments;
