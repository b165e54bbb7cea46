pub mod address;
pub mod cart;
pub mod checkout;
pub mod currency;
pub mod order;
pub mod package;
pub mod product;
pub mod quote;
