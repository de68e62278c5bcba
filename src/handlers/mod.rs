pub(crate) mod auth;
pub(crate) mod cart;
pub(crate) mod orders;
pub(crate) mod payment_handlers;
pub(crate) mod products;
