pub mod domain;
pub mod error;
pub mod form;
pub mod pagination;
pub mod record;
pub mod store;
