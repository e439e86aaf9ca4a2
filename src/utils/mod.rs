pub mod table;
pub mod notifications;
pub mod convert;
pub mod slugs;
