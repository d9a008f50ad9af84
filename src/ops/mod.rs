pub mod closure;
pub mod hierarchy;
pub mod import;
pub mod search;
