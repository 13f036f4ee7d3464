//! Clients for the hosted services the marketplace leans on.

pub mod identity;
pub mod storage;
