//! Shared types for the database layer

pub mod errors;

pub use errors::{AccessError, DatabaseError, DocumentError, ListingError, RentalError, TeamError};

pub type DatabaseResult<T> = Result<T, DatabaseError>;
pub type RentalResult<T> = Result<T, RentalError>;
pub type TeamResult<T> = Result<T, TeamError>;
pub type ListingResult<T> = Result<T, ListingError>;
pub type DocumentResult<T> = Result<T, DocumentError>;
pub type AccessResult<T> = Result<T, AccessError>;
