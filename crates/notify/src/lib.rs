//! Keurimmo Notify Crate
//!
//! Transactional email: message templates and the fail-open mailer that
//! delivers them.

pub mod mailer;
pub mod templates;

pub use mailer::Mailer;
pub use templates::{format_fcfa, magic_link, owner_payment_notice, rent_receipt, EmailContent};
