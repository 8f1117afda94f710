//! Transaction-scoped journals.
//!
//! Each journal records one category of side effect and implements
//! [`Controllable`](crate::snapshot::Controllable) with its own revert
//! semantics.

mod access_list;
mod destroyed;
mod logs;
mod refund;
mod transient;

pub use access_list::AccessList;
pub use destroyed::DestroyedAccounts;
pub use logs::Logs;
pub use refund::Refund;
pub use transient::TransientStorage;
