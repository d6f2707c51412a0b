//! Object store abstraction for Account objects.
//!
//! The reconciler and the REST handlers only talk to [`AccountStore`]; the
//! in-process [`MemoryStore`] provides the semantics the reconciler relies on:
//!
//! ```text
//! reconciler / handlers → Arc<dyn AccountStore>
//!                              ↓
//!                        store.get(&key)                 // level-triggered read
//!                        store.update(account)           // spec + finalizers, versioned
//!                        store.update_status(account)    // status subresource, versioned
//!                        store.subscribe()               // ordered change events
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use forma_operator::store::{AccountStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let account = store.create(Account::new("default", "acc", spec)).await?;
//! store.delete(&account.key()).await?;
//! ```

mod error;
mod event;
mod memory;
mod traits;

pub use error::{Result, StoreError};
pub use event::StoreEvent;
pub use memory::MemoryStore;
pub use traits::AccountStore;
