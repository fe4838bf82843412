//! 条目模块
//!
//! 条目的本地存储、草稿持久化以及批量同步

pub mod api;
pub mod dao;
pub mod listener;
pub mod models;
pub mod service;
pub mod store;
pub mod types;

// 重新导出主要类型
pub use api::{EntryApi, EntryBackend};
pub use dao::EntryDraftDao;
pub use listener::{EmptyEntrySyncListener, EntrySyncListener, Notice};
pub use models::{AttributeValue, Entry, EntryErrorMap, EntrySyncerConfig, EntryType, FormError};
pub use service::{EntrySyncer, SyncOutcome, SyncReport};
pub use store::EntryStore;
pub use types::{BulkUpdateEntriesResp, EntryInput};
