pub mod tagging;

// 重新导出常用类型，方便外部使用
pub use tagging::{
    client::{ClientConfig, DeepClient},
    entry::{Entry, EntryStore, EntrySyncListener, Notice, SyncOutcome},
    framework::Framework,
    lead::{LeadDraft, SaveIntent},
};
