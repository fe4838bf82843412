//! 来源文档（Lead）模块
//!
//! 条目全部保存成功后，按需更新来源文档（例如标记为已打标签）

pub mod api;
pub mod models;
pub mod service;
pub mod types;

pub use api::{LeadApi, LeadBackend};
pub use models::{LeadDraft, LeadPatch, LeadStatus};
pub use service::{decide_lead_update, LeadFinalizer, SaveIntent};
