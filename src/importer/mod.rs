// ==========================================
// 排课数据同步系统 - 导入层
// ==========================================
// 职责: 解析导出文件，将其中的目录数据与课表合并进存储
// 顺序: 学期 → 类别、授课方式、网格 → 课程、班级、教师、教室 → 单元 → 课次
// ==========================================

// 模块声明
pub mod category_resolver;
pub mod context;
pub mod document;
pub mod error;
pub mod event_resolver;
pub mod grid_resolver;
pub mod group_resolver;
pub mod instance_resolver;
pub mod method_resolver;
pub mod occurrence_expander;
pub mod person_resolver;
pub mod reference_resolver;
pub mod room_resolver;
pub mod schedule_importer;
pub mod term_resolver;
pub mod unit_resolver;
pub mod warning_aggregator;

// 重导出核心类型
pub use context::{ImportContext, StagingRecord};
pub use document::{Document, XmlNode};
pub use error::{ImportError, ImportResult};
pub use schedule_importer::ScheduleImporter;
pub use term_resolver::{ImportHeader, TermResolver};

// 重导出 Trait 接口
pub use reference_resolver::{ProtectedMerge, ReferenceResolver};
