// ==========================================
// 排课数据同步系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供目录存储接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod records;
pub mod sqlite_store;
pub mod store;
pub mod values;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use sqlite_store::SqliteCatalogStore;
pub use store::{CatalogStore, Criteria, Record, Stored};
