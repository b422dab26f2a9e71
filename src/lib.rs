// ==========================================
// 排课数据同步系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 将外部排课软件的导出文件合并进共享的课表库
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 导出文件解析与合并
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{ConfigManager, ImportConfigReader, ImportSettings};
pub use domain::report::{ImportIssue, ImportReport, ImportSummary};
pub use domain::types::{DateSpan, ResourceKind, RowId};
pub use importer::{ImportError, ImportResult, ScheduleImporter};
pub use repository::{CatalogStore, RepositoryError, RepositoryResult, SqliteCatalogStore};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "排课数据同步系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
