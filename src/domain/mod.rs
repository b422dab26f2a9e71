// ==========================================
// 排课数据同步系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、导入报告
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod catalog;
pub mod report;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use catalog::{
    Association, Category, Event, Grid, GridDefinition, Group, Method, PeriodSpan, Person, Room,
    Term,
};
pub use report::{ImportIssue, ImportReport, ImportSummary, Listing};
pub use schedule::{Block, ImportRun, Instance, InstanceGroup, InstancePerson, InstanceRoom, Unit};
pub use types::{DateSpan, OccurrenceCode, ResourceKind, RowId, TEACHER_ROLE_ID};
