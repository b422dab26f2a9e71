// ==========================================
// 排课数据同步系统 - 目录存储 Trait
// ==========================================
// 职责: 定义导入核心唯一依赖的三个持久化原语 (find / insert / update)
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::types::RowId;
use crate::repository::error::RepositoryResult;
use rusqlite::types::Value;
use rusqlite::Row;

// ==========================================
// Record Trait - 可持久化实体
// ==========================================
// 约定: 表的第 0 列恒为 id，COLUMNS 从第 1 列开始依次对应
pub trait Record: Sized {
    /// 实体名称（错误信息使用）
    const ENTITY: &'static str;

    /// 表名
    const TABLE: &'static str;

    /// 除 id 外的列名，顺序与 to_values / from_row 一致
    const COLUMNS: &'static [&'static str];

    /// 落库后禁止修改
    const IMMUTABLE: bool = false;

    /// 按 COLUMNS 顺序输出列值
    fn to_values(&self) -> RepositoryResult<Vec<Value>>;

    /// 从查询行构造实体（第 0 列为 id）
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

// ==========================================
// Criteria - 等值查询条件
// ==========================================
// 多个条件之间为 AND；NULL 值按 IS NULL 匹配
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    clauses: Vec<(&'static str, Value)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按主键查询
    pub fn by_id(id: RowId) -> Self {
        Self::new().eq("id", Value::Integer(id))
    }

    /// 追加等值条件
    pub fn eq(mut self, column: &'static str, value: Value) -> Self {
        self.clauses.push((column, value));
        self
    }

    pub fn clauses(&self) -> &[(&'static str, Value)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

// ==========================================
// Stored - 带主键的实体
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<R> {
    pub id: RowId,
    pub record: R,
}

// ==========================================
// CatalogStore Trait
// ==========================================
// 实现者: SqliteCatalogStore（使用 rusqlite）
pub trait CatalogStore {
    /// 按条件查找第一条记录（按 id 升序）
    ///
    /// # 返回
    /// - Ok(Some(stored)): 找到记录
    /// - Ok(None): 未找到
    fn find<R: Record>(&self, criteria: &Criteria) -> RepositoryResult<Option<Stored<R>>>;

    /// 插入记录
    ///
    /// # 返回
    /// - Ok(id): 新记录主键
    fn insert<R: Record>(&self, record: &R) -> RepositoryResult<RowId>;

    /// 按主键整行更新
    ///
    /// # 返回
    /// - Err(BusinessRuleViolation): 实体不可修改
    /// - Err(NotFound): 主键不存在
    fn update<R: Record>(&self, id: RowId, record: &R) -> RepositoryResult<()>;
}
