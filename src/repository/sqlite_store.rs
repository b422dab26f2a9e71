// ==========================================
// 排课数据同步系统 - SQLite 目录存储
// ==========================================
// 职责: 基于 rusqlite 实现 CatalogStore
// 约束: 所有查询使用参数化；列名只来自 Record 常量
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::RowId;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::{CatalogStore, Criteria, Record, Stored};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// SQLite 目录存储
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// 打开数据库文件创建存储实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建存储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享底层连接（配置读取等场景复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn check_column<R: Record>(column: &str) -> RepositoryResult<()> {
        if column == "id" || R::COLUMNS.contains(&column) {
            Ok(())
        } else {
            Err(RepositoryError::InternalError(format!(
                "{} 没有列 {}",
                R::ENTITY,
                column
            )))
        }
    }

    fn check_arity<R: Record>(values: &[Value]) -> RepositoryResult<()> {
        if values.len() == R::COLUMNS.len() {
            Ok(())
        } else {
            Err(RepositoryError::InternalError(format!(
                "{} 列值数量不匹配: expected={}, actual={}",
                R::ENTITY,
                R::COLUMNS.len(),
                values.len()
            )))
        }
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn find<R: Record>(&self, criteria: &Criteria) -> RepositoryResult<Option<Stored<R>>> {
        let mut conditions = Vec::with_capacity(criteria.clauses().len());
        let mut bind_values = Vec::with_capacity(criteria.clauses().len());
        for (idx, (column, value)) in criteria.clauses().iter().enumerate() {
            Self::check_column::<R>(column)?;
            conditions.push(format!("{} IS ?{}", column, idx + 1));
            bind_values.push(value.clone());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT id, {} FROM {}{} ORDER BY id LIMIT 1",
            R::COLUMNS.join(", "),
            R::TABLE,
            where_clause
        );
        trace!(sql = %sql, "find");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let found = stmt
            .query_row(params_from_iter(bind_values), |row| {
                Ok(Stored {
                    id: row.get(0)?,
                    record: R::from_row(row)?,
                })
            })
            .optional()?;
        Ok(found)
    }

    fn insert<R: Record>(&self, record: &R) -> RepositoryResult<RowId> {
        let values = record.to_values()?;
        Self::check_arity::<R>(&values)?;

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            R::COLUMNS.join(", "),
            placeholders.join(", ")
        );
        trace!(sql = %sql, "insert");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(values))?;
        Ok(conn.last_insert_rowid())
    }

    fn update<R: Record>(&self, id: RowId, record: &R) -> RepositoryResult<()> {
        if R::IMMUTABLE {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "{} 落库后不可修改 (id={})",
                R::ENTITY,
                id
            )));
        }

        let mut values = record.to_values()?;
        Self::check_arity::<R>(&values)?;

        let assignments: Vec<String> = R::COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, column)| format!("{} = ?{}", column, idx + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            R::TABLE,
            assignments.join(", "),
            values.len() + 1
        );
        values.push(Value::Integer(id));
        trace!(sql = %sql, "update");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let changed = stmt.execute(params_from_iter(values))?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: R::ENTITY.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
