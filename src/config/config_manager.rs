// ==========================================
// 排课数据同步系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::{RowId, TEACHER_ROLE_ID};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值；缺失时使用默认值，解析失败时告警并使用默认值
    fn get_parsed_or_default<T: FromStr>(&self, key: &str, default: T) -> RepositoryResult<T> {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_default_role_id(&self) -> RepositoryResult<RowId> {
        self.get_parsed_or_default(config_keys::DEFAULT_ROLE_ID, TEACHER_ROLE_ID)
    }

    fn get_person_code_pattern(&self) -> RepositoryResult<String> {
        Ok(self
            .get_config_value(config_keys::PERSON_CODE_PATTERN)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::PERSON_CODE_PATTERN.to_string()))
    }

    fn get_cutoff_offset_days(&self) -> RepositoryResult<i64> {
        let days = self.get_parsed_or_default(
            config_keys::CUTOFF_OFFSET_DAYS,
            defaults::CUTOFF_OFFSET_DAYS,
        )?;
        if !(0..=defaults::MAX_CUTOFF_OFFSET_DAYS).contains(&days) {
            warn!(
                config_key = config_keys::CUTOFF_OFFSET_DAYS,
                days,
                max = defaults::MAX_CUTOFF_OFFSET_DAYS,
                "截止日偏移超出范围，使用默认值"
            );
            return Ok(defaults::CUTOFF_OFFSET_DAYS);
        }
        Ok(days)
    }

    fn get_warning_list_limit(&self) -> RepositoryResult<usize> {
        let limit = self
            .get_parsed_or_default(config_keys::WARNING_LIST_LIMIT, defaults::WARNING_LIST_LIMIT)?;
        if limit < defaults::MIN_WARNING_LIST_LIMIT {
            warn!(
                config_key = config_keys::WARNING_LIST_LIMIT,
                limit,
                min = defaults::MIN_WARNING_LIST_LIMIT,
                "逐项列出上限过小，使用默认值"
            );
            return Ok(defaults::WARNING_LIST_LIMIT);
        }
        Ok(limit)
    }

    fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 课次人员
    pub const DEFAULT_ROLE_ID: &str = "default_role_id";
    pub const PERSON_CODE_PATTERN: &str = "person_code_pattern";

    // 截止日
    pub const CUTOFF_OFFSET_DAYS: &str = "cutoff_offset_days";

    // 报告
    pub const WARNING_LIST_LIMIT: &str = "warning_list_limit";
}

/// 配置默认值
pub mod defaults {
    pub const PERSON_CODE_PATTERN: &str = "^[A-Za-z][A-Za-z0-9]*$";
    pub const CUTOFF_OFFSET_DAYS: i64 = 1;
    pub const MAX_CUTOFF_OFFSET_DAYS: i64 = 366;
    pub const WARNING_LIST_LIMIT: usize = 2;
    pub const MIN_WARNING_LIST_LIMIT: usize = 2;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = manager();
        assert_eq!(config.get_default_role_id().unwrap(), 1);
        assert_eq!(config.get_cutoff_offset_days().unwrap(), 1);
        assert_eq!(config.get_warning_list_limit().unwrap(), 2);
        assert_eq!(
            config.get_person_code_pattern().unwrap(),
            defaults::PERSON_CODE_PATTERN
        );
    }

    #[test]
    fn test_set_and_read_back() {
        let config = manager();
        config.set_config_value(config_keys::DEFAULT_ROLE_ID, "3").unwrap();
        config.set_config_value(config_keys::DEFAULT_ROLE_ID, "4").unwrap();
        assert_eq!(config.get_default_role_id().unwrap(), 4);
    }

    #[test]
    fn test_unparseable_value_falls_back() {
        let config = manager();
        config
            .set_config_value(config_keys::WARNING_LIST_LIMIT, "many")
            .unwrap();
        config
            .set_config_value(config_keys::CUTOFF_OFFSET_DAYS, "-3")
            .unwrap();
        assert_eq!(config.get_warning_list_limit().unwrap(), 2);
        assert_eq!(config.get_cutoff_offset_days().unwrap(), 1);
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let config = manager();
        config
            .set_config_value(config_keys::CUTOFF_OFFSET_DAYS, "1000000000")
            .unwrap();
        config.set_config_value(config_keys::WARNING_LIST_LIMIT, "0").unwrap();
        assert_eq!(config.get_cutoff_offset_days().unwrap(), 1);
        assert_eq!(config.get_warning_list_limit().unwrap(), 2);

        config.set_config_value(config_keys::CUTOFF_OFFSET_DAYS, "366").unwrap();
        config.set_config_value(config_keys::WARNING_LIST_LIMIT, "4").unwrap();
        assert_eq!(config.get_cutoff_offset_days().unwrap(), 366);
        assert_eq!(config.get_warning_list_limit().unwrap(), 4);
    }

    #[test]
    fn test_snapshot_lists_global_values() {
        let config = manager();
        config.set_config_value(config_keys::WARNING_LIST_LIMIT, "5").unwrap();
        let snapshot: serde_json::Value =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot["warning_list_limit"], "5");
    }
}
