// ==========================================
// 排课数据同步系统 - 导入参数
// ==========================================
// 职责: 一次导入开始时读取全部配置，导入过程中不再访问配置表
// ==========================================

use crate::config::config_manager::defaults;
use crate::config::import_config_trait::ImportConfigReader;
use crate::domain::types::{RowId, TEACHER_ROLE_ID};
use crate::repository::error::RepositoryResult;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static DEFAULT_PERSON_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(defaults::PERSON_CODE_PATTERN).expect("valid regex"));

/// 导入参数快照
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub default_role_id: RowId,
    pub person_code_pattern: Regex,
    pub cutoff_offset_days: i64,
    pub warning_list_limit: usize,
}

impl ImportSettings {
    /// 从配置读取器加载
    ///
    /// 人员代码正则无法编译时告警并使用默认格式
    pub fn load<C: ImportConfigReader>(config: &C) -> RepositoryResult<Self> {
        let pattern = config.get_person_code_pattern()?;
        let person_code_pattern = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "人员代码格式无效，使用默认格式");
                DEFAULT_PERSON_CODE.clone()
            }
        };

        Ok(Self {
            default_role_id: config.get_default_role_id()?,
            person_code_pattern,
            cutoff_offset_days: config.get_cutoff_offset_days()?,
            warning_list_limit: config.get_warning_list_limit()?,
        })
    }

    /// 代码是否符合系统人员代码格式
    pub fn is_system_person_code(&self, code: &str) -> bool {
        self.person_code_pattern.is_match(code)
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            default_role_id: TEACHER_ROLE_ID,
            person_code_pattern: DEFAULT_PERSON_CODE.clone(),
            cutoff_offset_days: defaults::CUTOFF_OFFSET_DAYS,
            warning_list_limit: defaults::WARNING_LIST_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedConfig {
        pattern: &'static str,
    }

    impl ImportConfigReader for FixedConfig {
        fn get_default_role_id(&self) -> RepositoryResult<RowId> {
            Ok(2)
        }
        fn get_person_code_pattern(&self) -> RepositoryResult<String> {
            Ok(self.pattern.to_string())
        }
        fn get_cutoff_offset_days(&self) -> RepositoryResult<i64> {
            Ok(0)
        }
        fn get_warning_list_limit(&self) -> RepositoryResult<usize> {
            Ok(5)
        }
        fn get_config_snapshot(&self) -> RepositoryResult<String> {
            Ok("{}".to_string())
        }
    }

    #[test]
    fn test_load_reads_all_values() {
        let settings = ImportSettings::load(&FixedConfig { pattern: "^T[0-9]+$" }).unwrap();
        assert_eq!(settings.default_role_id, 2);
        assert_eq!(settings.cutoff_offset_days, 0);
        assert_eq!(settings.warning_list_limit, 5);
        assert!(settings.is_system_person_code("T17"));
        assert!(!settings.is_system_person_code("17"));
    }

    #[test]
    fn test_invalid_pattern_falls_back_to_default() {
        let settings = ImportSettings::load(&FixedConfig { pattern: "([" }).unwrap();
        assert!(settings.is_system_person_code("mmuster"));
        assert!(!settings.is_system_person_code("5"));
    }
}
