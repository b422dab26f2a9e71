// ==========================================
// 排课数据同步系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::RowId;
use crate::repository::error::RepositoryResult;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader {
    /// 获取课次人员默认角色
    ///
    /// # 默认值
    /// - 1（教师）
    fn get_default_role_id(&self) -> RepositoryResult<RowId>;

    /// 获取系统人员代码格式（正则表达式）
    ///
    /// # 说明
    /// 已存人员代码不符合、导入代码符合时，升级为导入代码
    ///
    /// # 默认值
    /// - ^[A-Za-z][A-Za-z0-9]*$
    fn get_person_code_pattern(&self) -> RepositoryResult<String>;

    /// 获取截止日偏移天数
    ///
    /// # 说明
    /// 截止日 = 导出生成日期 - 偏移天数；截止日及之前的课次不落库
    ///
    /// # 默认值
    /// - 1
    fn get_cutoff_offset_days(&self) -> RepositoryResult<i64>;

    /// 获取汇总警告逐项列出的上限
    ///
    /// # 默认值
    /// - 2（超过则折叠为数量）
    fn get_warning_list_limit(&self) -> RepositoryResult<usize>;

    /// 获取全部配置的快照（JSON 对象，键 → 原始值）
    ///
    /// # 用途
    /// - 写入导入记录，便于追溯导入时生效的配置
    fn get_config_snapshot(&self) -> RepositoryResult<String>;
}
