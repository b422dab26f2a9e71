// ==========================================
// 排课数据同步系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 只承载基础设施故障；数据问题进入导入报告，不转为 Err
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("XML 解析失败 (位置 {position}): {message}")]
    XmlParseError { position: usize, message: String },

    #[error("文档结构错误: {0}")]
    MalformedDocument(String),

    // ===== 配置错误 =====
    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    // ===== 数据库错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("导入报告序列化失败: {0}")]
    ReportSerialization(#[from] serde_json::Error),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
