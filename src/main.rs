// ==========================================
// 排课数据同步系统 - 命令行入口
// ==========================================
// 用法: timetable-sync <export.xml> <organization_id> [db_path]
// 退出码: 0 = 导入成功；1 = 报告含错误；2 = 参数或运行环境错误
// ==========================================

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use timetable_sync::db::{init_schema, open_sqlite_connection};
use timetable_sync::{logging, ConfigManager, RowId, ScheduleImporter, SqliteCatalogStore};

/// 数据库路径环境变量
const DB_PATH_ENV: &str = "TIMETABLE_SYNC_DB_PATH";

/// 默认数据库路径: 环境变量优先，其次用户数据目录
fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("timetable-sync");
            std::fs::create_dir_all(&dir).ok();
            dir.join("timetable_sync.db")
        }
        None => PathBuf::from("./timetable_sync.db"),
    }
}

fn run() -> Result<bool> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("用法: timetable-sync <export.xml> <organization_id> [db_path]");
    }

    let export_path = Path::new(&args[0]);
    let organization_id: RowId = args[1]
        .parse()
        .with_context(|| format!("组织编号无效: {}", args[1]))?;
    let db_path = args.get(2).map(PathBuf::from).unwrap_or_else(default_db_path);

    tracing::info!("==================================================");
    tracing::info!("{} v{}", timetable_sync::APP_NAME, timetable_sync::VERSION);
    tracing::info!("使用数据库: {}", db_path.display());
    tracing::info!("==================================================");

    let db_path_str = db_path
        .to_str()
        .with_context(|| format!("数据库路径不是有效的 UTF-8: {}", db_path.display()))?;
    let conn: Connection = open_sqlite_connection(db_path_str)
        .with_context(|| format!("无法打开数据库: {}", db_path.display()))?;
    init_schema(&conn).context("初始化数据库 schema 失败")?;

    let conn = Arc::new(Mutex::new(conn));
    let store = SqliteCatalogStore::from_connection(Arc::clone(&conn));
    let config = ConfigManager::from_connection(conn).context("初始化配置管理器失败")?;
    let importer = ScheduleImporter::new(store, config);

    let report = importer
        .import_file(export_path, organization_id)
        .with_context(|| format!("导入失败: {}", export_path.display()))?;

    println!("{}", report.to_text());
    println!(
        "Units: {} total, {} expanded, {} skipped, {} rejected; instances: {} created, {} updated",
        report.summary.units_total,
        report.summary.units_expanded,
        report.summary.units_skipped,
        report.summary.units_rejected,
        report.summary.instances_created,
        report.summary.instances_updated,
    );
    Ok(report.success)
}

fn main() -> ExitCode {
    logging::init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
