// ==========================================
// 排课数据同步系统 - 导入编排
// ==========================================
// 流程: 丢弃无关分支 → 文件头校验 → 重复导入检测 → 学期落库
//       → 引用资源解析（固定顺序）→ 单元展开 → 实际区间回写 → 警告汇总 → 报告
// 红线:
// - 文件头无效、重复导入: 整体终止，不做任何写入
// - 单个节点的问题只影响该节点及其依赖
// - 仅成功的导入写入导入记录
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::report::{ImportIssue, ImportReport, ImportSummary};
use crate::domain::schedule::ImportRun;
use crate::domain::types::RowId;
use crate::importer::context::ImportContext;
use crate::importer::document::Document;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::instance_resolver::InstanceResolver;
use crate::importer::reference_resolver::registry;
use crate::importer::term_resolver::TermResolver;
use crate::importer::unit_resolver::UnitResolver;
use crate::importer::warning_aggregator::WarningAggregator;
use crate::repository::store::CatalogStore;
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ScheduleImporter - 排课导入器
// ==========================================
pub struct ScheduleImporter<S, C>
where
    S: CatalogStore,
    C: ImportConfigReader,
{
    // 数据访问层
    store: S,

    // 配置读取器
    config: C,
}

impl<S, C> ScheduleImporter<S, C>
where
    S: CatalogStore,
    C: ImportConfigReader,
{
    /// # 参数
    /// - store: 存储
    /// - config: 配置读取器（每次导入开始时读取一次）
    pub fn new(store: S, config: C) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 从文件导入
    pub fn import_file(&self, path: &Path, organization_id: RowId) -> ImportResult<ImportReport> {
        info!(path = %path.display(), organization_id, "读取导出文件");
        let document = Document::load(path)?;
        self.validate(document, organization_id)
    }

    /// 从 XML 文本导入
    pub fn import_str(&self, xml: &str, organization_id: RowId) -> ImportResult<ImportReport> {
        let document = Document::parse(xml)?;
        self.validate(document, organization_id)
    }

    /// 处理一份导出文档
    ///
    /// # 返回
    /// - Ok(ImportReport): 导入报告（数据问题都在报告中）
    /// - Err: 基础设施故障（存储、配置）
    #[instrument(skip(self, document), fields(run_id))]
    pub fn validate(
        &self,
        mut document: Document,
        organization_id: RowId,
    ) -> ImportResult<ImportReport> {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        info!(organization_id, "开始导入排课数据");

        // === 步骤 1: 丢弃无关分支 ===
        document.strip_unused();

        // === 步骤 2: 文件头 ===
        let check = TermResolver::validate(document.section("general"));
        let Some(header) = check.header else {
            warn!(errors = check.errors.len(), "文件头无效，终止导入");
            return Ok(ImportReport::new(
                run_id,
                check.errors,
                check.warnings,
                ImportSummary::default(),
            ));
        };

        // === 步骤 3: 重复导入检测 ===
        let existing_term = TermResolver::find_term(&self.store, &header)?;
        if let Some(term) = &existing_term {
            if let Some(previous) =
                TermResolver::find_previous_run(&self.store, organization_id, term.id, header.created)?
            {
                warn!(previous_run = %previous.record.run_id, "重复导入，终止");
                return Ok(ImportReport::new(
                    run_id,
                    vec![ImportIssue::DuplicateImport {
                        created: header.created,
                    }],
                    check.warnings,
                    ImportSummary::default(),
                ));
            }
        }

        // === 步骤 4: 学期与参数 ===
        let settings =
            ImportSettings::load(&self.config).map_err(|e| ImportError::ConfigReadError(e.to_string()))?;
        let term_id = TermResolver::resolve_id(&self.store, &header, existing_term)?;
        let mut ctx = ImportContext::new(run_id, organization_id, term_id, &header, settings);
        for issue in check.warnings {
            ctx.warning(issue);
        }

        // === 步骤 5: 引用资源 ===
        for resolver in registry::<S>() {
            let kind = resolver.kind();
            for node in document.entries(resolver.section(), resolver.node_name()) {
                resolver.validate(&mut ctx, node);
            }
            for code in ctx.staged_codes(kind) {
                if let Some(id) = resolver.resolve_id(&mut ctx, &self.store, &code)? {
                    ctx.mark_resolved(kind, &code, id);
                }
            }
            debug!(kind = %kind, resolved = ctx.resolved_count(kind), "引用资源解析完成");
        }

        // === 步骤 6: 单元 ===
        UnitResolver::resolve_all(&mut ctx, &self.store, &document)?;
        InstanceResolver::write_back_effective_dates(&mut ctx, &self.store)?;

        // === 步骤 7: 报告 ===
        WarningAggregator::flush(&mut ctx);
        ctx.clear_staging();

        let report = ImportReport::new(ctx.run_id, ctx.errors, ctx.warnings, ctx.summary);
        if report.success {
            self.record_run(&report, organization_id, term_id, header.created)?;
        }
        info!(
            success = report.success,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "排课数据导入结束"
        );
        Ok(report)
    }

    fn record_run(
        &self,
        report: &ImportReport,
        organization_id: RowId,
        term_id: RowId,
        created: chrono::NaiveDateTime,
    ) -> ImportResult<()> {
        let run = ImportRun {
            run_id: report.run_id.clone(),
            organization_id,
            term_id,
            created,
            imported_at: Utc::now(),
            error_count: report.errors.len() as i64,
            warning_count: report.warnings.len() as i64,
            report_json: Some(serde_json::to_string(report)?),
            config_snapshot: Some(self.config.get_config_snapshot()?),
        };
        let id = self.store.insert(&run)?;
        debug!(import_run_id = id, "导入记录已写入");
        Ok(())
    }
}
