// ==========================================
// 排课数据同步系统 - 时间网格解析
// ==========================================
// 来源: timeperiods/timeperiod，按 timegrid 名称聚合为网格定义
// 红线: 网格不随导入创建；存储中不存在即为阻断性错误
// 说明: 网格与组织无关，不建立归属关系
// ==========================================

use crate::domain::catalog::{Grid, GridDefinition, PeriodSpan};
use crate::domain::report::ImportIssue;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::context::{ImportContext, StagingRecord};
use crate::importer::document::{parse_xml_time, XmlNode};
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{by_code, find_first, ProtectedMerge, ReferenceResolver};
use crate::repository::store::CatalogStore;
use chrono::NaiveTime;
use tracing::debug;

pub struct GridResolver;

/// 读取必填的数值字段；缺失或无效时记录错误
fn required_number(
    ctx: &mut ImportContext,
    node: &XmlNode,
    code: &str,
    field: &str,
    valid: impl Fn(u32) -> bool,
) -> Option<u32> {
    let Some(raw) = node.child_text(field) else {
        ctx.error(ImportIssue::MissingField {
            kind: ResourceKind::Grid,
            code: code.to_string(),
            field: field.to_string(),
        });
        return None;
    };
    match raw.parse::<u32>() {
        Ok(value) if valid(value) => Some(value),
        _ => {
            ctx.error(ImportIssue::InvalidField {
                kind: ResourceKind::Grid,
                code: code.to_string(),
                field: field.to_string(),
                value: raw.to_string(),
            });
            None
        }
    }
}

fn required_time(ctx: &mut ImportContext, node: &XmlNode, code: &str, field: &str) -> Option<NaiveTime> {
    let Some(raw) = node.child_text(field) else {
        ctx.error(ImportIssue::MissingField {
            kind: ResourceKind::Grid,
            code: code.to_string(),
            field: field.to_string(),
        });
        return None;
    };
    let parsed = parse_xml_time(raw);
    if parsed.is_none() {
        ctx.error(ImportIssue::InvalidField {
            kind: ResourceKind::Grid,
            code: code.to_string(),
            field: field.to_string(),
            value: raw.to_string(),
        });
    }
    parsed
}

impl<S: CatalogStore> ReferenceResolver<S> for GridResolver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Grid
    }

    fn section(&self) -> &'static str {
        "timeperiods"
    }

    fn node_name(&self) -> &'static str {
        "timeperiod"
    }

    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode) {
        let label = node.id().unwrap_or("?").to_string();
        let Some(grid_code) = node.child_text("timegrid").map(str::to_string) else {
            ctx.error(ImportIssue::MissingField {
                kind: ResourceKind::Grid,
                code: label,
                field: "timegrid".to_string(),
            });
            return;
        };

        let day = required_number(ctx, node, &grid_code, "day", |d| (1..=7).contains(&d));
        let period = required_number(ctx, node, &grid_code, "period", |p| p > 0);
        let start = required_time(ctx, node, &grid_code, "starttime");
        let end = required_time(ctx, node, &grid_code, "endtime");
        let (Some(day), Some(period), Some(start), Some(end)) = (day, period, start, end) else {
            return;
        };
        let span = PeriodSpan { start, end };

        match ctx.staged_mut(ResourceKind::Grid, &grid_code) {
            Some(StagingRecord::Grid(grid)) => match grid.definition.as_mut() {
                Some(definition) => definition.add_period(day, period, span),
                None => grid.definition = Some(GridDefinition::new(day, period, span)),
            },
            _ => {
                let grid = Grid {
                    code: grid_code.clone(),
                    name: Some(grid_code.clone()),
                    definition: Some(GridDefinition::new(day, period, span)),
                };
                ctx.stage(ResourceKind::Grid, grid_code, StagingRecord::Grid(grid));
            }
        }
    }

    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>> {
        let Some(StagingRecord::Grid(staged)) = ctx.staged(ResourceKind::Grid, code).cloned() else {
            return Ok(None);
        };

        let Some(mut stored) = find_first::<S, Grid>(store, &[by_code(code)])? else {
            ctx.error(ImportIssue::GridNotFound {
                code: code.to_string(),
            });
            return Ok(None);
        };

        if stored.record.merge_from(&staged) {
            store.update(stored.id, &stored.record)?;
            debug!(grid_id = stored.id, code, "网格定义已补全");
        }
        if let Some(definition) = stored.record.definition {
            ctx.set_grid_definition(code, definition);
        }
        Ok(Some(stored.id))
    }
}
