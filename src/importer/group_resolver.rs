// ==========================================
// 排课数据同步系统 - 班级解析
// ==========================================
// 来源: classes/class (CL_ 前缀)
// 依赖: 类别（class_department）与网格（timegrid）须先解析
// ==========================================

use crate::domain::catalog::Group;
use crate::domain::report::ImportIssue;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::context::{GroupStage, ImportContext, StagingRecord};
use crate::importer::document::XmlNode;
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{
    by_code, ensure_association, merge_into, node_code, optional_text, ReferenceResolver,
};
use crate::repository::store::CatalogStore;

pub struct GroupResolver;

impl GroupResolver {
    /// 解析可选引用；给出代码却无法解析时记录警告
    fn optional_reference(
        ctx: &mut ImportContext,
        group_code: &str,
        reference: ResourceKind,
        reference_code: Option<&str>,
    ) -> Option<RowId> {
        let reference_code = reference_code?;
        let id = ctx.resolved_id(reference, reference_code);
        if id.is_none() {
            ctx.warning(ImportIssue::UnresolvedReference {
                kind: ResourceKind::Group,
                code: group_code.to_string(),
                reference,
                reference_code: reference_code.to_string(),
            });
        }
        id
    }
}

impl<S: CatalogStore> ReferenceResolver<S> for GroupResolver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Group
    }

    fn section(&self) -> &'static str {
        "classes"
    }

    fn node_name(&self) -> &'static str {
        "class"
    }

    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode) {
        let Some(code) = node_code(ctx, ResourceKind::Group, node) else {
            return;
        };
        let stage = GroupStage {
            group: Group {
                code: code.clone(),
                name: Some(code.clone()),
                full_name: optional_text(node, "longname"),
                category_id: None,
                grid_id: None,
            },
            category_code: node
                .child_attr("class_department", "id")
                .map(|raw| ResourceKind::Category.strip_code(raw)),
            grid_code: optional_text(node, "timegrid"),
        };
        ctx.stage(ResourceKind::Group, code, StagingRecord::Group(stage));
    }

    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>> {
        let Some(StagingRecord::Group(stage)) = ctx.staged(ResourceKind::Group, code).cloned()
        else {
            return Ok(None);
        };

        let mut group = stage.group;
        group.category_id = Self::optional_reference(
            ctx,
            code,
            ResourceKind::Category,
            stage.category_code.as_deref(),
        );
        group.grid_id =
            Self::optional_reference(ctx, code, ResourceKind::Grid, stage.grid_code.as_deref());

        let id = merge_into(store, &[by_code(code)], &group)?;
        ensure_association(store, ctx.organization_id, ResourceKind::Group, id)?;
        Ok(Some(id))
    }
}
