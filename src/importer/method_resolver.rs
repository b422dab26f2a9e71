// ==========================================
// 排课数据同步系统 - 授课方式解析
// ==========================================
// 来源: descriptions/description (DS_ 前缀)
// 说明: 单元的授课方式为可选项，缺失只计入汇总警告
// ==========================================

use crate::domain::catalog::Method;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::context::{ImportContext, StagingRecord};
use crate::importer::document::XmlNode;
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{
    by_code, ensure_association, merge_into, node_code, optional_text, ReferenceResolver,
};
use crate::repository::store::CatalogStore;

pub struct MethodResolver;

impl<S: CatalogStore> ReferenceResolver<S> for MethodResolver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Method
    }

    fn section(&self) -> &'static str {
        "descriptions"
    }

    fn node_name(&self) -> &'static str {
        "description"
    }

    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode) {
        let Some(code) = node_code(ctx, ResourceKind::Method, node) else {
            return;
        };
        let method = Method {
            code: code.clone(),
            name: optional_text(node, "longname"),
        };
        ctx.stage(ResourceKind::Method, code, StagingRecord::Method(method));
    }

    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>> {
        let Some(StagingRecord::Method(method)) = ctx.staged(ResourceKind::Method, code).cloned()
        else {
            return Ok(None);
        };
        let id = merge_into(store, &[by_code(code)], &method)?;
        ensure_association(store, ctx.organization_id, ResourceKind::Method, id)?;
        Ok(Some(id))
    }
}
