// ==========================================
// 排课数据同步系统 - 类别解析
// ==========================================
// 来源: departments/department (DP_ 前缀)
// ==========================================

use crate::domain::catalog::Category;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::context::{ImportContext, StagingRecord};
use crate::importer::document::XmlNode;
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{
    by_code, ensure_association, merge_into, node_code, optional_text, ReferenceResolver,
};
use crate::repository::store::CatalogStore;

pub struct CategoryResolver;

impl<S: CatalogStore> ReferenceResolver<S> for CategoryResolver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Category
    }

    fn section(&self) -> &'static str {
        "departments"
    }

    fn node_name(&self) -> &'static str {
        "department"
    }

    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode) {
        let Some(code) = node_code(ctx, ResourceKind::Category, node) else {
            return;
        };
        let category = Category {
            code: code.clone(),
            name: optional_text(node, "longname"),
        };
        ctx.stage(ResourceKind::Category, code, StagingRecord::Category(category));
    }

    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>> {
        let Some(StagingRecord::Category(category)) =
            ctx.staged(ResourceKind::Category, code).cloned()
        else {
            return Ok(None);
        };
        let id = merge_into(store, &[by_code(code)], &category)?;
        ensure_association(store, ctx.organization_id, ResourceKind::Category, id)?;
        Ok(Some(id))
    }
}
