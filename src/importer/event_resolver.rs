// ==========================================
// 排课数据同步系统 - 课程解析
// ==========================================
// 来源: subjects/subject (SU_ 前缀)
// 映射: longname → name, subjectgroup → subject_no, text → description
// ==========================================

use crate::domain::catalog::Event;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::context::{ImportContext, StagingRecord};
use crate::importer::document::XmlNode;
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{
    by_code, ensure_association, merge_into, node_code, optional_text, ReferenceResolver,
};
use crate::repository::store::CatalogStore;

pub struct EventResolver;

impl<S: CatalogStore> ReferenceResolver<S> for EventResolver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Event
    }

    fn section(&self) -> &'static str {
        "subjects"
    }

    fn node_name(&self) -> &'static str {
        "subject"
    }

    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode) {
        let Some(code) = node_code(ctx, ResourceKind::Event, node) else {
            return;
        };
        let event = Event {
            code: code.clone(),
            name: optional_text(node, "longname"),
            subject_no: optional_text(node, "subjectgroup"),
            description: optional_text(node, "text"),
        };
        ctx.stage(ResourceKind::Event, code, StagingRecord::Event(event));
    }

    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>> {
        let Some(StagingRecord::Event(event)) = ctx.staged(ResourceKind::Event, code).cloned()
        else {
            return Ok(None);
        };
        let id = merge_into(store, &[by_code(code)], &event)?;
        ensure_association(store, ctx.organization_id, ResourceKind::Event, id)?;
        Ok(Some(id))
    }
}
