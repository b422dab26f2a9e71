// ==========================================
// 排课数据同步系统 - 教室解析
// ==========================================
// 来源: rooms/room (RM_ 前缀)
// 红线: 教室为物理资产，不随导入创建；存储中不存在即为阻断性错误
// ==========================================

use crate::domain::catalog::Room;
use crate::domain::report::ImportIssue;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::context::{ImportContext, StagingRecord};
use crate::importer::document::XmlNode;
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{
    by_code, ensure_association, find_first, node_code, optional_text, ProtectedMerge,
    ReferenceResolver,
};
use crate::repository::store::CatalogStore;

pub struct RoomResolver;

impl<S: CatalogStore> ReferenceResolver<S> for RoomResolver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Room
    }

    fn section(&self) -> &'static str {
        "rooms"
    }

    fn node_name(&self) -> &'static str {
        "room"
    }

    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode) {
        let Some(code) = node_code(ctx, ResourceKind::Room, node) else {
            return;
        };
        let capacity = match node.child_text("capacity") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) if value >= 0 => Some(value),
                _ => {
                    ctx.warning(ImportIssue::InvalidField {
                        kind: ResourceKind::Room,
                        code: code.clone(),
                        field: "capacity".to_string(),
                        value: raw.to_string(),
                    });
                    None
                }
            },
            None => None,
        };
        let room = Room {
            code: code.clone(),
            name: optional_text(node, "longname"),
            capacity,
        };
        ctx.stage(ResourceKind::Room, code, StagingRecord::Room(room));
    }

    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>> {
        let Some(StagingRecord::Room(room)) = ctx.staged(ResourceKind::Room, code).cloned() else {
            return Ok(None);
        };

        let Some(mut stored) = find_first::<S, Room>(store, &[by_code(code)])? else {
            ctx.error(ImportIssue::RoomNotFound {
                code: code.to_string(),
            });
            return Ok(None);
        };
        if stored.record.merge_from(&room) {
            store.update(stored.id, &stored.record)?;
        }

        ensure_association(store, ctx.organization_id, ResourceKind::Room, stored.id)?;
        Ok(Some(stored.id))
    }
}
