// ==========================================
// 排课数据同步系统 - 引用资源解析协议
// ==========================================
// 职责: 定义 validate / resolve_id 协议、保护性合并、归属关系首占规则
// 顺序: 类别、授课方式、网格 → 课程、班级、教师、教室
// ==========================================

use crate::domain::catalog::{Association, Category, Event, Grid, Group, Method, Person, Room, Term};
use crate::domain::report::ImportIssue;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::category_resolver::CategoryResolver;
use crate::importer::context::ImportContext;
use crate::importer::document::XmlNode;
use crate::importer::error::ImportResult;
use crate::importer::event_resolver::EventResolver;
use crate::importer::grid_resolver::GridResolver;
use crate::importer::group_resolver::GroupResolver;
use crate::importer::method_resolver::MethodResolver;
use crate::importer::person_resolver::PersonResolver;
use crate::importer::room_resolver::RoomResolver;
use crate::repository::store::{CatalogStore, Criteria, Record, Stored};
use crate::repository::values;
use tracing::debug;

// ==========================================
// ReferenceResolver Trait
// ==========================================
pub trait ReferenceResolver<S: CatalogStore> {
    /// 资源类型
    fn kind(&self) -> ResourceKind;

    /// 文档中的分支名与条目名
    fn section(&self) -> &'static str;
    fn node_name(&self) -> &'static str;

    /// 校验单个节点并登记暂存记录
    ///
    /// 缺少必填字段时记录错误并跳过该节点（不产生暂存记录）
    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode);

    /// 将暂存记录解析为存储主键（查找或创建，保护性合并）
    ///
    /// # 返回
    /// - Ok(Some(id)): 已解析
    /// - Ok(None): 无法解析（问题已写入上下文）
    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>>;
}

/// 按依赖顺序排列的解析器注册表
pub fn registry<S: CatalogStore>() -> Vec<Box<dyn ReferenceResolver<S>>> {
    vec![
        Box::new(CategoryResolver),
        Box::new(MethodResolver),
        Box::new(GridResolver),
        Box::new(EventResolver),
        Box::new(GroupResolver),
        Box::new(PersonResolver),
        Box::new(RoomResolver),
    ]
}

/// 读取节点 id 并剥离类型前缀；缺失时记录错误
pub fn node_code(ctx: &mut ImportContext, kind: ResourceKind, node: &XmlNode) -> Option<String> {
    match node.id() {
        Some(raw) => Some(kind.strip_code(raw)),
        None => {
            ctx.error(ImportIssue::MissingId { kind });
            None
        }
    }
}

/// 子节点文本转为可选字段
pub fn optional_text(node: &XmlNode, field: &str) -> Option<String> {
    node.child_text(field).map(str::to_string)
}

// ==========================================
// ProtectedMerge - 保护性合并
// ==========================================
// 规则: 仅当存储值为空且导入值非空时写入
pub trait ProtectedMerge {
    /// # 返回
    /// - true: 存储记录有字段被补全
    fn merge_from(&mut self, incoming: &Self) -> bool;
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// 补全文本字段
pub fn fill_text(target: &mut Option<String>, incoming: &Option<String>) -> bool {
    if is_blank(target) && !is_blank(incoming) {
        *target = incoming.clone();
        return true;
    }
    false
}

/// 补全非文本字段
pub fn fill_value<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) -> bool {
    if target.is_none() && incoming.is_some() {
        *target = incoming.clone();
        return true;
    }
    false
}

impl ProtectedMerge for Term {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        fill_text(&mut self.name, &incoming.name)
    }
}

impl ProtectedMerge for Category {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        fill_text(&mut self.name, &incoming.name)
    }
}

impl ProtectedMerge for Method {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        fill_text(&mut self.name, &incoming.name)
    }
}

impl ProtectedMerge for Grid {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        let name = fill_text(&mut self.name, &incoming.name);
        let definition = fill_value(&mut self.definition, &incoming.definition);
        name || definition
    }
}

impl ProtectedMerge for Event {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        let name = fill_text(&mut self.name, &incoming.name);
        let subject_no = fill_text(&mut self.subject_no, &incoming.subject_no);
        let description = fill_text(&mut self.description, &incoming.description);
        name || subject_no || description
    }
}

impl ProtectedMerge for Group {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        let name = fill_text(&mut self.name, &incoming.name);
        let full_name = fill_text(&mut self.full_name, &incoming.full_name);
        let category = fill_value(&mut self.category_id, &incoming.category_id);
        let grid = fill_value(&mut self.grid_id, &incoming.grid_id);
        name || full_name || category || grid
    }
}

impl ProtectedMerge for Person {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        let surname = fill_text(&mut self.surname, &incoming.surname);
        let forename = fill_text(&mut self.forename, &incoming.forename);
        let title = fill_text(&mut self.title, &incoming.title);
        let username = fill_text(&mut self.username, &incoming.username);
        surname || forename || title || username
    }
}

impl ProtectedMerge for Room {
    fn merge_from(&mut self, incoming: &Self) -> bool {
        let name = fill_text(&mut self.name, &incoming.name);
        let capacity = fill_value(&mut self.capacity, &incoming.capacity);
        name || capacity
    }
}

// ==========================================
// 存储辅助
// ==========================================

/// 按优先级依次查找，返回第一个命中
pub fn find_first<S: CatalogStore, R: Record>(
    store: &S,
    lookups: &[Criteria],
) -> ImportResult<Option<Stored<R>>> {
    for criteria in lookups.iter().filter(|c| !c.is_empty()) {
        if let Some(found) = store.find::<R>(criteria)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// 按代码查找的单键查询
pub fn by_code(code: &str) -> Criteria {
    Criteria::new().eq("code", values::text(code))
}

/// 查找或创建并保护性合并
///
/// # 返回
/// - 存储主键
pub fn merge_into<S: CatalogStore, R: Record + ProtectedMerge>(
    store: &S,
    lookups: &[Criteria],
    staged: &R,
) -> ImportResult<RowId> {
    match find_first::<S, R>(store, lookups)? {
        Some(mut stored) => {
            if stored.record.merge_from(staged) {
                store.update(stored.id, &stored.record)?;
                debug!(entity = R::ENTITY, id = stored.id, "已补全存储记录的空字段");
            }
            Ok(stored.id)
        }
        None => {
            let id = store.insert(staged)?;
            debug!(entity = R::ENTITY, id, "新建记录");
            Ok(id)
        }
    }
}

/// 建立资源与组织的归属关系（首占: 资源已有任一归属则不再新增）
///
/// # 返回
/// - true: 本次新建了归属关系
pub fn ensure_association<S: CatalogStore>(
    store: &S,
    organization_id: RowId,
    kind: ResourceKind,
    id: RowId,
) -> ImportResult<bool> {
    let (Some(column), Some(association)) = (
        Association::resource_column(kind),
        Association::for_resource(organization_id, kind, id),
    ) else {
        return Ok(false);
    };

    let existing = store.find::<Association>(&Criteria::new().eq(column, values::int(id)))?;
    if let Some(existing) = existing {
        if existing.record.organization_id != organization_id {
            debug!(
                kind = %kind,
                id,
                owner = existing.record.organization_id,
                "资源已归属其他组织，保持不变"
            );
        }
        return Ok(false);
    }

    store.insert(&association)?;
    Ok(true)
}
