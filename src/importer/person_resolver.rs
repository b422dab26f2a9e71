// ==========================================
// 排课数据同步系统 - 教师解析
// ==========================================
// 来源: teachers/teacher (TR_ 前缀)，payrollnumber 作为用户名
// 查找顺序: username → (surname, forename) → code
// 规则: 存储代码不符合系统格式且导入代码符合时，升级存储代码（单向）
// ==========================================

use crate::domain::catalog::Person;
use crate::domain::report::ImportIssue;
use crate::domain::types::{ResourceKind, RowId};
use crate::importer::context::{ImportContext, StagingRecord};
use crate::importer::document::XmlNode;
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{
    by_code, ensure_association, find_first, node_code, optional_text, ProtectedMerge,
    ReferenceResolver,
};
use crate::repository::store::{CatalogStore, Criteria};
use crate::repository::values;
use tracing::{debug, info};

pub struct PersonResolver;

impl PersonResolver {
    /// 按优先级排列的查找条件
    fn lookups(person: &Person) -> Vec<Criteria> {
        let mut lookups = Vec::with_capacity(3);
        if let Some(username) = person.username.as_deref() {
            lookups.push(Criteria::new().eq("username", values::text(username)));
        }
        if let Some(surname) = person.surname.as_deref() {
            lookups.push(
                Criteria::new()
                    .eq("surname", values::text(surname))
                    .eq("forename", values::opt_text(person.forename.as_deref())),
            );
        }
        lookups.push(by_code(&person.code));
        lookups
    }
}

impl<S: CatalogStore> ReferenceResolver<S> for PersonResolver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Person
    }

    fn section(&self) -> &'static str {
        "teachers"
    }

    fn node_name(&self) -> &'static str {
        "teacher"
    }

    fn validate(&self, ctx: &mut ImportContext, node: &XmlNode) {
        let Some(code) = node_code(ctx, ResourceKind::Person, node) else {
            return;
        };
        let Some(surname) = optional_text(node, "surname") else {
            ctx.error(ImportIssue::MissingField {
                kind: ResourceKind::Person,
                code,
                field: "surname".to_string(),
            });
            return;
        };
        let person = Person {
            code: code.clone(),
            surname: Some(surname),
            forename: optional_text(node, "forename"),
            title: optional_text(node, "title"),
            username: optional_text(node, "payrollnumber"),
        };
        ctx.stage(ResourceKind::Person, code, StagingRecord::Person(person));
    }

    fn resolve_id(
        &self,
        ctx: &mut ImportContext,
        store: &S,
        code: &str,
    ) -> ImportResult<Option<RowId>> {
        let Some(StagingRecord::Person(person)) = ctx.staged(ResourceKind::Person, code).cloned()
        else {
            return Ok(None);
        };

        let id = match find_first::<S, Person>(store, &Self::lookups(&person))? {
            Some(mut stored) => {
                let mut changed = stored.record.merge_from(&person);
                if stored.record.code != person.code
                    && !ctx.settings.is_system_person_code(&stored.record.code)
                    && ctx.settings.is_system_person_code(&person.code)
                {
                    info!(
                        person_id = stored.id,
                        from = %stored.record.code,
                        to = %person.code,
                        "人员代码升级为系统格式"
                    );
                    stored.record.code = person.code.clone();
                    changed = true;
                }
                if changed {
                    store.update(stored.id, &stored.record)?;
                }
                stored.id
            }
            None => {
                let id = store.insert(&person)?;
                debug!(person_id = id, code, "新建人员");
                id
            }
        };

        ensure_association(store, ctx.organization_id, ResourceKind::Person, id)?;
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_priority() {
        let person = Person {
            code: "MUS".to_string(),
            surname: Some("Muster".to_string()),
            forename: None,
            title: None,
            username: Some("mmuster".to_string()),
        };
        let lookups = PersonResolver::lookups(&person);
        let first_columns: Vec<&str> = lookups.iter().map(|c| c.clauses()[0].0).collect();
        assert_eq!(first_columns, vec!["username", "surname", "code"]);
    }
}
