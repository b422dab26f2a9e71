// ==========================================
// 排课数据同步系统 - 排课单元解析
// ==========================================
// 来源: lessons/lesson (LS_ 前缀)
// 流程:
// 1. 无时间模板的单元跳过
// 2. 单元区间按学期裁剪，与学期无交集时静默跳过
// 3. 依次校验: 日期、课程、班级（至少一个）、教师（恰好一个）、授课方式（可选）
// 4. 通过校验的单元落库，按出现掩码展开为课次
// ==========================================

use crate::domain::report::ImportIssue;
use crate::domain::schedule::Unit;
use crate::domain::types::{weekday_number, DateSpan, ResourceKind, RowId};
use crate::importer::context::ImportContext;
use crate::importer::document::{parse_xml_date, parse_xml_time, Document, XmlNode};
use crate::importer::error::ImportResult;
use crate::importer::instance_resolver::{InstanceResolver, Slot, UnitPlan};
use crate::importer::occurrence_expander::OccurrenceExpander;
use crate::importer::reference_resolver::{node_code, optional_text};
use crate::repository::store::{CatalogStore, Criteria};
use crate::repository::values;
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

/// 单元的时间模板（常规: 按星期匹配；临时: 按日期匹配）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub weekday: u32,
    pub period: Option<u32>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub date: Option<NaiveDate>,
    pub room_codes: Vec<String>,
}

impl TimeSlot {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        match self.date {
            Some(explicit) => explicit == date,
            None => self.weekday == weekday_number(date),
        }
    }
}

enum SpanCheck {
    Valid(DateSpan),
    OutsideTerm,
    Invalid,
}

/// 以空白分隔的代码列表（剥离类型前缀、去重、保持顺序）
fn split_codes(raw: Option<&str>, kind: ResourceKind) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for code in raw.unwrap_or_default().split_whitespace() {
        let code = kind.strip_code(code);
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

pub struct UnitResolver;

impl UnitResolver {
    /// 解析全部单元
    pub fn resolve_all<S: CatalogStore>(
        ctx: &mut ImportContext,
        store: &S,
        document: &Document,
    ) -> ImportResult<()> {
        for node in document.entries("lessons", "lesson") {
            Self::resolve_unit(ctx, store, node)?;
        }
        info!(
            total = ctx.summary.units_total,
            expanded = ctx.summary.units_expanded,
            skipped = ctx.summary.units_skipped,
            rejected = ctx.summary.units_rejected,
            "排课单元处理完成"
        );
        Ok(())
    }

    fn resolve_unit<S: CatalogStore>(
        ctx: &mut ImportContext,
        store: &S,
        node: &XmlNode,
    ) -> ImportResult<()> {
        ctx.summary.units_total += 1;
        let Some(code) = node_code(ctx, ResourceKind::Unit, node) else {
            ctx.summary.units_rejected += 1;
            return Ok(());
        };

        let time_nodes: Vec<&XmlNode> = node
            .child("times")
            .map(|times| times.children_named("time").collect())
            .unwrap_or_default();
        if time_nodes.is_empty() {
            debug!(unit = %code, "单元没有时间模板，跳过");
            ctx.summary.units_skipped += 1;
            return Ok(());
        }

        // ===== 校验 =====
        let span = match Self::unit_span(ctx, &code, node) {
            SpanCheck::Valid(span) => Some(span),
            SpanCheck::OutsideTerm => {
                debug!(unit = %code, "单元区间与学期无交集，跳过");
                ctx.summary.units_skipped += 1;
                return Ok(());
            }
            SpanCheck::Invalid => None,
        };
        let event_id = Self::event(ctx, &code, node);
        let (group_codes, group_ids) = Self::groups(ctx, &code, node);
        let person = Self::person(ctx, &code, node);
        let method_id = Self::method(ctx, &code, node);

        let grid_code = optional_text(node, "timegrid").or_else(|| {
            group_codes
                .iter()
                .find_map(|g| ctx.staged_group_grid(g).map(str::to_string))
        });
        let slots = Self::time_slots(ctx, &code, &time_nodes, grid_code.as_deref());

        let (Some(span), Some(slots)) = (span, slots) else {
            ctx.summary.units_rejected += 1;
            return Ok(());
        };

        // ===== 落库 =====
        let plan = match (event_id, person, group_ids.is_empty()) {
            (Some(event_id), Some((person_id, role_id)), false) => {
                let unit = Unit {
                    organization_id: ctx.organization_id,
                    term_id: ctx.term_id,
                    code: code.clone(),
                    grid_id: grid_code
                        .as_deref()
                        .and_then(|g| ctx.resolved_id(ResourceKind::Grid, g)),
                    comment: optional_text(node, "text"),
                    start_date: span.start,
                    end_date: span.end,
                    effective_start: None,
                    effective_end: None,
                    modified: Some(ctx.created),
                };
                let unit_id = Self::persist_unit(store, &unit)?;
                ctx.mark_resolved(ResourceKind::Unit, &code, unit_id);
                ctx.summary.units_expanded += 1;
                Some(UnitPlan {
                    unit_id,
                    code: code.clone(),
                    event_id,
                    person_id,
                    role_id,
                    method_id,
                    group_ids,
                    comment: unit.comment,
                })
            }
            _ => {
                ctx.summary.units_rejected += 1;
                None
            }
        };

        // ===== 展开 =====
        let mask = node.child_text("occurence");
        for (date, occurrence) in OccurrenceExpander::expand(ctx.school_year.start, &span, mask) {
            if !occurrence.is_scheduled() || date <= ctx.cutoff {
                continue;
            }
            for slot in slots.iter().filter(|s| s.applies_to(date)) {
                let room_ids = Self::rooms(ctx, &code, slot, date);
                if let Some(plan) = &plan {
                    let slot = Slot {
                        date,
                        start: slot.start,
                        end: slot.end,
                    };
                    InstanceResolver::materialize(ctx, store, plan, slot, &room_ids)?;
                }
            }
        }
        Ok(())
    }

    /// 单元区间: 缺省为学年，随后按学期裁剪
    fn unit_span(ctx: &mut ImportContext, code: &str, node: &XmlNode) -> SpanCheck {
        let start = Self::optional_date(ctx, code, node, "effectivebegindate");
        let end = Self::optional_date(ctx, code, node, "effectiveenddate");
        let (Ok(start), Ok(end)) = (start, end) else {
            return SpanCheck::Invalid;
        };
        let start = start.unwrap_or(ctx.school_year.start);
        let end = end.unwrap_or(ctx.school_year.end);

        let Some(span) = DateSpan::new(start, end) else {
            ctx.error(ImportIssue::UnitDatesInconsistent {
                code: code.to_string(),
                start,
                end,
            });
            return SpanCheck::Invalid;
        };
        match span.intersect(&ctx.term) {
            Some(clipped) => SpanCheck::Valid(clipped),
            None => SpanCheck::OutsideTerm,
        }
    }

    fn optional_date(
        ctx: &mut ImportContext,
        code: &str,
        node: &XmlNode,
        field: &str,
    ) -> Result<Option<NaiveDate>, ()> {
        let Some(raw) = node.child_text(field) else {
            return Ok(None);
        };
        match parse_xml_date(raw) {
            Some(date) => Ok(Some(date)),
            None => {
                ctx.error(Self::invalid(code, field, raw));
                Err(())
            }
        }
    }

    fn invalid(code: &str, field: &str, value: &str) -> ImportIssue {
        ImportIssue::InvalidField {
            kind: ResourceKind::Unit,
            code: code.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    fn missing(code: &str, field: &str) -> ImportIssue {
        ImportIssue::MissingField {
            kind: ResourceKind::Unit,
            code: code.to_string(),
            field: field.to_string(),
        }
    }

    fn unresolved(code: &str, reference: ResourceKind, reference_code: &str) -> ImportIssue {
        ImportIssue::UnresolvedReference {
            kind: ResourceKind::Unit,
            code: code.to_string(),
            reference,
            reference_code: reference_code.to_string(),
        }
    }

    fn event(ctx: &mut ImportContext, code: &str, node: &XmlNode) -> Option<RowId> {
        let Some(raw) = node.child_attr("lesson_subject", "id") else {
            ctx.error(Self::missing(code, "lesson_subject"));
            return None;
        };
        let event_code = ResourceKind::Event.strip_code(raw);
        let id = ctx.resolved_id(ResourceKind::Event, &event_code);
        if id.is_none() {
            ctx.error(Self::unresolved(code, ResourceKind::Event, &event_code));
        }
        id
    }

    /// 班级: 无法解析的记警告；一个都没有解析时为错误
    fn groups(ctx: &mut ImportContext, code: &str, node: &XmlNode) -> (Vec<String>, Vec<RowId>) {
        let codes = split_codes(node.child_attr("lesson_classes", "id"), ResourceKind::Group);
        let mut resolved_codes = Vec::new();
        let mut ids = Vec::new();
        for group_code in codes {
            match ctx.resolved_id(ResourceKind::Group, &group_code) {
                Some(id) => {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                    resolved_codes.push(group_code);
                }
                None => ctx.warning(Self::unresolved(code, ResourceKind::Group, &group_code)),
            }
        }
        if ids.is_empty() {
            ctx.error(ImportIssue::UnitWithoutGroups {
                code: code.to_string(),
            });
        }
        (resolved_codes, ids)
    }

    /// 教师: 恰好一个；role 属性缺省时使用默认角色
    fn person(ctx: &mut ImportContext, code: &str, node: &XmlNode) -> Option<(RowId, RowId)> {
        let teachers: Vec<&XmlNode> = node.children_named("lesson_teacher").collect();
        let mut entries: Vec<(String, Option<&str>)> = Vec::new();
        for teacher in &teachers {
            for person_code in split_codes(teacher.id(), ResourceKind::Person) {
                entries.push((person_code, teacher.attr("role")));
            }
        }
        if entries.len() != 1 {
            ctx.error(ImportIssue::UnitPersonCount {
                code: code.to_string(),
                count: entries.len(),
            });
            return None;
        }

        let (person_code, role) = &entries[0];
        let Some(person_id) = ctx.resolved_id(ResourceKind::Person, person_code) else {
            ctx.error(Self::unresolved(code, ResourceKind::Person, person_code));
            return None;
        };
        let role_id = match role {
            Some(raw) => match raw.parse::<RowId>() {
                Ok(role_id) => role_id,
                Err(_) => {
                    ctx.warning(Self::invalid(code, "role", raw));
                    ctx.settings.default_role_id
                }
            },
            None => ctx.settings.default_role_id,
        };
        Some((person_id, role_id))
    }

    /// 授课方式: 缺失或无法解析时计入汇总桶
    fn method(ctx: &mut ImportContext, code: &str, node: &XmlNode) -> Option<RowId> {
        let id = node
            .child_attr("lesson_description", "id")
            .map(|raw| ResourceKind::Method.strip_code(raw))
            .and_then(|method_code| ctx.resolved_id(ResourceKind::Method, &method_code));
        if id.is_none() {
            ctx.buckets.missing_methods.insert(code.to_string());
        }
        id
    }

    /// 时间模板；任一模板无效时整个单元不可落库
    fn time_slots(
        ctx: &mut ImportContext,
        code: &str,
        time_nodes: &[&XmlNode],
        grid_code: Option<&str>,
    ) -> Option<Vec<TimeSlot>> {
        let mut slots = Vec::with_capacity(time_nodes.len());
        let mut valid = true;
        for node in time_nodes {
            match Self::time_slot(ctx, code, node, grid_code) {
                Some(slot) => slots.push(slot),
                None => valid = false,
            }
        }
        valid.then_some(slots)
    }

    fn time_slot(
        ctx: &mut ImportContext,
        code: &str,
        node: &XmlNode,
        grid_code: Option<&str>,
    ) -> Option<TimeSlot> {
        let date = match node.child_text("assigned_date") {
            Some(raw) => match parse_xml_date(raw) {
                Some(date) => Some(date),
                None => {
                    ctx.error(Self::invalid(code, "assigned_date", raw));
                    return None;
                }
            },
            None => None,
        };

        let weekday = match node.child_text("assigned_day") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(day) if (1..=7).contains(&day) => day,
                _ => {
                    ctx.error(Self::invalid(code, "assigned_day", raw));
                    return None;
                }
            },
            None => match date {
                Some(date) => weekday_number(date),
                None => {
                    ctx.error(Self::missing(code, "assigned_day"));
                    return None;
                }
            },
        };

        let period = match node.child_text("assigned_period") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(period) => Some(period),
                Err(_) => {
                    ctx.error(Self::invalid(code, "assigned_period", raw));
                    return None;
                }
            },
            None => None,
        };

        let grid_period = period.and_then(|p| {
            grid_code
                .and_then(|g| ctx.grid_definition(g))
                .and_then(|definition| definition.period(p))
        });
        let start = Self::slot_time(ctx, code, node, "assigned_starttime")?
            .or(grid_period.map(|p| p.start));
        let end = Self::slot_time(ctx, code, node, "assigned_endtime")?
            .or(grid_period.map(|p| p.end));
        let (Some(start), Some(end)) = (start, end) else {
            ctx.error(ImportIssue::SlotWithoutTimes {
                code: code.to_string(),
                weekday,
                period,
            });
            return None;
        };

        Some(TimeSlot {
            weekday,
            period,
            start,
            end,
            date,
            room_codes: split_codes(node.child_attr("assigned_room", "id"), ResourceKind::Room),
        })
    }

    /// 读取时间字段；格式无效时记录错误并返回 None，缺失时返回 Some(None)
    fn slot_time(
        ctx: &mut ImportContext,
        code: &str,
        node: &XmlNode,
        field: &str,
    ) -> Option<Option<NaiveTime>> {
        let Some(raw) = node.child_text(field) else {
            return Some(None);
        };
        match parse_xml_time(raw) {
            Some(time) => Some(Some(time)),
            None => {
                ctx.error(Self::invalid(code, field, raw));
                None
            }
        }
    }

    /// 解析时段教室；无法解析或缺失的情况计入汇总桶
    fn rooms(ctx: &mut ImportContext, code: &str, slot: &TimeSlot, date: NaiveDate) -> Vec<RowId> {
        if slot.room_codes.is_empty() {
            ctx.buckets
                .missing_rooms
                .entry((code.to_string(), slot.weekday, slot.period))
                .or_default()
                .insert(date);
            return Vec::new();
        }

        let mut room_ids = Vec::with_capacity(slot.room_codes.len());
        for room_code in &slot.room_codes {
            match ctx.resolved_id(ResourceKind::Room, room_code) {
                Some(id) => room_ids.push(id),
                None => {
                    ctx.buckets
                        .invalid_rooms
                        .entry(code.to_string())
                        .or_default()
                        .insert(room_code.clone());
                }
            }
        }
        room_ids
    }

    /// 单元落库: 按 (组织, 学期, 代码) 查找，存在则更新配置项（保留实际区间）
    fn persist_unit<S: CatalogStore>(store: &S, unit: &Unit) -> ImportResult<RowId> {
        let criteria = Criteria::new()
            .eq("organization_id", values::int(unit.organization_id))
            .eq("term_id", values::int(unit.term_id))
            .eq("code", values::text(&unit.code));
        match store.find::<Unit>(&criteria)? {
            Some(mut stored) => {
                if stored.record.reconfigure(unit) {
                    store.update(stored.id, &stored.record)?;
                    debug!(unit_id = stored.id, code = %unit.code, "单元配置已更新");
                }
                Ok(stored.id)
            }
            None => Ok(store.insert(unit)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn test_split_codes_strips_and_dedups() {
        assert_eq!(
            split_codes(Some(" CL_A1  CL_A2 CL_A1 "), ResourceKind::Group),
            vec!["A1", "A2"]
        );
        assert!(split_codes(None, ResourceKind::Room).is_empty());
    }

    #[test]
    fn test_slot_applies_by_weekday_or_date() {
        let regular = TimeSlot {
            weekday: 1,
            period: Some(1),
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            date: None,
            room_codes: vec![],
        };
        assert!(regular.applies_to(d(3, 4)));
        assert!(!regular.applies_to(d(3, 5)));

        let sporadic = TimeSlot {
            date: Some(d(3, 6)),
            weekday: 3,
            ..regular
        };
        assert!(sporadic.applies_to(d(3, 6)));
        assert!(!sporadic.applies_to(d(3, 13)));
    }
}
