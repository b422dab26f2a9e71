// ==========================================
// 排课数据同步系统 - 课次实例落库
// ==========================================
// 职责: 为 (单元, 日期, 时段) 查找或创建时间块、课次、课次人员，并追加班级/教室关联
// 红线:
// - 时间块落库后不修改
// - 班级/教室关联只增不删
// - 所有写入路径幂等（按自然键先查后写）
// ==========================================

use crate::domain::schedule::{Block, Instance, InstanceGroup, InstancePerson, InstanceRoom, Unit};
use crate::domain::types::{weekday_number, RowId};
use crate::importer::context::ImportContext;
use crate::importer::error::ImportResult;
use crate::repository::store::{CatalogStore, Criteria};
use crate::repository::values;
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

/// 通过校验、可落库的单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPlan {
    pub unit_id: RowId,
    pub code: String,
    pub event_id: RowId,
    pub person_id: RowId,
    pub role_id: RowId,
    pub method_id: Option<RowId>,
    pub group_ids: Vec<RowId>,
    pub comment: Option<String>,
}

/// 单次落库的时段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

pub struct InstanceResolver;

impl InstanceResolver {
    /// 落库一个课次
    pub fn materialize<S: CatalogStore>(
        ctx: &mut ImportContext,
        store: &S,
        plan: &UnitPlan,
        slot: Slot,
        room_ids: &[RowId],
    ) -> ImportResult<()> {
        let block_id = Self::resolve_block(store, slot)?;
        let instance_id = Self::resolve_instance(ctx, store, plan, block_id)?;
        let assoc_id = Self::resolve_person(ctx, store, plan, instance_id)?;

        for &group_id in &plan.group_ids {
            Self::link_group(ctx, store, assoc_id, group_id)?;
        }
        for &room_id in room_ids {
            Self::link_room(ctx, store, assoc_id, room_id)?;
        }

        ctx.touch_unit(plan.unit_id, slot.date);
        Ok(())
    }

    fn resolve_block<S: CatalogStore>(store: &S, slot: Slot) -> ImportResult<RowId> {
        let criteria = Criteria::new()
            .eq("date", values::date(slot.date))
            .eq("start_time", values::time(slot.start))
            .eq("end_time", values::time(slot.end));
        if let Some(block) = store.find::<Block>(&criteria)? {
            return Ok(block.id);
        }
        let block = Block {
            date: slot.date,
            day_of_week: weekday_number(slot.date),
            start_time: slot.start,
            end_time: slot.end,
        };
        Ok(store.insert(&block)?)
    }

    fn resolve_instance<S: CatalogStore>(
        ctx: &mut ImportContext,
        store: &S,
        plan: &UnitPlan,
        block_id: RowId,
    ) -> ImportResult<RowId> {
        let criteria = Criteria::new()
            .eq("unit_id", values::int(plan.unit_id))
            .eq("block_id", values::int(block_id))
            .eq("event_id", values::int(plan.event_id));

        match store.find::<Instance>(&criteria)? {
            Some(mut stored) => {
                let instance = &mut stored.record;
                if instance.method_id != plan.method_id
                    || instance.comment != plan.comment
                    || instance.modified.is_none()
                {
                    instance.method_id = plan.method_id;
                    instance.comment = plan.comment.clone();
                    instance.modified = Some(ctx.created);
                    store.update(stored.id, &stored.record)?;
                    ctx.summary.instances_updated += 1;
                }
                Ok(stored.id)
            }
            None => {
                let instance = Instance {
                    unit_id: plan.unit_id,
                    block_id,
                    event_id: plan.event_id,
                    method_id: plan.method_id,
                    comment: plan.comment.clone(),
                    modified: Some(ctx.created),
                };
                let id = store.insert(&instance)?;
                ctx.summary.instances_created += 1;
                Ok(id)
            }
        }
    }

    fn resolve_person<S: CatalogStore>(
        ctx: &ImportContext,
        store: &S,
        plan: &UnitPlan,
        instance_id: RowId,
    ) -> ImportResult<RowId> {
        let criteria = Criteria::new()
            .eq("instance_id", values::int(instance_id))
            .eq("person_id", values::int(plan.person_id));

        match store.find::<InstancePerson>(&criteria)? {
            Some(mut stored) => {
                let link = &mut stored.record;
                if link.role_id != plan.role_id {
                    link.role_id = plan.role_id;
                    link.modified = Some(ctx.created);
                    store.update(stored.id, &stored.record)?;
                } else if link.modified.is_none() {
                    link.modified = Some(ctx.created);
                    store.update(stored.id, &stored.record)?;
                }
                Ok(stored.id)
            }
            None => {
                let link = InstancePerson {
                    instance_id,
                    person_id: plan.person_id,
                    role_id: plan.role_id,
                    modified: Some(ctx.created),
                };
                Ok(store.insert(&link)?)
            }
        }
    }

    fn link_group<S: CatalogStore>(
        ctx: &ImportContext,
        store: &S,
        assoc_id: RowId,
        group_id: RowId,
    ) -> ImportResult<()> {
        let criteria = Criteria::new()
            .eq("assoc_id", values::int(assoc_id))
            .eq("group_id", values::int(group_id));
        match store.find::<InstanceGroup>(&criteria)? {
            Some(mut stored) if stored.record.modified.is_none() => {
                stored.record.modified = Some(ctx.created);
                store.update(stored.id, &stored.record)?;
            }
            Some(_) => {}
            None => {
                store.insert(&InstanceGroup {
                    assoc_id,
                    group_id,
                    modified: Some(ctx.created),
                })?;
            }
        }
        Ok(())
    }

    fn link_room<S: CatalogStore>(
        ctx: &ImportContext,
        store: &S,
        assoc_id: RowId,
        room_id: RowId,
    ) -> ImportResult<()> {
        let criteria = Criteria::new()
            .eq("assoc_id", values::int(assoc_id))
            .eq("room_id", values::int(room_id));
        match store.find::<InstanceRoom>(&criteria)? {
            Some(mut stored) if stored.record.modified.is_none() => {
                stored.record.modified = Some(ctx.created);
                store.update(stored.id, &stored.record)?;
            }
            Some(_) => {}
            None => {
                store.insert(&InstanceRoom {
                    assoc_id,
                    room_id,
                    modified: Some(ctx.created),
                })?;
            }
        }
        Ok(())
    }

    /// 回写各单元的实际落地区间（与已有区间合并，不超出配置区间）
    ///
    /// # 返回
    /// - 区间发生变化的单元数
    pub fn write_back_effective_dates<S: CatalogStore>(
        ctx: &mut ImportContext,
        store: &S,
    ) -> ImportResult<usize> {
        let mut changed = 0;
        for (unit_id, touched) in ctx.take_touched_units() {
            let Some(mut stored) = store.find::<Unit>(&Criteria::by_id(unit_id))? else {
                continue;
            };
            if stored.record.absorb_materialized(&touched) {
                store.update(stored.id, &stored.record)?;
                debug!(unit_id, span = %touched, "单元实际区间已更新");
                changed += 1;
            }
        }
        info!(changed, "单元实际区间回写完成");
        Ok(changed)
    }
}
