// ==========================================
// 排课数据同步系统 - 排课领域模型
// ==========================================
// 职责: 排课单元、时间块、课次实例及其关联、导入记录
// ==========================================

use crate::domain::types::{DateSpan, RowId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Unit - 排课单元
// ==========================================
// 唯一键: (organization_id, term_id, code)
// 红线: effective ⊆ configured ⊆ term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub organization_id: RowId,
    pub term_id: RowId,
    pub code: String,
    pub grid_id: Option<RowId>,
    pub comment: Option<String>,

    // ===== 配置区间（已按学期裁剪）=====
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    // ===== 实际落地区间 =====
    pub effective_start: Option<NaiveDate>,
    pub effective_end: Option<NaiveDate>,

    pub modified: Option<NaiveDateTime>,
}

impl Unit {
    pub fn configured_span(&self) -> Option<DateSpan> {
        DateSpan::new(self.start_date, self.end_date)
    }

    pub fn effective_span(&self) -> Option<DateSpan> {
        match (self.effective_start, self.effective_end) {
            (Some(start), Some(end)) => DateSpan::new(start, end),
            _ => None,
        }
    }

    /// 以导入数据更新配置项；已有实际区间按新配置区间收窄
    ///
    /// # 返回
    /// - true: 有字段发生变化
    pub fn reconfigure(&mut self, incoming: &Unit) -> bool {
        let mut changed = self.grid_id != incoming.grid_id
            || self.comment != incoming.comment
            || self.start_date != incoming.start_date
            || self.end_date != incoming.end_date;
        self.grid_id = incoming.grid_id;
        self.comment = incoming.comment.clone();
        self.start_date = incoming.start_date;
        self.end_date = incoming.end_date;

        if let Some(effective) = self.effective_span() {
            let clamped = self.configured_span().and_then(|c| effective.intersect(&c));
            if clamped != Some(effective) {
                self.effective_start = clamped.map(|s| s.start);
                self.effective_end = clamped.map(|s| s.end);
                changed = true;
            }
        }
        if changed {
            self.modified = incoming.modified;
        }
        changed
    }

    /// 合并本次落地的日期区间，结果不超出配置区间
    ///
    /// # 返回
    /// - true: 实际区间发生变化
    pub fn absorb_materialized(&mut self, touched: &DateSpan) -> bool {
        let Some(configured) = self.configured_span() else {
            return false;
        };
        let merged = match self.effective_span() {
            Some(existing) => existing.union(touched),
            None => *touched,
        };
        let Some(clamped) = merged.intersect(&configured) else {
            return false;
        };
        if self.effective_span() == Some(clamped) {
            return false;
        }
        self.effective_start = Some(clamped.start);
        self.effective_end = Some(clamped.end);
        true
    }
}

// ==========================================
// Block - 时间块
// ==========================================
// 唯一键: (date, start_time, end_time)
// 红线: 落库后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub date: NaiveDate,
    pub day_of_week: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

// ==========================================
// Instance - 课次实例
// ==========================================
// 唯一键: (unit_id, block_id, event_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub unit_id: RowId,
    pub block_id: RowId,
    pub event_id: RowId,
    pub method_id: Option<RowId>,
    pub comment: Option<String>,
    pub modified: Option<NaiveDateTime>,
}

// ==========================================
// InstancePerson - 课次与教师关联
// ==========================================
// 唯一键: (instance_id, person_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePerson {
    pub instance_id: RowId,
    pub person_id: RowId,
    pub role_id: RowId,
    pub modified: Option<NaiveDateTime>,
}

// ==========================================
// InstanceGroup / InstanceRoom - 课次附属关联
// ==========================================
// 唯一键: (assoc_id, group_id / room_id)；assoc_id 指向 InstancePerson
// 红线: 导入只增不删
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub assoc_id: RowId,
    pub group_id: RowId,
    pub modified: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRoom {
    pub assoc_id: RowId,
    pub room_id: RowId,
    pub modified: Option<NaiveDateTime>,
}

// ==========================================
// ImportRun - 导入记录
// ==========================================
// 唯一键: (organization_id, term_id, created)，用于重复导入检测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub run_id: String,
    pub organization_id: RowId,
    pub term_id: RowId,
    pub created: NaiveDateTime,       // 导出文件生成时间
    pub imported_at: DateTime<Utc>,   // 实际导入时间
    pub error_count: i64,
    pub warning_count: i64,
    pub report_json: Option<String>,
    pub config_snapshot: Option<String>, // 导入时生效的配置（JSON）
}
