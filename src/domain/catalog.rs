// ==========================================
// 排课数据同步系统 - 基础目录领域模型
// ==========================================
// 职责: 学期、类别、授课方式、时间网格、课程、班级、教师、教室、归属关系
// 红线: 不含数据访问逻辑
// ==========================================

use crate::domain::types::{ResourceKind, RowId};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// Term - 学期
// ==========================================
// 唯一键: code 或 (start_date, end_date)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub code: String,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// ==========================================
// Category - 类别（部门）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub code: String,
    pub name: Option<String>,
}

// ==========================================
// Method - 授课方式
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub code: String,
    pub name: Option<String>,
}

// ==========================================
// Grid - 时间网格
// ==========================================
// 不随导入自动创建；definition 以 JSON 形式落库
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub code: String,
    pub name: Option<String>,
    pub definition: Option<GridDefinition>,
}

/// 单个节次的起止时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSpan {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// 网格定义: 节次号 → 起止时间，外加星期跨度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub periods: BTreeMap<u32, PeriodSpan>,
    pub start_day: u32,
    pub end_day: u32,
}

impl GridDefinition {
    pub fn new(day: u32, period: u32, span: PeriodSpan) -> Self {
        let mut periods = BTreeMap::new();
        periods.insert(period, span);
        Self {
            periods,
            start_day: day,
            end_day: day,
        }
    }

    /// 登记一个节次；同一节次号以首次出现为准
    pub fn add_period(&mut self, day: u32, period: u32, span: PeriodSpan) {
        self.periods.entry(period).or_insert(span);
        self.start_day = self.start_day.min(day);
        self.end_day = self.end_day.max(day);
    }

    pub fn period(&self, period: u32) -> Option<PeriodSpan> {
        self.periods.get(&period).copied()
    }
}

// ==========================================
// Event - 课程（科目）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub code: String,
    pub name: Option<String>,
    pub subject_no: Option<String>,
    pub description: Option<String>,
}

// ==========================================
// Group - 班级 / 分组
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub code: String,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub category_id: Option<RowId>,
    pub grid_id: Option<RowId>,
}

// ==========================================
// Person - 教师
// ==========================================
// 查找顺序: username → (surname, forename) → code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub code: String,
    pub surname: Option<String>,
    pub forename: Option<String>,
    pub title: Option<String>,
    pub username: Option<String>,
}

// ==========================================
// Room - 教室
// ==========================================
// 物理资产，需单独建档，不随导入自动创建
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub code: String,
    pub name: Option<String>,
    pub capacity: Option<i64>,
}

// ==========================================
// Association - 资源归属关系
// ==========================================
// 红线: 每行只能引用一种资源类型
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub organization_id: RowId,
    pub category_id: Option<RowId>,
    pub event_id: Option<RowId>,
    pub group_id: Option<RowId>,
    pub method_id: Option<RowId>,
    pub person_id: Option<RowId>,
    pub room_id: Option<RowId>,
}

impl Association {
    /// 归属关系表中对应资源类型的外键列；网格与单元没有归属关系
    pub fn resource_column(kind: ResourceKind) -> Option<&'static str> {
        match kind {
            ResourceKind::Category => Some("category_id"),
            ResourceKind::Event => Some("event_id"),
            ResourceKind::Group => Some("group_id"),
            ResourceKind::Method => Some("method_id"),
            ResourceKind::Person => Some("person_id"),
            ResourceKind::Room => Some("room_id"),
            ResourceKind::Grid | ResourceKind::Unit => None,
        }
    }

    /// 为单个资源构造归属关系
    pub fn for_resource(organization_id: RowId, kind: ResourceKind, id: RowId) -> Option<Self> {
        let mut association = Association {
            organization_id,
            ..Default::default()
        };
        let slot = match kind {
            ResourceKind::Category => &mut association.category_id,
            ResourceKind::Event => &mut association.event_id,
            ResourceKind::Group => &mut association.group_id,
            ResourceKind::Method => &mut association.method_id,
            ResourceKind::Person => &mut association.person_id,
            ResourceKind::Room => &mut association.room_id,
            ResourceKind::Grid | ResourceKind::Unit => return None,
        };
        *slot = Some(id);
        Some(association)
    }

    /// 非空资源外键数量（合法行恰好为 1）
    pub fn resource_count(&self) -> usize {
        [
            self.category_id,
            self.event_id,
            self.group_id,
            self.method_id,
            self.person_id,
            self.room_id,
        ]
        .iter()
        .filter(|id| id.is_some())
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_association_references_exactly_one_resource() {
        let association = Association::for_resource(7, ResourceKind::Person, 42).unwrap();
        assert_eq!(association.organization_id, 7);
        assert_eq!(association.person_id, Some(42));
        assert_eq!(association.resource_count(), 1);

        assert!(Association::for_resource(7, ResourceKind::Grid, 1).is_none());
    }

    #[test]
    fn test_grid_definition_day_span() {
        let first = PeriodSpan { start: t(8, 0), end: t(9, 30) };
        let mut grid = GridDefinition::new(2, 1, first);
        grid.add_period(1, 2, PeriodSpan { start: t(9, 45), end: t(11, 15) });
        grid.add_period(5, 1, PeriodSpan { start: t(7, 0), end: t(8, 0) });

        assert_eq!(grid.start_day, 1);
        assert_eq!(grid.end_day, 5);
        assert_eq!(grid.period(1), Some(first));
        assert_eq!(grid.period(3), None);
    }

    #[test]
    fn test_grid_definition_json_roundtrip_keeps_period_keys() {
        let grid = GridDefinition::new(1, 1, PeriodSpan { start: t(8, 0), end: t(9, 30) });
        let json = serde_json::to_string(&grid).unwrap();
        let parsed: GridDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, grid);
    }
}
