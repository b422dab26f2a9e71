// ==========================================
// 排课数据同步系统 - 领域类型定义
// ==========================================
// 职责: 资源类型、日期区间、出现码等基础类型
// ==========================================

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 存储层行主键
pub type RowId = i64;

/// 默认人员角色（教师）
pub const TEACHER_ROLE_ID: RowId = 1;

// ==========================================
// 资源类型 (Resource Kind)
// ==========================================
// 导出文件中的外部代码带有类型前缀（如 SU_101），使用前剥离
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Category, // 部门 / 类别
    Method,   // 授课方式
    Grid,     // 时间网格
    Event,    // 课程 / 科目
    Group,    // 班级 / 分组
    Person,   // 教师
    Room,     // 教室
    Unit,     // 排课单元
}

impl ResourceKind {
    /// 外部代码前缀
    pub fn code_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Category => "DP_",
            ResourceKind::Method => "DS_",
            ResourceKind::Grid => "",
            ResourceKind::Event => "SU_",
            ResourceKind::Group => "CL_",
            ResourceKind::Person => "TR_",
            ResourceKind::Room => "RM_",
            ResourceKind::Unit => "LS_",
        }
    }

    /// 剥离外部代码前缀并去除首尾空白
    ///
    /// 没有前缀的代码原样返回（部分导出工具版本不带前缀）
    pub fn strip_code(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let prefix = self.code_prefix();
        if !prefix.is_empty() && trimmed.len() > prefix.len() && trimmed.starts_with(prefix) {
            trimmed[prefix.len()..].to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Category => write!(f, "category"),
            ResourceKind::Method => write!(f, "method"),
            ResourceKind::Grid => write!(f, "grid"),
            ResourceKind::Event => write!(f, "event"),
            ResourceKind::Group => write!(f, "group"),
            ResourceKind::Person => write!(f, "person"),
            ResourceKind::Room => write!(f, "room"),
            ResourceKind::Unit => write!(f, "unit"),
        }
    }
}

// ==========================================
// 日期区间 (闭区间)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// 创建区间；start > end 时返回 None
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// 与另一个区间求交；无交集返回 None
    pub fn intersect(&self, other: &DateSpan) -> Option<DateSpan> {
        DateSpan::new(self.start.max(other.start), self.end.min(other.end))
    }

    /// 合并为覆盖两者的最小区间
    pub fn union(&self, other: &DateSpan) -> DateSpan {
        DateSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 区间包含的天数（含两端）
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ==========================================
// 出现码 (Occurrence Code)
// ==========================================
// 出现掩码中每个字符对应学年中的一天
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccurrenceCode {
    NoOccurrence, // '0'
    Vacation,     // 'F'
    Scheduled,    // 其他字符
}

impl OccurrenceCode {
    pub fn from_char(c: char) -> Self {
        match c {
            '0' => OccurrenceCode::NoOccurrence,
            'F' | 'f' => OccurrenceCode::Vacation,
            _ => OccurrenceCode::Scheduled,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, OccurrenceCode::Scheduled)
    }
}

/// 星期编号（1 = 周一 … 7 = 周日）
pub fn weekday_number(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

/// 星期名称（报告文本使用）
pub fn weekday_name(day: u32) -> &'static str {
    match day {
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        7 => "Sunday",
        _ => "an unknown weekday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_strip_code() {
        assert_eq!(ResourceKind::Event.strip_code("SU_101"), "101");
        assert_eq!(ResourceKind::Person.strip_code(" TR_5 "), "5");
        assert_eq!(ResourceKind::Room.strip_code("A1.01"), "A1.01");
        // 仅有前缀时不剥离
        assert_eq!(ResourceKind::Group.strip_code("CL_"), "CL_");
    }

    #[test]
    fn test_date_span_intersect() {
        let unit = DateSpan::new(d(2024, 1, 1), d(2024, 12, 31)).unwrap();
        let term = DateSpan::new(d(2024, 3, 1), d(2024, 7, 31)).unwrap();
        assert_eq!(unit.intersect(&term), Some(term));

        let late = DateSpan::new(d(2024, 9, 1), d(2024, 9, 30)).unwrap();
        assert_eq!(late.intersect(&term), None);
        assert!(DateSpan::new(d(2024, 2, 1), d(2024, 1, 1)).is_none());
    }

    #[test]
    fn test_date_span_days_leap_year() {
        let span = DateSpan::new(d(2024, 2, 1), d(2024, 3, 1)).unwrap();
        assert_eq!(span.days(), 30);
    }

    #[test]
    fn test_occurrence_code() {
        assert_eq!(OccurrenceCode::from_char('0'), OccurrenceCode::NoOccurrence);
        assert_eq!(OccurrenceCode::from_char('F'), OccurrenceCode::Vacation);
        assert!(OccurrenceCode::from_char('1').is_scheduled());
        assert!(OccurrenceCode::from_char('X').is_scheduled());
    }

    #[test]
    fn test_weekday_number() {
        // 2024-03-04 是周一
        assert_eq!(weekday_number(d(2024, 3, 4)), 1);
        assert_eq!(weekday_number(d(2024, 3, 10)), 7);
        assert_eq!(weekday_name(1), "Monday");
    }
}
