// ==========================================
// 排课数据同步系统 - 导入报告
// ==========================================
// 职责: 错误/警告的结构化分类，仅在报告边界格式化为文本
// ==========================================

use crate::domain::types::{weekday_name, ResourceKind};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// Listing - 汇总条目
// ==========================================
// Listed: 逐项列出；Counted: 超出上限后只保留数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Listing {
    Listed(Vec<String>),
    Counted(usize),
}

impl Listing {
    /// 条目数不超过 limit 时逐项列出，否则折叠为数量
    pub fn from_items(items: Vec<String>, limit: usize) -> Self {
        if items.len() > limit {
            Listing::Counted(items.len())
        } else {
            Listing::Listed(items)
        }
    }
}

/// 以 "X and Y" / "X, Y and Z" 连接条目
pub fn join_and(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [head @ .., last] => format!("{} and {}", head.join(", "), last),
    }
}

fn slot_label(weekday: u32, period: Option<u32>) -> String {
    match period {
        Some(period) => format!("{}, period {}", weekday_name(weekday), period),
        None => weekday_name(weekday).to_string(),
    }
}

fn render_invalid_rooms(unit: &str, rooms: &Listing) -> String {
    match rooms {
        Listing::Listed(codes) if codes.len() == 1 => {
            format!("The unit {} references the unknown room {}.", unit, codes[0])
        }
        Listing::Listed(codes) => {
            format!("The unit {} references the unknown rooms {}.", unit, join_and(codes))
        }
        Listing::Counted(count) => {
            format!("The unit {} references {} unknown rooms.", unit, count)
        }
    }
}

fn render_missing_rooms(unit: &str, weekday: u32, period: Option<u32>, dates: &Listing) -> String {
    let slot = slot_label(weekday, period);
    match dates {
        Listing::Listed(dates) => {
            format!("The unit {} has no room on {} on {}.", unit, slot, join_and(dates))
        }
        Listing::Counted(count) => format!(
            "The unit {} has no room on {} on {} dates.",
            unit, slot, count
        ),
    }
}

fn render_missing_methods(units: &Listing) -> String {
    match units {
        Listing::Listed(codes) if codes.len() == 1 => {
            format!("The unit {} has no method.", codes[0])
        }
        Listing::Listed(codes) => format!("The units {} have no method.", join_and(codes)),
        Listing::Counted(count) => format!("{} units have no method.", count),
    }
}

// ==========================================
// ImportIssue - 导入问题分类
// ==========================================
// 同一类型既可作为错误（阻断）也可作为警告（提示），由所在列表决定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ImportIssue {
    // ===== 文件头 / 学期 =====
    #[error("The export has no general section.")]
    MissingGeneralSection,

    #[error("The export's creation {field} is missing or invalid.")]
    CreationTimestampInvalid { field: String },

    #[error("The school year's {field} is missing or invalid.")]
    SchoolYearInvalid { field: String },

    #[error("The school year ends ({end}) before it starts ({start}).")]
    SchoolYearInconsistent { start: NaiveDate, end: NaiveDate },

    #[error("The term's {field} is missing or invalid.")]
    TermInvalid { field: String },

    #[error("The term ends ({end}) before it starts ({start}).")]
    TermInconsistent { start: NaiveDate, end: NaiveDate },

    #[error("The term ended on {end}, before the export was created on {created}.")]
    TermExpired { end: NaiveDate, created: NaiveDate },

    #[error("The term starts on {term_start}, before the school year starts on {school_year_start}.")]
    TermBeforeSchoolYear {
        term_start: NaiveDate,
        school_year_start: NaiveDate,
    },

    #[error("The export created at {created} has already been imported for this term.")]
    DuplicateImport { created: NaiveDateTime },

    // ===== 节点级 =====
    #[error("A {kind} entry has no id.")]
    MissingId { kind: ResourceKind },

    #[error("The {kind} {code} is missing its {field}.")]
    MissingField {
        kind: ResourceKind,
        code: String,
        field: String,
    },

    #[error("The {kind} {code} has an invalid {field}: '{value}'.")]
    InvalidField {
        kind: ResourceKind,
        code: String,
        field: String,
        value: String,
    },

    #[error("The {kind} {code} references the unknown {reference} {reference_code}.")]
    UnresolvedReference {
        kind: ResourceKind,
        code: String,
        reference: ResourceKind,
        reference_code: String,
    },

    #[error("The grid {code} does not exist and must be set up before importing.")]
    GridNotFound { code: String },

    #[error("The room {code} does not exist and must be set up before importing.")]
    RoomNotFound { code: String },

    // ===== 排课单元 =====
    #[error("The unit {code} ends ({end}) before it starts ({start}).")]
    UnitDatesInconsistent {
        code: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("The unit {code} has no valid groups.")]
    UnitWithoutGroups { code: String },

    #[error("The unit {code} has {count} persons; exactly one is required.")]
    UnitPersonCount { code: String, count: usize },

    #[error("The unit {code} has no start and end time for {}.", slot_label(*.weekday, *.period))]
    SlotWithoutTimes {
        code: String,
        weekday: u32,
        period: Option<u32>,
    },

    // ===== 汇总类 =====
    #[error("{}", render_invalid_rooms(.unit, .rooms))]
    InvalidRooms { unit: String, rooms: Listing },

    #[error("{}", render_missing_rooms(.unit, *.weekday, *.period, .dates))]
    MissingRooms {
        unit: String,
        weekday: u32,
        period: Option<u32>,
        dates: Listing,
    },

    #[error("{}", render_missing_methods(.units))]
    MissingMethods { units: Listing },
}

// ==========================================
// ImportSummary - 导入统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub units_total: usize,      // 文件中的单元总数
    pub units_skipped: usize,    // 无时间模板或不在学期内而跳过的单元
    pub units_rejected: usize,   // 校验未通过的单元
    pub units_expanded: usize,   // 已落库并展开的单元
    pub instances_created: usize,
    pub instances_updated: usize,
}

// ==========================================
// ImportReport - 导入报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub success: bool,
    pub errors: Vec<ImportIssue>,
    pub warnings: Vec<ImportIssue>,
    pub summary: ImportSummary,
}

impl ImportReport {
    /// 组装报告；success 当且仅当没有错误
    pub fn new(
        run_id: String,
        errors: Vec<ImportIssue>,
        warnings: Vec<ImportIssue>,
        summary: ImportSummary,
    ) -> Self {
        Self {
            run_id,
            success: errors.is_empty(),
            errors,
            warnings,
            summary,
        }
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }

    /// 合并后的文本报告（先错误后警告）
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        if !self.errors.is_empty() {
            lines.push(format!("Errors ({}):", self.errors.len()));
            lines.extend(self.error_messages().into_iter().map(|m| format!("  - {}", m)));
        }
        if !self.warnings.is_empty() {
            lines.push(format!("Warnings ({}):", self.warnings.len()));
            lines.extend(self.warning_messages().into_iter().map(|m| format!("  - {}", m)));
        }
        if lines.is_empty() {
            lines.push("The export was imported without findings.".to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_join_and() {
        assert_eq!(join_and(&items(&["A"])), "A");
        assert_eq!(join_and(&items(&["A", "B"])), "A and B");
        assert_eq!(join_and(&items(&["A", "B", "C"])), "A, B and C");
    }

    #[test]
    fn test_listing_collapses_above_limit() {
        assert_eq!(
            Listing::from_items(items(&["a", "b"]), 2),
            Listing::Listed(items(&["a", "b"]))
        );
        assert_eq!(Listing::from_items(items(&["a", "b", "c"]), 2), Listing::Counted(3));
    }

    #[test]
    fn test_missing_rooms_rendering() {
        let listed = ImportIssue::MissingRooms {
            unit: "77".to_string(),
            weekday: 1,
            period: Some(2),
            dates: Listing::Listed(items(&["2024-03-04", "2024-03-11"])),
        };
        assert_eq!(
            listed.to_string(),
            "The unit 77 has no room on Monday, period 2 on 2024-03-04 and 2024-03-11."
        );

        let counted = ImportIssue::MissingRooms {
            unit: "77".to_string(),
            weekday: 1,
            period: Some(2),
            dates: Listing::Counted(4),
        };
        assert_eq!(
            counted.to_string(),
            "The unit 77 has no room on Monday, period 2 on 4 dates."
        );
    }

    #[test]
    fn test_missing_methods_rendering() {
        let one = ImportIssue::MissingMethods {
            units: Listing::Listed(items(&["5"])),
        };
        assert_eq!(one.to_string(), "The unit 5 has no method.");

        let many = ImportIssue::MissingMethods {
            units: Listing::Counted(7),
        };
        assert_eq!(many.to_string(), "7 units have no method.");
    }

    #[test]
    fn test_report_success_follows_errors() {
        let ok = ImportReport::new("r1".into(), vec![], vec![], ImportSummary::default());
        assert!(ok.success);

        let failed = ImportReport::new(
            "r2".into(),
            vec![ImportIssue::RoomNotFound { code: "A1".into() }],
            vec![],
            ImportSummary::default(),
        );
        assert!(!failed.success);
        assert!(failed.to_text().starts_with("Errors (1):"));
    }

    #[test]
    fn test_issue_serializes_with_issue_tag() {
        let issue = ImportIssue::GridNotFound { code: "Main".into() };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["issue"], "grid_not_found");
        assert_eq!(json["code"], "Main");
    }
}
