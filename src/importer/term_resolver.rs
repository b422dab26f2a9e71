// ==========================================
// 排课数据同步系统 - 学期解析
// ==========================================
// 职责: 校验文件头（生成时间、学年、学期），查找或创建学期
// 红线: 文件头任一项无效即整体终止，不做任何写入
// ==========================================

use crate::domain::catalog::Term;
use crate::domain::report::ImportIssue;
use crate::domain::schedule::ImportRun;
use crate::domain::types::{DateSpan, RowId};
use crate::importer::document::{parse_xml_date, parse_xml_time, XmlNode};
use crate::importer::error::ImportResult;
use crate::importer::reference_resolver::{find_first, ProtectedMerge};
use crate::repository::store::{CatalogStore, Criteria, Stored};
use crate::repository::values;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

/// 文件头: 生成时间、学年与学期
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportHeader {
    pub created: NaiveDateTime,
    pub school_year: DateSpan,
    pub term_span: DateSpan,
    pub term_code: String,
    pub term_name: Option<String>,
}

impl ImportHeader {
    pub fn term(&self) -> Term {
        Term {
            code: self.term_code.clone(),
            name: self.term_name.clone(),
            start_date: self.term_span.start,
            end_date: self.term_span.end,
        }
    }
}

/// 文件头校验结果
#[derive(Debug, Clone, Default)]
pub struct HeaderCheck {
    pub header: Option<ImportHeader>,
    pub errors: Vec<ImportIssue>,
    pub warnings: Vec<ImportIssue>,
}

/// 学期代码: 导出提供学期名时使用学期名，否则由起止日期生成
pub fn term_code(name: Option<&str>, span: &DateSpan) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!(
            "{}-{}",
            span.start.format("%Y%m%d"),
            span.end.format("%Y%m%d")
        ),
    }
}

pub struct TermResolver;

impl TermResolver {
    /// 校验 general 分支
    pub fn validate(general: Option<&XmlNode>) -> HeaderCheck {
        let mut check = HeaderCheck::default();
        let Some(general) = general else {
            check.errors.push(ImportIssue::MissingGeneralSection);
            return check;
        };

        // ===== 生成时间 =====
        let created_date = general.child_text("date").and_then(parse_xml_date);
        if created_date.is_none() {
            check.errors.push(ImportIssue::CreationTimestampInvalid {
                field: "date".to_string(),
            });
        }
        let created_time = general.child_text("time").and_then(parse_xml_time);
        if created_time.is_none() {
            check.errors.push(ImportIssue::CreationTimestampInvalid {
                field: "time".to_string(),
            });
        }

        // ===== 学年 =====
        let school_year = read_span(
            general,
            ("schoolyearbegindate", "schoolyearenddate"),
            &mut check.errors,
            |field| ImportIssue::SchoolYearInvalid { field },
            |start, end| ImportIssue::SchoolYearInconsistent { start, end },
        );

        // ===== 学期 =====
        let term_span = read_span(
            general,
            ("termbegindate", "termenddate"),
            &mut check.errors,
            |field| ImportIssue::TermInvalid { field },
            |start, end| ImportIssue::TermInconsistent { start, end },
        );

        let (Some(date), Some(time), Some(school_year), Some(term_span)) =
            (created_date, created_time, school_year, term_span)
        else {
            return check;
        };

        if term_span.end < date {
            check.errors.push(ImportIssue::TermExpired {
                end: term_span.end,
                created: date,
            });
            return check;
        }

        if term_span.start < school_year.start {
            check.warnings.push(ImportIssue::TermBeforeSchoolYear {
                term_start: term_span.start,
                school_year_start: school_year.start,
            });
        }

        let term_name = general.child_text("termname").map(str::to_string);
        check.header = Some(ImportHeader {
            created: date.and_time(time),
            school_year,
            term_code: term_code(term_name.as_deref(), &term_span),
            term_name,
            term_span,
        });
        check
    }

    /// 按代码、再按起止日期查找学期
    pub fn find_term<S: CatalogStore>(
        store: &S,
        header: &ImportHeader,
    ) -> ImportResult<Option<Stored<Term>>> {
        find_first(
            store,
            &[
                Criteria::new().eq("code", values::text(&header.term_code)),
                Criteria::new()
                    .eq("start_date", values::date(header.term_span.start))
                    .eq("end_date", values::date(header.term_span.end)),
            ],
        )
    }

    /// 查找同一组织、学期、生成时间的既往导入
    pub fn find_previous_run<S: CatalogStore>(
        store: &S,
        organization_id: RowId,
        term_id: RowId,
        created: NaiveDateTime,
    ) -> ImportResult<Option<Stored<ImportRun>>> {
        Ok(store.find(
            &Criteria::new()
                .eq("organization_id", values::int(organization_id))
                .eq("term_id", values::int(term_id))
                .eq("created", values::datetime(created)),
        )?)
    }

    /// 写入学期: 已存在则保护性合并，否则新建
    pub fn resolve_id<S: CatalogStore>(
        store: &S,
        header: &ImportHeader,
        existing: Option<Stored<Term>>,
    ) -> ImportResult<RowId> {
        let incoming = header.term();
        match existing {
            Some(mut stored) => {
                if stored.record.merge_from(&incoming) {
                    store.update(stored.id, &stored.record)?;
                    debug!(term_id = stored.id, "学期信息已补全");
                }
                Ok(stored.id)
            }
            None => {
                let id = store.insert(&incoming)?;
                info!(term_id = id, code = %incoming.code, "新建学期");
                Ok(id)
            }
        }
    }
}

fn read_span(
    general: &XmlNode,
    (start_field, end_field): (&str, &str),
    errors: &mut Vec<ImportIssue>,
    invalid: impl Fn(String) -> ImportIssue,
    inconsistent: impl Fn(NaiveDate, NaiveDate) -> ImportIssue,
) -> Option<DateSpan> {
    let start = general.child_text(start_field).and_then(parse_xml_date);
    if start.is_none() {
        errors.push(invalid("start date".to_string()));
    }
    let end = general.child_text(end_field).and_then(parse_xml_date);
    if end.is_none() {
        errors.push(invalid("end date".to_string()));
    }
    let (start, end) = (start?, end?);
    let span = DateSpan::new(start, end);
    if span.is_none() {
        errors.push(inconsistent(start, end));
    }
    span
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::document::Document;

    fn general(body: &str) -> Document {
        Document::parse(&format!("<document><general>{}</general></document>", body)).unwrap()
    }

    const VALID: &str = "<schoolyearbegindate>20240101</schoolyearbegindate>\
        <schoolyearenddate>20241231</schoolyearenddate>\
        <termbegindate>20240301</termbegindate>\
        <termenddate>20240731</termenddate>\
        <date>20240220</date><time>101500</time>";

    #[test]
    fn test_valid_header() {
        let doc = general(VALID);
        let check = TermResolver::validate(doc.section("general"));
        assert!(check.errors.is_empty());
        let header = check.header.unwrap();
        assert_eq!(header.term_code, "20240301-20240731");
        assert_eq!(header.created.to_string(), "2024-02-20 10:15:00");
    }

    #[test]
    fn test_missing_general_section() {
        let check = TermResolver::validate(None);
        assert_eq!(check.errors, vec![ImportIssue::MissingGeneralSection]);
        assert!(check.header.is_none());
    }

    #[test]
    fn test_inconsistent_term_is_fatal() {
        let doc = general(&VALID.replace("20240731", "20240201"));
        let check = TermResolver::validate(doc.section("general"));
        assert!(check.header.is_none());
        assert!(matches!(check.errors[0], ImportIssue::TermInconsistent { .. }));
    }

    #[test]
    fn test_expired_term_is_fatal() {
        let doc = general(&VALID.replace("<date>20240220</date>", "<date>20240901</date>"));
        let check = TermResolver::validate(doc.section("general"));
        assert!(check.header.is_none());
        assert!(matches!(check.errors[0], ImportIssue::TermExpired { .. }));
    }

    #[test]
    fn test_invalid_creation_time() {
        let doc = general(&VALID.replace("101500", "99"));
        let check = TermResolver::validate(doc.section("general"));
        assert_eq!(
            check.errors,
            vec![ImportIssue::CreationTimestampInvalid {
                field: "time".to_string()
            }]
        );
    }

    #[test]
    fn test_term_before_school_year_is_warning() {
        let doc = general(&VALID.replace("20240101", "20240401"));
        let check = TermResolver::validate(doc.section("general"));
        assert!(check.errors.is_empty());
        assert!(check.header.is_some());
        assert!(matches!(
            check.warnings[0],
            ImportIssue::TermBeforeSchoolYear { .. }
        ));
    }

    #[test]
    fn test_term_name_becomes_code() {
        let doc = general(&format!("{}<termname>SS24</termname>", VALID));
        let header = TermResolver::validate(doc.section("general")).header.unwrap();
        assert_eq!(header.term_code, "SS24");
        assert_eq!(header.term().name.as_deref(), Some("SS24"));
    }
}
