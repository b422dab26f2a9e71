// ==========================================
// 排课数据同步系统 - 出现掩码展开
// ==========================================
// 职责: 将学年逐日掩码截取到单元区间，展开为 (日期, 出现码) 序列
// 规则:
// - 偏移 = 学年开始日 → 单元开始日的天数
// - 长度 = 单元区间天数（含两端）
// - 掩码之外的日期（早于学年或超出掩码长度）视为不上课
// ==========================================

use crate::domain::types::{DateSpan, OccurrenceCode};
use chrono::{Duration, NaiveDate};

/// 单元开始日在掩码中的偏移（单元早于学年时为负）
pub fn mask_offset(school_year_start: NaiveDate, unit_start: NaiveDate) -> i64 {
    (unit_start - school_year_start).num_days()
}

pub struct OccurrenceExpander;

impl OccurrenceExpander {
    /// 展开单元区间内的逐日出现码（按日期升序）
    ///
    /// # 参数
    /// - school_year_start: 掩码第一个字符对应的日期
    /// - span: 已按学期裁剪的单元区间
    /// - mask: 出现掩码；缺失时区间内每天均视为上课
    pub fn expand(
        school_year_start: NaiveDate,
        span: &DateSpan,
        mask: Option<&str>,
    ) -> Vec<(NaiveDate, OccurrenceCode)> {
        let codes: Option<Vec<char>> = mask.map(|m| m.trim().chars().collect());
        let offset = mask_offset(school_year_start, span.start);

        (0..span.days())
            .map(|day| {
                let date = span.start + Duration::days(day);
                let code = match &codes {
                    None => OccurrenceCode::Scheduled,
                    Some(codes) => usize::try_from(offset + day)
                        .ok()
                        .and_then(|idx| codes.get(idx))
                        .map(|&c| OccurrenceCode::from_char(c))
                        .unwrap_or(OccurrenceCode::NoOccurrence),
                };
                (date, code)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_offset_is_leap_year_correct() {
        assert_eq!(mask_offset(d(2024, 1, 1), d(2024, 3, 1)), 60);
        assert_eq!(mask_offset(d(2023, 1, 1), d(2023, 3, 1)), 59);
    }

    #[test]
    fn test_expand_slices_mask_at_offset() {
        // 学年 2024-01-01 起，3 月 1 日为第 60 个字符
        let mut mask = "0".repeat(60);
        mask.push_str("1F01");
        let span = DateSpan::new(d(2024, 3, 1), d(2024, 3, 4)).unwrap();

        let days = OccurrenceExpander::expand(d(2024, 1, 1), &span, Some(&mask));
        assert_eq!(
            days,
            vec![
                (d(2024, 3, 1), OccurrenceCode::Scheduled),
                (d(2024, 3, 2), OccurrenceCode::Vacation),
                (d(2024, 3, 3), OccurrenceCode::NoOccurrence),
                (d(2024, 3, 4), OccurrenceCode::Scheduled),
            ]
        );
    }

    #[test]
    fn test_days_outside_mask_do_not_occur() {
        // 单元早于学年开始，且掩码比区间短
        let span = DateSpan::new(d(2023, 12, 30), d(2024, 1, 3)).unwrap();
        let days = OccurrenceExpander::expand(d(2024, 1, 1), &span, Some("11"));
        let codes: Vec<OccurrenceCode> = days.into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            codes,
            vec![
                OccurrenceCode::NoOccurrence,
                OccurrenceCode::NoOccurrence,
                OccurrenceCode::Scheduled,
                OccurrenceCode::Scheduled,
                OccurrenceCode::NoOccurrence,
            ]
        );
    }

    #[test]
    fn test_missing_mask_schedules_every_day() {
        let span = DateSpan::new(d(2024, 3, 4), d(2024, 3, 5)).unwrap();
        let days = OccurrenceExpander::expand(d(2024, 1, 1), &span, None);
        assert!(days.iter().all(|(_, c)| c.is_scheduled()));
        assert_eq!(days.len(), 2);
    }
}
