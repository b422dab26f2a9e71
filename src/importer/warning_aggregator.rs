// ==========================================
// 排课数据同步系统 - 警告汇总
// ==========================================
// 职责: 将重复出现的低级别问题（无效教室、缺少教室、缺少授课方式）折叠为简短警告
// 规则: 条目数不超过上限时逐项列出（"X and Y"），超出时只给出数量；桶在汇总后清空
// ==========================================

use crate::domain::report::{ImportIssue, Listing};
use crate::importer::context::ImportContext;
use std::mem;

pub struct WarningAggregator;

impl WarningAggregator {
    /// 汇总并清空全部桶
    ///
    /// # 返回
    /// - 生成的警告数量
    pub fn flush(ctx: &mut ImportContext) -> usize {
        let limit = ctx.settings.warning_list_limit;
        let buckets = mem::take(&mut ctx.buckets);
        let before = ctx.warnings.len();

        for (unit, rooms) in buckets.invalid_rooms {
            let rooms = Listing::from_items(rooms.into_iter().collect(), limit);
            ctx.warning(ImportIssue::InvalidRooms { unit, rooms });
        }

        for ((unit, weekday, period), dates) in buckets.missing_rooms {
            let dates = dates
                .into_iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            ctx.warning(ImportIssue::MissingRooms {
                unit,
                weekday,
                period,
                dates: Listing::from_items(dates, limit),
            });
        }

        if !buckets.missing_methods.is_empty() {
            let units = Listing::from_items(buckets.missing_methods.into_iter().collect(), limit);
            ctx.warning(ImportIssue::MissingMethods { units });
        }

        ctx.warnings.len() - before
    }
}
