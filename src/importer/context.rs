// ==========================================
// 排课数据同步系统 - 导入上下文
// ==========================================
// 职责: 单次导入的全部可变状态（暂存记录、已解析主键、错误/警告、汇总桶）
// 红线: 以 &mut 形式在解析器之间传递，导入结束即丢弃
// ==========================================

use crate::config::ImportSettings;
use crate::domain::catalog::{Category, Event, Grid, GridDefinition, Group, Method, Person, Room};
use crate::domain::report::{ImportIssue, ImportSummary};
use crate::domain::types::{DateSpan, ResourceKind, RowId};
use crate::importer::term_resolver::ImportHeader;
use chrono::{Days, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

// ==========================================
// StagingRecord - 暂存记录
// ==========================================
// 节点校验通过后生成，解析为存储主键后即不再使用
#[derive(Debug, Clone, PartialEq)]
pub enum StagingRecord {
    Category(Category),
    Method(Method),
    Grid(Grid),
    Event(Event),
    Group(GroupStage),
    Person(Person),
    Room(Room),
}

/// 班级暂存: 外部引用仍为代码，解析时再换成主键
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    pub group: Group,
    pub category_code: Option<String>,
    pub grid_code: Option<String>,
}

/// 单一资源类型的暂存表，保留文档顺序
#[derive(Debug, Clone, Default)]
pub struct StagingMap {
    order: Vec<String>,
    records: HashMap<String, StagingRecord>,
}

impl StagingMap {
    /// 登记暂存记录；同一代码以首次出现为准
    ///
    /// # 返回
    /// - false: 代码已存在，本次记录被忽略
    pub fn insert(&mut self, code: String, record: StagingRecord) -> bool {
        if self.records.contains_key(&code) {
            return false;
        }
        self.order.push(code.clone());
        self.records.insert(code, record);
        true
    }

    pub fn get(&self, code: &str) -> Option<&StagingRecord> {
        self.records.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut StagingRecord> {
        self.records.get_mut(code)
    }

    /// 文档顺序的代码列表
    pub fn codes(&self) -> &[String] {
        &self.order
    }
}

// ==========================================
// WarningBuckets - 待汇总的低级别问题
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct WarningBuckets {
    /// 单元代码 → 无法解析的教室代码
    pub invalid_rooms: BTreeMap<String, BTreeSet<String>>,
    /// (单元代码, 星期, 节次) → 缺少教室的日期
    pub missing_rooms: BTreeMap<(String, u32, Option<u32>), BTreeSet<NaiveDate>>,
    /// 缺少授课方式的单元代码
    pub missing_methods: BTreeSet<String>,
}

/// 截止日 = 生成日期 - 偏移天数
///
/// 负偏移按 0 处理；日期下溢时取最早日期（不截止任何课次）
fn cutoff_date(created: NaiveDate, offset_days: i64) -> NaiveDate {
    let days = Days::new(offset_days.max(0).unsigned_abs());
    match created.checked_sub_days(days) {
        Some(cutoff) => cutoff,
        None => {
            warn!(%created, offset_days, "截止日超出日期范围，不设截止");
            NaiveDate::MIN
        }
    }
}

// ==========================================
// ImportContext - 导入上下文
// ==========================================
#[derive(Debug)]
pub struct ImportContext {
    pub run_id: String,
    pub organization_id: RowId,
    pub term_id: RowId,

    // ===== 文件头 =====
    pub created: NaiveDateTime,
    pub cutoff: NaiveDate,
    pub school_year: DateSpan,
    pub term: DateSpan,

    pub settings: ImportSettings,

    // ===== 暂存与解析结果 =====
    staging: HashMap<ResourceKind, StagingMap>,
    resolved: HashMap<ResourceKind, HashMap<String, RowId>>,
    grid_definitions: HashMap<String, GridDefinition>,

    // ===== 单元落地区间 =====
    touched_units: BTreeMap<RowId, DateSpan>,

    // ===== 报告 =====
    pub errors: Vec<ImportIssue>,
    pub warnings: Vec<ImportIssue>,
    pub buckets: WarningBuckets,
    pub summary: ImportSummary,
}

impl ImportContext {
    pub fn new(
        run_id: String,
        organization_id: RowId,
        term_id: RowId,
        header: &ImportHeader,
        settings: ImportSettings,
    ) -> Self {
        let cutoff = cutoff_date(header.created.date(), settings.cutoff_offset_days);
        Self {
            run_id,
            organization_id,
            term_id,
            created: header.created,
            cutoff,
            school_year: header.school_year,
            term: header.term_span,
            settings,
            staging: HashMap::new(),
            resolved: HashMap::new(),
            grid_definitions: HashMap::new(),
            touched_units: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            buckets: WarningBuckets::default(),
            summary: ImportSummary::default(),
        }
    }

    // ===== 报告 =====

    /// 记录阻断性错误
    pub fn error(&mut self, issue: ImportIssue) {
        warn!(run_id = %self.run_id, issue = %issue, "导入错误");
        self.errors.push(issue);
    }

    /// 记录提示性警告
    pub fn warning(&mut self, issue: ImportIssue) {
        debug!(run_id = %self.run_id, issue = %issue, "导入警告");
        self.warnings.push(issue);
    }

    // ===== 暂存 =====

    /// 登记暂存记录
    pub fn stage(&mut self, kind: ResourceKind, code: String, record: StagingRecord) {
        let staged = self.staging.entry(kind).or_default();
        if !staged.insert(code.clone(), record) {
            debug!(kind = %kind, code = %code, "重复代码，忽略后出现的节点");
        }
    }

    pub fn staged(&self, kind: ResourceKind, code: &str) -> Option<&StagingRecord> {
        self.staging.get(&kind).and_then(|m| m.get(code))
    }

    pub fn staged_mut(&mut self, kind: ResourceKind, code: &str) -> Option<&mut StagingRecord> {
        self.staging.get_mut(&kind).and_then(|m| m.get_mut(code))
    }

    /// 文档顺序的暂存代码
    pub fn staged_codes(&self, kind: ResourceKind) -> Vec<String> {
        self.staging
            .get(&kind)
            .map(|m| m.codes().to_vec())
            .unwrap_or_default()
    }

    /// 班级暂存时登记的网格代码
    pub fn staged_group_grid(&self, group_code: &str) -> Option<&str> {
        match self.staged(ResourceKind::Group, group_code) {
            Some(StagingRecord::Group(stage)) => stage.grid_code.as_deref(),
            _ => None,
        }
    }

    /// 文档处理完毕后释放暂存记录
    pub fn clear_staging(&mut self) {
        self.staging.clear();
    }

    // ===== 已解析主键 =====

    pub fn mark_resolved(&mut self, kind: ResourceKind, code: &str, id: RowId) {
        self.resolved
            .entry(kind)
            .or_default()
            .insert(code.to_string(), id);
    }

    pub fn resolved_id(&self, kind: ResourceKind, code: &str) -> Option<RowId> {
        self.resolved.get(&kind).and_then(|m| m.get(code)).copied()
    }

    pub fn resolved_count(&self, kind: ResourceKind) -> usize {
        self.resolved.get(&kind).map(HashMap::len).unwrap_or(0)
    }

    // ===== 网格定义 =====

    pub fn set_grid_definition(&mut self, code: &str, definition: GridDefinition) {
        self.grid_definitions.insert(code.to_string(), definition);
    }

    pub fn grid_definition(&self, code: &str) -> Option<&GridDefinition> {
        self.grid_definitions.get(code)
    }

    // ===== 单元落地区间 =====

    /// 记录单元本次落地的日期
    pub fn touch_unit(&mut self, unit_id: RowId, date: NaiveDate) {
        let day = DateSpan { start: date, end: date };
        self.touched_units
            .entry(unit_id)
            .and_modify(|span| *span = span.union(&day))
            .or_insert(day);
    }

    /// 取出全部单元落地区间
    pub fn take_touched_units(&mut self) -> BTreeMap<RowId, DateSpan> {
        std::mem::take(&mut self.touched_units)
    }
}
