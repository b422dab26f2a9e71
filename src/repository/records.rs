// ==========================================
// 排课数据同步系统 - 实体表映射
// ==========================================
// 职责: 为每个领域实体声明表名、列顺序与行编解码
// 红线: 列顺序必须与 db::init_schema 中的建表语句一致
// ==========================================

use crate::domain::catalog::{
    Association, Category, Event, Grid, Group, Method, Person, Room, Term,
};
use crate::domain::schedule::{
    Block, ImportRun, Instance, InstanceGroup, InstancePerson, InstanceRoom, Unit,
};
use crate::repository::error::RepositoryResult;
use crate::repository::store::Record;
use crate::repository::values::*;
use rusqlite::types::Value;
use rusqlite::Row;

// ==========================================
// 基础目录
// ==========================================

impl Record for Term {
    const ENTITY: &'static str = "Term";
    const TABLE: &'static str = "terms";
    const COLUMNS: &'static [&'static str] = &["code", "name", "start_date", "end_date"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            text(&self.code),
            opt_text(self.name.as_deref()),
            date(self.start_date),
            date(self.end_date),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            name: row.get(2)?,
            start_date: read_date(row, 3)?,
            end_date: read_date(row, 4)?,
        })
    }
}

impl Record for Category {
    const ENTITY: &'static str = "Category";
    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] = &["code", "name"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![text(&self.code), opt_text(self.name.as_deref())])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            name: row.get(2)?,
        })
    }
}

impl Record for Method {
    const ENTITY: &'static str = "Method";
    const TABLE: &'static str = "methods";
    const COLUMNS: &'static [&'static str] = &["code", "name"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![text(&self.code), opt_text(self.name.as_deref())])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            name: row.get(2)?,
        })
    }
}

impl Record for Grid {
    const ENTITY: &'static str = "Grid";
    const TABLE: &'static str = "grids";
    const COLUMNS: &'static [&'static str] = &["code", "name", "definition"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        let definition = match &self.definition {
            Some(def) => Value::Text(serde_json::to_string(def)?),
            None => Value::Null,
        };
        Ok(vec![text(&self.code), opt_text(self.name.as_deref()), definition])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            name: row.get(2)?,
            definition: read_opt_json(row, 3)?,
        })
    }
}

impl Record for Event {
    const ENTITY: &'static str = "Event";
    const TABLE: &'static str = "events";
    const COLUMNS: &'static [&'static str] = &["code", "name", "subject_no", "description"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            text(&self.code),
            opt_text(self.name.as_deref()),
            opt_text(self.subject_no.as_deref()),
            opt_text(self.description.as_deref()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            name: row.get(2)?,
            subject_no: row.get(3)?,
            description: row.get(4)?,
        })
    }
}

impl Record for Group {
    const ENTITY: &'static str = "Group";
    const TABLE: &'static str = "class_groups";
    const COLUMNS: &'static [&'static str] =
        &["code", "name", "full_name", "category_id", "grid_id"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            text(&self.code),
            opt_text(self.name.as_deref()),
            opt_text(self.full_name.as_deref()),
            opt_int(self.category_id),
            opt_int(self.grid_id),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            name: row.get(2)?,
            full_name: row.get(3)?,
            category_id: row.get(4)?,
            grid_id: row.get(5)?,
        })
    }
}

impl Record for Person {
    const ENTITY: &'static str = "Person";
    const TABLE: &'static str = "persons";
    const COLUMNS: &'static [&'static str] = &["code", "surname", "forename", "title", "username"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            text(&self.code),
            opt_text(self.surname.as_deref()),
            opt_text(self.forename.as_deref()),
            opt_text(self.title.as_deref()),
            opt_text(self.username.as_deref()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            surname: row.get(2)?,
            forename: row.get(3)?,
            title: row.get(4)?,
            username: row.get(5)?,
        })
    }
}

impl Record for Room {
    const ENTITY: &'static str = "Room";
    const TABLE: &'static str = "rooms";
    const COLUMNS: &'static [&'static str] = &["code", "name", "capacity"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            text(&self.code),
            opt_text(self.name.as_deref()),
            opt_int(self.capacity),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(1)?,
            name: row.get(2)?,
            capacity: row.get(3)?,
        })
    }
}

impl Record for Association {
    const ENTITY: &'static str = "Association";
    const TABLE: &'static str = "associations";
    const COLUMNS: &'static [&'static str] = &[
        "organization_id",
        "category_id",
        "event_id",
        "group_id",
        "method_id",
        "person_id",
        "room_id",
    ];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            int(self.organization_id),
            opt_int(self.category_id),
            opt_int(self.event_id),
            opt_int(self.group_id),
            opt_int(self.method_id),
            opt_int(self.person_id),
            opt_int(self.room_id),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            organization_id: row.get(1)?,
            category_id: row.get(2)?,
            event_id: row.get(3)?,
            group_id: row.get(4)?,
            method_id: row.get(5)?,
            person_id: row.get(6)?,
            room_id: row.get(7)?,
        })
    }
}

// ==========================================
// 排课数据
// ==========================================

impl Record for Unit {
    const ENTITY: &'static str = "Unit";
    const TABLE: &'static str = "units";
    const COLUMNS: &'static [&'static str] = &[
        "organization_id",
        "term_id",
        "code",
        "grid_id",
        "comment",
        "start_date",
        "end_date",
        "effective_start",
        "effective_end",
        "modified",
    ];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            int(self.organization_id),
            int(self.term_id),
            text(&self.code),
            opt_int(self.grid_id),
            opt_text(self.comment.as_deref()),
            date(self.start_date),
            date(self.end_date),
            opt_date(self.effective_start),
            opt_date(self.effective_end),
            opt_datetime(self.modified),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            organization_id: row.get(1)?,
            term_id: row.get(2)?,
            code: row.get(3)?,
            grid_id: row.get(4)?,
            comment: row.get(5)?,
            start_date: read_date(row, 6)?,
            end_date: read_date(row, 7)?,
            effective_start: read_opt_date(row, 8)?,
            effective_end: read_opt_date(row, 9)?,
            modified: read_opt_datetime(row, 10)?,
        })
    }
}

impl Record for Block {
    const ENTITY: &'static str = "Block";
    const TABLE: &'static str = "blocks";
    const COLUMNS: &'static [&'static str] = &["date", "day_of_week", "start_time", "end_time"];
    const IMMUTABLE: bool = true;

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            date(self.date),
            int(i64::from(self.day_of_week)),
            time(self.start_time),
            time(self.end_time),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: read_date(row, 1)?,
            day_of_week: row.get(2)?,
            start_time: read_time(row, 3)?,
            end_time: read_time(row, 4)?,
        })
    }
}

impl Record for Instance {
    const ENTITY: &'static str = "Instance";
    const TABLE: &'static str = "instances";
    const COLUMNS: &'static [&'static str] =
        &["unit_id", "block_id", "event_id", "method_id", "comment", "modified"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            int(self.unit_id),
            int(self.block_id),
            int(self.event_id),
            opt_int(self.method_id),
            opt_text(self.comment.as_deref()),
            opt_datetime(self.modified),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            unit_id: row.get(1)?,
            block_id: row.get(2)?,
            event_id: row.get(3)?,
            method_id: row.get(4)?,
            comment: row.get(5)?,
            modified: read_opt_datetime(row, 6)?,
        })
    }
}

impl Record for InstancePerson {
    const ENTITY: &'static str = "InstancePerson";
    const TABLE: &'static str = "instance_persons";
    const COLUMNS: &'static [&'static str] = &["instance_id", "person_id", "role_id", "modified"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            int(self.instance_id),
            int(self.person_id),
            int(self.role_id),
            opt_datetime(self.modified),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            instance_id: row.get(1)?,
            person_id: row.get(2)?,
            role_id: row.get(3)?,
            modified: read_opt_datetime(row, 4)?,
        })
    }
}

impl Record for InstanceGroup {
    const ENTITY: &'static str = "InstanceGroup";
    const TABLE: &'static str = "instance_groups";
    const COLUMNS: &'static [&'static str] = &["assoc_id", "group_id", "modified"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            int(self.assoc_id),
            int(self.group_id),
            opt_datetime(self.modified),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            assoc_id: row.get(1)?,
            group_id: row.get(2)?,
            modified: read_opt_datetime(row, 3)?,
        })
    }
}

impl Record for InstanceRoom {
    const ENTITY: &'static str = "InstanceRoom";
    const TABLE: &'static str = "instance_rooms";
    const COLUMNS: &'static [&'static str] = &["assoc_id", "room_id", "modified"];

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            int(self.assoc_id),
            int(self.room_id),
            opt_datetime(self.modified),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            assoc_id: row.get(1)?,
            room_id: row.get(2)?,
            modified: read_opt_datetime(row, 3)?,
        })
    }
}

impl Record for ImportRun {
    const ENTITY: &'static str = "ImportRun";
    const TABLE: &'static str = "import_runs";
    const COLUMNS: &'static [&'static str] = &[
        "run_id",
        "organization_id",
        "term_id",
        "created",
        "imported_at",
        "error_count",
        "warning_count",
        "report_json",
        "config_snapshot",
    ];
    const IMMUTABLE: bool = true;

    fn to_values(&self) -> RepositoryResult<Vec<Value>> {
        Ok(vec![
            text(&self.run_id),
            int(self.organization_id),
            int(self.term_id),
            datetime(self.created),
            utc(self.imported_at),
            int(self.error_count),
            int(self.warning_count),
            opt_text(self.report_json.as_deref()),
            opt_text(self.config_snapshot.as_deref()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(1)?,
            organization_id: row.get(2)?,
            term_id: row.get(3)?,
            created: read_datetime(row, 4)?,
            imported_at: read_utc(row, 5)?,
            error_count: row.get(6)?,
            warning_count: row.get(7)?,
            report_json: row.get(8)?,
            config_snapshot: row.get(9)?,
        })
    }
}
