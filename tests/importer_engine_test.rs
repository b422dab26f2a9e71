// ==========================================
// 排课数据同步系统 - 导入引擎集成测试
// ==========================================
// 覆盖: 端到端展开、幂等重跑、重跑合并、学期裁剪、保护性合并、归属首占、
//       文件头终止、重复导入、教室解析、人员代码升级、临时课次、配置
// ==========================================


use std::io::Write;
use tempfile::NamedTempFile;
use test_helpers::*;
use timetable_sync::config::config_keys;
use timetable_sync::domain::{Person, TEACHER_ROLE_ID};
use timetable_sync::repository::CatalogStore;
use timetable_sync::{ImportError, ImportIssue, SqliteCatalogStore};

fn setup() -> (NamedTempFile, String) {
    timetable_sync::logging::init_test();
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    seed_grid(&db_path, "Main");
    (temp_file, db_path)
}

// ==========================================
// 端到端
// ==========================================

#[test]
fn test_four_mondays_without_room() {
    let (_tmp, db_path) = setup();
    let importer = create_importer(&db_path);

    let report = importer
        .import_str(&four_mondays_export().build(), 1)
        .expect("导入失败");

    assert!(report.success, "{}", report.to_text());
    assert_eq!(report.summary.units_total, 1);
    assert_eq!(report.summary.units_expanded, 1);
    assert_eq!(report.summary.instances_created, 4);

    assert_eq!(count_rows(&db_path, "blocks"), 4);
    assert_eq!(count_rows(&db_path, "instances"), 4);
    assert_eq!(count_rows(&db_path, "instance_persons"), 4);
    assert_eq!(count_rows(&db_path, "instance_groups"), 4);
    assert_eq!(count_rows(&db_path, "instance_rooms"), 0);
    assert_eq!(count_rows(&db_path, "import_runs"), 1);

    let roles = query_strings(&db_path, "SELECT CAST(role_id AS TEXT) FROM instance_persons");
    assert!(roles.iter().all(|r| r == &TEACHER_ROLE_ID.to_string()));

    let dates = query_strings(&db_path, "SELECT date FROM blocks ORDER BY date");
    assert_eq!(dates, vec!["2024-03-04", "2024-03-11", "2024-03-18", "2024-03-25"]);
    let times = query_strings(&db_path, "SELECT start_time || '-' || end_time FROM blocks");
    assert!(times.iter().all(|t| t == "08:00:00-09:30:00"));

    assert_eq!(
        report.warning_messages(),
        vec!["The unit 1 has no room on Monday, period 1 on 4 dates.".to_string()]
    );
}

#[test]
fn test_second_run_inserts_no_instance_rows() {
    let (_tmp, db_path) = setup();

    let first = create_importer(&db_path)
        .import_str(&four_mondays_export().build(), 1)
        .unwrap();
    assert!(first.success, "{}", first.to_text());

    let importer = create_importer(&db_path);
    let second = importer
        .import_str(
            &four_mondays_export().created("20240221", "090000").build(),
            1,
        )
        .unwrap();
    assert!(second.success, "{}", second.to_text());

    let store = importer.store();
    for table in ["blocks", "instances", "instance_persons", "instance_groups", "instance_rooms"] {
        assert_eq!(store.inserts(table), 0, "{} 不应新增行", table);
    }
    assert_eq!(store.updates("instances"), 0);
    assert_eq!(second.summary.instances_created, 0);
    assert_eq!(second.summary.instances_updated, 0);
    assert_eq!(count_rows(&db_path, "instances"), 4);
    assert_eq!(count_rows(&db_path, "import_runs"), 2);
}

// ==========================================
// 重跑合并
// ==========================================

#[test]
fn test_rerun_backfills_missing_link_timestamps() {
    let (_tmp, db_path) = setup();
    seed_room(&db_path, "A1");
    let export = |date: &str, time: &str| {
        standard_catalog(ExportXml::new().created(date, time))
            .section("<rooms><room id=\"RM_A1\"/></rooms>")
            .section(&format!(
                "<lessons>{}</lessons>",
                monday_lesson("LS_1", Some("20240304"), Some("20240325"), Some("RM_A1"))
            ))
            .build()
    };

    let first = create_importer(&db_path)
        .import_str(&export("20240220", "101500"), 1)
        .unwrap();
    assert!(first.success, "{}", first.to_text());
    assert_eq!(count_rows(&db_path, "instance_rooms"), 4);

    // 旧版本写入的关联没有时间戳
    execute(
        &db_path,
        "UPDATE instance_persons SET modified = NULL;
         UPDATE instance_groups SET modified = NULL;
         UPDATE instance_rooms SET modified = NULL;",
    );

    let importer = create_importer(&db_path);
    let second = importer
        .import_str(&export("20240221", "090000"), 1)
        .unwrap();
    assert!(second.success, "{}", second.to_text());

    let store = importer.store();
    for table in ["instance_persons", "instance_groups", "instance_rooms"] {
        assert_eq!(store.inserts(table), 0, "{} 不应新增行", table);
        assert_eq!(store.updates(table), 4, "{} 应补写时间戳", table);
        let stamps = query_strings(&db_path, &format!("SELECT COALESCE(modified, '') FROM {}", table));
        assert_eq!(stamps, vec!["2024-02-21 09:00:00"; 4], "{}", table);
    }
}

#[test]
fn test_rerun_adds_new_groups_and_keeps_existing_links() {
    let (_tmp, db_path) = setup();
    let first = create_importer(&db_path)
        .import_str(
            &standard_catalog(ExportXml::new())
                .section(&format!(
                    "<lessons>{}</lessons>",
                    custom_lesson("LS_1", "CL_A1", None, MONDAY_FIRST_PERIOD)
                ))
                .build(),
            1,
        )
        .unwrap();
    assert!(first.success, "{}", first.to_text());
    assert_eq!(count_rows(&db_path, "instance_groups"), 4);

    let importer = create_importer(&db_path);
    let second = importer
        .import_str(
            &catalog_with_classes(ExportXml::new().created("20240221", "090000"), &["CL_A1", "CL_A2"])
                .section(&format!(
                    "<lessons>{}</lessons>",
                    custom_lesson("LS_1", "CL_A1 CL_A2", None, MONDAY_FIRST_PERIOD)
                ))
                .build(),
            1,
        )
        .unwrap();
    assert!(second.success, "{}", second.to_text());

    let store = importer.store();
    assert_eq!(store.inserts("instance_groups"), 4);
    assert_eq!(store.updates("instance_groups"), 0);
    assert_eq!(store.inserts("instance_persons"), 0);
    assert_eq!(count_rows(&db_path, "instance_groups"), 8);

    let kept = query_strings(
        &db_path,
        "SELECT modified FROM instance_groups \
         WHERE group_id = (SELECT id FROM class_groups WHERE code = 'A1')",
    );
    assert_eq!(kept, vec!["2024-02-20 10:15:00"; 4]);
    let added = query_strings(
        &db_path,
        "SELECT modified FROM instance_groups \
         WHERE group_id = (SELECT id FROM class_groups WHERE code = 'A2')",
    );
    assert_eq!(added, vec!["2024-02-21 09:00:00"; 4]);
}

#[test]
fn test_rerun_with_new_role_updates_in_place() {
    let (_tmp, db_path) = setup();
    let first = create_importer(&db_path)
        .import_str(&four_mondays_export().build(), 1)
        .unwrap();
    assert!(first.success, "{}", first.to_text());

    let importer = create_importer(&db_path);
    let second = importer
        .import_str(
            &standard_catalog(ExportXml::new().created("20240221", "090000"))
                .section(&format!(
                    "<lessons>{}</lessons>",
                    custom_lesson("LS_1", "CL_A1", Some("2"), MONDAY_FIRST_PERIOD)
                ))
                .build(),
            1,
        )
        .unwrap();
    assert!(second.success, "{}", second.to_text());

    let store = importer.store();
    assert_eq!(store.inserts("instance_persons"), 0);
    assert_eq!(store.updates("instance_persons"), 4);
    assert_eq!(count_rows(&db_path, "instance_persons"), 4);

    let roles = query_strings(&db_path, "SELECT CAST(role_id AS TEXT) FROM instance_persons");
    assert_eq!(roles, vec!["2"; 4]);
    let stamps = query_strings(&db_path, "SELECT modified FROM instance_persons");
    assert_eq!(stamps, vec!["2024-02-21 09:00:00"; 4]);
}

// ==========================================
// 临时课次
// ==========================================

#[test]
fn test_assigned_date_expands_to_single_block() {
    let (_tmp, db_path) = setup();
    let time = "<assigned_date>20240306</assigned_date><assigned_period>1</assigned_period>";
    let export = standard_catalog(ExportXml::new()).section(&format!(
        "<lessons>{}</lessons>",
        custom_lesson("LS_1", "CL_A1", None, time)
    ));

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(report.success, "{}", report.to_text());
    assert_eq!(report.summary.instances_created, 1);

    let blocks = query_strings(
        &db_path,
        "SELECT date || ' ' || day_of_week || ' ' || start_time || '-' || end_time FROM blocks",
    );
    assert_eq!(blocks, vec!["2024-03-06 3 08:00:00-09:30:00"]);
    assert_eq!(count_rows(&db_path, "instances"), 1);
    assert_eq!(count_rows(&db_path, "instance_persons"), 1);
}

#[test]
fn test_unit_dates_clipped_to_term() {
    let (_tmp, db_path) = setup();
    let export = standard_catalog(ExportXml::new()).section(&format!(
        "<lessons>{}</lessons>",
        monday_lesson("LS_1", Some("20240101"), Some("20241231"), None)
    ));

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(report.success, "{}", report.to_text());

    let configured = query_strings(&db_path, "SELECT start_date || '/' || end_date FROM units");
    assert_eq!(configured, vec!["2024-03-01/2024-07-31"]);
    let effective =
        query_strings(&db_path, "SELECT effective_start || '/' || effective_end FROM units");
    assert_eq!(effective, vec!["2024-03-04/2024-07-29"]);

    let outside = query_strings(
        &db_path,
        "SELECT date FROM blocks WHERE date < '2024-03-01' OR date > '2024-07-31'",
    );
    assert!(outside.is_empty());
}

#[test]
fn test_unit_outside_term_is_skipped_silently() {
    let (_tmp, db_path) = setup();
    let export = standard_catalog(ExportXml::new()).section(&format!(
        "<lessons>{}</lessons>",
        monday_lesson("LS_9", Some("20240901"), Some("20241220"), None)
    ));

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(report.success, "{}", report.to_text());
    assert_eq!(report.summary.units_skipped, 1);
    assert!(report.warnings.is_empty());
    assert_eq!(count_rows(&db_path, "units"), 0);
}

// ==========================================
// 保护性合并与归属
// ==========================================

#[test]
fn test_populated_fields_are_not_overwritten() {
    let (_tmp, db_path) = setup();
    let store = SqliteCatalogStore::new(&db_path).unwrap();
    store
        .insert(&Person {
            code: "MUS".to_string(),
            surname: Some("Muster".to_string()),
            forename: Some("Max".to_string()),
            title: None,
            username: Some("mmuster".to_string()),
        })
        .unwrap();

    let export = ExportXml::new().section(
        "<teachers><teacher id=\"TR_MUS\"><surname>Muster</surname><forename>Moritz</forename>\
         <title>Dr.</title><payrollnumber>mmuster</payrollnumber></teacher></teachers>",
    );
    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(report.success, "{}", report.to_text());

    assert_eq!(count_rows(&db_path, "persons"), 1);
    let person = query_strings(&db_path, "SELECT forename || '|' || title FROM persons");
    assert_eq!(person, vec!["Max|Dr."]);
}

#[test]
fn test_association_first_claim_across_organizations() {
    let (_tmp, db_path) = setup();

    let first = create_importer(&db_path)
        .import_str(&four_mondays_export().build(), 1)
        .unwrap();
    assert!(first.success, "{}", first.to_text());
    let second = create_importer(&db_path)
        .import_str(&four_mondays_export().build(), 2)
        .unwrap();
    assert!(second.success, "{}", second.to_text());

    let owners = query_strings(
        &db_path,
        "SELECT CAST(organization_id AS TEXT) FROM associations WHERE person_id IS NOT NULL",
    );
    assert_eq!(owners, vec!["1"]);
    // 单元按组织区分
    assert_eq!(count_rows(&db_path, "units"), 2);
}

#[test]
fn test_person_code_upgrade_is_one_way() {
    let (_tmp, db_path) = setup();
    let store = SqliteCatalogStore::new(&db_path).unwrap();
    store
        .insert(&Person {
            code: "legacy_17".to_string(),
            surname: Some("Muster".to_string()),
            forename: None,
            title: None,
            username: Some("mmuster".to_string()),
        })
        .unwrap();

    let upgrade = ExportXml::new().section(
        "<teachers><teacher id=\"TR_MUS\"><surname>Muster</surname>\
         <payrollnumber>mmuster</payrollnumber></teacher></teachers>",
    );
    create_importer(&db_path)
        .import_str(&upgrade.build(), 1)
        .unwrap();
    assert_eq!(query_strings(&db_path, "SELECT code FROM persons"), vec!["MUS"]);

    let downgrade = ExportXml::new()
        .created("20240221", "101500")
        .section(
            "<teachers><teacher id=\"TR_old_1\"><surname>Muster</surname>\
             <payrollnumber>mmuster</payrollnumber></teacher></teachers>",
        );
    create_importer(&db_path)
        .import_str(&downgrade.build(), 1)
        .unwrap();
    assert_eq!(query_strings(&db_path, "SELECT code FROM persons"), vec!["MUS"]);
}

// ==========================================
// 终止条件
// ==========================================

#[test]
fn test_expired_term_aborts_without_mutation() {
    let (_tmp, db_path) = setup();
    let export = four_mondays_export().created("20240801", "080000");

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(!report.success);
    assert!(matches!(report.errors[0], ImportIssue::TermExpired { .. }));
    for table in ["terms", "events", "persons", "units", "instances", "import_runs"] {
        assert_eq!(count_rows(&db_path, table), 0, "{} 应保持为空", table);
    }
}

#[test]
fn test_inconsistent_school_year_aborts() {
    let (_tmp, db_path) = setup();
    let export = four_mondays_export().school_year("20241231", "20240101");

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(!report.success);
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, ImportIssue::SchoolYearInconsistent { .. })));
    assert_eq!(count_rows(&db_path, "terms"), 0);
}

#[test]
fn test_duplicate_import_is_rejected() {
    let (_tmp, db_path) = setup();
    let xml = four_mondays_export().build();

    let first = create_importer(&db_path).import_str(&xml, 1).unwrap();
    assert!(first.success, "{}", first.to_text());

    let importer = create_importer(&db_path);
    let second = importer.import_str(&xml, 1).unwrap();
    assert!(!second.success);
    assert!(matches!(second.errors[0], ImportIssue::DuplicateImport { .. }));
    assert_eq!(importer.store().inserts("instances"), 0);
    assert_eq!(count_rows(&db_path, "import_runs"), 1);
}

// ==========================================
// 教室
// ==========================================

#[test]
fn test_room_missing_from_store_blocks_import() {
    let (_tmp, db_path) = setup();
    let export = four_mondays_export()
        .section("<rooms><room id=\"RM_Z9\"><longname>Annex</longname></room></rooms>");

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(!report.success);
    assert_eq!(
        report.errors,
        vec![ImportIssue::RoomNotFound {
            code: "Z9".to_string()
        }]
    );
    assert_eq!(count_rows(&db_path, "rooms"), 0);
    assert_eq!(count_rows(&db_path, "import_runs"), 0);
}

#[test]
fn test_unknown_room_codes_are_collapsed_per_unit() {
    let (_tmp, db_path) = setup();
    seed_room(&db_path, "A1");
    let export = standard_catalog(ExportXml::new())
        .section("<rooms><room id=\"RM_A1\"><capacity>30</capacity></room></rooms>")
        .section(&format!(
            "<lessons>{}</lessons>",
            monday_lesson("LS_1", Some("20240304"), Some("20240325"), Some("RM_A1 RM_X9"))
        ));

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(report.success, "{}", report.to_text());
    assert_eq!(
        report.warning_messages(),
        vec!["The unit 1 references the unknown room X9.".to_string()]
    );
    assert_eq!(count_rows(&db_path, "instance_rooms"), 4);
    assert_eq!(query_strings(&db_path, "SELECT CAST(capacity AS TEXT) FROM rooms"), vec!["30"]);
}

// ==========================================
// 单元校验
// ==========================================

#[test]
fn test_unit_without_teacher_is_rejected() {
    let (_tmp, db_path) = setup();
    let lesson = "<lessons><lesson id=\"LS_2\"><lesson_subject id=\"SU_101\"/>\
                  <lesson_classes id=\"CL_A1\"/><times><time><assigned_day>1</assigned_day>\
                  <assigned_period>1</assigned_period></time></times></lesson></lessons>";
    let export = standard_catalog(ExportXml::new()).section(lesson);

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(!report.success);
    assert!(report
        .errors
        .contains(&ImportIssue::UnitPersonCount {
            code: "2".to_string(),
            count: 0
        }));
    assert_eq!(report.summary.units_rejected, 1);
    assert_eq!(count_rows(&db_path, "units"), 0);
    // 未落库的单元仍参与教室与授课方式汇总
    assert!(report
        .warning_messages()
        .contains(&"The unit 2 has no method.".to_string()));
}

#[test]
fn test_unit_without_times_is_skipped() {
    let (_tmp, db_path) = setup();
    let lesson = "<lessons><lesson id=\"LS_3\"><lesson_subject id=\"SU_101\"/>\
                  <lesson_teacher id=\"TR_5\"/><lesson_classes id=\"CL_A1\"/></lesson></lessons>";
    let export = standard_catalog(ExportXml::new()).section(lesson);

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(report.success, "{}", report.to_text());
    assert_eq!(report.summary.units_skipped, 1);
    assert_eq!(count_rows(&db_path, "units"), 0);
}

#[test]
fn test_term_before_school_year_treats_missing_mask_days_as_free() {
    let (_tmp, db_path) = setup();
    let export = standard_catalog(ExportXml::new().school_year("20240315", "20241231"))
        .section(&format!(
            "<lessons>{}</lessons>",
            monday_lesson("LS_1", Some("20240301"), Some("20240325"), Some("RM_A1"))
        ))
        .section("<rooms><room id=\"RM_A1\"/></rooms>");
    seed_room(&db_path, "A1");

    let report = create_importer(&db_path)
        .import_str(&export.build(), 1)
        .unwrap();
    assert!(report.success, "{}", report.to_text());
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, ImportIssue::TermBeforeSchoolYear { .. })));

    let dates = query_strings(&db_path, "SELECT date FROM blocks ORDER BY date");
    assert_eq!(dates, vec!["2024-03-18", "2024-03-25"]);
}

// ==========================================
// 配置与输入
// ==========================================

#[test]
fn test_configured_role_and_cutoff() {
    let (_tmp, db_path) = setup();
    let importer = create_importer(&db_path);
    {
        use timetable_sync::config::ConfigManager;
        let config = ConfigManager::new(&db_path).unwrap();
        config.set_config_value(config_keys::DEFAULT_ROLE_ID, "3").unwrap();
        // 截止日 = 2024-03-10，2024-03-04 不再落库
        config.set_config_value(config_keys::CUTOFF_OFFSET_DAYS, "2").unwrap();
    }
    let export = four_mondays_export().created("20240312", "070000");

    let report = importer.import_str(&export.build(), 1).unwrap();
    assert!(report.success, "{}", report.to_text());

    let roles = query_strings(&db_path, "SELECT CAST(role_id AS TEXT) FROM instance_persons");
    assert_eq!(roles, vec!["3", "3", "3"]);
}

#[test]
fn test_import_file_reads_export_and_reports_missing_file() {
    let (_tmp, db_path) = setup();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(four_mondays_export().build().as_bytes()).unwrap();

    let importer = create_importer(&db_path);
    let report = importer.import_file(file.path(), 1).unwrap();
    assert!(report.success, "{}", report.to_text());

    let missing = importer.import_file(std::path::Path::new("/nonexistent/export.xml"), 1);
    assert!(matches!(missing, Err(ImportError::FileNotFound(_))));
}

#[test]
fn test_import_run_keeps_config_snapshot() {
    let (_tmp, db_path) = setup();
    let importer = create_importer(&db_path);
    {
        use timetable_sync::config::ConfigManager;
        let config = ConfigManager::new(&db_path).unwrap();
        config.set_config_value(config_keys::WARNING_LIST_LIMIT, "3").unwrap();
    }

    let report = importer.import_str(&four_mondays_export().build(), 1).unwrap();
    assert!(report.success, "{}", report.to_text());

    let snapshots = query_strings(&db_path, "SELECT config_snapshot FROM import_runs");
    assert_eq!(snapshots.len(), 1);
    let snapshot: serde_json::Value = serde_json::from_str(&snapshots[0]).unwrap();
    assert_eq!(snapshot[config_keys::WARNING_LIST_LIMIT], "3");
}

#[test]
fn test_out_of_range_config_falls_back_to_defaults() {
    let (_tmp, db_path) = setup();
    let importer = create_importer(&db_path);
    {
        use timetable_sync::config::ConfigManager;
        let config = ConfigManager::new(&db_path).unwrap();
        config
            .set_config_value(config_keys::CUTOFF_OFFSET_DAYS, "1000000000")
            .unwrap();
        config.set_config_value(config_keys::WARNING_LIST_LIMIT, "0").unwrap();
    }
    let export = standard_catalog(ExportXml::new()).section(&format!(
        "<lessons>{}</lessons>",
        monday_lesson("LS_1", Some("20240304"), Some("20240311"), None)
    ));

    let report = importer.import_str(&export.build(), 1).unwrap();
    assert!(report.success, "{}", report.to_text());
    assert_eq!(count_rows(&db_path, "instances"), 2);
    assert_eq!(
        report.warning_messages(),
        vec!["The unit 1 has no room on Monday, period 1 on 2024-03-04 and 2024-03-11.".to_string()]
    );
}
