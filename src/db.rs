use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "resultd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema, for tests.
#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Identity directories. Owned by the surrounding application; the engine
    // keeps only what grouping and tie-breaking need.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            education_level TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_sessions(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            result_type TEXT NOT NULL DEFAULT 'TERMLY',
            is_active INTEGER NOT NULL DEFAULT 1,
            is_current INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scoring_configurations(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            education_level TEXT NOT NULL,
            result_type TEXT NOT NULL,
            components TEXT NOT NULL,
            total_max_score REAL NOT NULL,
            ca_weight REAL,
            exam_weight REAL,
            is_default INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scoring_scope
         ON scoring_configurations(education_level, result_type)",
        [],
    )?;
    // Backstop for the single-default flip.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_scoring_one_default
         ON scoring_configurations(education_level) WHERE is_default = 1",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grading_systems(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_bands(
            id TEXT PRIMARY KEY,
            grading_system_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            min_score REAL NOT NULL,
            max_score REAL NOT NULL,
            letter TEXT NOT NULL,
            grade_point REAL,
            is_passing INTEGER NOT NULL,
            FOREIGN KEY(grading_system_id) REFERENCES grading_systems(id) ON DELETE CASCADE,
            UNIQUE(grading_system_id, sort_order)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            exam_session_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            education_level TEXT NOT NULL,
            grading_system_id TEXT NOT NULL,
            scoring_configuration_id TEXT NOT NULL,
            raw_scores TEXT NOT NULL,
            ca_total REAL NOT NULL DEFAULT 0,
            exam_score REAL NOT NULL DEFAULT 0,
            total_score REAL NOT NULL DEFAULT 0,
            ca_percentage REAL NOT NULL DEFAULT 0,
            exam_percentage REAL NOT NULL DEFAULT 0,
            total_percentage REAL NOT NULL DEFAULT 0,
            grade TEXT NOT NULL DEFAULT 'N/A',
            grade_point REAL,
            is_passed INTEGER NOT NULL DEFAULT 0,
            class_average REAL,
            highest_in_class REAL,
            lowest_in_class REAL,
            subject_position INTEGER,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            entered_by TEXT,
            approved_by TEXT,
            remarks TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE,
            FOREIGN KEY(exam_session_id) REFERENCES exam_sessions(id) ON DELETE CASCADE,
            FOREIGN KEY(grading_system_id) REFERENCES grading_systems(id),
            FOREIGN KEY(scoring_configuration_id) REFERENCES scoring_configurations(id),
            UNIQUE(student_id, subject_id, exam_session_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_group
         ON results(subject_id, exam_session_id, class_id, education_level)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_student_session
         ON results(student_id, exam_session_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS term_reports(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            exam_session_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            education_level TEXT NOT NULL,
            total_score REAL NOT NULL DEFAULT 0,
            average_score REAL NOT NULL DEFAULT 0,
            overall_percentage REAL NOT NULL DEFAULT 0,
            subjects_count INTEGER NOT NULL DEFAULT 0,
            class_position INTEGER,
            total_students INTEGER,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            approved_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(exam_session_id) REFERENCES exam_sessions(id) ON DELETE CASCADE,
            UNIQUE(student_id, exam_session_id, education_level)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_term_reports_group
         ON term_reports(exam_session_id, class_id, education_level)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recalculation_runs(
            id TEXT PRIMARY KEY,
            filters TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            summary TEXT
        )",
        [],
    )?;

    Ok(())
}
