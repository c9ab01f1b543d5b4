pub const SCHEMA: &str = r#"
-- Users are students or admins; identity is the email
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    username TEXT,
    role TEXT NOT NULL DEFAULT 'student',
    current_level TEXT,           -- class_11 | class_12 | NULL
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Tokens are auth credentials bound to a user
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- first 8 chars of ID for fast lookup
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,            -- NULL = never
    last_used_at TEXT
);

-- Syllabus tree: subjects own units own topics
CREATE TABLE IF NOT EXISTS subjects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    color TEXT
);

CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY,
    subject_id INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS topics (
    id INTEGER PRIMARY KEY,
    unit_id INTEGER NOT NULL REFERENCES units(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_important INTEGER NOT NULL DEFAULT 0,
    weightage TEXT,
    applies_to_class11 INTEGER NOT NULL DEFAULT 1,
    applies_to_class12 INTEGER NOT NULL DEFAULT 0
);

-- At most one progress row per (user, topic)
CREATE TABLE IF NOT EXISTS topic_progress (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'not_started',
    confidence TEXT,
    notes TEXT,
    completed_at TEXT,          -- set iff status = 'completed'
    last_revised_at TEXT,
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(user_id, topic_id)
);

CREATE TABLE IF NOT EXISTS study_sessions (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    subject_id INTEGER REFERENCES subjects(id) ON DELETE SET NULL,
    duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
    date TEXT NOT NULL,         -- YYYY-MM-DD
    notes TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Entries sharing (user_id, scheduled_date) form one revision session
CREATE TABLE IF NOT EXISTS revision_entries (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    scheduled_date TEXT NOT NULL,   -- YYYY-MM-DD
    status TEXT NOT NULL DEFAULT 'not_started',
    completed_at TEXT,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(user_id, topic_id, scheduled_date)
);

-- Deleting a topic clears topic_id; topic_ids is pruned by the store
CREATE TABLE IF NOT EXISTS backlog_items (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    topic_id INTEGER REFERENCES topics(id) ON DELETE SET NULL,  -- single-topic scope
    topic_ids TEXT,             -- JSON array, multi-topic scope
    title TEXT NOT NULL,
    description TEXT,
    priority TEXT NOT NULL DEFAULT 'medium',
    kind TEXT NOT NULL DEFAULT 'concept',
    deadline TEXT,
    is_completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS mock_tests (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    test_date TEXT NOT NULL,    -- YYYY-MM-DD
    max_score INTEGER NOT NULL,
    total_score REAL NOT NULL,
    notes TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Subjects referenced here cannot be deleted
CREATE TABLE IF NOT EXISTS mock_test_subjects (
    id INTEGER PRIMARY KEY,
    mock_test_id TEXT NOT NULL REFERENCES mock_tests(id) ON DELETE CASCADE,
    subject_id INTEGER NOT NULL REFERENCES subjects(id) ON DELETE RESTRICT,
    score REAL NOT NULL,
    negative_marks REAL NOT NULL DEFAULT 0,
    max_score INTEGER,
    scope TEXT,                 -- class_11 | class_12 | full
    unit_ids TEXT               -- JSON array, only when scope is NULL
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_units_subject ON units(subject_id);
CREATE INDEX IF NOT EXISTS idx_topics_unit ON topics(unit_id);
CREATE INDEX IF NOT EXISTS idx_progress_user ON topic_progress(user_id);
CREATE INDEX IF NOT EXISTS idx_study_sessions_user_date ON study_sessions(user_id, date);
CREATE INDEX IF NOT EXISTS idx_revision_user_date ON revision_entries(user_id, scheduled_date);
CREATE INDEX IF NOT EXISTS idx_backlog_user ON backlog_items(user_id);
CREATE INDEX IF NOT EXISTS idx_mock_tests_user ON mock_tests(user_id);
CREATE INDEX IF NOT EXISTS idx_mock_test_subjects_test ON mock_test_subjects(mock_test_id);
"#;
