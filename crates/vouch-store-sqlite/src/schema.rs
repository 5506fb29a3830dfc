//! SQL schema for the vouch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Immutable rubric snapshots. Never updated once written.
CREATE TABLE IF NOT EXISTS kpi_sets (
    kpi_set_id      TEXT PRIMARY KEY,
    role            TEXT NOT NULL,
    seniority_level TEXT NOT NULL,
    version         INTEGER NOT NULL,
    created_at      TEXT NOT NULL,
    UNIQUE (role, seniority_level, version)
);

CREATE TABLE IF NOT EXISTS kpis (
    kpi_id              TEXT PRIMARY KEY,
    kpi_set_id          TEXT NOT NULL REFERENCES kpi_sets(kpi_set_id),
    position            INTEGER NOT NULL,
    key                 TEXT NOT NULL,
    name                TEXT NOT NULL,
    category            TEXT,
    required            INTEGER NOT NULL,
    weight              REAL NOT NULL,
    min_evidence_length INTEGER NOT NULL DEFAULT 200,
    UNIQUE (kpi_set_id, key)
);

-- The only mutable rubric state: which snapshot is live per pair.
CREATE TABLE IF NOT EXISTS active_kpi_sets (
    role            TEXT NOT NULL,
    seniority_level TEXT NOT NULL,
    kpi_set_id      TEXT NOT NULL REFERENCES kpi_sets(kpi_set_id),
    activated_at    TEXT NOT NULL,
    PRIMARY KEY (role, seniority_level)
);

-- Never deleted; status is the only column that changes.
CREATE TABLE IF NOT EXISTS reference_requests (
    request_id        TEXT PRIMARY KEY,
    candidate_id      TEXT NOT NULL,
    referee_email     TEXT NOT NULL,
    referee_name      TEXT,
    relationship_type TEXT NOT NULL
                      CHECK (relationship_type IN ('manager','peer','report','client','mentor','other')),
    role              TEXT NOT NULL,
    seniority_level   TEXT NOT NULL,
    kpi_set_id        TEXT NOT NULL REFERENCES kpi_sets(kpi_set_id),
    kpi_set_version   INTEGER NOT NULL,
    token_hash        TEXT NOT NULL UNIQUE,  -- hex SHA-256; no plaintext column
    expires_at        TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending'
                      CHECK (status IN ('pending','submitted','expired','revoked')),
    created_at        TEXT NOT NULL
);

-- One row per fulfilled request; the UNIQUE constraint is the single-use
-- guarantee.
CREATE TABLE IF NOT EXISTS submitted_references (
    reference_id           TEXT PRIMARY KEY,
    reference_request_id   TEXT NOT NULL UNIQUE REFERENCES reference_requests(request_id),
    candidate_id           TEXT NOT NULL,
    referee_id             TEXT,
    referee_email          TEXT NOT NULL,
    relationship_type      TEXT NOT NULL
                           CHECK (relationship_type IN ('manager','peer','report','client','mentor','other')),
    start_date             TEXT,
    end_date               TEXT,
    overall_recommendation TEXT
                           CHECK (overall_recommendation IN
                                  ('strongly_recommend','recommend','neutral','not_recommend')),
    rehire_decision        TEXT NOT NULL CHECK (rehire_decision IN ('yes','no','conditional')),
    rehire_reasoning       TEXT,
    confidence_level       TEXT NOT NULL DEFAULT 'medium'
                           CHECK (confidence_level IN ('high','medium','low')),
    kpi_set_id             TEXT NOT NULL REFERENCES kpi_sets(kpi_set_id),
    kpi_set_version        INTEGER NOT NULL,
    completeness_score     REAL,
    signature_hash         TEXT NOT NULL,
    submitted_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kpi_scores (
    score_id          TEXT PRIMARY KEY,
    reference_id      TEXT NOT NULL
                      REFERENCES submitted_references(reference_id) ON DELETE CASCADE,
    position          INTEGER NOT NULL,
    kpi_id            TEXT NOT NULL REFERENCES kpis(kpi_id),
    kpi_key           TEXT NOT NULL,
    kpi_name          TEXT NOT NULL,
    score             INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
    evidence_text     TEXT NOT NULL,
    confidence_level  TEXT NOT NULL DEFAULT 'medium'
                      CHECK (confidence_level IN ('high','medium','low')),
    evidence_metadata TEXT,
    UNIQUE (reference_id, kpi_id)
);

-- Bumped in the same transaction as every reference insert or delete.
CREATE TABLE IF NOT EXISTS candidate_revisions (
    candidate_id TEXT PRIMARY KEY,
    revision     INTEGER NOT NULL
);

-- Materialised per-candidate aggregates; a cache, safe to drop. `revision`
-- is the candidate revision the aggregates were computed from.
CREATE TABLE IF NOT EXISTS kpi_aggregates (
    candidate_id    TEXT PRIMARY KEY,
    aggregates_json TEXT NOT NULL,
    computed_at     TEXT NOT NULL,
    revision        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS requests_candidate_idx  ON reference_requests(candidate_id, created_at);
CREATE INDEX IF NOT EXISTS requests_expiry_idx     ON reference_requests(status, expires_at);
CREATE INDEX IF NOT EXISTS references_candidate_idx ON submitted_references(candidate_id, submitted_at);
CREATE INDEX IF NOT EXISTS scores_reference_idx    ON kpi_scores(reference_id);

PRAGMA user_version = 1;
";
