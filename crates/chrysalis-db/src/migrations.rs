use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               TEXT PRIMARY KEY,
            username         TEXT NOT NULL UNIQUE,
            password         TEXT NOT NULL,
            display_name     TEXT NOT NULL,
            current_stage    TEXT NOT NULL DEFAULT 'FLOWER',
            stage_updated_at TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS proposals (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            content     TEXT NOT NULL,
            vote_type   TEXT NOT NULL,
            vote_status TEXT NOT NULL DEFAULT 'DRAFT',
            start_date  TEXT,
            end_date    TEXT,
            quorum      INTEGER,
            threshold   REAL,
            result      TEXT,
            author_id   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            closed_at   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_proposals_status
            ON proposals(vote_status, created_at);

        CREATE TABLE IF NOT EXISTS votes (
            proposal_id TEXT NOT NULL REFERENCES proposals(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            choice      TEXT NOT NULL,
            cast_at     TEXT NOT NULL,
            PRIMARY KEY (proposal_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS stage_transitions (
            id         TEXT PRIMARY KEY,
            user_id    TEXT NOT NULL REFERENCES users(id),
            from_stage TEXT NOT NULL,
            to_stage   TEXT NOT NULL,
            reason     TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_stage_transitions_user
            ON stage_transitions(user_id, created_at);

        CREATE TABLE IF NOT EXISTS achievements (
            id          TEXT PRIMARY KEY,
            code        TEXT NOT NULL UNIQUE,
            type        TEXT NOT NULL,
            title       TEXT NOT NULL,
            description TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_achievements (
            user_id        TEXT NOT NULL REFERENCES users(id),
            achievement_id TEXT NOT NULL REFERENCES achievements(id),
            progress       INTEGER NOT NULL DEFAULT 0,
            earned_at      TEXT,
            seen_at        TEXT,
            updated_at     TEXT NOT NULL,
            PRIMARY KEY (user_id, achievement_id)
        );

        CREATE TABLE IF NOT EXISTS meadows (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            description  TEXT NOT NULL,
            meadow_type  TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'PLANNED',
            host_id      TEXT NOT NULL REFERENCES users(id),
            scheduled_at TEXT NOT NULL,
            location     TEXT,
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_meadows_host
            ON meadows(host_id, status);

        CREATE TABLE IF NOT EXISTS meadow_participants (
            meadow_id  TEXT NOT NULL REFERENCES meadows(id),
            user_id    TEXT NOT NULL REFERENCES users(id),
            role       TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (meadow_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_participants_user
            ON meadow_participants(user_id, created_at);

        CREATE TABLE IF NOT EXISTS resources (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            description   TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            url           TEXT,
            body          TEXT,
            access        TEXT NOT NULL DEFAULT 'PUBLIC',
            stage         TEXT,
            author_id     TEXT NOT NULL REFERENCES users(id),
            meadow_id     TEXT REFERENCES meadows(id),
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resource_categories (
            id   TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS resource_category_links (
            resource_id TEXT NOT NULL REFERENCES resources(id),
            category_id TEXT NOT NULL REFERENCES resource_categories(id),
            PRIMARY KEY (resource_id, category_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
