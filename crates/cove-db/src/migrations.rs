use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS files (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            kind         TEXT NOT NULL,
            size         INTEGER NOT NULL,
            storage_key  TEXT NOT NULL,
            nonce        TEXT,
            auth_tag     TEXT,
            encrypted    INTEGER NOT NULL DEFAULT 1,
            owner_id     TEXT NOT NULL REFERENCES users(id),
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_files_owner
            ON files(owner_id);

        CREATE TABLE IF NOT EXISTS user_files (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            file_id     TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            permission  TEXT NOT NULL DEFAULT 'read',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, file_id)
        );

        CREATE TABLE IF NOT EXISTS shares (
            id          TEXT PRIMARY KEY,
            file_id     TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            token       TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            expires_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_shares_file
            ON shares(file_id);

        CREATE TABLE IF NOT EXISTS audio_metadata (
            file_id  TEXT PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
            title    TEXT,
            artist   TEXT,
            album    TEXT,
            cover    TEXT,
            lyrics   TEXT
        );

        CREATE TABLE IF NOT EXISTS video_metadata (
            file_id     TEXT PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            duration    INTEGER,
            resolution  TEXT,
            thumbnail   TEXT,
            codec       TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
