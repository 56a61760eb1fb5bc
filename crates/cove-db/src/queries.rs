use crate::Database;
use crate::models::{AudioMetadataRow, FileListRow, FileRow, ShareRow, UserRow, VideoMetadataRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const FILE_COLUMNS: &str =
    "id, name, kind, size, storage_key, nonce, auth_tag, encrypted, owner_id, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, name: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, name, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, email, password, created_at FROM users WHERE email = ?1")?;
            let row = stmt.query_row([email], map_user_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, email, password, created_at FROM users WHERE id = ?1")?;
            let row = stmt.query_row([id], map_user_row).optional()?;
            Ok(row)
        })
    }

    // -- Files --

    /// Insert a file row together with the owner's write grant.
    ///
    /// Both inserts run in one transaction: a file reachable by nobody must
    /// never become visible, so a failed grant insert rolls the file back.
    pub fn insert_file_with_owner(&self, file: &FileRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!("INSERT INTO files ({FILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
                rusqlite::params![
                    file.id,
                    file.name,
                    file.kind,
                    file.size,
                    file.storage_key,
                    file.nonce,
                    file.auth_tag,
                    file.encrypted,
                    file.owner_id,
                    file.created_at,
                    file.updated_at,
                ],
            )?;
            tx.execute(
                "INSERT INTO user_files (user_id, file_id, permission) VALUES (?1, ?2, 'write')",
                (&file.owner_id, &file.id),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_file(&self, file_id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| query_file(conn, file_id))
    }

    /// The file, if `user_id` holds any grant on it.
    pub fn get_file_for_user(&self, file_id: &str, user_id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM files f
                 JOIN user_files uf ON f.id = uf.file_id
                 WHERE f.id = ?1 AND uf.user_id = ?2",
                prefixed_file_columns()
            ))?;
            let row = stmt.query_row([file_id, user_id], map_file_row).optional()?;
            Ok(row)
        })
    }

    /// The file, if `user_id` holds a write grant on it.
    pub fn get_file_for_writer(&self, file_id: &str, user_id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM files f
                 JOIN user_files uf ON f.id = uf.file_id
                 WHERE f.id = ?1 AND uf.user_id = ?2 AND uf.permission = 'write'",
                prefixed_file_columns()
            ))?;
            let row = stmt.query_row([file_id, user_id], map_file_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_file_owned(&self, file_id: &str, owner_id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FILE_COLUMNS} FROM files WHERE id = ?1 AND owner_id = ?2"
            ))?;
            let row = stmt.query_row([file_id, owner_id], map_file_row).optional()?;
            Ok(row)
        })
    }

    /// Files owned by or shared with the user, newest-updated first.
    pub fn list_files_for_user(&self, user_id: &str) -> Result<Vec<FileListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, CASE WHEN s.id IS NOT NULL THEN 1 ELSE 0 END AS is_shared
                 FROM files f
                 LEFT JOIN shares s ON f.id = s.file_id
                 WHERE f.owner_id = ?1
                    OR f.id IN (SELECT file_id FROM user_files WHERE user_id = ?1)
                 ORDER BY f.updated_at DESC",
                prefixed_file_columns()
            ))?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FileListRow {
                        file: map_file_row(row)?,
                        is_shared: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Rewrite the cipher fields after a content save. Every save carries a
    /// fresh nonce/tag pair and re-marks the row encrypted.
    pub fn update_cipher_fields(
        &self,
        file_id: &str,
        nonce: &str,
        auth_tag: &str,
        updated_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE files SET nonce = ?1, auth_tag = ?2, encrypted = 1, updated_at = ?3
                 WHERE id = ?4",
                (nonce, auth_tag, updated_at, file_id),
            )?;
            Ok(())
        })
    }

    /// Owner delete. Grants, shares and metadata rows go with the file via
    /// ON DELETE CASCADE.
    pub fn delete_file(&self, file_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM files WHERE id = ?1", [file_id])?;
            Ok(())
        })
    }

    // -- Grants --

    pub fn has_grant(&self, file_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM user_files WHERE file_id = ?1 AND user_id = ?2",
                    [file_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn insert_grant(&self, user_id: &str, file_id: &str, permission: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_files (user_id, file_id, permission) VALUES (?1, ?2, ?3)",
                (user_id, file_id, permission),
            )?;
            Ok(())
        })
    }

    /// Revoke one user's access, leaving the file intact.
    pub fn delete_grant(&self, file_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM user_files WHERE file_id = ?1 AND user_id = ?2",
                [file_id, user_id],
            )?;
            Ok(())
        })
    }

    // -- Shares --

    pub fn get_share_token(&self, file_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let token = conn
                .query_row(
                    "SELECT token FROM shares WHERE file_id = ?1",
                    [file_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(token)
        })
    }

    pub fn insert_share(&self, id: &str, file_id: &str, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO shares (id, file_id, token) VALUES (?1, ?2, ?3)",
                (id, file_id, token),
            )?;
            Ok(())
        })
    }

    pub fn get_share_by_token(&self, token: &str) -> Result<Option<ShareRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, file_id, token FROM shares WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(ShareRow {
                            id: row.get(0)?,
                            file_id: row.get(1)?,
                            token: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Audio metadata --

    pub fn upsert_audio_metadata(&self, meta: &AudioMetadataRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audio_metadata (file_id, title, artist, album, cover, lyrics)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(file_id) DO UPDATE SET
                     title = excluded.title,
                     artist = excluded.artist,
                     album = excluded.album,
                     cover = excluded.cover,
                     lyrics = excluded.lyrics",
                rusqlite::params![
                    meta.file_id,
                    meta.title,
                    meta.artist,
                    meta.album,
                    meta.cover,
                    meta.lyrics,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_audio_metadata(&self, file_id: &str) -> Result<Option<AudioMetadataRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT file_id, title, artist, album, cover, lyrics
                     FROM audio_metadata WHERE file_id = ?1",
                    [file_id],
                    |row| {
                        Ok(AudioMetadataRow {
                            file_id: row.get(0)?,
                            title: row.get(1)?,
                            artist: row.get(2)?,
                            album: row.get(3)?,
                            cover: row.get(4)?,
                            lyrics: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Video metadata --

    pub fn insert_video_metadata(&self, meta: &VideoMetadataRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO video_metadata (file_id, title, duration, resolution, thumbnail, codec)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    meta.file_id,
                    meta.title,
                    meta.duration,
                    meta.resolution,
                    meta.thumbnail,
                    meta.codec,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_video_metadata(&self, file_id: &str) -> Result<Option<VideoMetadataRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT file_id, title, duration, resolution, thumbnail, codec
                     FROM video_metadata WHERE file_id = ?1",
                    [file_id],
                    |row| {
                        Ok(VideoMetadataRow {
                            file_id: row.get(0)?,
                            title: row.get(1)?,
                            duration: row.get(2)?,
                            resolution: row.get(3)?,
                            thumbnail: row.get(4)?,
                            codec: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn prefixed_file_columns() -> String {
    FILE_COLUMNS
        .split(", ")
        .map(|c| format!("f.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn query_file(conn: &Connection, file_id: &str) -> Result<Option<FileRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"))?;
    let row = stmt.query_row([file_id], map_file_row).optional()?;
    Ok(row)
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_file_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        size: row.get(3)?,
        storage_key: row.get(4)?,
        nonce: row.get(5)?,
        auth_tag: row.get(6)?,
        encrypted: row.get(7)?,
        owner_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn open_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("cove-test.db")).unwrap();
        (db, dir)
    }

    fn seed_user(db: &Database) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, "tester", &format!("{id}@example.com"), "hash")
            .unwrap();
        id
    }

    fn seed_file(db: &Database, owner_id: &str) -> FileRow {
        let file = FileRow {
            id: Uuid::new_v4().to_string(),
            name: "notes.txt".into(),
            kind: "text/plain".into(),
            size: 9,
            storage_key: format!("{}.txt", Uuid::new_v4()),
            nonce: Some("bm9uY2U=".into()),
            auth_tag: Some("dGFn".into()),
            encrypted: true,
            owner_id: owner_id.into(),
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        };
        db.insert_file_with_owner(&file).unwrap();
        file
    }

    #[test]
    fn insert_creates_file_and_owner_grant() {
        let (db, _dir) = open_test_db();
        let owner = seed_user(&db);
        let file = seed_file(&db, &owner);

        assert!(db.get_file(&file.id).unwrap().is_some());
        assert!(db.has_grant(&file.id, &owner).unwrap());
        // Owner grant carries write permission
        assert!(db.get_file_for_writer(&file.id, &owner).unwrap().is_some());
    }

    #[test]
    fn duplicate_grant_is_rejected() {
        let (db, _dir) = open_test_db();
        let owner = seed_user(&db);
        let file = seed_file(&db, &owner);

        assert!(db.insert_grant(&owner, &file.id, "write").is_err());
    }

    #[test]
    fn delete_cascades_to_grants_shares_and_metadata() {
        let (db, _dir) = open_test_db();
        let owner = seed_user(&db);
        let file = seed_file(&db, &owner);

        db.insert_share(&Uuid::new_v4().to_string(), &file.id, "cove_share?abc")
            .unwrap();
        db.upsert_audio_metadata(&AudioMetadataRow {
            file_id: file.id.clone(),
            title: Some("Song A".into()),
            artist: None,
            album: None,
            cover: None,
            lyrics: None,
        })
        .unwrap();

        db.delete_file(&file.id).unwrap();

        assert!(db.get_file(&file.id).unwrap().is_none());
        assert!(!db.has_grant(&file.id, &owner).unwrap());
        assert!(db.get_share_token(&file.id).unwrap().is_none());
        assert!(db.get_audio_metadata(&file.id).unwrap().is_none());
    }

    #[test]
    fn listing_marks_shared_files() {
        let (db, _dir) = open_test_db();
        let owner = seed_user(&db);
        let shared = seed_file(&db, &owner);
        let private = seed_file(&db, &owner);
        db.insert_share(&Uuid::new_v4().to_string(), &shared.id, "cove_share?tok")
            .unwrap();

        let rows = db.list_files_for_user(&owner).unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            if row.file.id == shared.id {
                assert!(row.is_shared);
            } else {
                assert_eq!(row.file.id, private.id);
                assert!(!row.is_shared);
            }
        }
    }

    #[test]
    fn listing_includes_files_shared_with_user() {
        let (db, _dir) = open_test_db();
        let owner = seed_user(&db);
        let joiner = seed_user(&db);
        let file = seed_file(&db, &owner);
        db.insert_grant(&joiner, &file.id, "write").unwrap();

        let rows = db.list_files_for_user(&joiner).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file.id, file.id);
    }

    #[test]
    fn cipher_field_update_rewrites_pair() {
        let (db, _dir) = open_test_db();
        let owner = seed_user(&db);
        let file = seed_file(&db, &owner);

        db.update_cipher_fields(&file.id, "bmV3", "bmV3dGFn", "2025-01-02T00:00:00Z")
            .unwrap();

        let row = db.get_file(&file.id).unwrap().unwrap();
        assert_eq!(row.nonce.as_deref(), Some("bmV3"));
        assert_eq!(row.auth_tag.as_deref(), Some("bmV3dGFn"));
        assert!(row.encrypted);
        assert_eq!(row.updated_at, "2025-01-02T00:00:00Z");
    }

    #[test]
    fn audio_metadata_upsert_overwrites() {
        let (db, _dir) = open_test_db();
        let owner = seed_user(&db);
        let file = seed_file(&db, &owner);

        db.upsert_audio_metadata(&AudioMetadataRow {
            file_id: file.id.clone(),
            title: Some("First".into()),
            artist: None,
            album: None,
            cover: None,
            lyrics: None,
        })
        .unwrap();
        db.upsert_audio_metadata(&AudioMetadataRow {
            file_id: file.id.clone(),
            title: Some("Second".into()),
            artist: Some("Artist".into()),
            album: None,
            cover: None,
            lyrics: None,
        })
        .unwrap();

        let row = db.get_audio_metadata(&file.id).unwrap().unwrap();
        assert_eq!(row.title.as_deref(), Some("Second"));
        assert_eq!(row.artist.as_deref(), Some("Artist"));
    }
}
