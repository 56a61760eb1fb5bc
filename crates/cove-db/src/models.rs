/// Database row types — these map directly to SQLite rows.
/// Distinct from cove-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct FileRow {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub size: i64,
    pub storage_key: String,
    pub nonce: Option<String>,
    pub auth_tag: Option<String>,
    pub encrypted: bool,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A listing row: the file plus whether a share token exists for it.
pub struct FileListRow {
    pub file: FileRow,
    pub is_shared: bool,
}

pub struct ShareRow {
    pub id: String,
    pub file_id: String,
    pub token: String,
}

pub struct AudioMetadataRow {
    pub file_id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover: Option<String>,
    pub lyrics: Option<String>,
}

pub struct VideoMetadataRow {
    pub file_id: String,
    pub title: String,
    pub duration: Option<i64>,
    pub resolution: Option<String>,
    pub thumbnail: Option<String>,
    pub codec: Option<String>,
}
