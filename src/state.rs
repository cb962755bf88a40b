use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::adapters::Presenter;
use crate::auth::token::TokenKeys;
use crate::config::Config;
use crate::uploads::{MediaStore, UploadPolicy};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenKeys>,
    pub media: MediaStore,
    pub presenter: Presenter,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenKeys::new(
            config.jwt_secret().as_bytes(),
            config.auth.token_hours,
        ));
        let media = MediaStore::new(config.uploads_path());
        let presenter = Presenter::new(&config.base_url())?;
        Ok(Self {
            db,
            config,
            tokens,
            media,
            presenter,
        })
    }

    /// Upload rules for offer creation.
    pub fn offer_upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.config.storage.max_file_size,
            file_fields: vec![("previewImage", 1), ("photos", self.config.storage.max_photos)],
        }
    }

    /// Upload rules for registration.
    pub fn avatar_upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.config.storage.max_file_size,
            file_fields: vec![("avatar", 1)],
        }
    }

    /// Largest request body the upload rules can produce, plus form overhead.
    pub fn body_limit(&self) -> usize {
        let files = self.config.storage.max_photos + 1;
        self.config.storage.max_file_size * files + 1024 * 1024
    }
}
