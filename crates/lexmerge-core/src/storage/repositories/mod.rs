mod merge_repository;
mod review_repository;
mod word_repository;

pub use merge_repository::{MergeRepository, SqliteMergeRepository};
pub use review_repository::{ReviewRepository, SqliteReviewRepository};
pub use word_repository::{SqliteWordRepository, WordRepository};

use crate::error::Result;

pub trait Repository {
    type Entity;
    type Id;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
    fn save(&self, entity: &Self::Entity) -> Result<()>;
    fn delete(&self, id: &Self::Id) -> Result<bool>;
}
