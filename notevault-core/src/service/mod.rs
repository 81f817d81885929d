pub mod files;
pub mod stats;
pub mod trash;

pub use files::FileService;
pub use stats::StatsService;
pub use trash::TrashService;
